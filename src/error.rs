//! Error types for hyperjump.
//!
//! This module provides error types for configuration, particle population,
//! the rendering capability, surface acquisition, and GPU initialization.

use thiserror::Error;

/// Errors raised while validating or loading a configuration snapshot.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Particle or star count must be strictly positive.
    #[error("particle count must be positive, got {0}")]
    NonPositiveCount(i64),
    /// Particle or star count exceeds what a field will generate.
    #[error("particle count must be at most {max}, got {count}")]
    CountTooLarge { count: i64, max: usize },
    /// Speed multiplier must be finite and strictly positive.
    #[error("speed multiplier must be a positive finite number, got {0}")]
    InvalidSpeed(f32),
    /// The settings document could not be parsed.
    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
    /// The settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when (re)building a particle population.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    /// A population must contain at least one particle.
    #[error("cannot configure an empty particle population")]
    EmptyPopulation,
    /// More particles were requested than a field will generate.
    #[error("cannot configure {0} particles, the limit is {max}", max = crate::field::MAX_PARTICLES)]
    TooManyParticles(usize),
}

/// Errors reported by a rendering backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Shader compilation or program linking failed.
    #[error("{stage} shader failed to compile: {log}")]
    Compile {
        /// Which stage failed ("vertex", "fragment" or "link").
        stage: &'static str,
        /// Diagnostic text from the shader compiler.
        log: String,
    },
    /// A draw referenced a program the backend does not know about.
    #[error("unknown program handle {0}")]
    UnknownProgram(u32),
}

/// Errors raised while acquiring or presenting the drawable surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The host surface is not usable yet (for example zero-sized).
    #[error("surface is not ready")]
    NotReady,
    /// The surface was lost and must be recreated.
    #[error("surface lost")]
    Lost,
    /// The surface configuration no longer matches the window.
    #[error("surface outdated")]
    Outdated,
    /// Acquiring the next frame timed out.
    #[error("timed out acquiring the next frame")]
    Timeout,
    /// The graphics driver ran out of memory.
    #[error("out of memory")]
    OutOfMemory,
}

impl SurfaceError {
    /// Whether retrying after a short backoff can succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SurfaceError::OutOfMemory)
    }

    /// Whether the surface has to be recreated before the next frame.
    pub fn needs_recreate(&self) -> bool {
        matches!(self, SurfaceError::Lost | SurfaceError::Outdated)
    }
}

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
}

/// Errors that can occur when running the windowed host.
#[derive(Debug, Error)]
pub enum HostError {
    /// Failed to create event loop.
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    /// Failed to create window.
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    /// GPU initialization failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
}
