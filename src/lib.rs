//! # Hyperjump
//!
//! A hyperspace / energy-burst particle renderer: thousands of particles
//! streaming radially out of the center or down a twisting tunnel, drawn
//! with additive blending, reacting to device tilt (parallax) and touch
//! (warp).
//!
//! ## Quick Start
//!
//! ```ignore
//! use hyperjump::prelude::*;
//!
//! fn main() -> Result<(), HostError> {
//!     let settings = SettingsStore::new(ConfigSnapshot::default());
//!     hyperjump::window::run(&settings)
//! }
//! ```
//!
//! ## Architecture
//!
//! Leaf to root:
//!
//! | Module | Role |
//! |--------|------|
//! | [`field`] | Owns the particle population, regenerates and respawns it |
//! | [`clock`] | Fixed-step animation time, warp, parallax easing |
//! | [`vertex`] | Turns particles into flat attribute streams each frame |
//! | [`orchestrator`] | Render thread, surface lifecycle, pause/resume/destroy |
//! | [`input`] | Tilt and pointer events to parallax target and warp flag |
//!
//! Around them, [`config`] carries settings snapshots to the render thread,
//! [`backend`] is the drawing capability the renderer consumes, [`gpu`]
//! implements it on wgpu, and [`renderer`] wires everything into the
//! orchestrator's callbacks.
//!
//! ## Embedding
//!
//! Hosts other than the bundled winit window drive a [`FrameOrchestrator`]
//! directly and feed input through an [`InputBridge`]:
//!
//! ```ignore
//! let input = InputBridge::new();
//! let renderer = HyperspaceRenderer::new(&settings, input.clone());
//! let mut orchestrator = FrameOrchestrator::new(renderer);
//!
//! orchestrator.surface_created(move || WgpuContext::new(instance, surface));
//! orchestrator.surface_changed(width, height);
//! input.on_gyroscope([x, y, z]);
//! orchestrator.visibility_changed(false);
//! orchestrator.surface_destroyed();
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod field;
pub mod gpu;
pub mod input;
pub mod orchestrator;
pub mod palette;
pub mod renderer;
pub mod shader;
pub mod time;
pub mod vertex;
pub mod window;

pub use backend::{
    AttributeStream, BlendFactor, BlendState, Primitive, ProgramHandle, RenderBackend,
    UniformValue,
};
pub use clock::{Parallax, SimulationClock};
pub use config::{ConfigSnapshot, FpsTarget, SettingsStore, SettingsWatcher, SimulationMode};
pub use error::{BackendError, ConfigError, FieldError, GpuError, HostError, SurfaceError};
pub use field::{ParticleField, Population, RadialParticle, ShapeKind, Star};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::WgpuContext;
pub use input::{ControlSignals, InputBridge};
pub use orchestrator::{
    Drawable, FrameOrchestrator, GraphicsContext, LifecycleAware, OrchestratorState, Renderer,
    Resizable,
};
pub use palette::{Palette, Rgb8, Theme};
pub use renderer::HyperspaceRenderer;
pub use shader::ShaderDialect;
pub use time::FrameTimer;
pub use vertex::{FrameParams, StreamLayout, VertexStreamBuilder};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use hyperjump::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::{Primitive, ProgramHandle, RenderBackend, UniformValue};
    pub use crate::config::{ConfigSnapshot, FpsTarget, SettingsStore, SimulationMode};
    pub use crate::error::{ConfigError, HostError};
    pub use crate::field::ParticleField;
    pub use crate::input::InputBridge;
    pub use crate::orchestrator::{
        Drawable, FrameOrchestrator, GraphicsContext, LifecycleAware, OrchestratorState,
        Resizable,
    };
    pub use crate::palette::{Rgb8, Theme};
    pub use crate::renderer::HyperspaceRenderer;
    pub use crate::{Vec2, Vec3, Vec4};
}
