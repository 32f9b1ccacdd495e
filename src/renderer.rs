//! The hyperspace renderer: settings, simulation and drawing for one surface.
//!
//! [`HyperspaceRenderer`] is composed from the pieces the render loop needs
//! and implements the orchestrator's callback traits. It lives on the render
//! thread; the host talks to it only through the [`InputBridge`] and the
//! [`SettingsStore`] it was built from.
//!
//! Per frame:
//!
//! 1. apply a newer settings snapshot, if one was published
//! 2. feed the input signals to the clock and advance it one step
//! 3. advance the field (respawning expired particles)
//! 4. rebuild the vertex streams and draw them with additive blending

use std::time::Duration;

use crate::backend::{BlendFactor, ProgramHandle, RenderBackend};
use crate::clock::SimulationClock;
use crate::config::{ConfigSnapshot, SettingsStore, SettingsWatcher};
use crate::field::ParticleField;
use crate::input::InputBridge;
use crate::orchestrator::{Drawable, LifecycleAware, Resizable};
use crate::shader::{self, ProgramSource, ShaderDialect};
use crate::vertex::{FrameParams, StreamLayout, VertexStreamBuilder};

/// Deep space blue.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.02, 1.0];

pub struct HyperspaceRenderer {
    field: ParticleField,
    clock: SimulationClock,
    builder: VertexStreamBuilder,
    input: InputBridge,
    settings: SettingsWatcher,
    config: Option<ConfigSnapshot>,
    dialect: ShaderDialect,
    point_program: ProgramHandle,
    line_program: ProgramHandle,
    size: (u32, u32),
}

impl HyperspaceRenderer {
    pub fn new(settings: &SettingsStore, input: InputBridge) -> Self {
        Self::with_field(settings, input, ParticleField::new())
    }

    /// Renderer with a caller-provided (e.g. seeded) field.
    pub fn with_field(settings: &SettingsStore, input: InputBridge, field: ParticleField) -> Self {
        Self {
            field,
            clock: SimulationClock::default(),
            builder: VertexStreamBuilder::new(),
            input,
            settings: settings.watch(),
            config: None,
            dialect: ShaderDialect::Wgsl,
            point_program: ProgramHandle::INVALID,
            line_program: ProgramHandle::INVALID,
            size: (1, 1),
        }
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn builder(&self) -> &VertexStreamBuilder {
        &self.builder
    }

    pub fn input(&self) -> &InputBridge {
        &self.input
    }

    /// The settings currently in effect.
    pub fn config(&self) -> Option<&ConfigSnapshot> {
        self.config.as_ref()
    }

    /// Pick up a newer settings snapshot. Never called mid-frame.
    fn apply_pending_settings(&mut self) {
        let Some(snapshot) = self.settings.poll() else {
            return;
        };
        let regenerate = match &self.config {
            Some(current) => current.needs_regeneration(&snapshot),
            None => true,
        };
        if regenerate {
            let result =
                self.field
                    .configure(snapshot.mode, snapshot.count(), snapshot.palette());
            if let Err(e) = result {
                log::warn!("Keeping previous population: {}", e);
                return;
            }
            self.builder.reserve(self.field.population(), self.dialect);
        }
        self.clock.set_speed_multiplier(snapshot.speed_multiplier);
        log::debug!("Applied settings: {:?}", snapshot);
        self.config = Some(snapshot);
    }

    fn compile(backend: &mut dyn RenderBackend, source: ProgramSource) -> ProgramHandle {
        match backend.compile_program(source.vertex, source.fragment) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to build {} program: {}", source.name, e);
                ProgramHandle::INVALID
            }
        }
    }
}

impl LifecycleAware for HyperspaceRenderer {
    fn surface_created(&mut self, backend: &mut dyn RenderBackend) {
        self.dialect = backend.dialect();
        backend.clear(CLEAR_COLOR);
        self.point_program = Self::compile(backend, shader::point_program(self.dialect));
        self.line_program = Self::compile(backend, shader::line_program(self.dialect));
        self.apply_pending_settings();
        self.input.set_listening(true);
        log::info!("Renderer ready ({:?})", self.dialect);
    }

    fn surface_destroyed(&mut self, backend: &mut dyn RenderBackend) {
        self.input.set_listening(false);
        for program in [self.point_program, self.line_program] {
            if program.is_valid() {
                backend.delete_program(program);
            }
        }
        self.point_program = ProgramHandle::INVALID;
        self.line_program = ProgramHandle::INVALID;
    }

    fn paused(&mut self) {
        self.input.set_listening(false);
    }

    fn resumed(&mut self) {
        self.input.set_listening(true);
    }
}

impl Resizable for HyperspaceRenderer {
    fn surface_changed(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        self.size = (width, height);
        backend.set_viewport(width, height);
        log::debug!("Viewport {}x{}", width, height);
    }
}

impl Drawable for HyperspaceRenderer {
    fn draw_frame(&mut self, backend: &mut dyn RenderBackend) {
        self.apply_pending_settings();

        self.clock.apply_signals(self.input.signals());
        self.clock.advance(1.0);
        self.field.advance(&self.clock);

        let frame = FrameParams::from_clock(&self.clock, self.size.0, self.size.1);
        let count = self
            .builder
            .build(self.field.population(), self.dialect, &frame);

        backend.clear(CLEAR_COLOR);
        let program = match self.builder.layout() {
            Some(StreamLayout::Tunnel) => self.line_program,
            _ => self.point_program,
        };
        if !program.is_valid() || count == 0 {
            return;
        }

        backend.set_blend(BlendFactor::SrcAlpha, BlendFactor::One, true);
        backend.upload_and_draw(
            program,
            self.builder.primitive(),
            count,
            &self.builder.streams(),
            &self.builder.uniforms(&frame),
        );
        backend.set_blend(BlendFactor::SrcAlpha, BlendFactor::One, false);
    }

    fn frame_interval(&self) -> Option<Duration> {
        self.config
            .as_ref()
            .map(|c| c.fps_target)
            .unwrap_or_default()
            .frame_interval()
    }
}
