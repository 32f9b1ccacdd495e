//! Recording doubles for the graphics context and rendering capability.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use hyperjump::backend::{
    AttributeStream, BlendFactor, Primitive, ProgramHandle, RenderBackend, UniformValue,
};
use hyperjump::error::{BackendError, SurfaceError};
use hyperjump::orchestrator::GraphicsContext;
use hyperjump::shader::ShaderDialect;

/// Everything a backend or context was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    AcquireSurface(u32, u32),
    ReleaseSurface,
    Present,
    Release,
    Compile,
    DeleteProgram(ProgramHandle),
    Viewport(u32, u32),
    Clear([f32; 4]),
    Blend(BlendFactor, BlendFactor, bool),
    Draw(DrawCall),
}

/// Copy of one `upload_and_draw`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub primitive: Primitive,
    pub vertex_count: usize,
    pub streams: Vec<(&'static str, u32, Vec<f32>)>,
    pub uniforms: Vec<(&'static str, UniformValue)>,
}

impl DrawCall {
    pub fn stream(&self, name: &str) -> Option<&(&'static str, u32, Vec<f32>)> {
        self.streams.iter().find(|(n, _, _)| *n == name)
    }

    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

pub fn draws(log: &CallLog) -> Vec<DrawCall> {
    calls(log)
        .into_iter()
        .filter_map(|c| match c {
            Call::Draw(d) => Some(d),
            _ => None,
        })
        .collect()
}

/// Rendering capability that records every call.
pub struct RecordingBackend {
    pub dialect: ShaderDialect,
    pub log: CallLog,
    pub fail_compile: bool,
    next_program: u32,
}

impl RecordingBackend {
    pub fn new(dialect: ShaderDialect) -> Self {
        Self::with_log(dialect, new_log())
    }

    pub fn with_log(dialect: ShaderDialect, log: CallLog) -> Self {
        Self {
            dialect,
            log,
            fail_compile: false,
            next_program: 1,
        }
    }

    fn push(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

impl RenderBackend for RecordingBackend {
    fn dialect(&self) -> ShaderDialect {
        self.dialect
    }

    fn compile_program(
        &mut self,
        _vertex_src: &str,
        _fragment_src: &str,
    ) -> Result<ProgramHandle, BackendError> {
        self.push(Call::Compile);
        if self.fail_compile {
            return Err(BackendError::Compile {
                stage: "vertex",
                log: "mock failure".into(),
            });
        }
        let handle = ProgramHandle(self.next_program);
        self.next_program += 1;
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.push(Call::DeleteProgram(program));
    }

    fn upload_and_draw(
        &mut self,
        program: ProgramHandle,
        primitive: Primitive,
        vertex_count: usize,
        streams: &[AttributeStream<'_>],
        uniforms: &[(&'static str, UniformValue)],
    ) {
        self.push(Call::Draw(DrawCall {
            program,
            primitive,
            vertex_count,
            streams: streams
                .iter()
                .map(|s| (s.name, s.components, s.data.to_vec()))
                .collect(),
            uniforms: uniforms.to_vec(),
        }));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.push(Call::Viewport(width, height));
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        self.push(Call::Clear(rgba));
    }

    fn set_blend(&mut self, src: BlendFactor, dst: BlendFactor, enabled: bool) {
        self.push(Call::Blend(src, dst, enabled));
    }
}

/// Graphics context that records into the same log as its backend.
///
/// `fail_acquire` makes the next N surface acquisitions fail;
/// `lose_on_present` reports a lost surface on the given present.
pub struct RecordingContext {
    pub backend: RecordingBackend,
    pub fail_acquire: Arc<Mutex<u32>>,
    pub lose_on_present: Option<u64>,
    presents: u64,
}

impl RecordingContext {
    pub fn new(log: CallLog) -> Self {
        Self {
            backend: RecordingBackend::with_log(ShaderDialect::Glsl100, log),
            fail_acquire: Arc::new(Mutex::new(0)),
            lose_on_present: None,
            presents: 0,
        }
    }
}

impl GraphicsContext for RecordingContext {
    fn acquire_surface(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        self.backend.push(Call::AcquireSurface(width, height));
        let mut failures = self.fail_acquire.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(SurfaceError::NotReady);
        }
        Ok(())
    }

    fn release_surface(&mut self) {
        self.backend.push(Call::ReleaseSurface);
    }

    fn backend(&mut self) -> &mut dyn RenderBackend {
        &mut self.backend
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        self.presents += 1;
        self.backend.push(Call::Present);
        if self.lose_on_present == Some(self.presents) {
            return Err(SurfaceError::Lost);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.backend.push(Call::Release);
    }
}
