//! wgpu implementation of the graphics context and rendering capability.
//!
//! [`WgpuContext`] is both the [`GraphicsContext`] the render loop owns and
//! the [`RenderBackend`] the renderer draws through. The `wgpu::Surface` is
//! created on the host's main thread and handed over; adapter and device are
//! requested on the render thread.
//!
//! Frames are acquired lazily by the first `clear` or draw and submitted by
//! `present`. Vertex buffers are kept per stream name and only grow.
//! Pipelines are created on first use and cached by program, primitive, blend
//! state and stream layout.

use std::collections::HashMap;

use crate::backend::{
    pack_uniforms, AttributeStream, BlendFactor, BlendState, Primitive, ProgramHandle,
    RenderBackend, UniformValue, MAX_STREAMS,
};
use crate::error::{BackendError, GpuError, SurfaceError};
use crate::orchestrator::GraphicsContext;
use crate::shader::ShaderDialect;

/// Vertices of the quad each point expands into.
const POINT_QUAD_VERTICES: u32 = 6;

struct Program {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    primitive: Primitive,
    blend: BlendState,
    /// Components per stream, 0 for unused slots.
    streams: [u32; MAX_STREAMS],
    has_uniforms: bool,
}

struct UniformSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct Frame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    /// The pending clear has been recorded into `encoder`.
    cleared: bool,
}

pub struct WgpuContext {
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: Option<wgpu::SurfaceConfiguration>,
    uniform_layout: wgpu::BindGroupLayout,
    uniforms: Option<UniformSlot>,
    programs: HashMap<ProgramHandle, Program>,
    next_program: u32,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    buffers: HashMap<&'static str, wgpu::Buffer>,
    blend: BlendState,
    viewport: (u32, u32),
    clear_color: wgpu::Color,
    frame: Option<Frame>,
    frame_error: Option<SurfaceError>,
}

impl WgpuContext {
    /// Request an adapter and device for `surface`. Blocks the calling thread.
    pub fn new(instance: wgpu::Instance, surface: wgpu::Surface<'static>) -> Result<Self, GpuError> {
        pollster::block_on(Self::init(instance, surface))
    }

    async fn init(instance: wgpu::Instance, surface: wgpu::Surface<'static>) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Hyperjump Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;
        device.on_uncaptured_error(Box::new(|e: wgpu::Error| log::error!("Uncaptured wgpu error: {}", e)));

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        Ok(Self {
            surface,
            adapter,
            device,
            queue,
            config: None,
            uniform_layout,
            uniforms: None,
            programs: HashMap::new(),
            next_program: 1,
            pipelines: HashMap::new(),
            buffers: HashMap::new(),
            blend: BlendState::DISABLED,
            viewport: (0, 0),
            clear_color: wgpu::Color::BLACK,
            frame: None,
            frame_error: None,
        })
    }

    fn format(&self) -> Option<wgpu::TextureFormat> {
        self.config.as_ref().map(|c| c.format)
    }

    /// Acquire the next surface texture if this frame has none yet.
    fn ensure_frame(&mut self) -> bool {
        if self.frame.is_some() {
            return true;
        }
        if self.config.is_none() || self.frame_error.is_some() {
            return false;
        }
        match self.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let encoder = self
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Frame Encoder"),
                    });
                self.frame = Some(Frame {
                    texture,
                    view,
                    encoder,
                    cleared: false,
                });
                true
            }
            Err(e) => {
                self.frame_error = Some(map_surface_error(e));
                false
            }
        }
    }

    fn write_stream(&mut self, stream: &AttributeStream<'_>) {
        let bytes: &[u8] = bytemuck::cast_slice(stream.data);
        let needed = bytes.len().max(4) as wgpu::BufferAddress;
        let grow = self
            .buffers
            .get(stream.name)
            .map_or(true, |buffer| buffer.size() < needed);
        if grow {
            let size = needed.next_power_of_two();
            log::debug!("Growing {} buffer to {} bytes", stream.name, size);
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(stream.name),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.buffers.insert(stream.name, buffer);
        }
        if let Some(buffer) = self.buffers.get(stream.name) {
            if !bytes.is_empty() {
                self.queue.write_buffer(buffer, 0, bytes);
            }
        }
    }

    fn write_uniforms(&mut self, uniforms: &[(&'static str, UniformValue)]) {
        let bytes = pack_uniforms(uniforms);
        if bytes.is_empty() {
            return;
        }
        let needed = bytes.len() as wgpu::BufferAddress;
        let grow = self
            .uniforms
            .as_ref()
            .map_or(true, |slot| slot.buffer.size() < needed);
        if grow {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Uniform Buffer"),
                size: needed,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Uniform Bind Group"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            self.uniforms = Some(UniformSlot { buffer, bind_group });
        }
        if let Some(slot) = &self.uniforms {
            self.queue.write_buffer(&slot.buffer, 0, &bytes);
        }
    }

    fn pipeline(&mut self, key: PipelineKey) -> Option<&wgpu::RenderPipeline> {
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.create_pipeline(&key)?;
            self.pipelines.insert(key, pipeline);
        }
        self.pipelines.get(&key)
    }

    fn create_pipeline(&self, key: &PipelineKey) -> Option<wgpu::RenderPipeline> {
        let program = self.programs.get(&key.program)?;
        let format = self.format()?;

        let step_mode = match key.primitive {
            Primitive::Points => wgpu::VertexStepMode::Instance,
            Primitive::Lines => wgpu::VertexStepMode::Vertex,
        };
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
            .streams
            .iter()
            .take_while(|&&components| components > 0)
            .enumerate()
            .map(|(location, &components)| {
                [wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: location as u32,
                    format: vertex_format(components),
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = key
            .streams
            .iter()
            .zip(attributes.iter())
            .map(|(&components, attribute)| wgpu::VertexBufferLayout {
                array_stride: (components as usize * std::mem::size_of::<f32>())
                    as wgpu::BufferAddress,
                step_mode,
                attributes: attribute,
            })
            .collect();

        let uniform_layouts = [&self.uniform_layout];
        let bind_group_layouts: &[&wgpu::BindGroupLayout] = if key.has_uniforms {
            &uniform_layouts
        } else {
            &[]
        };
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts,
                push_constant_ranges: &[],
            });

        let topology = match key.primitive {
            Primitive::Points => wgpu::PrimitiveTopology::TriangleList,
            Primitive::Lines => wgpu::PrimitiveTopology::LineList,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Render Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some("vs_main"),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: wgpu_blend(key.blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!("Failed to create pipeline: {}", e);
            return None;
        }
        Some(pipeline)
    }

    fn compile_module(&self, stage: &'static str, source: &str) -> Result<wgpu::ShaderModule, BackendError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(stage),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => Err(BackendError::Compile {
                stage,
                log: e.to_string(),
            }),
            None => Ok(module),
        }
    }
}

impl GraphicsContext for WgpuContext {
    fn acquire_surface(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::NotReady);
        }
        self.frame = None;
        self.frame_error = None;

        let caps = self.surface.get_capabilities(&self.adapter);
        // Linear target, so additive colors add like a GLES framebuffer
        let format = caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or(SurfaceError::NotReady)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.surface.configure(&self.device, &config);
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            log::warn!("Surface configuration rejected: {}", e);
            return Err(SurfaceError::Lost);
        }

        if self.format() != Some(format) {
            self.pipelines.clear();
        }
        self.config = Some(config);
        self.viewport = (width, height);
        Ok(())
    }

    fn release_surface(&mut self) {
        self.frame = None;
        self.frame_error = None;
    }

    fn backend(&mut self) -> &mut dyn RenderBackend {
        self
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        if let Some(e) = self.frame_error.take() {
            self.frame = None;
            return Err(e);
        }
        // Nothing drawn: still show the cleared frame
        if !self.ensure_frame() {
            return Err(self.frame_error.take().unwrap_or(SurfaceError::NotReady));
        }
        let Some(mut frame) = self.frame.take() else {
            return Err(SurfaceError::NotReady);
        };
        if !frame.cleared {
            let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.texture.present();
        Ok(())
    }

    fn release(&mut self) {
        self.frame = None;
        self.pipelines.clear();
        self.programs.clear();
        self.buffers.clear();
        self.uniforms = None;
        self.config = None;
        log::debug!("wgpu resources released");
    }
}

impl RenderBackend for WgpuContext {
    fn dialect(&self) -> ShaderDialect {
        ShaderDialect::Wgsl
    }

    fn compile_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramHandle, BackendError> {
        let vertex = self.compile_module("vertex", vertex_src)?;
        let fragment = if fragment_src == vertex_src {
            vertex.clone()
        } else {
            self.compile_module("fragment", fragment_src)?
        };
        let handle = ProgramHandle(self.next_program);
        self.next_program += 1;
        self.programs.insert(handle, Program { vertex, fragment });
        Ok(handle)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.pipelines.retain(|key, _| key.program != program);
    }

    fn upload_and_draw(
        &mut self,
        program: ProgramHandle,
        primitive: Primitive,
        vertex_count: usize,
        streams: &[AttributeStream<'_>],
        uniforms: &[(&'static str, UniformValue)],
    ) {
        if vertex_count == 0 || !self.programs.contains_key(&program) {
            return;
        }
        if streams.len() > MAX_STREAMS {
            log::error!("Draw with {} streams exceeds the limit of {}", streams.len(), MAX_STREAMS);
            return;
        }
        if !self.ensure_frame() {
            return;
        }

        let mut layout = [0u32; MAX_STREAMS];
        for (slot, stream) in layout.iter_mut().zip(streams) {
            *slot = stream.components;
        }
        for stream in streams {
            self.write_stream(stream);
        }
        self.write_uniforms(uniforms);

        let key = PipelineKey {
            program,
            primitive,
            blend: self.blend,
            streams: layout,
            has_uniforms: !uniforms.is_empty(),
        };
        let Some(pipeline) = self.pipeline(key).cloned() else {
            return;
        };

        let clear_color = self.clear_color;
        let (width, height) = self.viewport;
        let surface_size = self
            .config
            .as_ref()
            .map_or((width, height), |c| (c.width, c.height));
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let load = if frame.cleared {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(clear_color)
        };
        frame.cleared = true;

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(
            0.0,
            0.0,
            width.min(surface_size.0).max(1) as f32,
            height.min(surface_size.1).max(1) as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(&pipeline);
        if key.has_uniforms {
            if let Some(slot) = &self.uniforms {
                pass.set_bind_group(0, &slot.bind_group, &[]);
            }
        }
        for (slot, stream) in streams.iter().enumerate() {
            if let Some(buffer) = self.buffers.get(stream.name) {
                let bytes = (stream.data.len() * std::mem::size_of::<f32>()) as wgpu::BufferAddress;
                pass.set_vertex_buffer(slot as u32, buffer.slice(..bytes.max(4)));
            }
        }
        match primitive {
            Primitive::Points => pass.draw(0..POINT_QUAD_VERTICES, 0..vertex_count as u32),
            Primitive::Lines => pass.draw(0..vertex_count as u32, 0..1),
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        self.clear_color = wgpu::Color {
            r: rgba[0] as f64,
            g: rgba[1] as f64,
            b: rgba[2] as f64,
            a: rgba[3] as f64,
        };
        if let Some(frame) = self.frame.as_mut() {
            frame.cleared = false;
        }
    }

    fn set_blend(&mut self, src: BlendFactor, dst: BlendFactor, enabled: bool) {
        self.blend = BlendState { src, dst, enabled };
    }
}

fn map_surface_error(e: wgpu::SurfaceError) -> SurfaceError {
    match e {
        wgpu::SurfaceError::Timeout => SurfaceError::Timeout,
        wgpu::SurfaceError::Outdated => SurfaceError::Outdated,
        wgpu::SurfaceError::OutOfMemory => SurfaceError::OutOfMemory,
        _ => SurfaceError::Lost,
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn wgpu_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

fn wgpu_blend(blend: BlendState) -> Option<wgpu::BlendState> {
    if !blend.enabled {
        return None;
    }
    let component = wgpu::BlendComponent {
        src_factor: wgpu_factor(blend.src),
        dst_factor: wgpu_factor(blend.dst),
        operation: wgpu::BlendOperation::Add,
    };
    Some(wgpu::BlendState {
        color: component,
        alpha: component,
    })
}
