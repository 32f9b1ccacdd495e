//! Desktop host: a winit window standing in for the wallpaper surface.
//!
//! The host only forwards events. Drawing happens on the orchestrator's
//! render thread, so the event loop just waits.
//!
//! | winit event                  | forwarded as                         |
//! |------------------------------|--------------------------------------|
//! | window created               | `surface_created` + `surface_changed`|
//! | `Resized`                    | `surface_changed`                    |
//! | `Occluded`, `suspended`      | `visibility_changed`                 |
//! | left button press / release  | pointer down / up                    |
//! | cursor drag                  | pointer move                         |
//! | cursor motion, button up     | orientation sample                   |
//! | `CloseRequested`, exit       | `surface_destroyed`                  |

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::SettingsStore;
use crate::error::{GpuError, HostError};
use crate::gpu::WgpuContext;
use crate::input::InputBridge;
use crate::orchestrator::FrameOrchestrator;
use crate::renderer::HyperspaceRenderer;

/// Orientation units per pixel of cursor motion.
pub const CURSOR_TILT_SCALE: f32 = 0.01;

pub struct App {
    window: Option<Arc<Window>>,
    orchestrator: FrameOrchestrator,
    input: InputBridge,
    pointer_down: bool,
    last_cursor: Option<PhysicalPosition<f64>>,
    error: Option<HostError>,
}

impl App {
    pub fn new(settings: &SettingsStore) -> Self {
        let input = InputBridge::new();
        let renderer = HyperspaceRenderer::new(settings, input.clone());
        Self {
            window: None,
            orchestrator: FrameOrchestrator::new(renderer),
            input,
            pointer_down: false,
            last_cursor: None,
            error: None,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<(), HostError> {
        let window_attrs = Window::default_attributes()
            .with_title("Hyperjump")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(GpuError::from)?;

        self.orchestrator
            .surface_created(move || WgpuContext::new(instance, surface));
        let size = window.inner_size();
        self.orchestrator.surface_changed(size.width, size.height);
        self.window = Some(window);
        Ok(())
    }

    fn cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        if self.pointer_down {
            self.input.on_pointer_move();
        } else if let Some(last) = self.last_cursor {
            let dx = (position.x - last.x) as f32 * CURSOR_TILT_SCALE;
            let dy = (position.y - last.y) as f32 * CURSOR_TILT_SCALE;
            self.input.on_orientation_sample(dx, dy);
        }
        self.last_cursor = Some(position);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.orchestrator.surface_destroyed();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            self.orchestrator.visibility_changed(true);
            return;
        }
        if let Err(e) = self.create_window(event_loop) {
            log::error!("Failed to start: {}", e);
            self.error = Some(e);
            self.shutdown(event_loop);
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.orchestrator.visibility_changed(false);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                self.orchestrator.surface_changed(size.width, size.height);
            }
            WindowEvent::Occluded(occluded) => {
                self.orchestrator.visibility_changed(!occluded);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.pointer_down = state == ElementState::Pressed;
                if self.pointer_down {
                    self.input.on_pointer_down();
                } else {
                    self.input.on_pointer_up();
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor_moved(position),
            WindowEvent::CursorLeft { .. } => {
                self.last_cursor = None;
                if self.pointer_down {
                    self.pointer_down = false;
                    self.input.on_pointer_cancel();
                }
            }
            WindowEvent::Focused(false) if self.pointer_down => {
                self.pointer_down = false;
                self.input.on_pointer_cancel();
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.orchestrator.surface_destroyed();
    }
}

/// Open a window and run until it is closed.
pub fn run(settings: &SettingsStore) -> Result<(), HostError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(settings);
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
