//! The render-loop engine.
//!
//! [`FrameOrchestrator`] owns one dedicated render thread per surface. Host
//! events (`surface_created`, `surface_changed`, `visibility_changed`,
//! `surface_destroyed`) arrive on other threads and only touch a small
//! mutex-protected [`Control`] block; the render thread reads it at the top
//! of every iteration.
//!
//! ```text
//! Uninitialized --surface_created--> SurfaceReady --first frame--> Running
//!                                                                  |   ^
//!                                              visibility_changed(false/true)
//!                                                                  v   |
//!                                                                 Paused
//! any state --surface_destroyed--> Destroyed (terminal)
//! ```
//!
//! The graphics context is built on the render thread from a factory closure
//! and released by a drop guard when the thread exits, including by panic.
//! [`FrameOrchestrator::surface_destroyed`] joins the thread before returning,
//! so no GPU call happens after it.
//!
//! # Example
//!
//! ```ignore
//! let mut orchestrator = FrameOrchestrator::new(HyperspaceRenderer::new(settings, input));
//! orchestrator.surface_created(move || WgpuContext::new(instance, surface));
//! orchestrator.surface_changed(1280, 720);
//! // ...
//! orchestrator.surface_destroyed();
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::backend::RenderBackend;
use crate::error::{GpuError, SurfaceError};
use crate::time::FrameTimer;

/// Wait between failed surface acquisitions.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// One-time setup and teardown around a surface.
pub trait LifecycleAware {
    /// Called once, on the first loop pass with a live surface.
    fn surface_created(&mut self, backend: &mut dyn RenderBackend);

    /// Called on the render thread before the context is released.
    fn surface_destroyed(&mut self, _backend: &mut dyn RenderBackend) {}

    /// The surface became invisible; the loop is about to block.
    fn paused(&mut self) {}

    /// The surface is visible again.
    fn resumed(&mut self) {}
}

/// Reacts to surface size changes.
pub trait Resizable {
    fn surface_changed(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32);
}

/// Draws one frame.
pub trait Drawable {
    fn draw_frame(&mut self, backend: &mut dyn RenderBackend);

    /// Minimum time between frames, or `None` to run at presentation rate.
    fn frame_interval(&self) -> Option<Duration> {
        None
    }
}

/// Everything the render loop calls back into.
pub trait Renderer: LifecycleAware + Resizable + Drawable + Send {}

impl<T: LifecycleAware + Resizable + Drawable + Send> Renderer for T {}

/// Host-surface side of the graphics API, owned by the render thread.
pub trait GraphicsContext {
    /// (Re)create the drawable surface at the given size.
    fn acquire_surface(&mut self, width: u32, height: u32) -> Result<(), SurfaceError>;

    /// Drop the drawable surface but keep the device.
    fn release_surface(&mut self);

    /// Drawing capability for the current surface.
    fn backend(&mut self) -> &mut dyn RenderBackend;

    /// Submit and present the frame drawn since the last present.
    fn present(&mut self) -> Result<(), SurfaceError>;

    /// Release every graphics resource. Nothing is called afterwards.
    fn release(&mut self);
}

impl<C: GraphicsContext + ?Sized> GraphicsContext for Box<C> {
    fn acquire_surface(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        (**self).acquire_surface(width, height)
    }

    fn release_surface(&mut self) {
        (**self).release_surface()
    }

    fn backend(&mut self) -> &mut dyn RenderBackend {
        (**self).backend()
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        (**self).present()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Observable state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Uninitialized,
    SurfaceReady,
    Running,
    Paused,
    Destroyed,
}

/// Flags shared between host threads and the render thread.
#[derive(Debug, Default)]
struct Control {
    running: bool,
    paused: bool,
    started: bool,
    destroyed: bool,
    /// A surface has been acquired at least once.
    live: bool,
    /// Latest size not yet seen by the render thread.
    pending_resize: Option<(u32, u32)>,
    /// Whether any size has been queued yet.
    has_size: bool,
}

struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
    frames: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Block for up to `timeout` or until `keep_waiting` turns false.
    fn wait_while<F>(&self, timeout: Duration, keep_waiting: F)
    where
        F: FnMut(&mut Control) -> bool,
    {
        let guard = self.lock();
        // Poison only means another thread panicked mid-update; flags stay usable
        let _ = self.wake.wait_timeout_while(guard, timeout, keep_waiting);
    }
}

/// Owns the render thread and exposes lifecycle controls to the host.
pub struct FrameOrchestrator {
    shared: Arc<Shared>,
    renderer: Option<Box<dyn Renderer>>,
    thread: Option<JoinHandle<()>>,
}

impl FrameOrchestrator {
    pub fn new<R: Renderer + 'static>(renderer: R) -> Self {
        Self {
            shared: Arc::new(Shared {
                control: Mutex::new(Control::default()),
                wake: Condvar::new(),
                frames: AtomicU64::new(0),
            }),
            renderer: Some(Box::new(renderer)),
            thread: None,
        }
    }

    /// The host created a surface. Starts the render thread exactly once.
    ///
    /// `factory` runs on the render thread and builds the graphics context.
    pub fn surface_created<C, F>(&mut self, factory: F)
    where
        C: GraphicsContext + 'static,
        F: FnOnce() -> Result<C, GpuError> + Send + 'static,
    {
        let Some(renderer) = self.renderer.take() else {
            log::warn!("Ignoring surface_created: render thread already started or destroyed");
            return;
        };
        {
            let mut control = self.shared.lock();
            if control.destroyed {
                log::warn!("Ignoring surface_created after destroy");
                return;
            }
            control.started = true;
            control.running = true;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("render".into())
            .spawn(move || render_thread(shared, renderer, factory));
        match spawned {
            Ok(handle) => {
                log::info!("Render thread started");
                self.thread = Some(handle);
            }
            Err(e) => {
                log::error!("Failed to spawn render thread: {}", e);
                self.shared.lock().running = false;
            }
        }
    }

    /// Queue a new surface size. Only the latest queued size is applied.
    pub fn surface_changed(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring zero-sized surface {}x{}", width, height);
            return;
        }
        let mut control = self.shared.lock();
        control.pending_resize = Some((width, height));
        control.has_size = true;
        self.shared.wake.notify_all();
    }

    /// Pause on hide, resume on show.
    pub fn visibility_changed(&self, visible: bool) {
        let mut control = self.shared.lock();
        if control.paused == !visible {
            return;
        }
        control.paused = !visible;
        log::debug!("Render loop {}", if visible { "resumed" } else { "paused" });
        self.shared.wake.notify_all();
    }

    /// Stop the render thread and wait until it has released the context.
    pub fn surface_destroyed(&mut self) {
        {
            let mut control = self.shared.lock();
            if control.destroyed {
                return;
            }
            control.destroyed = true;
            control.running = false;
            self.shared.wake.notify_all();
        }
        self.renderer = None;
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Render thread panicked; graphics context was released by its guard");
            }
        }
        log::info!("Render loop destroyed");
    }

    /// Alias of [`surface_destroyed`](Self::surface_destroyed).
    pub fn destroy(&mut self) {
        self.surface_destroyed();
    }

    pub fn state(&self) -> OrchestratorState {
        let control = self.shared.lock();
        if control.destroyed || (control.started && !control.running) {
            OrchestratorState::Destroyed
        } else if !control.started {
            OrchestratorState::Uninitialized
        } else if control.paused {
            OrchestratorState::Paused
        } else if !control.live {
            OrchestratorState::SurfaceReady
        } else {
            OrchestratorState::Running
        }
    }

    /// Frames presented so far.
    pub fn frames_presented(&self) -> u64 {
        self.shared.frames.load(Ordering::Acquire)
    }
}

impl Drop for FrameOrchestrator {
    fn drop(&mut self) {
        self.surface_destroyed();
    }
}

/// Releases the graphics context when the render thread leaves, even by
/// unwinding out of a render callback.
struct ContextGuard<C: GraphicsContext> {
    context: C,
    has_surface: bool,
}

impl<C: GraphicsContext> Deref for ContextGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.context
    }
}

impl<C: GraphicsContext> DerefMut for ContextGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.context
    }
}

impl<C: GraphicsContext> Drop for ContextGuard<C> {
    fn drop(&mut self) {
        if self.has_surface {
            self.context.release_surface();
        }
        self.context.release();
        log::debug!("Graphics context released");
    }
}

/// Marks the loop as stopped when the render thread leaves, so `state()`
/// reports `Destroyed` even after a panicking callback.
struct RunningGuard<'a>(&'a Shared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().running = false;
    }
}

/// What the loop should do after the control block was read.
enum Command {
    Exit,
    /// Draw a frame; carries the latest queued size if it changed.
    Frame(Option<(u32, u32)>),
}

fn next_command(shared: &Shared, renderer: &mut dyn Renderer, notified_pause: &mut bool) -> Command {
    let mut control = shared.lock();
    loop {
        if !control.running {
            return Command::Exit;
        }
        if control.paused && !*notified_pause {
            drop(control);
            renderer.paused();
            *notified_pause = true;
            control = shared.lock();
            continue;
        }
        if control.paused || !control.has_size {
            control = match shared.wake.wait(control) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            continue;
        }
        break;
    }
    let resize = control.pending_resize.take();
    drop(control);

    if *notified_pause {
        renderer.resumed();
        *notified_pause = false;
    }
    Command::Frame(resize)
}

fn render_thread<C, F>(shared: Arc<Shared>, mut renderer: Box<dyn Renderer>, factory: F)
where
    C: GraphicsContext,
    F: FnOnce() -> Result<C, GpuError>,
{
    // Declared before the context guard so it drops after the release
    let _running = RunningGuard(&shared);
    let context = match factory() {
        Ok(context) => context,
        Err(e) => {
            log::error!("Failed to create graphics context: {}", e);
            return;
        }
    };
    let mut ctx = ContextGuard {
        context,
        has_surface: false,
    };

    let mut created = false;
    let mut notified_pause = false;
    let mut needs_surface = true;
    let mut size = (0, 0);
    let mut size_dirty = false;
    let mut timer = FrameTimer::new();

    loop {
        let was_paused = notified_pause;
        let resize = match next_command(&shared, renderer.as_mut(), &mut notified_pause) {
            Command::Exit => break,
            Command::Frame(resize) => resize,
        };
        if was_paused {
            timer.reset();
        }
        if let Some(latest) = resize {
            if latest != size || !ctx.has_surface {
                size = latest;
                size_dirty = true;
                needs_surface = true;
            }
        }

        if needs_surface {
            if ctx.has_surface {
                ctx.release_surface();
                ctx.has_surface = false;
            }
            match ctx.acquire_surface(size.0, size.1) {
                Ok(()) => {
                    ctx.has_surface = true;
                    needs_surface = false;
                    shared.lock().live = true;
                    log::debug!("Surface acquired at {}x{}", size.0, size.1);
                }
                Err(e) => {
                    log::warn!("Surface acquisition failed ({}), retrying", e);
                    shared.wait_while(RETRY_BACKOFF, |c| c.running);
                    continue;
                }
            }
        }

        if !created {
            renderer.surface_created(ctx.backend());
            created = true;
        }
        if size_dirty {
            renderer.surface_changed(ctx.backend(), size.0, size.1);
            size_dirty = false;
        }

        timer.begin_frame();
        renderer.draw_frame(ctx.backend());
        match ctx.present() {
            Ok(()) => {
                shared.frames.fetch_add(1, Ordering::Release);
                timer.tick();
            }
            Err(e) if e.needs_recreate() => {
                log::debug!("Present failed ({}), recreating surface", e);
                needs_surface = true;
            }
            Err(e) if e.is_transient() => {
                log::debug!("Present skipped ({})", e);
            }
            Err(e) => {
                log::error!("Present failed ({}), stopping render loop", e);
                break;
            }
        }

        if let Some(wait) = timer.remaining(renderer.frame_interval()) {
            shared.wait_while(wait, |c| {
                c.running && !c.paused && c.pending_resize.is_none()
            });
        }
    }

    if created {
        renderer.surface_destroyed(ctx.backend());
    }
    log::info!("Render thread exiting after {} frames", timer.frame());
}
