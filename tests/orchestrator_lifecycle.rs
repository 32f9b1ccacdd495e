//! Integration tests for the render-loop lifecycle.
//!
//! A scripted renderer records its callbacks and a recording context records
//! every graphics call, so ordering across the render thread can be checked
//! after the fact.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{calls, new_log, Call, CallLog, RecordingContext};
use hyperjump::backend::RenderBackend;
use hyperjump::error::GpuError;
use hyperjump::orchestrator::{
    Drawable, FrameOrchestrator, LifecycleAware, OrchestratorState, Resizable,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Created,
    Changed(u32, u32),
    Draw,
    Paused,
    Resumed,
    Destroyed,
}

type EventLog = Arc<Mutex<Vec<Event>>>;

struct ScriptedRenderer {
    events: EventLog,
    panic_on_draw: bool,
}

impl ScriptedRenderer {
    fn new(events: &EventLog) -> Self {
        Self {
            events: Arc::clone(events),
            panic_on_draw: false,
        }
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl LifecycleAware for ScriptedRenderer {
    fn surface_created(&mut self, _backend: &mut dyn RenderBackend) {
        self.push(Event::Created);
    }

    fn surface_destroyed(&mut self, _backend: &mut dyn RenderBackend) {
        self.push(Event::Destroyed);
    }

    fn paused(&mut self) {
        self.push(Event::Paused);
    }

    fn resumed(&mut self) {
        self.push(Event::Resumed);
    }
}

impl Resizable for ScriptedRenderer {
    fn surface_changed(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        backend.set_viewport(width, height);
        self.push(Event::Changed(width, height));
    }
}

impl Drawable for ScriptedRenderer {
    fn draw_frame(&mut self, backend: &mut dyn RenderBackend) {
        if self.panic_on_draw {
            panic!("draw failed");
        }
        backend.clear([0.0, 0.0, 0.0, 1.0]);
        self.push(Event::Draw);
    }

    fn frame_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(1))
    }
}

fn recorded(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

fn start(events: &EventLog, log: &CallLog) -> FrameOrchestrator {
    let mut orchestrator = FrameOrchestrator::new(ScriptedRenderer::new(events));
    let log = Arc::clone(log);
    orchestrator.surface_created(move || Ok::<_, GpuError>(RecordingContext::new(log)));
    orchestrator
}

#[test]
fn test_full_lifecycle_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = new_log();
    let mut orchestrator = start(&events, &log);
    orchestrator.surface_changed(800, 600);

    wait_until("frames", || orchestrator.frames_presented() >= 3);
    assert_eq!(orchestrator.state(), OrchestratorState::Running);

    orchestrator.surface_destroyed();
    assert_eq!(orchestrator.state(), OrchestratorState::Destroyed);

    let events = recorded(&events);
    assert_eq!(events[0], Event::Created);
    assert_eq!(events[1], Event::Changed(800, 600));
    assert_eq!(events[2], Event::Draw);
    assert_eq!(events.last(), Some(&Event::Destroyed));
    assert_eq!(events.iter().filter(|e| **e == Event::Created).count(), 1);

    let calls = calls(&log);
    assert_eq!(calls[0], Call::AcquireSurface(800, 600));
    assert_eq!(calls.last(), Some(&Call::Release));
    let release = calls.iter().position(|c| *c == Call::Release).unwrap();
    assert_eq!(release, calls.len() - 1);
    assert_eq!(calls[release - 1], Call::ReleaseSurface);
}

#[test]
fn test_no_frames_before_first_size() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = new_log();
    let mut orchestrator = start(&events, &log);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(orchestrator.state(), OrchestratorState::SurfaceReady);
    assert_eq!(orchestrator.frames_presented(), 0);
    assert!(recorded(&events).is_empty());

    orchestrator.surface_changed(320, 200);
    wait_until("first frame", || orchestrator.frames_presented() >= 1);
    orchestrator.surface_destroyed();
}

#[test]
fn test_pause_blocks_and_latest_resize_wins() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = new_log();
    let mut orchestrator = start(&events, &log);
    orchestrator.surface_changed(800, 600);
    wait_until("frames", || orchestrator.frames_presented() >= 2);

    orchestrator.visibility_changed(false);
    assert_eq!(orchestrator.state(), OrchestratorState::Paused);
    wait_until("pause callback", || recorded(&events).contains(&Event::Paused));

    // No work while paused
    let frozen = orchestrator.frames_presented();
    orchestrator.surface_changed(640, 480);
    orchestrator.surface_changed(1024, 768);
    orchestrator.surface_changed(1920, 1080);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(orchestrator.frames_presented(), frozen);

    orchestrator.visibility_changed(true);
    wait_until("frames after resume", || {
        orchestrator.frames_presented() >= frozen + 2
    });
    assert_eq!(orchestrator.state(), OrchestratorState::Running);
    orchestrator.surface_destroyed();

    let events = recorded(&events);
    let changes: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, Event::Changed(..)))
        .cloned()
        .collect();
    assert_eq!(changes, [Event::Changed(800, 600), Event::Changed(1920, 1080)]);

    let paused = events.iter().position(|e| *e == Event::Paused).unwrap();
    let resumed = events.iter().position(|e| *e == Event::Resumed).unwrap();
    assert!(paused < resumed);
    // Nothing drawn between pause and resume
    assert!(events[paused..resumed].iter().all(|e| *e != Event::Draw));

    let viewports: Vec<_> = calls(&log)
        .into_iter()
        .filter(|c| matches!(c, Call::Viewport(..)))
        .collect();
    assert_eq!(viewports.last(), Some(&Call::Viewport(1920, 1080)));
}

#[test]
fn test_no_draw_after_release() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = new_log();
    let mut orchestrator = start(&events, &log);
    orchestrator.surface_changed(400, 400);
    wait_until("frames", || orchestrator.frames_presented() >= 5);
    orchestrator.surface_destroyed();

    let after = calls(&log).len();
    thread::sleep(Duration::from_millis(30));
    let calls = calls(&log);
    assert_eq!(calls.len(), after);

    let release = calls.iter().position(|c| *c == Call::Release).unwrap();
    assert!(calls[release..]
        .iter()
        .all(|c| !matches!(c, Call::Present | Call::Clear(_) | Call::Draw(_))));
}

#[test]
fn test_second_surface_created_is_ignored() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = new_log();
    let mut orchestrator = start(&events, &log);
    orchestrator.surface_changed(100, 100);
    wait_until("frames", || orchestrator.frames_presented() >= 1);

    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let other_log = new_log();
    orchestrator.surface_created(move || {
        flag.store(true, Ordering::SeqCst);
        Ok::<_, GpuError>(RecordingContext::new(other_log))
    });
    thread::sleep(Duration::from_millis(20));
    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(orchestrator.state(), OrchestratorState::Running);
    orchestrator.surface_destroyed();
}

#[test]
fn test_surface_created_after_destroy_is_ignored() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut orchestrator = FrameOrchestrator::new(ScriptedRenderer::new(&events));
    orchestrator.surface_destroyed();

    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    orchestrator.surface_created(move || {
        flag.store(true, Ordering::SeqCst);
        Ok::<_, GpuError>(RecordingContext::new(new_log()))
    });
    thread::sleep(Duration::from_millis(20));
    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(orchestrator.state(), OrchestratorState::Destroyed);
}

#[test]
fn test_acquire_retries_until_success() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = new_log();
    let mut orchestrator = FrameOrchestrator::new(ScriptedRenderer::new(&events));
    let context_log = Arc::clone(&log);
    orchestrator.surface_created(move || {
        let context = RecordingContext::new(context_log);
        *context.fail_acquire.lock().unwrap() = 2;
        Ok::<_, GpuError>(context)
    });
    orchestrator.surface_changed(300, 300);

    wait_until("frame after retries", || orchestrator.frames_presented() >= 1);
    orchestrator.surface_destroyed();

    let acquires = calls(&log)
        .iter()
        .filter(|c| matches!(c, Call::AcquireSurface(..)))
        .count();
    assert_eq!(acquires, 3);
    assert_eq!(recorded(&events)[0], Event::Created);
}

#[test]
fn test_destroy_interrupts_retry_backoff() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut orchestrator = FrameOrchestrator::new(ScriptedRenderer::new(&events));
    orchestrator.surface_created(move || {
        let context = RecordingContext::new(new_log());
        *context.fail_acquire.lock().unwrap() = u32::MAX;
        Ok::<_, GpuError>(context)
    });
    orchestrator.surface_changed(300, 300);
    thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    orchestrator.surface_destroyed();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(orchestrator.frames_presented(), 0);
    assert!(recorded(&events).is_empty());
}

#[test]
fn test_lost_surface_is_recreated() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = new_log();
    let mut orchestrator = FrameOrchestrator::new(ScriptedRenderer::new(&events));
    let context_log = Arc::clone(&log);
    orchestrator.surface_created(move || {
        let mut context = RecordingContext::new(context_log);
        context.lose_on_present = Some(2);
        Ok::<_, GpuError>(context)
    });
    orchestrator.surface_changed(500, 500);
    wait_until("frames after loss", || orchestrator.frames_presented() >= 3);
    orchestrator.surface_destroyed();

    let calls = calls(&log);
    let acquires: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, Call::AcquireSurface(..)))
        .collect();
    assert_eq!(acquires.len(), 2);
    assert!(acquires.iter().all(|c| **c == Call::AcquireSurface(500, 500)));
    // Same size, so the renderer is not told about a change
    let changes = recorded(&events)
        .iter()
        .filter(|e| matches!(e, Event::Changed(..)))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn test_context_released_when_draw_panics() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = new_log();
    let mut renderer = ScriptedRenderer::new(&events);
    renderer.panic_on_draw = true;
    let mut orchestrator = FrameOrchestrator::new(renderer);
    let context_log = Arc::clone(&log);
    orchestrator.surface_created(move || Ok::<_, GpuError>(RecordingContext::new(context_log)));
    orchestrator.surface_changed(200, 200);

    wait_until("loop exit", || {
        orchestrator.state() == OrchestratorState::Destroyed
    });
    // The dead thread is reported before the host tears anything down
    assert!(calls(&log).contains(&Call::Release));
    assert_eq!(orchestrator.frames_presented(), 0);

    orchestrator.surface_destroyed();
    assert_eq!(orchestrator.state(), OrchestratorState::Destroyed);
}

#[test]
fn test_factory_failure_stops_loop() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut orchestrator = FrameOrchestrator::new(ScriptedRenderer::new(&events));
    orchestrator.surface_created(|| Err::<RecordingContext, _>(GpuError::NoAdapter));
    orchestrator.surface_changed(200, 200);

    wait_until("loop exit", || {
        orchestrator.state() == OrchestratorState::Destroyed
    });
    orchestrator.surface_destroyed();
    assert!(recorded(&events).is_empty());
}
