//! Wall-clock frame measurement and pacing for the render loop.
//!
//! Animation time does not come from here; it advances in fixed steps in
//! [`SimulationClock`](crate::clock::SimulationClock). [`FrameTimer`] only
//! answers "how fast are we actually drawing" and "how long until the next
//! frame is due".
//!
//! # Example
//!
//! ```ignore
//! let mut timer = FrameTimer::new();
//!
//! // In the render loop, after present:
//! timer.tick();
//! if let Some(wait) = timer.remaining(Some(Duration::from_millis(16))) {
//!     sleep(wait);
//! }
//! ```

use std::time::{Duration, Instant};

/// Frame counter with a periodically refreshed FPS estimate.
#[derive(Debug)]
pub struct FrameTimer {
    /// Start of the frame currently being drawn.
    frame_start: Instant,
    /// Total frames since start.
    frame_count: u64,
    /// Measured FPS (updated every `report_interval`).
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    report_interval: Duration,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::with_report_interval(Duration::from_secs(1))
    }

    /// Timer that refreshes its FPS estimate every `interval`.
    pub fn with_report_interval(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            frame_start: now,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            report_interval: interval,
        }
    }

    /// Mark the start of a frame.
    #[inline]
    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Count a finished frame. Returns the new FPS estimate when one was
    /// computed on this call.
    pub fn tick(&mut self) -> Option<f32> {
        let now = Instant::now();
        self.frame_count += 1;

        let since = now.duration_since(self.fps_update_time);
        if since < self.report_interval {
            return None;
        }
        let frames = self.frame_count - self.fps_frame_count;
        self.fps = frames as f32 / since.as_secs_f32();
        self.fps_frame_count = self.frame_count;
        self.fps_update_time = now;
        log::debug!("{:.1} fps", self.fps);
        Some(self.fps)
    }

    /// Time left until `interval` has passed since [`begin_frame`](Self::begin_frame).
    ///
    /// `None` when uncapped or already late.
    pub fn remaining(&self, interval: Option<Duration>) -> Option<Duration> {
        let interval = interval?;
        interval
            .checked_sub(self.frame_start.elapsed())
            .filter(|d| !d.is_zero())
    }

    /// Restart FPS measurement, e.g. after a pause.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.frame_start = now;
        self.fps_frame_count = self.frame_count;
        self.fps_update_time = now;
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
