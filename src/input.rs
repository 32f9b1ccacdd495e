//! Input bridge between host event threads and the render thread.
//!
//! Orientation samples and pointer events arrive on threads the renderer
//! does not own (UI thread, sensor thread). They never touch simulation
//! state directly: they only write two synchronized fields, which the render
//! thread reads once per frame through [`InputBridge::signals`].
//!
//! # Usage
//!
//! ```ignore
//! let input = InputBridge::new();
//! let sensor_side = input.clone();
//!
//! // sensor thread
//! sensor_side.on_gyroscope([rate_x, rate_y, rate_z]);
//!
//! // UI thread
//! input.on_pointer_down();
//!
//! // render thread, once per frame
//! clock.apply_signals(input.signals());
//! ```

use glam::Vec2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Gain applied to each orientation sample before accumulation.
pub const ORIENTATION_GAIN: f32 = 0.12;
/// Symmetric clamp on each parallax axis.
pub const PARALLAX_LIMIT: f32 = 0.6;

/// Control values the simulation consumes each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlSignals {
    /// Where the smoothed parallax should head.
    pub parallax_target: Vec2,
    /// Whether the pointer is held (speed boost).
    pub warp: bool,
}

#[derive(Debug)]
struct InputShared {
    parallax_target: Mutex<Vec2>,
    warp: AtomicBool,
    listening: AtomicBool,
}

/// Cloneable handle turning raw input into [`ControlSignals`].
#[derive(Debug, Clone)]
pub struct InputBridge {
    shared: Arc<InputShared>,
}

impl InputBridge {
    /// Create a bridge that is listening to orientation samples.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(InputShared {
                parallax_target: Mutex::new(Vec2::ZERO),
                warp: AtomicBool::new(false),
                listening: AtomicBool::new(true),
            }),
        }
    }

    /// Accumulate a 2D tilt delta into the parallax target.
    ///
    /// Accumulation, not assignment: sustained tilt saturates at the clamp.
    pub fn on_orientation_sample(&self, dx: f32, dy: f32) {
        if !self.is_listening() || !dx.is_finite() || !dy.is_finite() {
            return;
        }
        let mut target = self.lock_target();
        let next = *target + Vec2::new(dx, dy) * ORIENTATION_GAIN;
        *target = next.clamp(Vec2::splat(-PARALLAX_LIMIT), Vec2::splat(PARALLAX_LIMIT));
    }

    /// Feed a raw gyroscope sample (angular rate around x, y, z).
    ///
    /// Rotation around the device's y axis pans horizontally, rotation
    /// around x pans vertically.
    pub fn on_gyroscope(&self, rates: [f32; 3]) {
        self.on_orientation_sample(rates[1], rates[0]);
    }

    pub fn on_pointer_down(&self) {
        self.shared.warp.store(true, Ordering::Release);
    }

    /// A drag keeps warp engaged.
    pub fn on_pointer_move(&self) {
        self.shared.warp.store(true, Ordering::Release);
    }

    pub fn on_pointer_up(&self) {
        self.shared.warp.store(false, Ordering::Release);
    }

    pub fn on_pointer_cancel(&self) {
        self.shared.warp.store(false, Ordering::Release);
    }

    /// Start or stop accepting orientation samples (sensor attach/detach).
    pub fn set_listening(&self, listening: bool) {
        self.shared.listening.store(listening, Ordering::Release);
    }

    pub fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Acquire)
    }

    pub fn is_warp(&self) -> bool {
        self.shared.warp.load(Ordering::Acquire)
    }

    pub fn parallax_target(&self) -> Vec2 {
        *self.lock_target()
    }

    /// Snapshot of both control signals for this frame.
    pub fn signals(&self) -> ControlSignals {
        ControlSignals {
            parallax_target: self.parallax_target(),
            warp: self.is_warp(),
        }
    }

    fn lock_target(&self) -> std::sync::MutexGuard<'_, Vec2> {
        match self.shared.parallax_target.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for InputBridge {
    fn default() -> Self {
        Self::new()
    }
}
