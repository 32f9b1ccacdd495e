//! Global animation time, speed breathing, warp and parallax easing.
//!
//! Time advances in fixed steps (one unit per rendered frame) rather than by
//! wall-clock delta, so the effect looks identical at any frame rate the host
//! happens to deliver. Within a step the effective speed breathes slowly:
//!
//! ```text
//! step = current_speed * (1 + 0.15 * sin(0.5 * time)) * 0.1
//! ```

use glam::Vec2;

use crate::input::{ControlSignals, PARALLAX_LIMIT};

/// Base speed before the user multiplier.
pub const BASE_SPEED: f32 = 0.08;
/// Warp speed before the user multiplier (about 4.4x base).
pub const WARP_SPEED: f32 = 0.35;
/// Amplitude of the slow speed modulation.
pub const BREATH_AMPLITUDE: f32 = 0.15;
/// Angular frequency of the slow speed modulation.
pub const BREATH_FREQUENCY: f32 = 0.5;
/// Scale from speed to time units per step.
pub const STEP_SCALE: f32 = 0.1;
/// Fraction of the remaining parallax distance covered each step.
pub const PARALLAX_EASING: f32 = 0.08;

/// Smoothed 2D parallax: a target set by input and a current value that
/// eases toward it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Parallax {
    pub current: Vec2,
    pub target: Vec2,
}

impl Parallax {
    /// Set the target, clamped to the symmetric parallax range.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target.clamp(Vec2::splat(-PARALLAX_LIMIT), Vec2::splat(PARALLAX_LIMIT));
    }

    /// Move `current` toward `target` by `steps` easing steps.
    pub fn ease(&mut self, steps: f32) {
        let factor = if steps == 1.0 {
            PARALLAX_EASING
        } else {
            1.0 - (1.0 - PARALLAX_EASING).powf(steps.max(0.0))
        };
        self.current += (self.target - self.current) * factor;
    }
}

/// Animation clock shared by both simulation modes.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    time: f32,
    base_speed: f32,
    warp_speed: f32,
    warp: bool,
    last_step: f32,
    frame: u64,
    parallax: Parallax,
}

impl SimulationClock {
    /// Create a clock at time zero with the given user speed multiplier.
    pub fn new(speed_multiplier: f32) -> Self {
        Self {
            time: 0.0,
            base_speed: BASE_SPEED * speed_multiplier,
            warp_speed: WARP_SPEED * speed_multiplier,
            warp: false,
            last_step: 0.0,
            frame: 0,
            parallax: Parallax::default(),
        }
    }

    /// Retune base and warp speed. The warp state is kept.
    pub fn set_speed_multiplier(&mut self, multiplier: f32) {
        self.base_speed = BASE_SPEED * multiplier;
        self.warp_speed = WARP_SPEED * multiplier;
    }

    /// Snap between base and warp speed. No easing.
    #[inline]
    pub fn set_warp(&mut self, active: bool) {
        self.warp = active;
    }

    #[inline]
    pub fn is_warp(&self) -> bool {
        self.warp
    }

    /// The speed constant currently in effect (before breathing).
    #[inline]
    pub fn current_speed(&self) -> f32 {
        if self.warp {
            self.warp_speed
        } else {
            self.base_speed
        }
    }

    #[inline]
    pub fn base_speed(&self) -> f32 {
        self.base_speed
    }

    #[inline]
    pub fn warp_speed(&self) -> f32 {
        self.warp_speed
    }

    /// Global animation time. Never decreases.
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Time advanced by the most recent [`advance`](Self::advance).
    #[inline]
    pub fn last_step(&self) -> f32 {
        self.last_step
    }

    /// Number of `advance` calls so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Secondary global oscillator in [0, 1].
    #[inline]
    pub fn pulse(&self) -> f32 {
        (self.time * 2.0).sin() * 0.5 + 0.5
    }

    #[inline]
    pub fn parallax(&self) -> Parallax {
        self.parallax
    }

    /// Take in the per-frame control signals from the input bridge.
    pub fn apply_signals(&mut self, signals: ControlSignals) {
        self.set_warp(signals.warp);
        self.parallax.set_target(signals.parallax_target);
    }

    /// Advance by `dt_units` fixed steps (1.0 per rendered frame).
    pub fn advance(&mut self, dt_units: f32) {
        let dt_units = dt_units.max(0.0);
        let breathing = 1.0 + (self.time * BREATH_FREQUENCY).sin() * BREATH_AMPLITUDE;
        let step = self.current_speed() * breathing * STEP_SCALE * dt_units;
        self.time += step;
        self.last_step = step;
        self.frame += 1;
        self.parallax.ease(dt_units);
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(1.0)
    }
}
