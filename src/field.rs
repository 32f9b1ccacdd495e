//! Particle populations for both simulation modes.
//!
//! The field exclusively owns particle storage. Two population shapes exist:
//!
//! - [`RadialParticle`]: a direction on the unit sphere plus per-particle
//!   phase offset, speed, size, shape and depth layer. Its progress along the
//!   burst is derived from global time, never stored.
//! - [`Star`]: a point in a fixed plane at depth `z`, flying toward the
//!   viewer and respawning at the far end when it passes the eye.
//!
//! Randomness comes from a seedable generator owned by the field, so a field
//! built with [`ParticleField::with_seed`] reproduces the same population.
//!
//! # Example
//!
//! ```ignore
//! let mut field = ParticleField::with_seed(42);
//! field.configure(SimulationMode::RadialBurst, 4000, Palette::default())?;
//!
//! clock.advance(1.0);
//! let respawned = field.advance(&clock);
//! ```

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{PI, TAU};

use crate::clock::SimulationClock;
use crate::config::SimulationMode;
use crate::error::FieldError;
use crate::palette::Palette;

/// Largest population a field will generate.
pub const MAX_PARTICLES: usize = 1_000_000;

/// Phase rate `k` in `t = fract(time * speed * k + offset)`.
pub const PHASE_RATE: f32 = 0.15;
/// Speed multiplier of the farthest layer.
pub const SPEED_BASE: f32 = 0.5;
/// Extra speed multiplier gained by the nearest layer.
pub const SPEED_RANGE: f32 = 1.5;
/// Size multiplier of the farthest layer.
pub const SIZE_BASE: f32 = 2.0;
/// Extra size multiplier gained by the nearest layer.
pub const SIZE_RANGE: f32 = 15.0;

/// Half extent of the plane stars are spawned in.
pub const STAR_HALF_EXTENT: f32 = 1.0;
/// Depth stars are born at.
pub const STAR_MAX_DEPTH: f32 = 1.0;
/// Depth travelled per unit of clock step.
pub const STAR_DEPTH_SPEED: f32 = 1.0;

/// Footprint drawn for a radial particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShapeKind {
    /// Diamond-like shard.
    Shard = 0,
    /// Short thin line.
    Line = 1,
    /// Elongated streak.
    Streak = 2,
}

impl ShapeKind {
    pub const COUNT: u32 = 3;

    pub fn from_index(index: u32) -> Self {
        match index {
            0 => ShapeKind::Shard,
            1 => ShapeKind::Line,
            _ => ShapeKind::Streak,
        }
    }

    /// Tag value as the shading stage reads it.
    #[inline]
    pub fn as_f32(self) -> f32 {
        self as u8 as f32
    }
}

/// A particle of the radial-burst mode.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialParticle {
    /// Unit direction of travel.
    pub direction: Vec3,
    /// Phase offset in [0, 1).
    pub offset: f32,
    /// Per-particle speed multiplier.
    pub speed: f32,
    /// Per-particle size multiplier.
    pub size: f32,
    pub shape: ShapeKind,
    /// Base RGB color (alpha is always 1).
    pub color: Vec3,
    /// Depth layer in [0, 1], 0 = near, 1 = far.
    pub layer: f32,
    /// How many times this particle has respawned.
    pub generation: u32,
    cycle: Option<i64>,
}

impl RadialParticle {
    #[inline]
    fn phase_argument(&self, time: f32) -> f32 {
        time * self.speed * PHASE_RATE + self.offset
    }

    /// Cyclic progress `t` in [0, 1) at `time`.
    #[inline]
    pub fn phase(&self, time: f32) -> f32 {
        let t = self.phase_argument(time).fract();
        // fract of a positive value is already in [0, 1); guard rounding
        if t >= 1.0 {
            0.0
        } else {
            t
        }
    }

    /// Whole number of bursts completed at `time`.
    #[inline]
    pub fn cycle(&self, time: f32) -> i64 {
        self.phase_argument(time).floor() as i64
    }
}

/// A particle of the tunnel-streak mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    /// Position in the spawn plane.
    pub position: Vec2,
    /// Depth in (0, STAR_MAX_DEPTH].
    pub z: f32,
    pub color: Vec3,
    /// Starting angle offset of the twist.
    pub twist_phase: f32,
    /// Twist frequency multiplier in [0.5, 1.5).
    pub twist_freq: f32,
    /// Phase of the radial breathing.
    pub radial_phase: f32,
    /// How many times this star has respawned.
    pub generation: u32,
}

/// The particle storage for whichever mode is active.
#[derive(Debug, Clone, PartialEq)]
pub enum Population {
    Radial(Vec<RadialParticle>),
    Tunnel(Vec<Star>),
}

impl Population {
    pub fn len(&self) -> usize {
        match self {
            Population::Radial(p) => p.len(),
            Population::Tunnel(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mode(&self) -> SimulationMode {
        match self {
            Population::Radial(_) => SimulationMode::RadialBurst,
            Population::Tunnel(_) => SimulationMode::TunnelStreak,
        }
    }
}

/// Owner of the particle population.
pub struct ParticleField {
    rng: StdRng,
    palette: Palette,
    population: Population,
}

impl ParticleField {
    /// Create an empty field seeded from system entropy.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create an empty field with a fixed seed for reproducible populations.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            palette: Palette::default(),
            population: Population::Radial(Vec::new()),
        }
    }

    /// Regenerate the whole population.
    ///
    /// A zero count or one above [`MAX_PARTICLES`] is rejected and the
    /// previous population is kept.
    pub fn configure(
        &mut self,
        mode: SimulationMode,
        count: usize,
        palette: Palette,
    ) -> Result<(), FieldError> {
        if count == 0 {
            return Err(FieldError::EmptyPopulation);
        }
        if count > MAX_PARTICLES {
            return Err(FieldError::TooManyParticles(count));
        }

        // Fresh seed per regeneration, drawn from the owned generator
        let seed: u64 = self.rng.gen();
        self.rng = StdRng::seed_from_u64(seed);
        self.palette = palette;

        self.population = match mode {
            SimulationMode::RadialBurst => {
                Population::Radial((0..count).map(|_| self.spawn_radial()).collect())
            }
            SimulationMode::TunnelStreak => Population::Tunnel(
                (0..count)
                    .map(|_| {
                        let mut star = self.spawn_star();
                        // First wave is spread through the tunnel, not stacked at the far end
                        star.z = self.rng.gen_range(f32::EPSILON..=STAR_MAX_DEPTH);
                        star
                    })
                    .collect(),
            ),
        };

        log::info!("Generated {} particles ({:?})", count, mode);
        Ok(())
    }

    pub fn mode(&self) -> SimulationMode {
        self.population.mode()
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Radial particles, or an empty slice in tunnel mode.
    pub fn radial(&self) -> &[RadialParticle] {
        match &self.population {
            Population::Radial(p) => p,
            Population::Tunnel(_) => &[],
        }
    }

    /// Tunnel stars, or an empty slice in radial mode.
    pub fn stars(&self) -> &[Star] {
        match &self.population {
            Population::Tunnel(s) => s,
            Population::Radial(_) => &[],
        }
    }

    /// Move the population forward to the clock's current time and respawn
    /// every particle that reached its terminal boundary. Returns the number
    /// of respawns.
    pub fn advance(&mut self, clock: &SimulationClock) -> usize {
        if let Population::Tunnel(stars) = &mut self.population {
            let travel = clock.last_step() * STAR_DEPTH_SPEED;
            for star in stars.iter_mut() {
                star.z -= travel;
            }
        }

        let time = clock.time();
        (0..self.len())
            .filter(|&i| self.respawn_if_expired(i, time))
            .count()
    }

    /// Respawn particle `index` if it crossed its terminal boundary.
    ///
    /// Radial particles expire when their phase wraps past 1; stars expire
    /// when `z <= 0`. Other particles are untouched.
    pub fn respawn_if_expired(&mut self, index: usize, time: f32) -> bool {
        match self.population.mode() {
            SimulationMode::RadialBurst => self.respawn_radial(index, time),
            SimulationMode::TunnelStreak => self.respawn_star(index),
        }
    }

    fn respawn_radial(&mut self, index: usize, time: f32) -> bool {
        let Population::Radial(particles) = &mut self.population else {
            return false;
        };
        let Some(particle) = particles.get_mut(index) else {
            return false;
        };
        let cycle = particle.cycle(time);
        match particle.cycle.replace(cycle) {
            Some(previous) if previous != cycle => {}
            _ => return false,
        }
        particle.direction = random_direction(&mut self.rng);
        particle.shape = ShapeKind::from_index(self.rng.gen_range(0..ShapeKind::COUNT));
        particle.color = self.palette.sample(&mut self.rng);
        particle.generation += 1;
        true
    }

    fn respawn_star(&mut self, index: usize) -> bool {
        let expired = match self.stars().get(index) {
            Some(star) => star.z <= 0.0 || !star.z.is_finite(),
            None => false,
        };
        if !expired {
            return false;
        }
        let fresh = self.spawn_star();
        if let Population::Tunnel(stars) = &mut self.population {
            let generation = stars[index].generation + 1;
            stars[index] = Star { generation, ..fresh };
        }
        true
    }

    fn spawn_radial(&mut self) -> RadialParticle {
        let direction = random_direction(&mut self.rng);
        let layer: f32 = self.rng.gen();
        let near = 1.0 - layer;
        RadialParticle {
            direction,
            offset: self.rng.gen(),
            speed: SPEED_BASE + near * SPEED_RANGE,
            size: SIZE_BASE + near * SIZE_RANGE,
            shape: ShapeKind::from_index(self.rng.gen_range(0..ShapeKind::COUNT)),
            color: self.palette.sample(&mut self.rng),
            layer,
            generation: 0,
            cycle: None,
        }
    }

    fn spawn_star(&mut self) -> Star {
        Star {
            position: Vec2::new(
                self.rng.gen_range(-STAR_HALF_EXTENT..STAR_HALF_EXTENT),
                self.rng.gen_range(-STAR_HALF_EXTENT..STAR_HALF_EXTENT),
            ),
            z: STAR_MAX_DEPTH,
            color: self.palette.sample(&mut self.rng),
            twist_phase: self.rng.gen_range(0.0..TAU),
            twist_freq: self.rng.gen_range(0.5..1.5),
            radial_phase: self.rng.gen_range(0.0..TAU),
            generation: 0,
        }
    }
}

impl Default for ParticleField {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform random unit vector.
fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let phi = rng.gen::<f32>() * PI * 2.0;
    let theta = (rng.gen::<f64>() * 2.0 - 1.0).acos() as f32;
    Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{Rgb8, Theme, DEFAULT_CUSTOM_COLORS};

    fn radial_field(count: usize) -> ParticleField {
        let mut field = ParticleField::with_seed(1);
        field
            .configure(SimulationMode::RadialBurst, count, Palette::default())
            .unwrap();
        field
    }

    #[test]
    fn test_configure_count_and_palette() {
        for theme in [Theme::SciFi, Theme::Classic, Theme::Custom] {
            let palette = Palette::for_theme(theme, &DEFAULT_CUSTOM_COLORS);
            let mut field = ParticleField::with_seed(3);
            field
                .configure(SimulationMode::RadialBurst, 500, palette.clone())
                .unwrap();
            assert_eq!(field.len(), 500);
            assert!(field.radial().iter().all(|p| palette.contains(p.color)));

            field
                .configure(SimulationMode::TunnelStreak, 250, palette.clone())
                .unwrap();
            assert_eq!(field.len(), 250);
            assert!(field.stars().iter().all(|s| palette.contains(s.color)));
        }
    }

    #[test]
    fn test_oversized_count_keeps_previous() {
        let mut field = radial_field(100);
        let before = field.population().clone();
        for count in [MAX_PARTICLES + 1, usize::MAX] {
            let err = field.configure(SimulationMode::TunnelStreak, count, Palette::default());
            assert_eq!(err, Err(FieldError::TooManyParticles(count)));
            assert_eq!(field.population(), &before);
        }
    }

    #[test]
    fn test_zero_count_keeps_previous() {
        let mut field = radial_field(100);
        let before = field.population().clone();
        let err = field.configure(SimulationMode::TunnelStreak, 0, Palette::default());
        assert_eq!(err, Err(FieldError::EmptyPopulation));
        assert_eq!(field.population(), &before);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = radial_field(64);
        let b = radial_field(64);
        assert_eq!(a.population(), b.population());
    }

    #[test]
    fn test_radial_invariants() {
        let field = radial_field(2000);
        for p in field.radial() {
            assert!((p.direction.length() - 1.0).abs() < 1e-5);
            assert!((0.0..1.0).contains(&p.offset));
            assert!((0.0..=1.0).contains(&p.layer));
            // nearer layer => faster and larger
            let near = 1.0 - p.layer;
            assert!((p.speed - (SPEED_BASE + near * SPEED_RANGE)).abs() < 1e-5);
            assert!((p.size - (SIZE_BASE + near * SIZE_RANGE)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_nearer_layers_are_faster() {
        let field = radial_field(500);
        let mut by_layer: Vec<_> = field.radial().iter().collect();
        by_layer.sort_by(|a, b| a.layer.total_cmp(&b.layer));
        for pair in by_layer.windows(2) {
            assert!(pair[0].speed >= pair[1].speed);
            assert!(pair[0].size >= pair[1].size);
        }
    }

    #[test]
    fn test_phase_in_unit_interval() {
        let field = radial_field(300);
        let mut time = 0.0f32;
        for _ in 0..500 {
            time += 0.0137;
            for p in field.radial() {
                let t = p.phase(time);
                assert!((0.0..1.0).contains(&t), "t = {}", t);
            }
        }
    }

    #[test]
    fn test_radial_respawn_on_wrap() {
        let mut field = radial_field(1);
        let particle = field.radial()[0].clone();

        // Establish the current cycle; nothing respawns on first sight
        assert!(!field.respawn_if_expired(0, 0.0));

        // Time at which this particle's phase wraps to the next cycle
        let wrap_time = (1.0 - particle.offset) / (particle.speed * PHASE_RATE) + 1e-3;
        assert!(field.respawn_if_expired(0, wrap_time));

        let after = &field.radial()[0];
        assert_eq!(after.generation, 1);
        assert_ne!(after.direction, particle.direction);
        assert!(after.phase(wrap_time) < 0.01);
        // Same cycle again: no second respawn
        assert!(!field.respawn_if_expired(0, wrap_time));
    }

    #[test]
    fn test_star_respawn_resets_depth() {
        let mut field = ParticleField::with_seed(9);
        field
            .configure(SimulationMode::TunnelStreak, 4, Palette::default())
            .unwrap();
        let before = field.stars()[2].clone();

        if let Population::Tunnel(stars) = &mut field.population {
            stars[2].z = -0.01;
        }
        assert!(field.respawn_if_expired(2, 0.0));
        let after = &field.stars()[2];
        assert_eq!(after.z, STAR_MAX_DEPTH);
        assert_eq!(after.generation, before.generation + 1);
        assert_ne!(after.position, before.position);
        assert_ne!(after.twist_phase, before.twist_phase);
        // neighbours untouched
        assert!(!field.respawn_if_expired(1, 0.0));
    }

    #[test]
    fn test_tunnel_advance_keeps_depth_valid() {
        let mut field = ParticleField::with_seed(11);
        field
            .configure(SimulationMode::TunnelStreak, 300, Palette::default())
            .unwrap();
        let mut clock = SimulationClock::new(4.0);
        clock.set_warp(true);
        let mut respawns = 0;
        for _ in 0..300 {
            clock.advance(1.0);
            respawns += field.advance(&clock);
            for star in field.stars() {
                assert!(star.z > 0.0 && star.z <= STAR_MAX_DEPTH);
            }
        }
        assert!(respawns > 0);
    }

    #[test]
    fn test_classic_theme_single_color() {
        let palette = Palette::for_theme(Theme::Classic, &DEFAULT_CUSTOM_COLORS);
        let mut field = ParticleField::with_seed(5);
        field
            .configure(SimulationMode::RadialBurst, 200, palette)
            .unwrap();
        assert!(field
            .radial()
            .iter()
            .all(|p| p.color == Rgb8::WHITE.to_vec3()));
    }
}
