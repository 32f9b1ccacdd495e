//! Per-frame attribute streams derived from the particle field.
//!
//! [`VertexStreamBuilder`] owns flat `f32` buffers sized once when the
//! population is configured. Each frame they are cleared and refilled, so the
//! steady-state loop does not allocate.
//!
//! Three layouts exist:
//!
//! | Layout           | Streams                                            | Primitive |
//! |------------------|----------------------------------------------------|-----------|
//! | `RadialRaw`      | `aDirection`(3) `aData`(4) `aColor`(4) `aLayer`(1) | points    |
//! | `RadialEvaluated`| `aCenter`(2) `aSprite`(3) `aColor`(4)              | points    |
//! | `Tunnel`         | `aPosition`(2) `aColor`(4)                         | lines     |
//!
//! `RadialRaw` leaves the burst curve to the GLSL vertex stage.
//! `RadialEvaluated` runs the same math here through [`evaluate_point`] for
//! backends without point sizes.

use glam::{Vec2, Vec3, Vec4};

use crate::backend::{
    AttributeStream, FixedList, Primitive, StreamList, UniformList, UniformValue, MAX_UNIFORMS,
};
use crate::clock::SimulationClock;
use crate::field::{Population, RadialParticle, Star, STAR_MAX_DEPTH};
use crate::shader::{self, ShaderDialect};

/// Maximum radial distance reached at the end of a burst.
pub const BURST_RADIUS: f32 = 5.0;
/// Radial pull toward the center driven by the pulse.
pub const PULSE_RADIUS: f32 = 0.1;
/// Parallax rotation gain of the nearest layer.
pub const PARALLAX_SCALE: f32 = 0.8;
/// Camera offset along z for the point projection.
pub const VIEW_OFFSET: f32 = 3.0;
/// Floor on the projected depth.
pub const MIN_VIEW_Z: f32 = 0.1;
/// Point size numerator `k` in `size * (k / z)`.
pub const POINT_SIZE_SCALE: f32 = 4.0;

/// Line segments drawn behind each star.
pub const TRAIL_SEGMENTS: usize = 12;
/// Depth covered by a full trail at base speed.
pub const TRAIL_LENGTH: f32 = 0.08;
/// Depth covered by a full trail under warp.
pub const WARP_TRAIL_LENGTH: f32 = TRAIL_LENGTH * 2.0;
/// Projection numerator `k = VIEW_DISTANCE / z`.
pub const VIEW_DISTANCE: f32 = 0.3;
/// Star depth never divides below this.
pub const MIN_STAR_DEPTH: f32 = 0.01;
/// Twist in radians per unit depth, before the per-star frequency.
pub const TWIST_RATE: f32 = 1.6;
pub const WAVE_AMPLITUDE: f32 = 0.25;
pub const BREATHING_AMPLITUDE: f32 = 0.12;

const TUNNEL_VERTICES_PER_STAR: usize = TRAIL_SEGMENTS * 2;

/// Stream layout of the most recent build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamLayout {
    RadialRaw,
    RadialEvaluated,
    Tunnel,
}

impl StreamLayout {
    /// Layout used for a population on a backend of `dialect`.
    pub fn select(population: &Population, dialect: ShaderDialect) -> Self {
        match population {
            Population::Radial(_) if dialect.evaluates_points_on_gpu() => StreamLayout::RadialRaw,
            Population::Radial(_) => StreamLayout::RadialEvaluated,
            Population::Tunnel(_) => StreamLayout::Tunnel,
        }
    }

    pub fn primitive(self) -> Primitive {
        match self {
            StreamLayout::RadialRaw | StreamLayout::RadialEvaluated => Primitive::Points,
            StreamLayout::Tunnel => Primitive::Lines,
        }
    }
}

/// Global values every particle of a frame shares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub time: f32,
    pub pulse: f32,
    /// Smoothed (current) parallax.
    pub parallax: Vec2,
    /// Width over height.
    pub aspect: f32,
    /// Surface size in pixels.
    pub viewport: Vec2,
    pub warp: bool,
}

impl FrameParams {
    /// Capture the clock for a surface of `width` x `height`.
    pub fn from_clock(clock: &SimulationClock, width: u32, height: u32) -> Self {
        Self {
            time: clock.time(),
            pulse: clock.pulse(),
            parallax: clock.parallax().current,
            aspect: aspect_ratio(width, height),
            viewport: Vec2::new(width as f32, height as f32),
            warp: clock.is_warp(),
        }
    }
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            time: 0.0,
            pulse: 0.0,
            parallax: Vec2::ZERO,
            aspect: 1.0,
            viewport: Vec2::ONE,
            warp: false,
        }
    }
}

/// Width over height, 1.0 for a degenerate surface.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if width == 0 || height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// A radial particle after the burst curve and projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatedPoint {
    /// Center in normalized device coordinates.
    pub center: Vec2,
    /// Point size in pixels.
    pub size: f32,
    pub shape: f32,
    /// Rotation of the shape mask.
    pub angle: f32,
    /// Brightness-scaled RGB and faded alpha.
    pub color: Vec4,
    /// Cyclic progress used for the evaluation.
    pub t: f32,
}

fn rotate_x(p: Vec3, a: f32) -> Vec3 {
    let (s, c) = a.sin_cos();
    Vec3::new(p.x, p.y * c - p.z * s, p.y * s + p.z * c)
}

fn rotate_y(p: Vec3, a: f32) -> Vec3 {
    let (s, c) = a.sin_cos();
    Vec3::new(p.x * c + p.z * s, p.y, -p.x * s + p.z * c)
}

/// Alpha ramp: in over the first 10% of `t`, out over the last 30%.
#[inline]
pub fn burst_alpha(t: f32) -> f32 {
    let mut alpha = 1.0;
    if t < 0.1 {
        alpha = t * 10.0;
    }
    if t > 0.7 {
        alpha = 1.0 - (t - 0.7) * 3.3;
    }
    alpha.clamp(0.0, 1.0)
}

/// Distance from the center at progress `t`: an ease-out burst plus a
/// pulse-driven wobble that fades as the particle leaves.
#[inline]
pub fn burst_distance(t: f32, pulse: f32) -> f32 {
    t.powf(2.5) * BURST_RADIUS + (1.0 - t) * pulse * PULSE_RADIUS
}

/// Run the point vertex stage on the CPU.
pub fn evaluate_point(particle: &RadialParticle, frame: &FrameParams) -> EvaluatedPoint {
    let t = particle.phase(frame.time);
    let dist = burst_distance(t, frame.pulse);

    let parallax_scale = (1.0 - particle.layer) * PARALLAX_SCALE;
    let mut pos = particle.direction * dist;
    pos = rotate_y(pos, frame.parallax.x * parallax_scale);
    pos = rotate_x(pos, frame.parallax.y * parallax_scale);

    let z = (pos.z + VIEW_OFFSET).max(MIN_VIEW_Z);
    let aspect = if frame.aspect > 0.0 { frame.aspect } else { 1.0 };
    let center = Vec2::new(pos.x / aspect / z, pos.y / z);
    let size =
        particle.size * (POINT_SIZE_SCALE / z) * (1.0 + (1.0 - t) * frame.pulse * 0.3);

    let jitter = (frame.time * 10.0 + particle.offset * 100.0).sin() * 0.1;
    let brightness = 1.0 + (1.0 - t) * 0.8 + jitter;

    EvaluatedPoint {
        center,
        size,
        shape: particle.shape.as_f32(),
        angle: particle.direction.y.atan2(particle.direction.x),
        color: (particle.color * brightness).extend(burst_alpha(t)),
        t,
    }
}

/// One trail vertex of a star.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailVertex {
    pub position: Vec2,
    pub alpha: f32,
}

/// Project the point `segment` steps behind the head of `star`.
///
/// Returns `None` for a star that has already passed the eye.
pub fn project_trail_point(star: &Star, segment: usize, frame: &FrameParams) -> Option<TrailVertex> {
    if star.z <= 0.0 || !star.z.is_finite() {
        return None;
    }
    let trail = if frame.warp { WARP_TRAIL_LENGTH } else { TRAIL_LENGTH };
    let along = segment as f32 / TRAIL_SEGMENTS as f32;
    let depth = (star.z + trail * along).max(MIN_STAR_DEPTH);

    let wave = WAVE_AMPLITUDE * (6.0 * depth + 2.0 * frame.time + star.twist_phase).sin();
    let angle = star.position.y.atan2(star.position.x)
        + TWIST_RATE * star.twist_freq * depth
        + frame.time
        + star.twist_phase
        + wave;
    let breathing = 1.0 + BREATHING_AMPLITUDE * (3.0 * frame.time + star.radial_phase).sin();
    let radius = star.position.length() * breathing;

    let k = VIEW_DISTANCE / depth;
    let aspect = if frame.aspect > 0.0 { frame.aspect } else { 1.0 };
    let nearness = (1.0 - depth / STAR_MAX_DEPTH).clamp(0.0, 1.0);
    let (s, c) = angle.sin_cos();
    let position = Vec2::new(c * radius * k / aspect, s * radius * k)
        + frame.parallax * PARALLAX_SCALE * nearness;

    let head_fade = (1.0 - star.z / STAR_MAX_DEPTH).clamp(0.0, 1.0);
    let alpha = head_fade * (1.0 - along);
    Some(TrailVertex { position, alpha })
}

/// Reusable per-frame attribute buffers.
#[derive(Debug, Default)]
pub struct VertexStreamBuilder {
    direction: Vec<f32>,
    data: Vec<f32>,
    color: Vec<f32>,
    layer: Vec<f32>,
    center: Vec<f32>,
    sprite: Vec<f32>,
    position: Vec<f32>,
    layout: Option<StreamLayout>,
    vertex_count: usize,
}

impl VertexStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the buffers for `population` so later builds never grow them.
    pub fn reserve(&mut self, population: &Population, dialect: ShaderDialect) {
        let layout = StreamLayout::select(population, dialect);
        let n = population.len();
        self.clear();
        match layout {
            StreamLayout::RadialRaw => {
                reserve_exact(&mut self.direction, n * 3);
                reserve_exact(&mut self.data, n * 4);
                reserve_exact(&mut self.color, n * 4);
                reserve_exact(&mut self.layer, n);
            }
            StreamLayout::RadialEvaluated => {
                reserve_exact(&mut self.center, n * 2);
                reserve_exact(&mut self.sprite, n * 3);
                reserve_exact(&mut self.color, n * 4);
            }
            StreamLayout::Tunnel => {
                let vertices = n * TUNNEL_VERTICES_PER_STAR;
                reserve_exact(&mut self.position, vertices * 2);
                reserve_exact(&mut self.color, vertices * 4);
            }
        }
        log::debug!("Reserved vertex streams for {} particles ({:?})", n, layout);
    }

    /// Total floats the buffers can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.direction.capacity()
            + self.data.capacity()
            + self.color.capacity()
            + self.layer.capacity()
            + self.center.capacity()
            + self.sprite.capacity()
            + self.position.capacity()
    }

    fn clear(&mut self) {
        self.direction.clear();
        self.data.clear();
        self.color.clear();
        self.layer.clear();
        self.center.clear();
        self.sprite.clear();
        self.position.clear();
        self.vertex_count = 0;
    }

    /// Refill the buffers for one frame. Returns the vertex count.
    pub fn build(
        &mut self,
        population: &Population,
        dialect: ShaderDialect,
        frame: &FrameParams,
    ) -> usize {
        self.clear();
        let layout = StreamLayout::select(population, dialect);
        self.layout = Some(layout);
        match population {
            Population::Radial(particles) if layout == StreamLayout::RadialRaw => {
                self.build_radial_raw(particles)
            }
            Population::Radial(particles) => self.build_radial_evaluated(particles, frame),
            Population::Tunnel(stars) => self.build_tunnel(stars, frame),
        }
        self.vertex_count
    }

    fn build_radial_raw(&mut self, particles: &[RadialParticle]) {
        for p in particles {
            self.direction.extend_from_slice(&p.direction.to_array());
            self.data
                .extend_from_slice(&[p.offset, p.speed, p.size, p.shape.as_f32()]);
            self.color.extend_from_slice(&p.color.extend(1.0).to_array());
            self.layer.push(p.layer);
        }
        self.vertex_count = particles.len();
    }

    fn build_radial_evaluated(&mut self, particles: &[RadialParticle], frame: &FrameParams) {
        for p in particles {
            let point = evaluate_point(p, frame);
            self.center.extend_from_slice(&point.center.to_array());
            self.sprite
                .extend_from_slice(&[point.size, point.shape, point.angle]);
            self.color.extend_from_slice(&point.color.to_array());
        }
        self.vertex_count = particles.len();
    }

    fn build_tunnel(&mut self, stars: &[Star], frame: &FrameParams) {
        let mut count = 0;
        for star in stars {
            // Passed the eye; respawned before the next frame
            if star.z <= 0.0 || !star.z.is_finite() {
                continue;
            }
            for segment in 0..TRAIL_SEGMENTS {
                let (Some(head), Some(tail)) = (
                    project_trail_point(star, segment, frame),
                    project_trail_point(star, segment + 1, frame),
                ) else {
                    continue;
                };
                for v in [head, tail] {
                    self.position.extend_from_slice(&v.position.to_array());
                    self.color.extend_from_slice(&star.color.extend(v.alpha).to_array());
                }
                count += 2;
            }
        }
        self.vertex_count = count;
    }

    pub fn layout(&self) -> Option<StreamLayout> {
        self.layout
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Primitive of the most recent build.
    pub fn primitive(&self) -> Primitive {
        self.layout.map_or(Primitive::Points, StreamLayout::primitive)
    }

    /// Streams of the most recent build, named as the shaders expect.
    pub fn streams(&self) -> StreamList<'_> {
        let empty = AttributeStream::new("", 0, &[]);
        match self.layout {
            Some(StreamLayout::RadialRaw) => FixedList::new(
                [
                    AttributeStream::new(shader::A_DIRECTION, 3, &self.direction),
                    AttributeStream::new(shader::A_DATA, 4, &self.data),
                    AttributeStream::new(shader::A_COLOR, 4, &self.color),
                    AttributeStream::new(shader::A_LAYER, 1, &self.layer),
                ],
                4,
            ),
            Some(StreamLayout::RadialEvaluated) => FixedList::new(
                [
                    AttributeStream::new(shader::A_CENTER, 2, &self.center),
                    AttributeStream::new(shader::A_SPRITE, 3, &self.sprite),
                    AttributeStream::new(shader::A_COLOR, 4, &self.color),
                    empty,
                ],
                3,
            ),
            Some(StreamLayout::Tunnel) => FixedList::new(
                [
                    AttributeStream::new(shader::A_POSITION, 2, &self.position),
                    AttributeStream::new(shader::A_COLOR, 4, &self.color),
                    empty,
                    empty,
                ],
                2,
            ),
            None => FixedList::new([empty; 4], 0),
        }
    }

    /// Uniforms the program of the most recent build reads.
    pub fn uniforms(&self, frame: &FrameParams) -> UniformList {
        let unused = ("", UniformValue::F32(0.0));
        match self.layout {
            Some(StreamLayout::RadialRaw) => FixedList::new(
                [
                    (shader::U_TIME, UniformValue::F32(frame.time)),
                    (shader::U_PULSE, UniformValue::F32(frame.pulse)),
                    (shader::U_PARALLAX, UniformValue::Vec2(frame.parallax)),
                    (shader::U_ASPECT_RATIO, UniformValue::F32(frame.aspect)),
                ],
                4,
            ),
            Some(StreamLayout::RadialEvaluated) => FixedList::new(
                [
                    (shader::U_VIEWPORT, UniformValue::Vec2(frame.viewport)),
                    unused,
                    unused,
                    unused,
                ],
                1,
            ),
            Some(StreamLayout::Tunnel) | None => FixedList::new([unused; MAX_UNIFORMS], 0),
        }
    }
}

fn reserve_exact(buf: &mut Vec<f32>, len: usize) {
    if buf.capacity() < len {
        buf.reserve_exact(len - buf.len());
    }
}
