//! Fixed shader assets and the names shared with the vertex builder.
//!
//! Two families exist. The GLSL ES 1.00 point shader evaluates the burst
//! curve on the GPU from raw per-particle attributes and relies on
//! `gl_PointSize`. Backends without point sizes (wgpu) use the WGSL family,
//! which receives points already evaluated by the CPU and expands each one
//! into a quad. Both families draw tunnel streaks from projected lines.

pub const GLSL_POINT_VERTEX: &str = include_str!("shaders/point.vert.glsl");
pub const GLSL_POINT_FRAGMENT: &str = include_str!("shaders/point.frag.glsl");
pub const GLSL_LINE_VERTEX: &str = include_str!("shaders/line.vert.glsl");
pub const GLSL_LINE_FRAGMENT: &str = include_str!("shaders/line.frag.glsl");
pub const WGSL_POINT: &str = include_str!("shaders/point.wgsl");
pub const WGSL_LINE: &str = include_str!("shaders/line.wgsl");

// Attributes of the GLSL point program
pub const A_DIRECTION: &str = "aDirection";
pub const A_DATA: &str = "aData";
pub const A_COLOR: &str = "aColor";
pub const A_LAYER: &str = "aLayer";

// Attributes of the WGSL point program
pub const A_CENTER: &str = "aCenter";
pub const A_SPRITE: &str = "aSprite";

// Attributes of both line programs
pub const A_POSITION: &str = "aPosition";

pub const U_TIME: &str = "uTime";
pub const U_PULSE: &str = "uPulse";
pub const U_PARALLAX: &str = "uParallax";
pub const U_ASPECT_RATIO: &str = "uAspectRatio";
pub const U_VIEWPORT: &str = "uViewport";

/// Shading language a backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// OpenGL ES 2.0 style GLSL; point math runs in the vertex shader.
    Glsl100,
    /// WGSL; point math runs on the CPU.
    Wgsl,
}

impl ShaderDialect {
    /// Whether the radial burst curve is evaluated by the shading stage
    /// rather than by the CPU.
    pub fn evaluates_points_on_gpu(self) -> bool {
        matches!(self, ShaderDialect::Glsl100)
    }
}

/// Vertex and fragment source of one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSource {
    pub name: &'static str,
    pub vertex: &'static str,
    pub fragment: &'static str,
}

/// Program drawing radial-burst particles.
pub fn point_program(dialect: ShaderDialect) -> ProgramSource {
    match dialect {
        ShaderDialect::Glsl100 => ProgramSource {
            name: "point",
            vertex: GLSL_POINT_VERTEX,
            fragment: GLSL_POINT_FRAGMENT,
        },
        ShaderDialect::Wgsl => ProgramSource {
            name: "point",
            vertex: WGSL_POINT,
            fragment: WGSL_POINT,
        },
    }
}

/// Program drawing tunnel streaks.
pub fn line_program(dialect: ShaderDialect) -> ProgramSource {
    match dialect {
        ShaderDialect::Glsl100 => ProgramSource {
            name: "line",
            vertex: GLSL_LINE_VERTEX,
            fragment: GLSL_LINE_FRAGMENT,
        },
        ShaderDialect::Wgsl => ProgramSource {
            name: "line",
            vertex: WGSL_LINE,
            fragment: WGSL_LINE,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glsl_point_contract_names() {
        for name in [A_DIRECTION, A_DATA, A_COLOR, A_LAYER] {
            assert!(GLSL_POINT_VERTEX.contains(name), "missing {}", name);
        }
        for name in [U_TIME, U_PULSE, U_PARALLAX, U_ASPECT_RATIO] {
            assert!(GLSL_POINT_VERTEX.contains(name), "missing {}", name);
        }
        assert!(GLSL_POINT_VERTEX.contains("fract(uTime * speed * 0.15 + offset)"));
        assert!(GLSL_POINT_FRAGMENT.contains("gl_PointCoord"));
    }

    #[test]
    fn test_glsl_line_contract_names() {
        assert!(GLSL_LINE_VERTEX.contains(A_POSITION));
        assert!(GLSL_LINE_VERTEX.contains(A_COLOR));
    }

    #[test]
    fn test_program_selection() {
        assert_eq!(point_program(ShaderDialect::Glsl100).vertex, GLSL_POINT_VERTEX);
        assert_eq!(point_program(ShaderDialect::Wgsl).vertex, WGSL_POINT);
        assert_eq!(line_program(ShaderDialect::Wgsl).fragment, WGSL_LINE);
        assert!(ShaderDialect::Glsl100.evaluates_points_on_gpu());
        assert!(!ShaderDialect::Wgsl.evaluates_points_on_gpu());
    }
}
