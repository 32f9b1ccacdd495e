//! The rendering capability the renderer draws through.
//!
//! The renderer never talks to a graphics API directly. It compiles programs,
//! uploads attribute streams and draws through a [`RenderBackend`], which is
//! implemented by the wgpu backend in [`crate::gpu`] and by recording mocks
//! in tests.
//!
//! # Example
//!
//! ```ignore
//! let program = backend.compile_program(source.vertex, source.fragment)?;
//! backend.clear(CLEAR_COLOR);
//! backend.set_blend(BlendFactor::SrcAlpha, BlendFactor::One, true);
//! backend.upload_and_draw(
//!     program,
//!     Primitive::Points,
//!     count,
//!     &streams,
//!     &[(U_TIME, UniformValue::F32(time))],
//! );
//! ```

use std::ops::Deref;

use glam::{Vec2, Vec4};

use crate::error::BackendError;
use crate::shader::ShaderDialect;

/// Most attribute streams a single draw binds.
pub const MAX_STREAMS: usize = 4;
/// Most uniforms a single draw sets.
pub const MAX_UNIFORMS: usize = 4;

/// Opaque handle of a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

impl ProgramHandle {
    /// Marks a program that failed to compile. Draws with it are skipped.
    pub const INVALID: ProgramHandle = ProgramHandle(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for ProgramHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// How vertices are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
}

/// Blend factor for source or destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Current blend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub enabled: bool,
}

impl BlendState {
    /// Additive blending: `src * alpha + dst`.
    pub const ADDITIVE: BlendState = BlendState {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::One,
        enabled: true,
    };

    pub const DISABLED: BlendState = BlendState {
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
        enabled: false,
    };
}

impl Default for BlendState {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// One named, tightly packed float attribute stream.
#[derive(Debug, Clone, Copy)]
pub struct AttributeStream<'a> {
    pub name: &'static str,
    /// Floats per vertex (1 to 4).
    pub components: u32,
    pub data: &'a [f32],
}

impl<'a> AttributeStream<'a> {
    pub fn new(name: &'static str, components: u32, data: &'a [f32]) -> Self {
        Self {
            name,
            components,
            data,
        }
    }

    /// Number of whole vertices in the stream.
    pub fn vertex_count(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.data.len() / self.components as usize
        }
    }
}

/// A uniform value set by name before a draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec2(Vec2),
    Vec4(Vec4),
}

impl UniformValue {
    /// Alignment inside a WGSL uniform struct.
    pub fn align(&self) -> usize {
        match self {
            UniformValue::F32(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec4(_) => 16,
        }
    }

    /// Byte size without trailing padding.
    pub fn byte_size(&self) -> usize {
        match self {
            UniformValue::F32(_) => 4,
            UniformValue::Vec2(_) => 8,
            UniformValue::Vec4(_) => 16,
        }
    }

    /// Append the little-endian bytes of this value.
    pub fn write_bytes(&self, buf: &mut Vec<u8>) {
        match self {
            UniformValue::F32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            UniformValue::Vec2(v) => buf.extend_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec4(v) => buf.extend_from_slice(bytemuck::bytes_of(v)),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::F32(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

/// Up to `N` draw descriptors held inline, so per-frame draws do not touch
/// the heap. Derefs to the filled prefix.
#[derive(Debug, Clone, Copy)]
pub struct FixedList<T: Copy, const N: usize> {
    items: [T; N],
    len: usize,
}

impl<T: Copy, const N: usize> FixedList<T, N> {
    /// Keep the first `len` of `items`; the rest is filler.
    pub fn new(items: [T; N], len: usize) -> Self {
        Self {
            items,
            len: len.min(N),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }
}

impl<T: Copy, const N: usize> Deref for FixedList<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

/// Streams of one draw.
pub type StreamList<'a> = FixedList<AttributeStream<'a>, MAX_STREAMS>;
/// Named uniforms of one draw.
pub type UniformList = FixedList<(&'static str, UniformValue), MAX_UNIFORMS>;

/// Pack uniforms in declaration order for a WGSL uniform buffer.
///
/// Each value starts at its natural alignment and the total is rounded up to
/// 16 bytes. An empty list packs to an empty buffer.
pub fn pack_uniforms(values: &[(&str, UniformValue)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (_, value) in values {
        let align = value.align();
        while buf.len() % align != 0 {
            buf.push(0);
        }
        value.write_bytes(&mut buf);
    }
    while buf.len() % 16 != 0 {
        buf.push(0);
    }
    buf
}

/// Drawing operations the renderer needs from the host graphics API.
///
/// All calls happen on the render thread while a surface is current.
pub trait RenderBackend {
    /// Shading language this backend compiles.
    fn dialect(&self) -> ShaderDialect;

    /// Compile and link a program. Returns a handle other than
    /// [`ProgramHandle::INVALID`] on success.
    fn compile_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramHandle, BackendError>;

    /// Release a program. Unknown handles are ignored.
    fn delete_program(&mut self, program: ProgramHandle);

    /// Bind `program`, upload the streams and uniforms, and draw
    /// `vertex_count` vertices.
    fn upload_and_draw(
        &mut self,
        program: ProgramHandle,
        primitive: Primitive,
        vertex_count: usize,
        streams: &[AttributeStream<'_>],
        uniforms: &[(&'static str, UniformValue)],
    );

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Clear the color target.
    fn clear(&mut self, rgba: [f32; 4]);

    fn set_blend(&mut self, src: BlendFactor, dst: BlendFactor, enabled: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_list_exposes_prefix() {
        let data = [1.0, 2.0, 3.0];
        let empty = AttributeStream::new("", 0, &[]);
        let list: StreamList<'_> =
            FixedList::new([AttributeStream::new("aLayer", 1, &data), empty, empty, empty], 1);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "aLayer");
        assert_eq!(list[0].vertex_count(), 3);

        let uniforms: UniformList = FixedList::new([("", UniformValue::F32(0.0)); MAX_UNIFORMS], 9);
        assert_eq!(uniforms.len(), MAX_UNIFORMS);
    }

    #[test]
    fn test_invalid_handle() {
        assert!(!ProgramHandle::INVALID.is_valid());
        assert!(!ProgramHandle::default().is_valid());
        assert!(ProgramHandle(7).is_valid());
    }

    #[test]
    fn test_stream_vertex_count() {
        let data = [0.0f32; 12];
        assert_eq!(AttributeStream::new("a", 4, &data).vertex_count(), 3);
        assert_eq!(AttributeStream::new("a", 3, &data).vertex_count(), 4);
        assert_eq!(AttributeStream::new("a", 0, &data).vertex_count(), 0);
    }

    #[test]
    fn test_pack_single_vec2() {
        let bytes = pack_uniforms(&[("uViewport", UniformValue::Vec2(Vec2::new(800.0, 600.0)))]);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &800.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &600.0f32.to_le_bytes());
    }

    #[test]
    fn test_pack_alignment() {
        let bytes = pack_uniforms(&[
            ("a", UniformValue::F32(1.0)),
            ("b", UniformValue::Vec2(Vec2::new(2.0, 3.0))),
            ("c", UniformValue::F32(4.0)),
            ("d", UniformValue::Vec4(Vec4::ONE)),
        ]);
        // a@0, pad, b@8, c@16, pad, d@32, total 48
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[8..12], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &4.0f32.to_le_bytes());
        assert_eq!(&bytes[32..36], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_pack_empty() {
        assert!(pack_uniforms(&[]).is_empty());
    }

    #[test]
    fn test_blend_presets() {
        assert_eq!(BlendState::ADDITIVE.src, BlendFactor::SrcAlpha);
        assert_eq!(BlendState::ADDITIVE.dst, BlendFactor::One);
        assert!(!BlendState::default().enabled);
    }
}
