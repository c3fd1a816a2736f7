//! Texture, shader and vertex buffer handles with process-unique identities.
//!
//! A backend may recycle its raw resource slots after a texture is destroyed,
//! so the raw slot alone cannot tell two textures apart. Each handle therefore
//! also carries an identity drawn from a global counter that never repeats.
//! The state cache keys on the identity, never on the raw slot.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;
use tessera_core::geometry::{Rect, Size};

use crate::PrimitiveType;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_SHADER_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique texture identity. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(NonZeroU64);

impl TextureId {
    /// Allocate a fresh identity.
    pub fn next() -> Self {
        let raw = NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::MIN.saturating_add(raw))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// Process-unique shader identity. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(NonZeroU64);

impl ShaderId {
    pub fn next() -> Self {
        let raw = NEXT_SHADER_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::MIN.saturating_add(raw))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// Process-unique vertex buffer identity. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexBufferId(NonZeroU64);

impl VertexBufferId {
    pub fn next() -> Self {
        let raw = NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::MIN.saturating_add(raw))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// How a draw's texture coordinates address its texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoordinateType {
    /// `0..1` across the texture. Every built-in drawable emits these.
    #[default]
    Normalized,
    /// `0..size` in texels. The driver rescales by the bound texture's size.
    Pixels,
}

impl CoordinateType {
    /// Factor that maps coordinates of this type into `0..1` for `texture`.
    pub fn scale(self, texture: Option<&TextureHandle>) -> Vec2 {
        match (self, texture) {
            (CoordinateType::Pixels, Some(texture)) => {
                let size = texture.size();
                Vec2::new(1.0 / size.width.max(1) as f32, 1.0 / size.height.max(1) as f32)
            }
            _ => Vec2::ONE,
        }
    }
}

/// A reference to a texture owned by a backend.
///
/// Handles are cheap to copy. The backend that created one owns the GPU
/// resource; the handle only names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    id: TextureId,
    raw: u32,
    size: Size<u32>,
}

impl TextureHandle {
    /// Wrap a backend slot, assigning a new identity.
    pub fn new(raw: u32, size: Size<u32>) -> Self {
        Self {
            id: TextureId::next(),
            raw,
            size,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    /// The backend's slot for this texture. May be reused after destruction.
    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn size(&self) -> Size<u32> {
        self.size
    }

    /// Convert a pixel rectangle inside this texture to normalized
    /// `(min, max)` texture coordinates.
    pub fn normalize(&self, pixels: Rect<f32>) -> (Vec2, Vec2) {
        let size = Vec2::new(self.size.width.max(1) as f32, self.size.height.max(1) as f32);
        let min = Vec2::new(pixels.x, pixels.y) / size;
        let max = Vec2::new(pixels.x + pixels.width, pixels.y + pixels.height) / size;
        (min, max)
    }
}

/// A reference to a shader program owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle {
    id: ShaderId,
    raw: u32,
}

impl ShaderHandle {
    pub fn new(raw: u32) -> Self {
        Self {
            id: ShaderId::next(),
            raw,
        }
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }
}

/// Geometry stored on the GPU, drawn by range through
/// [`RenderTarget::draw_buffer_range`](crate::RenderTarget::draw_buffer_range).
///
/// The vertex count and primitive type are fixed when the backend creates
/// the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferHandle {
    id: VertexBufferId,
    raw: u32,
    len: usize,
    primitive: PrimitiveType,
}

impl VertexBufferHandle {
    pub fn new(raw: u32, len: usize, primitive: PrimitiveType) -> Self {
        Self {
            id: VertexBufferId::next(),
            raw,
            len,
            primitive,
        }
    }

    pub fn id(&self) -> VertexBufferId {
        self.id
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    /// Number of vertices the buffer holds.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive
    }

    /// Clamp `first..first + count` to the buffer. `None` when nothing is left.
    pub fn clamp_range(&self, first: usize, count: usize) -> Option<std::ops::Range<usize>> {
        if first > self.len {
            return None;
        }
        let count = count.min(self.len - first);
        (count > 0).then(|| first..first + count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recycled_slot_gets_new_identity() {
        let first = TextureHandle::new(7, Size::new(4, 4));
        let second = TextureHandle::new(7, Size::new(4, 4));
        assert_eq!(first.raw(), second.raw());
        assert_ne!(first.id(), second.id());
        assert_ne!(first, second);
    }

    #[test]
    fn test_identities_are_nonzero_and_increasing() {
        let a = TextureId::next();
        let b = TextureId::next();
        assert!(a.get() > 0);
        assert!(b > a);
        assert!(ShaderId::next().get() > 0);
    }

    #[test]
    fn test_pixel_coordinates_scale_by_texture_size() {
        let texture = TextureHandle::new(0, Size::new(64, 32));
        assert_eq!(CoordinateType::Pixels.scale(Some(&texture)), Vec2::new(1.0 / 64.0, 1.0 / 32.0));
        assert_eq!(CoordinateType::Normalized.scale(Some(&texture)), Vec2::ONE);
        assert_eq!(CoordinateType::Pixels.scale(None), Vec2::ONE);
    }

    #[test]
    fn test_buffer_range_is_clamped() {
        let buffer = VertexBufferHandle::new(0, 10, PrimitiveType::Triangles);
        assert_eq!(buffer.clamp_range(0, 10), Some(0..10));
        assert_eq!(buffer.clamp_range(4, 100), Some(4..10));
        assert_eq!(buffer.clamp_range(10, 3), None);
        assert_eq!(buffer.clamp_range(11, 1), None);
        assert_eq!(buffer.clamp_range(2, 0), None);
    }

    #[test]
    fn test_normalize_pixel_rect() {
        let texture = TextureHandle::new(0, Size::new(64, 32));
        let (min, max) = texture.normalize(Rect::new(16.0, 8.0, 32.0, 16.0));
        assert_eq!(min, Vec2::new(0.25, 0.25));
        assert_eq!(max, Vec2::new(0.75, 0.75));
    }
}
