use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::{Color, Transform};

/// A single 2D vertex: position, color and normalized texture coordinates.
///
/// The layout is fixed (`position` at 0, `color` at 8, `tex_coords` at 12,
/// 20 bytes total) and matches the vertex buffer layout of the GPU backend.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec2,
    pub color: Color,
    pub tex_coords: Vec2,
}

static_assertions::assert_eq_size!(Vertex, [u8; 20]);
static_assertions::const_assert_eq!(std::mem::offset_of!(Vertex, color), 8);
static_assertions::const_assert_eq!(std::mem::offset_of!(Vertex, tex_coords), 12);

impl Vertex {
    pub const fn new(position: Vec2, color: Color, tex_coords: Vec2) -> Self {
        Self {
            position,
            color,
            tex_coords,
        }
    }

    /// White, untextured vertex at `position`.
    pub const fn with_position(position: Vec2) -> Self {
        Self::new(position, Color::WHITE, Vec2::ZERO)
    }

    pub const fn colored(position: Vec2, color: Color) -> Self {
        Self::new(position, color, Vec2::ZERO)
    }

    pub const fn textured(position: Vec2, tex_coords: Vec2) -> Self {
        Self::new(position, Color::WHITE, tex_coords)
    }

    /// Copy of this vertex with its position mapped through `transform`.
    #[inline]
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            position: transform.transform_point(self.position),
            ..*self
        }
    }

    #[cfg(feature = "wgpu")]
    pub(crate) const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Unorm8x4, 2 => Float32x2];

    /// Vertex buffer layout for the backend pipeline.
    #[cfg(feature = "wgpu")]
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
