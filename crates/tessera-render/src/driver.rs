//! The seam between render targets and the GPU.
//!
//! A [`RenderTarget`](crate::RenderTarget) decides *which* state changes are
//! needed; a [`RenderDriver`] carries them out. The target never talks to the
//! GPU directly, so the state-caching logic can be exercised against the
//! recording [`MockDriver`](crate::mock::MockDriver) as well as the wgpu
//! backend.

use std::num::NonZeroU64;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tessera_core::geometry::{Rect, Size};

use crate::{
    BlendMode, Color, CoordinateType, PrimitiveType, ShaderHandle, StencilMode, TextureHandle,
    Transform, Vertex, VertexBufferHandle,
};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a render target, used by drivers to track which target
/// currently owns the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(NonZeroU64);

impl TargetId {
    pub fn next() -> Self {
        let raw = NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::MIN.saturating_add(raw))
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// GPU operations a render target issues.
///
/// # Borrow Checking Pattern
///
/// Methods take `&self`. Several render targets may share one driver (one
/// GPU context) through an `Arc`, and implementations use interior
/// mutability for their recorded state. The trait is object-safe.
///
/// Viewport and scissor rectangles are in pixels with a top-left origin.
pub trait RenderDriver: Send + Sync {
    /// Make `target` the current user of the context (or release it).
    /// Returns `false` if the context could not be activated.
    fn activate(&self, target: TargetId, active: bool) -> bool;

    /// The target currently holding the context, if any.
    fn active_target(&self) -> Option<TargetId>;

    /// Size of the surface being rendered to, in pixels.
    fn target_size(&self) -> Size<u32>;

    /// Put untracked pipeline state (culling, depth, color writes) into the
    /// fixed 2D baseline.
    fn reset_baseline(&self);

    fn set_viewport(&self, viewport: Rect<i32>);

    /// `None` disables scissoring.
    fn set_scissor(&self, scissor: Option<Rect<i32>>);

    fn load_projection(&self, projection: &Transform);

    fn load_transform(&self, transform: &Transform);

    fn load_identity(&self);

    fn set_blend_mode(&self, mode: BlendMode);

    /// `None` turns the stencil test off and re-enables color writes.
    fn set_stencil_mode(&self, mode: Option<&StencilMode>);

    /// `None` unbinds the current texture. With [`CoordinateType::Pixels`]
    /// texture coordinates are scaled by the inverse texture size.
    fn bind_texture(&self, texture: Option<&TextureHandle>, coordinate_type: CoordinateType);

    /// `None` returns to the built-in shader.
    fn bind_shader(&self, shader: Option<&ShaderHandle>);

    fn draw_primitives(&self, primitive: PrimitiveType, vertices: &[Vertex]);

    /// Draw `range` of a GPU-resident buffer. The range is already clamped.
    fn draw_buffer(&self, buffer: &VertexBufferHandle, range: Range<usize>);

    fn clear(&self, color: Color);

    fn clear_stencil(&self, value: u32);

    /// Save all driver state so it can be restored by [`pop_states`](Self::pop_states).
    fn push_states(&self);

    fn pop_states(&self);
}

macro_rules! forward_driver {
    ($ty:ty) => {
        impl<D: RenderDriver + ?Sized> RenderDriver for $ty {
            fn activate(&self, target: TargetId, active: bool) -> bool {
                (**self).activate(target, active)
            }
            fn active_target(&self) -> Option<TargetId> {
                (**self).active_target()
            }
            fn target_size(&self) -> Size<u32> {
                (**self).target_size()
            }
            fn reset_baseline(&self) {
                (**self).reset_baseline()
            }
            fn set_viewport(&self, viewport: Rect<i32>) {
                (**self).set_viewport(viewport)
            }
            fn set_scissor(&self, scissor: Option<Rect<i32>>) {
                (**self).set_scissor(scissor)
            }
            fn load_projection(&self, projection: &Transform) {
                (**self).load_projection(projection)
            }
            fn load_transform(&self, transform: &Transform) {
                (**self).load_transform(transform)
            }
            fn load_identity(&self) {
                (**self).load_identity()
            }
            fn set_blend_mode(&self, mode: BlendMode) {
                (**self).set_blend_mode(mode)
            }
            fn set_stencil_mode(&self, mode: Option<&StencilMode>) {
                (**self).set_stencil_mode(mode)
            }
            fn bind_texture(&self, texture: Option<&TextureHandle>, coordinate_type: CoordinateType) {
                (**self).bind_texture(texture, coordinate_type)
            }
            fn bind_shader(&self, shader: Option<&ShaderHandle>) {
                (**self).bind_shader(shader)
            }
            fn draw_primitives(&self, primitive: PrimitiveType, vertices: &[Vertex]) {
                (**self).draw_primitives(primitive, vertices)
            }
            fn draw_buffer(&self, buffer: &VertexBufferHandle, range: Range<usize>) {
                (**self).draw_buffer(buffer, range)
            }
            fn clear(&self, color: Color) {
                (**self).clear(color)
            }
            fn clear_stencil(&self, value: u32) {
                (**self).clear_stencil(value)
            }
            fn push_states(&self) {
                (**self).push_states()
            }
            fn pop_states(&self) {
                (**self).pop_states()
            }
        }
    };
}

forward_driver!(Arc<D>);
forward_driver!(&D);
forward_driver!(Box<D>);
