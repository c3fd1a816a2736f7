//! Tessera Render
//!
//! An immediate-mode 2D rendering layer on top of a pluggable
//! [`RenderDriver`](driver::RenderDriver).
//!
//! - [`RenderTarget`] owns the current [`View`], issues draws and keeps a
//!   [`StateCache`](cache::StateCache) so redundant transform, blend,
//!   stencil and texture changes never reach the driver.
//! - [`Drawable`] types ([`GeometryBuffer`], [`Sprite`], [`Shape`], [`Text`])
//!   submit vertices to any [`DrawTarget`].
//! - [`Batcher`] stages many small draws and flushes them as few merged ones.
//!
//! The `wgpu` feature (on by default) provides [`WgpuDriver`]. The `mock`
//! feature exposes [`mock::MockDriver`], a recording driver for tests.

mod batch;
mod blend;
pub mod cache;
mod color;
mod config;
pub mod driver;
mod drawable;
mod error;
mod geometry;
pub mod primitive;
mod shapes;
mod states;
mod stencil;
mod target;
mod text;
mod texture;
mod transform;
mod vertex;
mod view;

#[cfg(feature = "wgpu")]
pub mod gpu;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use batch::{BatchEntry, BatchKey, BatchMode, Batcher, EntryStates, FlushStats};
pub use blend::{BlendFactor, BlendFactors, BlendMode};
pub use cache::VERTEX_CACHE_SIZE;
pub use color::Color;
pub use config::RenderConfig;
pub use drawable::{DrawTarget, Drawable, Transformable};
pub use error::RenderError;
pub use geometry::GeometryBuffer;
pub use primitive::{PrimitiveClass, PrimitiveType};
pub use shapes::{Shape, Sprite};
pub use states::RenderStates;
pub use stencil::{StencilComparison, StencilMode, StencilUpdateOperation};
pub use target::{RenderStats, RenderTarget, TargetState};
pub use text::{Glyph, GlyphSource, Text};
pub use texture::{
    CoordinateType, ShaderHandle, ShaderId, TextureHandle, TextureId, VertexBufferHandle,
    VertexBufferId,
};
pub use transform::Transform;
pub use vertex::Vertex;
pub use view::View;

#[cfg(feature = "wgpu")]
pub use gpu::WgpuDriver;
#[cfg(feature = "wgpu")]
pub use wgpu;
