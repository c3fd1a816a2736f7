//! Core types for the batcher.

use crate::cache::TextureKey;
use crate::primitive::PrimitiveClass;
use crate::{BlendMode, CoordinateType, ShaderHandle, ShaderId, StencilMode, TextureHandle};

/// Ordering applied to batched entries before merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BatchMode {
    /// Submission order. Adjacent entries with equal state still merge.
    #[default]
    Deferred,
    /// Stable sort by texture identity, so each texture is bound once.
    TextureSort,
    /// Stable sort by ascending depth (back to front).
    DepthSort,
}

impl std::fmt::Display for BatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchMode::Deferred => write!(f, "Deferred"),
            BatchMode::TextureSort => write!(f, "TextureSort"),
            BatchMode::DepthSort => write!(f, "DepthSort"),
        }
    }
}

/// Blend mode, stencil mode and shader of a staged entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStates<S = ShaderHandle> {
    /// Taken from the states passed to [`Batcher::flush`](super::Batcher::flush).
    Inherit,
    /// Fixed when the entry was staged.
    Fixed {
        blend_mode: BlendMode,
        stencil_mode: StencilMode,
        shader: Option<S>,
    },
}

impl EntryStates {
    /// Apply to `states`, leaving them as they are for [`EntryStates::Inherit`].
    pub fn resolve(&self, states: &mut crate::RenderStates) {
        if let EntryStates::Fixed {
            blend_mode,
            stencil_mode,
            shader,
        } = *self
        {
            states.blend_mode = blend_mode;
            states.stencil_mode = stencil_mode;
            states.shader = shader;
        }
    }

    fn key(&self) -> EntryStates<ShaderId> {
        match *self {
            EntryStates::Inherit => EntryStates::Inherit,
            EntryStates::Fixed {
                blend_mode,
                stencil_mode,
                shader,
            } => EntryStates::Fixed {
                blend_mode,
                stencil_mode,
                shader: shader.map(|s| s.id()),
            },
        }
    }
}

/// State that must match for two entries to share a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub texture: TextureKey,
    pub coordinate_type: CoordinateType,
    pub states: EntryStates<ShaderId>,
    pub class: PrimitiveClass,
}

impl BatchKey {
    pub fn new(
        texture: Option<&TextureHandle>,
        coordinate_type: CoordinateType,
        states: &EntryStates,
        class: PrimitiveClass,
    ) -> Self {
        Self {
            texture: TextureKey::of(texture),
            coordinate_type,
            states: states.key(),
            class,
        }
    }
}

/// One staged submission: a range of pre-transformed vertices plus the
/// state needed to draw it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchEntry {
    pub key: BatchKey,
    pub texture: Option<TextureHandle>,
    pub states: EntryStates,
    pub depth: f32,
    /// First vertex in the batcher's staging buffer.
    pub first_vertex: usize,
    pub vertex_count: usize,
}

impl BatchEntry {
    pub fn vertex_range(&self) -> std::ops::Range<usize> {
        self.first_vertex..self.first_vertex + self.vertex_count
    }
}

/// What one [`Batcher::flush`](super::Batcher::flush) submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub entries: usize,
    pub draw_calls: usize,
    pub vertices: usize,
}
