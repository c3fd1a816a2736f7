use crate::{BatchMode, Color};

/// Tuning switches for render targets and batchers.
///
/// The defaults enable both caches, which is what every normal renderer
/// wants; turning them off is mostly useful for comparing call counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// Pre-transform draws of at most [`VERTEX_CACHE_SIZE`](crate::VERTEX_CACHE_SIZE)
    /// vertices on the CPU instead of uploading their transform.
    pub vertex_cache: bool,
    /// Skip texture binds when the same texture is already bound.
    pub texture_cache: bool,
    /// Ordering used by [`Batcher::from_config`](crate::Batcher::from_config).
    pub default_batch_mode: BatchMode,
    /// Color used by [`RenderTarget::clear_default`](crate::RenderTarget::clear_default).
    pub clear_color: Color,
}

impl RenderConfig {
    /// Every cache disabled: each draw re-uploads its transform and texture.
    pub const UNCACHED: RenderConfig = RenderConfig {
        vertex_cache: false,
        texture_cache: false,
        default_batch_mode: BatchMode::Deferred,
        clear_color: Color::BLACK,
    };
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vertex_cache: true,
            texture_cache: true,
            default_batch_mode: BatchMode::Deferred,
            clear_color: Color::BLACK,
        }
    }
}
