//! Shadow copy of the GPU state a render target last applied.
//!
//! [`StateCache`] answers one question per state: does applying the desired
//! value require a GPU call? The `*_change` methods return a [`StateChange`]
//! only when the answer is yes. Once a change has been applied it is passed
//! back through [`StateCache::record`]. Diffing and recording are separate so
//! the decisions can be tested without any GPU.
//!
//! A disabled cache (the *sentinel* state) reports every state as changed.
//! It is entered at construction, after the context is switched to another
//! target, and whenever the GPU state was modified behind the cache's back.

use crate::{BlendMode, CoordinateType, ShaderHandle, StencilMode, TextureHandle, Transform, Vertex};

/// Draws with at most this many vertices are pre-transformed on the CPU
/// instead of uploading a new model transform.
pub const VERTEX_CACHE_SIZE: usize = 4;

/// Texture identity as tracked by the cache. `NONE` stands for "no texture".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextureKey(u64);

impl TextureKey {
    pub const NONE: TextureKey = TextureKey(0);

    pub fn of(texture: Option<&TextureHandle>) -> Self {
        texture.map_or(Self::NONE, |t| TextureKey(t.id().get()))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// A single GPU state update decided by the cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateChange {
    LoadIdentity,
    LoadTransform(Transform),
    /// Re-apply the current view (viewport, scissor, projection).
    ApplyView,
    SetBlendMode(BlendMode),
    /// A disabled mode turns the stencil test off.
    SetStencilMode(StencilMode),
    BindTexture(Option<TextureHandle>, CoordinateType),
    BindShader(ShaderHandle),
    UnbindShader,
}

/// Per-target record of the last applied GPU state.
#[derive(Debug, Clone)]
pub struct StateCache {
    enabled: bool,
    states_set: bool,
    view_changed: bool,
    texture_caching: bool,
    last_transform: Transform,
    last_blend_mode: BlendMode,
    last_stencil_mode: StencilMode,
    last_texture: TextureKey,
    last_coordinate_type: CoordinateType,
    use_vertex_cache: bool,
    vertex_cache: [Vertex; VERTEX_CACHE_SIZE],
}

impl StateCache {
    pub fn new() -> Self {
        Self::with_texture_caching(true)
    }

    /// With `texture_caching` off, every draw rebinds its texture.
    pub fn with_texture_caching(texture_caching: bool) -> Self {
        Self {
            enabled: false,
            states_set: false,
            view_changed: true,
            texture_caching,
            last_transform: Transform::IDENTITY,
            last_blend_mode: BlendMode::Alpha,
            last_stencil_mode: StencilMode::DISABLED,
            last_texture: TextureKey::NONE,
            last_coordinate_type: CoordinateType::Normalized,
            use_vertex_cache: false,
            vertex_cache: [Vertex::default(); VERTEX_CACHE_SIZE],
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the baseline GPU state has been asserted at least once.
    pub fn states_set(&self) -> bool {
        self.states_set
    }

    pub fn view_changed(&self) -> bool {
        self.view_changed
    }

    /// Whether the previous draw went through the vertex cache.
    pub fn uses_vertex_cache(&self) -> bool {
        self.use_vertex_cache
    }

    pub fn last_transform(&self) -> &Transform {
        &self.last_transform
    }

    pub fn last_blend_mode(&self) -> BlendMode {
        self.last_blend_mode
    }

    pub fn last_stencil_mode(&self) -> &StencilMode {
        &self.last_stencil_mode
    }

    /// Whether the last applied stencil mode left the test on.
    pub fn stencil_enabled(&self) -> bool {
        !self.last_stencil_mode.is_disabled()
    }

    pub fn last_texture(&self) -> TextureKey {
        self.last_texture
    }

    pub fn last_coordinate_type(&self) -> CoordinateType {
        self.last_coordinate_type
    }

    /// Enter the sentinel state: the next draw re-applies everything.
    pub fn invalidate(&mut self) {
        self.enabled = false;
    }

    /// Start trusting the recorded values.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn mark_states_set(&mut self) {
        self.states_set = true;
    }

    /// Forget that the baseline was applied; the next draw re-asserts it.
    pub fn mark_states_unset(&mut self) {
        self.states_set = false;
    }

    pub fn mark_view_changed(&mut self) {
        self.view_changed = true;
    }

    pub fn set_use_vertex_cache(&mut self, used: bool) {
        self.use_vertex_cache = used;
    }

    /// The model transform a draw needs. Draws that use the vertex cache
    /// are pre-transformed and need identity; everything else needs the
    /// states' own transform. A change is reported on mismatch with the
    /// last uploaded value.
    pub fn transform_change(&self, transform: &Transform, use_vertex_cache: bool) -> Option<StateChange> {
        let effective = if use_vertex_cache {
            &Transform::IDENTITY
        } else {
            transform
        };

        if self.enabled && *effective == self.last_transform {
            return None;
        }

        Some(if effective.is_identity() {
            StateChange::LoadIdentity
        } else {
            StateChange::LoadTransform(*effective)
        })
    }

    pub fn view_change(&self) -> Option<StateChange> {
        (!self.enabled || self.view_changed).then_some(StateChange::ApplyView)
    }

    pub fn blend_change(&self, mode: BlendMode) -> Option<StateChange> {
        (!self.enabled || mode != self.last_blend_mode).then_some(StateChange::SetBlendMode(mode))
    }

    pub fn stencil_change(&self, mode: &StencilMode) -> Option<StateChange> {
        (!self.enabled || *mode != self.last_stencil_mode).then_some(StateChange::SetStencilMode(*mode))
    }

    /// A texture is rebound when its identity or its coordinate type differs
    /// from the last bind.
    pub fn texture_change(
        &self,
        texture: Option<&TextureHandle>,
        coordinate_type: CoordinateType,
    ) -> Option<StateChange> {
        let changed = !self.enabled
            || !self.texture_caching
            || TextureKey::of(texture) != self.last_texture
            || coordinate_type != self.last_coordinate_type;
        changed.then(|| StateChange::BindTexture(texture.copied(), coordinate_type))
    }

    /// Shaders are not tracked: a draw with a shader always binds it.
    pub fn shader_change(&self, shader: Option<&ShaderHandle>) -> Option<StateChange> {
        shader.copied().map(StateChange::BindShader)
    }

    /// The unbind that follows a draw made with a shader.
    pub fn shader_cleanup(&self, shader: Option<&ShaderHandle>) -> Option<StateChange> {
        shader.map(|_| StateChange::UnbindShader)
    }

    /// Note that `change` has been applied to the GPU.
    pub fn record(&mut self, change: &StateChange) {
        match change {
            StateChange::LoadIdentity => self.last_transform = Transform::IDENTITY,
            StateChange::LoadTransform(transform) => self.last_transform = *transform,
            StateChange::ApplyView => self.view_changed = false,
            StateChange::SetBlendMode(mode) => self.last_blend_mode = *mode,
            StateChange::SetStencilMode(mode) => self.last_stencil_mode = *mode,
            StateChange::BindTexture(texture, coordinate_type) => {
                self.last_texture = TextureKey::of(texture.as_ref());
                self.last_coordinate_type = *coordinate_type;
            }
            StateChange::BindShader(_) | StateChange::UnbindShader => {}
        }
    }

    /// Write `vertices` mapped through `transform` into the vertex cache and
    /// return the transformed copy.
    ///
    /// # Panics
    ///
    /// Panics if `vertices` is longer than [`VERTEX_CACHE_SIZE`].
    pub fn pre_transform(&mut self, vertices: &[Vertex], transform: &Transform) -> &[Vertex] {
        let cached = &mut self.vertex_cache[..vertices.len()];
        for (slot, vertex) in cached.iter_mut().zip(vertices) {
            *slot = vertex.transformed(transform);
        }
        cached
    }
}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use tessera_core::geometry::Size;

    use super::*;
    use crate::{StencilComparison, StencilUpdateOperation};

    fn enabled_cache() -> StateCache {
        let mut cache = StateCache::new();
        cache.enable();
        cache
    }

    #[test]
    fn test_sentinel_reports_everything() {
        let cache = StateCache::new();
        assert!(!cache.is_enabled());
        assert_eq!(
            cache.transform_change(&Transform::IDENTITY, false),
            Some(StateChange::LoadIdentity)
        );
        assert_eq!(
            cache.blend_change(BlendMode::Alpha),
            Some(StateChange::SetBlendMode(BlendMode::Alpha))
        );
        assert_eq!(
            cache.texture_change(None, CoordinateType::Normalized),
            Some(StateChange::BindTexture(None, CoordinateType::Normalized))
        );
        assert_eq!(
            cache.stencil_change(&StencilMode::DISABLED),
            Some(StateChange::SetStencilMode(StencilMode::DISABLED))
        );
        assert_eq!(cache.view_change(), Some(StateChange::ApplyView));
    }

    #[test]
    fn test_recorded_state_is_not_reapplied() {
        let mut cache = enabled_cache();
        let texture = TextureHandle::new(1, Size::new(8, 8));
        let moved = Transform::from_translation(Vec2::new(5.0, 0.0));

        for change in [
            StateChange::LoadTransform(moved),
            StateChange::SetBlendMode(BlendMode::Add),
            StateChange::BindTexture(Some(texture), CoordinateType::Normalized),
            StateChange::ApplyView,
        ] {
            cache.record(&change);
        }

        assert_eq!(cache.transform_change(&moved, false), None);
        assert_eq!(cache.blend_change(BlendMode::Add), None);
        assert_eq!(cache.texture_change(Some(&texture), CoordinateType::Normalized), None);
        assert_eq!(cache.view_change(), None);

        assert!(cache.blend_change(BlendMode::Alpha).is_some());
        assert!(cache.texture_change(None, CoordinateType::Normalized).is_some());
    }

    #[test]
    fn test_vertex_cache_path_resets_last_transform() {
        let mut cache = enabled_cache();
        let moved = Transform::from_translation(Vec2::new(5.0, 0.0));
        cache.record(&StateChange::LoadTransform(moved));

        let change = cache.transform_change(&moved, true);
        assert_eq!(change, Some(StateChange::LoadIdentity));
        cache.record(&StateChange::LoadIdentity);
        assert_eq!(cache.last_transform(), &Transform::IDENTITY);

        // Another small draw needs nothing; a large one must upload again.
        assert_eq!(cache.transform_change(&moved, true), None);
        assert_eq!(
            cache.transform_change(&moved, false),
            Some(StateChange::LoadTransform(moved))
        );
    }

    #[test]
    fn test_same_raw_slot_different_identity_rebinds() {
        let mut cache = enabled_cache();
        let old = TextureHandle::new(3, Size::new(4, 4));
        cache.record(&StateChange::BindTexture(Some(old), CoordinateType::Normalized));

        let recycled = TextureHandle::new(3, Size::new(4, 4));
        assert_eq!(
            cache.texture_change(Some(&recycled), CoordinateType::Normalized),
            Some(StateChange::BindTexture(Some(recycled), CoordinateType::Normalized))
        );
    }

    #[test]
    fn test_coordinate_type_change_rebinds_same_texture() {
        let mut cache = enabled_cache();
        let texture = TextureHandle::new(0, Size::new(16, 16));
        cache.record(&StateChange::BindTexture(Some(texture), CoordinateType::Normalized));

        assert_eq!(cache.texture_change(Some(&texture), CoordinateType::Normalized), None);
        assert_eq!(
            cache.texture_change(Some(&texture), CoordinateType::Pixels),
            Some(StateChange::BindTexture(Some(texture), CoordinateType::Pixels))
        );
    }

    #[test]
    fn test_stencil_mode_is_tracked() {
        let mut cache = enabled_cache();
        cache.record(&StateChange::SetStencilMode(StencilMode::DISABLED));
        assert_eq!(cache.stencil_change(&StencilMode::DISABLED), None);
        assert!(!cache.stencil_enabled());

        let masked = StencilMode::new(StencilComparison::Equal, StencilUpdateOperation::Keep, 1);
        assert_eq!(cache.stencil_change(&masked), Some(StateChange::SetStencilMode(masked)));
        cache.record(&StateChange::SetStencilMode(masked));
        assert!(cache.stencil_enabled());
        assert_eq!(cache.stencil_change(&masked), None);

        let other_reference = StencilMode { reference: 2, ..masked };
        assert!(cache.stencil_change(&other_reference).is_some());
    }

    #[test]
    fn test_disabled_texture_caching_always_rebinds() {
        let mut cache = StateCache::with_texture_caching(false);
        cache.enable();
        cache.record(&StateChange::BindTexture(None, CoordinateType::Normalized));
        assert!(cache.texture_change(None, CoordinateType::Normalized).is_some());
    }

    #[test]
    fn test_shaders_bind_and_unbind_every_draw() {
        let cache = enabled_cache();
        let shader = ShaderHandle::new(0);
        assert_eq!(cache.shader_change(Some(&shader)), Some(StateChange::BindShader(shader)));
        assert_eq!(cache.shader_cleanup(Some(&shader)), Some(StateChange::UnbindShader));
        assert_eq!(cache.shader_change(None), None);
        assert_eq!(cache.shader_cleanup(None), None);
    }

    #[test]
    fn test_pre_transform_fills_prefix() {
        let mut cache = StateCache::new();
        let vertices = [
            Vertex::with_position(Vec2::new(0.0, 0.0)),
            Vertex::with_position(Vec2::new(1.0, 0.0)),
        ];
        let shifted = cache.pre_transform(&vertices, &Transform::from_translation(Vec2::ONE));
        assert_eq!(shifted.len(), 2);
        assert_eq!(shifted[1].position, Vec2::new(2.0, 1.0));
    }

    #[test]
    fn test_invalidate_forces_reapply() {
        let mut cache = enabled_cache();
        cache.record(&StateChange::SetBlendMode(BlendMode::Alpha));
        assert_eq!(cache.blend_change(BlendMode::Alpha), None);
        cache.invalidate();
        assert!(cache.blend_change(BlendMode::Alpha).is_some());
    }
}
