//! Render targets: immediate-mode drawing with redundant state elided.

use glam::{IVec2, Vec2};
use tessera_core::geometry::{Rect, Size};
use tessera_core::profiling::profile_function;

use crate::cache::{StateCache, StateChange, VERTEX_CACHE_SIZE};
use crate::driver::{RenderDriver, TargetId};
use crate::{
    BlendMode, Color, CoordinateType, DrawTarget, Drawable, PrimitiveType, RenderConfig,
    RenderStates, StencilMode, Vertex, VertexBufferHandle, View,
};

/// Where a target is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    /// Created without a usable context; draws are dropped.
    Uninitialized,
    /// Initialized, but the baseline GPU state has not been asserted yet.
    /// The first draw or clear asserts it.
    StatesNotYetSet,
    StatesSet,
}

/// Counters for the GPU work a target actually issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: usize,
    pub vertices: usize,
    pub transform_loads: usize,
    pub view_applications: usize,
    pub blend_changes: usize,
    pub stencil_changes: usize,
    pub texture_binds: usize,
    pub shader_binds: usize,
    pub clears: usize,
    pub stencil_clears: usize,
}

/// Anything that can be drawn into: owns a view, a state cache and a
/// driver connection.
///
/// Every draw passes through the [`StateCache`], so submitting the same
/// states twice in a row costs one set of GPU state changes, not two.
///
/// ```
/// use tessera_core::geometry::Size;
/// use tessera_render::{mock::MockDriver, Color, RenderStates, RenderTarget, TargetState};
///
/// let mut target = RenderTarget::new(MockDriver::new(Size::new(640, 480)));
/// assert_eq!(target.lifecycle(), TargetState::StatesNotYetSet);
/// target.clear(Color::BLACK);
/// target.reset_states();
/// assert_eq!(target.lifecycle(), TargetState::StatesSet);
/// ```
pub struct RenderTarget<D: RenderDriver> {
    id: TargetId,
    driver: D,
    config: RenderConfig,
    cache: StateCache,
    default_view: View,
    view: View,
    custom_view: bool,
    initialized: bool,
    stats: RenderStats,
}

impl<D: RenderDriver> RenderTarget<D> {
    /// Create and initialize a target with the default configuration.
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, RenderConfig::default())
    }

    pub fn with_config(driver: D, config: RenderConfig) -> Self {
        let mut target = Self::uninitialized(driver, config);
        target.initialize();
        target
    }

    /// Create a target whose context is not ready yet. Call
    /// [`initialize`](Self::initialize) once it is; until then every draw is
    /// dropped.
    pub fn uninitialized(driver: D, config: RenderConfig) -> Self {
        Self {
            id: TargetId::next(),
            driver,
            config,
            cache: StateCache::with_texture_caching(config.texture_cache),
            default_view: View::default(),
            view: View::default(),
            custom_view: false,
            initialized: false,
            stats: RenderStats::default(),
        }
    }

    /// Set up the default view from the driver's surface size and schedule
    /// the baseline GPU state. Also used after the context was recreated.
    pub fn initialize(&mut self) {
        let size = self.driver.target_size();
        self.default_view = View::from_rect(Rect::new(
            0.0,
            0.0,
            size.width as f32,
            size.height as f32,
        ));
        self.view = self.default_view.clone();
        self.custom_view = false;

        self.cache.mark_states_unset();
        self.cache.invalidate();
        self.initialized = true;

        tracing::debug!(
            target_id = self.id.get(),
            width = size.width,
            height = size.height,
            "Render target initialized"
        );
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn size(&self) -> Size<u32> {
        self.driver.target_size()
    }

    pub fn lifecycle(&self) -> TargetState {
        if !self.initialized {
            TargetState::Uninitialized
        } else if self.cache.states_set() {
            TargetState::StatesSet
        } else {
            TargetState::StatesNotYetSet
        }
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RenderStats::default();
    }

    /// Whether this target currently owns the driver's context.
    pub fn is_active(&self) -> bool {
        self.driver.active_target() == Some(self.id)
    }

    /// Acquire or release the context. Acquiring it from another target
    /// invalidates this target's cache. Returns `false` on failure.
    ///
    /// Taking over a context nobody holds also re-asserts the baseline on
    /// the next draw.
    pub fn set_active(&mut self, active: bool) -> bool {
        let previous = self.driver.active_target();
        if !self.driver.activate(self.id, active) {
            tracing::warn!(target_id = self.id.get(), active, "Failed to change context activation");
            return false;
        }

        match (active, previous) {
            (true, Some(owner)) if owner == self.id => {}
            (true, None) => {
                self.cache.mark_states_unset();
                self.cache.invalidate();
            }
            _ => self.cache.invalidate(),
        }
        true
    }

    fn ensure_active(&mut self) -> bool {
        self.is_active() || self.set_active(true)
    }

    /// Fill the whole target with `color`.
    pub fn clear(&mut self, color: Color) {
        profile_function!();

        if self.prepare_clear() {
            self.driver.clear(color);
            self.stats.clears += 1;
        }
    }

    /// Fill the stencil buffer with `value`, leaving colors untouched.
    pub fn clear_stencil(&mut self, value: u32) {
        profile_function!();

        if self.prepare_clear() {
            self.driver.clear_stencil(value);
            self.stats.stencil_clears += 1;
        }
    }

    /// Clear colors and stencil values together.
    pub fn clear_with_stencil(&mut self, color: Color, value: u32) {
        profile_function!();

        if self.prepare_clear() {
            self.driver.clear(color);
            self.driver.clear_stencil(value);
            self.stats.clears += 1;
            self.stats.stencil_clears += 1;
        }
    }

    /// Unbind the texture and apply a pending view before a clear.
    fn prepare_clear(&mut self) -> bool {
        if !self.initialized || !self.ensure_active() {
            tracing::debug!(target_id = self.id.get(), "Clear skipped, target not ready");
            return false;
        }

        if let Some(change) = self.cache.texture_change(None, CoordinateType::Normalized) {
            self.apply(change);
        }
        // The scissor limits what gets cleared.
        if let Some(change) = self.cache.view_change() {
            self.apply(change);
        }
        true
    }

    /// Clear with the configured clear color.
    pub fn clear_default(&mut self) {
        self.clear(self.config.clear_color);
    }

    /// Replace the current view. A user-set view survives resizes.
    pub fn set_view(&mut self, view: View) {
        self.view = view;
        self.custom_view = true;
        self.cache.mark_view_changed();
    }

    /// Go back to the default view, following future resizes again.
    pub fn reset_view(&mut self) {
        self.view = self.default_view.clone();
        self.custom_view = false;
        self.cache.mark_view_changed();
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn default_view(&self) -> &View {
        &self.default_view
    }

    /// Recompute the default view after the surface changed size.
    pub fn handle_resize(&mut self) {
        let size = self.driver.target_size();
        self.default_view
            .reset(Rect::new(0.0, 0.0, size.width as f32, size.height as f32));
        if !self.custom_view {
            self.view = self.default_view.clone();
        }
        self.cache.mark_view_changed();

        tracing::trace!(
            target_id = self.id.get(),
            width = size.width,
            height = size.height,
            "Render target resized"
        );
    }

    /// The pixel rectangle `view` renders into, with a top-left origin.
    pub fn viewport(&self, view: &View) -> Rect<i32> {
        self.to_pixels(view.viewport())
    }

    /// The pixel rectangle `view` clips to, with a top-left origin.
    pub fn scissor(&self, view: &View) -> Rect<i32> {
        self.to_pixels(view.scissor())
    }

    fn to_pixels(&self, normalized: Rect<f32>) -> Rect<i32> {
        let size = self.size();
        let (width, height) = (size.width as f32, size.height as f32);
        Rect::new(
            (width * normalized.x).round() as i32,
            (height * normalized.y).round() as i32,
            (width * normalized.width).round() as i32,
            (height * normalized.height).round() as i32,
        )
    }

    /// World coordinates of the top-left corner of `pixel` under `view`.
    pub fn map_pixel_to_coords(&self, pixel: IVec2, view: &View) -> Vec2 {
        let viewport = self.viewport(view);
        let normalized = Vec2::new(
            -1.0 + 2.0 * (pixel.x - viewport.x) as f32 / viewport.width.max(1) as f32,
            1.0 - 2.0 * (pixel.y - viewport.y) as f32 / viewport.height.max(1) as f32,
        );
        view.inverse_transform().transform_point(normalized)
    }

    /// The pixel containing `point` under `view`, rounded to the nearest
    /// pixel corner.
    pub fn map_coords_to_pixel(&self, point: Vec2, view: &View) -> IVec2 {
        let normalized = view.transform().transform_point(point);
        let viewport = self.viewport(view);
        IVec2::new(
            ((normalized.x + 1.0) / 2.0 * viewport.width as f32 + viewport.x as f32).round()
                as i32,
            ((-normalized.y + 1.0) / 2.0 * viewport.height as f32 + viewport.y as f32).round()
                as i32,
        )
    }

    /// [`map_pixel_to_coords`](Self::map_pixel_to_coords) with the current view.
    pub fn pixel_to_coords(&self, pixel: IVec2) -> Vec2 {
        self.map_pixel_to_coords(pixel, &self.view)
    }

    /// [`map_coords_to_pixel`](Self::map_coords_to_pixel) with the current view.
    pub fn coords_to_pixel(&self, point: Vec2) -> IVec2 {
        self.map_coords_to_pixel(point, &self.view)
    }

    /// Draw anything [`Drawable`].
    pub fn draw<T: Drawable + ?Sized>(&mut self, drawable: &T, states: &RenderStates) {
        drawable.draw(self, states);
    }

    /// Draw raw vertices. Empty slices are ignored without touching any state.
    pub fn draw_vertices(
        &mut self,
        vertices: &[Vertex],
        primitive: PrimitiveType,
        states: &RenderStates,
    ) {
        if vertices.is_empty() {
            return;
        }

        profile_function!();

        if !self.initialized || !self.ensure_active() {
            tracing::debug!(
                target_id = self.id.get(),
                vertices = vertices.len(),
                "Draw skipped, target not ready"
            );
            return;
        }

        let use_vertex_cache = self.config.vertex_cache && vertices.len() <= VERTEX_CACHE_SIZE;
        self.apply_draw_states(states, use_vertex_cache);

        if use_vertex_cache {
            let transformed = self.cache.pre_transform(vertices, &states.transform);
            self.driver.draw_primitives(primitive, transformed);
        } else {
            self.driver.draw_primitives(primitive, vertices);
        }
        self.finish_draw(states, vertices.len(), use_vertex_cache);
    }

    /// Draw a whole GPU-resident buffer.
    pub fn draw_buffer(&mut self, buffer: &VertexBufferHandle, states: &RenderStates) {
        self.draw_buffer_range(buffer, 0, buffer.len(), states);
    }

    /// Draw `count` vertices of `buffer` starting at `first`. The range is
    /// clamped to the buffer; an empty range is ignored without touching any
    /// state. Buffer draws never use the vertex cache.
    pub fn draw_buffer_range(
        &mut self,
        buffer: &VertexBufferHandle,
        first: usize,
        count: usize,
        states: &RenderStates,
    ) {
        let Some(range) = buffer.clamp_range(first, count) else {
            return;
        };

        profile_function!();

        if !self.initialized || !self.ensure_active() {
            tracing::debug!(
                target_id = self.id.get(),
                buffer = buffer.id().get(),
                "Buffer draw skipped, target not ready"
            );
            return;
        }

        self.apply_draw_states(states, false);
        let vertices = range.len();
        self.driver.draw_buffer(buffer, range);
        self.finish_draw(states, vertices, false);
    }

    fn finish_draw(&mut self, states: &RenderStates, vertices: usize, use_vertex_cache: bool) {
        self.stats.draw_calls += 1;
        self.stats.vertices += vertices;

        if let Some(change) = self.cache.shader_cleanup(states.shader.as_ref()) {
            self.apply(change);
        }
        self.cache.set_use_vertex_cache(use_vertex_cache);
        self.cache.enable();
    }

    /// Save the driver state, then reset to the baseline so this target can
    /// draw regardless of what other code did to the context.
    pub fn push_states(&mut self) {
        if self.ensure_active() {
            self.driver.push_states();
        }
        self.reset_states();
    }

    /// Restore the state saved by [`push_states`](Self::push_states).
    pub fn pop_states(&mut self) {
        if self.ensure_active() {
            self.driver.pop_states();
            self.cache.invalidate();
        }
    }

    /// Re-assert the baseline GPU state and forget all cached values.
    pub fn reset_states(&mut self) {
        profile_function!();

        if !self.ensure_active() {
            return;
        }

        self.cache.invalidate();
        self.driver.reset_baseline();
        self.apply(StateChange::SetBlendMode(BlendMode::Alpha));
        self.apply(StateChange::SetStencilMode(StencilMode::DISABLED));
        self.apply(StateChange::BindTexture(None, CoordinateType::Normalized));
        self.apply(StateChange::UnbindShader);
        self.apply(StateChange::LoadIdentity);

        self.cache.set_use_vertex_cache(false);
        self.cache.mark_view_changed();
        self.cache.mark_states_set();
        self.cache.enable();

        tracing::trace!(target_id = self.id.get(), "Render states reset");
    }

    fn apply_draw_states(&mut self, states: &RenderStates, use_vertex_cache: bool) {
        if !self.cache.states_set() {
            self.reset_states();
        }

        if let Some(change) = self.cache.transform_change(&states.transform, use_vertex_cache) {
            self.apply(change);
        }
        if let Some(change) = self.cache.view_change() {
            self.apply(change);
        }
        if let Some(change) = self.cache.blend_change(states.blend_mode) {
            self.apply(change);
        }
        if let Some(change) = self.cache.stencil_change(&states.stencil_mode) {
            self.apply(change);
        }
        if let Some(change) = self
            .cache
            .texture_change(states.texture.as_ref(), states.coordinate_type)
        {
            self.apply(change);
        }
        if let Some(change) = self.cache.shader_change(states.shader.as_ref()) {
            self.apply(change);
        }
    }

    fn apply(&mut self, change: StateChange) {
        match &change {
            StateChange::LoadIdentity => {
                self.driver.load_identity();
                self.stats.transform_loads += 1;
            }
            StateChange::LoadTransform(transform) => {
                self.driver.load_transform(transform);
                self.stats.transform_loads += 1;
            }
            StateChange::ApplyView => self.apply_current_view(),
            StateChange::SetBlendMode(mode) => {
                self.driver.set_blend_mode(*mode);
                self.stats.blend_changes += 1;
            }
            StateChange::SetStencilMode(mode) => {
                self.driver
                    .set_stencil_mode((!mode.is_disabled()).then_some(mode));
                self.stats.stencil_changes += 1;
            }
            StateChange::BindTexture(texture, coordinate_type) => {
                self.driver.bind_texture(texture.as_ref(), *coordinate_type);
                self.stats.texture_binds += 1;
            }
            StateChange::BindShader(shader) => {
                self.driver.bind_shader(Some(shader));
                self.stats.shader_binds += 1;
            }
            StateChange::UnbindShader => self.driver.bind_shader(None),
        }
        self.cache.record(&change);
    }

    fn apply_current_view(&mut self) {
        let viewport = self.viewport(&self.view);
        let scissor = (!self.view.has_full_scissor()).then(|| self.scissor(&self.view));

        self.driver.set_viewport(viewport);
        self.driver.set_scissor(scissor);
        self.driver.load_projection(self.view.transform());
        self.stats.view_applications += 1;
    }
}

impl<D: RenderDriver> DrawTarget for RenderTarget<D> {
    fn draw_vertices(&mut self, vertices: &[Vertex], primitive: PrimitiveType, states: &RenderStates) {
        RenderTarget::draw_vertices(self, vertices, primitive, states);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mock::{DriverCall, MockDriver};

    fn quad() -> [Vertex; 4] {
        [
            Vertex::with_position(Vec2::new(0.0, 0.0)),
            Vertex::with_position(Vec2::new(0.0, 10.0)),
            Vertex::with_position(Vec2::new(10.0, 0.0)),
            Vertex::with_position(Vec2::new(10.0, 10.0)),
        ]
    }

    #[test]
    fn test_first_draw_asserts_baseline_once() {
        let mut target = RenderTarget::new(MockDriver::default());
        assert_eq!(target.lifecycle(), TargetState::StatesNotYetSet);

        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);
        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);

        let baselines = target
            .driver()
            .calls()
            .iter()
            .filter(|call| matches!(call, DriverCall::ResetBaseline))
            .count();
        assert_eq!(baselines, 1);
        assert_eq!(target.lifecycle(), TargetState::StatesSet);
        assert_eq!(target.stats().draw_calls, 2);
        assert_eq!(target.stats().view_applications, 1);
    }

    #[test]
    fn test_uninitialized_target_drops_draws() {
        let mut target = RenderTarget::uninitialized(MockDriver::default(), RenderConfig::default());
        assert_eq!(target.lifecycle(), TargetState::Uninitialized);
        target.clear(Color::RED);
        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);
        assert_eq!(target.driver().call_count(), 0);

        target.initialize();
        target.clear(Color::RED);
        assert_eq!(target.driver().count_clears(), 1);
    }

    #[test]
    fn test_switching_targets_invalidates_cache() {
        let driver = Arc::new(MockDriver::default());
        let mut first = RenderTarget::new(driver.clone());
        let mut second = RenderTarget::new(driver.clone());

        first.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);
        assert!(first.cache().is_enabled());

        second.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);
        assert!(second.is_active());
        assert!(!first.is_active());

        driver.clear_calls();
        first.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);
        // Reacquiring the context re-applies blend, texture and view.
        assert_eq!(driver.count_blend_changes(), 1);
        assert_eq!(driver.count_texture_binds(), 1);
        assert_eq!(driver.count_projection_loads(), 1);
    }

    #[test]
    fn test_failed_activation_skips_draw() {
        let driver = MockDriver::default();
        driver.set_fail_activation(true);
        let mut target = RenderTarget::new(driver);
        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);
        assert_eq!(target.driver().count_draws(), 0);
        assert_eq!(target.lifecycle(), TargetState::StatesNotYetSet);
    }

    #[test]
    fn test_shader_is_unbound_after_each_draw() {
        let mut target = RenderTarget::new(MockDriver::default());
        let shader = crate::ShaderHandle::new(1);
        let states = RenderStates::DEFAULT.with_shader(shader);

        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &states);
        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &states);

        assert_eq!(target.driver().count_shader_binds(), 2);
        assert_eq!(target.driver().draws()[1].shader, Some(shader));
        assert!(matches!(
            target.driver().calls().last(),
            Some(DriverCall::BindShader(None))
        ));
    }

    #[test]
    fn test_baseline_disables_stencil() {
        let mut target = RenderTarget::new(MockDriver::default());
        target.reset_states();
        assert!(target
            .driver()
            .calls()
            .contains(&DriverCall::SetStencilMode(None)));
        assert!(!target.cache().stencil_enabled());
    }

    #[test]
    fn test_scissor_only_set_when_clipping() {
        let mut target = RenderTarget::new(MockDriver::new(Size::new(200, 100)));
        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);
        assert_eq!(target.driver().current_scissor(), None);

        let mut view = target.default_view().clone();
        view.set_scissor(Rect::new(0.25, 0.5, 0.5, 0.5));
        target.set_view(view);
        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &RenderStates::DEFAULT);
        assert_eq!(target.driver().current_scissor(), Some(Rect::new(50, 50, 100, 50)));
    }

    #[test]
    fn test_clear_unbinds_texture_once() {
        let mut target = RenderTarget::new(MockDriver::default());
        target.reset_states();
        target.driver().clear_calls();

        target.clear(Color::BLACK);
        target.clear(Color::WHITE);
        assert_eq!(target.driver().count_texture_binds(), 0);
        assert_eq!(target.driver().count_clears(), 2);
    }

    #[test]
    fn test_uncached_config_reuploads_every_draw() {
        let mut target = RenderTarget::with_config(MockDriver::default(), RenderConfig::UNCACHED);
        let texture = crate::TextureHandle::new(0, Size::new(4, 4));
        let states = RenderStates::DEFAULT.with_texture(texture);

        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &states);
        target.draw_vertices(&quad(), PrimitiveType::TriangleStrip, &states);

        assert_eq!(target.driver().count_binds_of(&texture), 2);
        // No vertex cache: small draws keep their (identity) model transform.
        assert!(target.driver().draws().iter().all(|d| d.transform.is_identity()));
    }
}
