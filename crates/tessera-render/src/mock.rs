//! Recording implementation of [`RenderDriver`] for tests.
//!
//! [`MockDriver`] performs no GPU work. It appends every call to a log and
//! tracks the state a real context would be in, so each recorded draw also
//! carries the transform, blend mode, stencil mode and texture it would have
//! rendered with.

use std::ops::Range;

use glam::Vec2;
use parking_lot::Mutex;
use tessera_core::geometry::{Rect, Size};

use crate::driver::{RenderDriver, TargetId};
use crate::{
    BlendMode, Color, CoordinateType, PrimitiveType, ShaderHandle, StencilMode, TextureHandle,
    Transform, Vertex, VertexBufferHandle,
};

/// A draw as the mock context executed it.
#[derive(Debug, Clone, PartialEq)]
pub struct MockDraw {
    pub primitive: PrimitiveType,
    pub vertices: Vec<Vertex>,
    /// Model transform loaded at the time of the draw.
    pub transform: Transform,
    pub blend_mode: BlendMode,
    /// `None` while the stencil test is off.
    pub stencil_mode: Option<StencilMode>,
    pub texture: Option<TextureHandle>,
    pub coordinate_type: CoordinateType,
    pub shader: Option<ShaderHandle>,
}

/// A draw of a GPU-resident buffer range.
#[derive(Debug, Clone, PartialEq)]
pub struct MockBufferDraw {
    pub buffer: VertexBufferHandle,
    pub range: Range<usize>,
    pub transform: Transform,
    pub blend_mode: BlendMode,
    pub stencil_mode: Option<StencilMode>,
    pub texture: Option<TextureHandle>,
    pub shader: Option<ShaderHandle>,
}

impl MockDraw {
    /// Vertex positions after the model transform, i.e. in world space.
    pub fn world_positions(&self) -> Vec<Vec2> {
        self.vertices
            .iter()
            .map(|v| self.transform.transform_point(v.position))
            .collect()
    }
}

/// Records a driver call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Activate { target: TargetId, active: bool },
    ResetBaseline,
    SetViewport(Rect<i32>),
    SetScissor(Option<Rect<i32>>),
    LoadProjection(Transform),
    LoadTransform(Transform),
    LoadIdentity,
    SetBlendMode(BlendMode),
    SetStencilMode(Option<StencilMode>),
    BindTexture(Option<TextureHandle>, CoordinateType),
    BindShader(Option<ShaderHandle>),
    Draw(MockDraw),
    DrawBuffer(MockBufferDraw),
    Clear(Color),
    ClearStencil(u32),
    PushStates,
    PopStates,
}

#[derive(Debug, Clone)]
struct ContextState {
    projection: Transform,
    model: Transform,
    blend_mode: BlendMode,
    stencil_mode: Option<StencilMode>,
    texture: Option<TextureHandle>,
    coordinate_type: CoordinateType,
    shader: Option<ShaderHandle>,
    viewport: Rect<i32>,
    scissor: Option<Rect<i32>>,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            projection: Transform::IDENTITY,
            model: Transform::IDENTITY,
            blend_mode: BlendMode::Alpha,
            stencil_mode: None,
            texture: None,
            coordinate_type: CoordinateType::Normalized,
            shader: None,
            viewport: Rect::default(),
            scissor: None,
        }
    }
}

/// Mock GPU context.
///
/// # Borrow Checking Pattern: Interior Mutability
///
/// [`RenderDriver`] methods take `&self`, so the log and the simulated
/// context live behind `parking_lot::Mutex`es. Share one mock between
/// several targets with `Arc<MockDriver>` to model a shared context.
///
/// ```
/// use std::sync::Arc;
/// use tessera_core::geometry::Size;
/// use tessera_render::{mock::MockDriver, Color, RenderTarget};
///
/// let driver = Arc::new(MockDriver::new(Size::new(800, 600)));
/// let mut target = RenderTarget::new(driver.clone());
/// target.clear(Color::BLACK);
/// assert_eq!(driver.count_clears(), 1);
/// ```
pub struct MockDriver {
    calls: Mutex<Vec<DriverCall>>,
    size: Mutex<Size<u32>>,
    active: Mutex<Option<TargetId>>,
    fail_activation: Mutex<bool>,
    state: Mutex<ContextState>,
    saved: Mutex<Vec<ContextState>>,
}

impl MockDriver {
    pub fn new(size: Size<u32>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            size: Mutex::new(size),
            active: Mutex::new(None),
            fail_activation: Mutex::new(false),
            state: Mutex::new(ContextState::default()),
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Change the surface size reported to targets.
    pub fn set_target_size(&self, size: Size<u32>) {
        *self.size.lock() = size;
    }

    /// Make every subsequent activation fail.
    pub fn set_fail_activation(&self, fail: bool) {
        *self.fail_activation.lock() = fail;
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().clone()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// All draws, in submission order.
    pub fn draws(&self) -> Vec<MockDraw> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DriverCall::Draw(draw) => Some(draw.clone()),
                _ => None,
            })
            .collect()
    }

    /// All buffer range draws, in submission order.
    pub fn buffer_draws(&self) -> Vec<MockBufferDraw> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DriverCall::DrawBuffer(draw) => Some(draw.clone()),
                _ => None,
            })
            .collect()
    }

    /// Draw calls of either kind.
    pub fn count_draws(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Draw(_) | DriverCall::DrawBuffer(_)))
    }

    /// Model transform uploads, identity loads included.
    pub fn count_transform_loads(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::LoadTransform(_) | DriverCall::LoadIdentity))
    }

    pub fn count_projection_loads(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::LoadProjection(_)))
    }

    pub fn count_blend_changes(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::SetBlendMode(_)))
    }

    /// Texture binds of any kind, unbinds included.
    pub fn count_texture_binds(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::BindTexture(..)))
    }

    /// Binds of one particular texture.
    pub fn count_binds_of(&self, texture: &TextureHandle) -> usize {
        self.count(|call| matches!(call, DriverCall::BindTexture(Some(t), _) if t.id() == texture.id()))
    }

    pub fn count_shader_binds(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::BindShader(Some(_))))
    }

    pub fn count_stencil_changes(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::SetStencilMode(_)))
    }

    pub fn count_clears(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::Clear(_)))
    }

    pub fn count_stencil_clears(&self) -> usize {
        self.count(|call| matches!(call, DriverCall::ClearStencil(_)))
    }

    pub fn current_stencil_mode(&self) -> Option<StencilMode> {
        self.state.lock().stencil_mode
    }

    pub fn current_viewport(&self) -> Rect<i32> {
        self.state.lock().viewport
    }

    pub fn current_scissor(&self) -> Option<Rect<i32>> {
        self.state.lock().scissor
    }

    pub fn current_projection(&self) -> Transform {
        self.state.lock().projection
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().push(call);
    }
}

impl RenderDriver for MockDriver {
    fn activate(&self, target: TargetId, active: bool) -> bool {
        self.record(DriverCall::Activate { target, active });
        if *self.fail_activation.lock() {
            return false;
        }

        let mut current = self.active.lock();
        if active {
            *current = Some(target);
        } else if *current == Some(target) {
            *current = None;
        }
        true
    }

    fn active_target(&self) -> Option<TargetId> {
        *self.active.lock()
    }

    fn target_size(&self) -> Size<u32> {
        *self.size.lock()
    }

    fn reset_baseline(&self) {
        self.record(DriverCall::ResetBaseline);
    }

    fn set_viewport(&self, viewport: Rect<i32>) {
        self.state.lock().viewport = viewport;
        self.record(DriverCall::SetViewport(viewport));
    }

    fn set_scissor(&self, scissor: Option<Rect<i32>>) {
        self.state.lock().scissor = scissor;
        self.record(DriverCall::SetScissor(scissor));
    }

    fn load_projection(&self, projection: &Transform) {
        self.state.lock().projection = *projection;
        self.record(DriverCall::LoadProjection(*projection));
    }

    fn load_transform(&self, transform: &Transform) {
        self.state.lock().model = *transform;
        self.record(DriverCall::LoadTransform(*transform));
    }

    fn load_identity(&self) {
        self.state.lock().model = Transform::IDENTITY;
        self.record(DriverCall::LoadIdentity);
    }

    fn set_blend_mode(&self, mode: BlendMode) {
        self.state.lock().blend_mode = mode;
        self.record(DriverCall::SetBlendMode(mode));
    }

    fn set_stencil_mode(&self, mode: Option<&StencilMode>) {
        self.state.lock().stencil_mode = mode.copied();
        self.record(DriverCall::SetStencilMode(mode.copied()));
    }

    fn bind_texture(&self, texture: Option<&TextureHandle>, coordinate_type: CoordinateType) {
        {
            let mut state = self.state.lock();
            state.texture = texture.copied();
            state.coordinate_type = coordinate_type;
        }
        self.record(DriverCall::BindTexture(texture.copied(), coordinate_type));
    }

    fn bind_shader(&self, shader: Option<&ShaderHandle>) {
        self.state.lock().shader = shader.copied();
        self.record(DriverCall::BindShader(shader.copied()));
    }

    fn draw_primitives(&self, primitive: PrimitiveType, vertices: &[Vertex]) {
        let draw = {
            let state = self.state.lock();
            MockDraw {
                primitive,
                vertices: vertices.to_vec(),
                transform: state.model,
                blend_mode: state.blend_mode,
                stencil_mode: state.stencil_mode,
                texture: state.texture,
                coordinate_type: state.coordinate_type,
                shader: state.shader,
            }
        };
        self.record(DriverCall::Draw(draw));
    }

    fn draw_buffer(&self, buffer: &VertexBufferHandle, range: Range<usize>) {
        let draw = {
            let state = self.state.lock();
            MockBufferDraw {
                buffer: *buffer,
                range,
                transform: state.model,
                blend_mode: state.blend_mode,
                stencil_mode: state.stencil_mode,
                texture: state.texture,
                shader: state.shader,
            }
        };
        self.record(DriverCall::DrawBuffer(draw));
    }

    fn clear(&self, color: Color) {
        self.record(DriverCall::Clear(color));
    }

    fn clear_stencil(&self, value: u32) {
        self.record(DriverCall::ClearStencil(value));
    }

    fn push_states(&self) {
        let snapshot = self.state.lock().clone();
        self.saved.lock().push(snapshot);
        self.record(DriverCall::PushStates);
    }

    fn pop_states(&self) {
        if let Some(snapshot) = self.saved.lock().pop() {
            *self.state.lock() = snapshot;
        }
        self.record(DriverCall::PopStates);
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new(Size::new(800, 600))
    }
}
