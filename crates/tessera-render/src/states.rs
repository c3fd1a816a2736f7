use crate::{BlendMode, CoordinateType, ShaderHandle, StencilMode, TextureHandle, Transform};

/// Everything besides geometry that determines how a draw call renders.
///
/// `RenderStates` is a plain value: copy it, tweak a field, pass it to a
/// draw. The `with_*` builders make one-off variations read naturally:
///
/// ```
/// use tessera_render::{BlendMode, RenderStates};
///
/// let additive = RenderStates::DEFAULT.with_blend_mode(BlendMode::Add);
/// assert_eq!(additive.texture, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStates {
    pub transform: Transform,
    pub blend_mode: BlendMode,
    pub stencil_mode: StencilMode,
    pub texture: Option<TextureHandle>,
    pub coordinate_type: CoordinateType,
    pub shader: Option<ShaderHandle>,
}

impl RenderStates {
    /// Alpha blending, identity transform, stencil test off, no texture,
    /// no shader.
    pub const DEFAULT: RenderStates = RenderStates {
        transform: Transform::IDENTITY,
        blend_mode: BlendMode::Alpha,
        stencil_mode: StencilMode::DISABLED,
        texture: None,
        coordinate_type: CoordinateType::Normalized,
        shader: None,
    };

    pub const fn new(
        transform: Transform,
        blend_mode: BlendMode,
        texture: Option<TextureHandle>,
        shader: Option<ShaderHandle>,
    ) -> Self {
        Self {
            transform,
            blend_mode,
            stencil_mode: StencilMode::DISABLED,
            texture,
            coordinate_type: CoordinateType::Normalized,
            shader,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_stencil_mode(mut self, stencil_mode: StencilMode) -> Self {
        self.stencil_mode = stencil_mode;
        self
    }

    pub fn with_coordinate_type(mut self, coordinate_type: CoordinateType) -> Self {
        self.coordinate_type = coordinate_type;
        self
    }

    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_shader(mut self, shader: ShaderHandle) -> Self {
        self.shader = Some(shader);
        self
    }

    /// Append an object's local transform, so it applies before the current one.
    pub fn with_local_transform(mut self, local: &Transform) -> Self {
        self.transform = self.transform.combine(local);
        self
    }
}

impl Default for RenderStates {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Transform> for RenderStates {
    fn from(transform: Transform) -> Self {
        Self::DEFAULT.with_transform(transform)
    }
}

impl From<BlendMode> for RenderStates {
    fn from(blend_mode: BlendMode) -> Self {
        Self::DEFAULT.with_blend_mode(blend_mode)
    }
}

impl From<TextureHandle> for RenderStates {
    fn from(texture: TextureHandle) -> Self {
        Self::DEFAULT.with_texture(texture)
    }
}

impl From<StencilMode> for RenderStates {
    fn from(stencil_mode: StencilMode) -> Self {
        Self::DEFAULT.with_stencil_mode(stencil_mode)
    }
}

impl From<ShaderHandle> for RenderStates {
    fn from(shader: ShaderHandle) -> Self {
        Self::DEFAULT.with_shader(shader)
    }
}
