use crate::{ShaderId, TextureId, VertexBufferId};

/// Errors reported by render backends.
///
/// Drawing itself never fails: a target that cannot activate its context
/// drops the draw and logs it. Errors only come from resource management.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// No GPU adapter matched the request
    AdapterNotFound(String),
    /// The adapter refused to create a device
    DeviceRequest(String),
    /// A texture with zero width or height was requested
    EmptyTexture,
    /// Pixel data does not match `width * height * 4` bytes
    TextureDataSize { expected: usize, actual: usize },
    /// The texture was destroyed or belongs to another backend
    UnknownTexture(TextureId),
    /// The shader was destroyed or belongs to another backend
    UnknownShader(ShaderId),
    /// Shader source failed validation
    ShaderCompilation(String),
    /// A vertex buffer with no vertices was requested
    EmptyVertexBuffer,
    /// An update would write past the end of a vertex buffer
    VertexBufferRange { offset: usize, count: usize, len: usize },
    /// The vertex buffer was destroyed or belongs to another backend
    UnknownVertexBuffer(VertexBufferId),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdapterNotFound(msg) => write!(f, "No suitable GPU adapter: {}", msg),
            Self::DeviceRequest(msg) => write!(f, "Failed to create device: {}", msg),
            Self::EmptyTexture => write!(f, "Texture dimensions must be non-zero"),
            Self::TextureDataSize { expected, actual } => write!(
                f,
                "Texture data is {} bytes, expected {} bytes",
                actual, expected
            ),
            Self::UnknownTexture(id) => write!(f, "Unknown texture {}", id.get()),
            Self::UnknownShader(id) => write!(f, "Unknown shader {}", id.get()),
            Self::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            Self::EmptyVertexBuffer => write!(f, "Vertex buffers must hold at least one vertex"),
            Self::VertexBufferRange { offset, count, len } => write!(
                f,
                "Writing {} vertices at {} overflows a buffer of {}",
                count, offset, len
            ),
            Self::UnknownVertexBuffer(id) => write!(f, "Unknown vertex buffer {}", id.get()),
        }
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_sizes() {
        let err = RenderError::TextureDataSize {
            expected: 64,
            actual: 60,
        };
        assert_eq!(err.to_string(), "Texture data is 60 bytes, expected 64 bytes");
    }
}
