//! Blend modes and their fixed GPU blend-function pairs.

/// A blend factor, applied to either the source or the destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
}

/// The `(source, destination)` factor pair a [`BlendMode`] maps to.
///
/// The blend equation is always `src * src_factor + dst * dst_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFactors {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

/// Blend modes supported by the render target.
///
/// Exactly one blend mode is active at any draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Standard alpha blending for transparent content.
    ///
    /// Formula: `src.rgb * src.a + dst.rgb * (1 - src.a)`
    #[default]
    Alpha,

    /// Additive blending.
    ///
    /// Formula: `src.rgb * src.a + dst.rgb`
    ///
    /// Use for: Glow effects, particles, light sources.
    Add,

    /// Multiplicative blending.
    ///
    /// Formula: `src.rgb * dst.rgb`
    Multiply,

    /// No blending: source replaces destination.
    None,
}

impl BlendMode {
    pub const ALL: [BlendMode; 4] = [
        BlendMode::Alpha,
        BlendMode::Add,
        BlendMode::Multiply,
        BlendMode::None,
    ];

    /// The fixed factor pair for this mode.
    pub const fn factors(self) -> BlendFactors {
        match self {
            BlendMode::Alpha => BlendFactors {
                src: BlendFactor::SrcAlpha,
                dst: BlendFactor::OneMinusSrcAlpha,
            },
            BlendMode::Add => BlendFactors {
                src: BlendFactor::SrcAlpha,
                dst: BlendFactor::One,
            },
            BlendMode::Multiply => BlendFactors {
                src: BlendFactor::DstColor,
                dst: BlendFactor::Zero,
            },
            BlendMode::None => BlendFactors {
                src: BlendFactor::One,
                dst: BlendFactor::Zero,
            },
        }
    }

    /// Convert to a wgpu `BlendState`. `None` maps to `REPLACE`.
    #[cfg(feature = "wgpu")]
    pub fn to_blend_state(self) -> wgpu::BlendState {
        match self {
            BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Add => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            },
            BlendMode::Multiply => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Dst,
                    dst_factor: wgpu::BlendFactor::Zero,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::DstAlpha,
                    dst_factor: wgpu::BlendFactor::Zero,
                    operation: wgpu::BlendOperation::Add,
                },
            },
            BlendMode::None => wgpu::BlendState::REPLACE,
        }
    }

    /// Create a color target state with this blend mode.
    #[cfg(feature = "wgpu")]
    pub fn to_color_target_state(self, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format,
            blend: Some(self.to_blend_state()),
            write_mask: wgpu::ColorWrites::ALL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mode_has_distinct_factors() {
        for (i, a) in BlendMode::ALL.iter().enumerate() {
            for b in &BlendMode::ALL[i + 1..] {
                assert_ne!(a.factors(), b.factors(), "{a:?} and {b:?} share factors");
            }
        }
    }

    #[test]
    fn test_default_is_alpha() {
        assert_eq!(BlendMode::default(), BlendMode::Alpha);
    }
}
