//! Stencil test configuration.

/// Comparison between a draw's reference value and the stored stencil value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilComparison {
    Never,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    #[default]
    Always,
}

/// What happens to the stored value when a fragment passes the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilUpdateOperation {
    #[default]
    Keep,
    Zero,
    /// Store the reference value.
    Replace,
    /// Increment, clamping at the maximum.
    Increment,
    /// Decrement, clamping at zero.
    Decrement,
    Invert,
}

/// Stencil state of a draw.
///
/// The default mode (always pass, keep the stored value) disables the
/// stencil test altogether.
///
/// ```
/// use tessera_render::{StencilComparison, StencilMode, StencilUpdateOperation};
///
/// // Write 1 wherever the mask shape covers, without touching the colors.
/// let write_mask = StencilMode::new(StencilComparison::Always, StencilUpdateOperation::Replace, 1)
///     .stencil_only();
/// // Then only draw where the mask was written.
/// let masked = StencilMode::new(StencilComparison::Equal, StencilUpdateOperation::Keep, 1);
/// assert!(!masked.is_disabled());
/// assert!(StencilMode::DISABLED.is_disabled());
/// # let _ = write_mask;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilMode {
    pub comparison: StencilComparison,
    pub update_operation: StencilUpdateOperation,
    pub reference: u32,
    /// Applied to both the reference and the stored value before comparing.
    pub mask: u32,
    /// Update the stencil buffer only, leaving colors untouched.
    pub only: bool,
}

impl StencilMode {
    pub const DISABLED: StencilMode = StencilMode {
        comparison: StencilComparison::Always,
        update_operation: StencilUpdateOperation::Keep,
        reference: 0,
        mask: !0,
        only: false,
    };

    pub const fn new(
        comparison: StencilComparison,
        update_operation: StencilUpdateOperation,
        reference: u32,
    ) -> Self {
        Self {
            comparison,
            update_operation,
            reference,
            mask: !0,
            only: false,
        }
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    pub fn stencil_only(mut self) -> Self {
        self.only = true;
        self
    }

    /// Whether this mode leaves the stencil test off.
    pub fn is_disabled(&self) -> bool {
        *self == Self::DISABLED
    }

    #[cfg(feature = "wgpu")]
    pub fn to_stencil_state(&self) -> wgpu::StencilState {
        let operation = self.update_operation.to_wgpu();
        let face = wgpu::StencilFaceState {
            compare: self.comparison.to_wgpu(),
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: operation,
            pass_op: operation,
        };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: self.mask,
            write_mask: !0,
        }
    }
}

impl Default for StencilMode {
    fn default() -> Self {
        Self::DISABLED
    }
}

#[cfg(feature = "wgpu")]
impl StencilComparison {
    pub fn to_wgpu(self) -> wgpu::CompareFunction {
        match self {
            StencilComparison::Never => wgpu::CompareFunction::Never,
            StencilComparison::Less => wgpu::CompareFunction::Less,
            StencilComparison::LessEqual => wgpu::CompareFunction::LessEqual,
            StencilComparison::Greater => wgpu::CompareFunction::Greater,
            StencilComparison::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            StencilComparison::Equal => wgpu::CompareFunction::Equal,
            StencilComparison::NotEqual => wgpu::CompareFunction::NotEqual,
            StencilComparison::Always => wgpu::CompareFunction::Always,
        }
    }
}

#[cfg(feature = "wgpu")]
impl StencilUpdateOperation {
    pub fn to_wgpu(self) -> wgpu::StencilOperation {
        match self {
            StencilUpdateOperation::Keep => wgpu::StencilOperation::Keep,
            StencilUpdateOperation::Zero => wgpu::StencilOperation::Zero,
            StencilUpdateOperation::Replace => wgpu::StencilOperation::Replace,
            StencilUpdateOperation::Increment => wgpu::StencilOperation::IncrementClamp,
            StencilUpdateOperation::Decrement => wgpu::StencilOperation::DecrementClamp,
            StencilUpdateOperation::Invert => wgpu::StencilOperation::Invert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_disabled() {
        assert!(StencilMode::default().is_disabled());
        assert!(!StencilMode::DISABLED.stencil_only().is_disabled());
        assert!(!StencilMode::DISABLED.with_mask(0xff).is_disabled());
    }

    #[test]
    fn test_reference_participates_in_equality() {
        let a = StencilMode::new(StencilComparison::Equal, StencilUpdateOperation::Keep, 1);
        let b = StencilMode::new(StencilComparison::Equal, StencilUpdateOperation::Keep, 2);
        assert_ne!(a, b);
    }
}
