/// Fast mathematical operations using SIMD-accelerated `glam` types.
///
/// This module re-exports all types and functions from the [`glam`] crate.
/// Tessera uses [`Vec2`] for positions and texture coordinates and [`Mat3`]
/// for 2D affine transforms.
///
/// ```
/// use tessera_core::math::{Mat3, Vec2};
///
/// let translate = Mat3::from_translation(Vec2::new(10.0, 20.0));
/// assert_eq!(translate.transform_point2(Vec2::ZERO), Vec2::new(10.0, 20.0));
/// ```
///
/// [`glam`]: https://docs.rs/glam
pub mod fast {
    pub use glam::*;
}

pub use fast::*;
