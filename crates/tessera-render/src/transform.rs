//! 2D affine transforms stored as 3x3 matrices.
//!
//! Points are column vectors, so `a.combine(&b)` applied to `p` is `a(b(p))`:
//! `b` acts first. Builder methods (`translate`, `rotate`, `scale`) append
//! on the right, which means the most recently added operation is the
//! first one applied to a point.

use std::ops::{Mul, MulAssign};

use glam::{Mat3, Vec2, Vec3};
use tessera_core::geometry::Rect;

/// A 2D transform with an affine 3x3 matrix.
///
/// Equality is bitwise on the matrix components; the state cache relies on
/// this to detect redundant transform uploads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Mat3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        matrix: Mat3::IDENTITY,
    };

    /// Build a transform from its nine components in row-major order.
    #[allow(clippy::too_many_arguments)]
    pub const fn from_rows(
        a00: f32,
        a01: f32,
        a02: f32,
        a10: f32,
        a11: f32,
        a12: f32,
        a20: f32,
        a21: f32,
        a22: f32,
    ) -> Self {
        Self {
            matrix: Mat3::from_cols(
                Vec3::new(a00, a10, a20),
                Vec3::new(a01, a11, a21),
                Vec3::new(a02, a12, a22),
            ),
        }
    }

    pub const fn from_matrix(matrix: Mat3) -> Self {
        Self { matrix }
    }

    pub fn from_translation(offset: Vec2) -> Self {
        Self::from_matrix(Mat3::from_translation(offset))
    }

    /// Rotation in degrees. Positive angles are clockwise on a y-down screen.
    pub fn from_rotation(degrees: f32) -> Self {
        Self::from_matrix(Mat3::from_angle(degrees.to_radians()))
    }

    pub fn from_scale(factors: Vec2) -> Self {
        Self::from_matrix(Mat3::from_scale(factors))
    }

    pub fn matrix(&self) -> &Mat3 {
        &self.matrix
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == Mat3::IDENTITY
    }

    /// `self * other`: the result applies `other` first, then `self`.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            matrix: self.matrix * other.matrix,
        }
    }

    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.matrix.transform_point2(point)
    }

    /// Axis-aligned bounds of `rect` after transformation.
    pub fn transform_rect(&self, rect: Rect<f32>) -> Rect<f32> {
        let corners = [
            self.transform_point(Vec2::new(rect.x, rect.y)),
            self.transform_point(Vec2::new(rect.x, rect.y + rect.height)),
            self.transform_point(Vec2::new(rect.x + rect.width, rect.y)),
            self.transform_point(Vec2::new(rect.x + rect.width, rect.y + rect.height)),
        ];

        let mut min = corners[0];
        let mut max = corners[0];
        for corner in &corners[1..] {
            min = min.min(*corner);
            max = max.max(*corner);
        }

        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// The inverse transform, or [`Transform::IDENTITY`] when the matrix is
    /// singular (determinant exactly zero).
    pub fn inverse(&self) -> Transform {
        let det = self.matrix.determinant();
        if det != 0.0 {
            Transform {
                matrix: self.matrix.inverse(),
            }
        } else {
            Transform::IDENTITY
        }
    }

    pub fn translate(self, offset: Vec2) -> Self {
        self.combine(&Transform::from_translation(offset))
    }

    pub fn rotate(self, degrees: f32) -> Self {
        self.combine(&Transform::from_rotation(degrees))
    }

    /// Rotate around `center` instead of the origin.
    pub fn rotate_around(self, degrees: f32, center: Vec2) -> Self {
        self.translate(center).rotate(degrees).translate(-center)
    }

    pub fn scale(self, factors: Vec2) -> Self {
        self.combine(&Transform::from_scale(factors))
    }

    /// Scale relative to `center` instead of the origin.
    pub fn scale_around(self, factors: Vec2, center: Vec2) -> Self {
        self.translate(center).scale(factors).translate(-center)
    }

    /// Embed into a column-major 4x4 matrix (z passes through unchanged).
    pub fn to_cols_array_4x4(&self) -> [[f32; 4]; 4] {
        let m = &self.matrix;
        [
            [m.x_axis.x, m.x_axis.y, 0.0, m.x_axis.z],
            [m.y_axis.x, m.y_axis.y, 0.0, m.y_axis.z],
            [0.0, 0.0, 1.0, 0.0],
            [m.z_axis.x, m.z_axis.y, 0.0, m.z_axis.z],
        ]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.combine(&rhs)
    }
}

impl MulAssign for Transform {
    fn mul_assign(&mut self, rhs: Transform) {
        *self = self.combine(&rhs);
    }
}

impl Mul<Vec2> for Transform {
    type Output = Vec2;

    fn mul(self, rhs: Vec2) -> Vec2 {
        self.transform_point(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Vec2, b: Vec2) {
        let tolerance = 1e-4 * (1.0 + a.abs().max_element().max(b.abs().max_element()));
        assert!(
            (a - b).abs().max_element() <= tolerance,
            "{a:?} != {b:?} (tolerance {tolerance})"
        );
    }

    #[test]
    fn test_combine_applies_right_operand_first() {
        let translate = Transform::from_translation(Vec2::new(10.0, 0.0));
        let scale = Transform::from_scale(Vec2::splat(2.0));

        let p = Vec2::new(1.0, 1.0);
        assert_eq!(translate.combine(&scale).transform_point(p), Vec2::new(12.0, 2.0));
        assert_eq!(scale.combine(&translate).transform_point(p), Vec2::new(22.0, 2.0));
    }

    #[test]
    fn test_builder_matches_combine() {
        let built = Transform::IDENTITY
            .translate(Vec2::new(5.0, 7.0))
            .scale(Vec2::new(2.0, 3.0));
        let combined = Transform::from_translation(Vec2::new(5.0, 7.0))
            .combine(&Transform::from_scale(Vec2::new(2.0, 3.0)));
        assert_eq!(built, combined);
    }

    #[test]
    fn test_rotation_is_clockwise_on_screen() {
        let t = Transform::from_rotation(90.0);
        assert_close(t.transform_point(Vec2::X), Vec2::Y);
    }

    #[test]
    fn test_inverse_round_trip() {
        let transforms = [
            Transform::IDENTITY,
            Transform::from_translation(Vec2::new(-320.0, 17.5)),
            Transform::IDENTITY
                .translate(Vec2::new(100.0, 50.0))
                .rotate(33.0)
                .scale(Vec2::new(1.5, 0.25)),
            Transform::IDENTITY.rotate_around(-71.0, Vec2::new(400.0, 300.0)),
            Transform::IDENTITY.scale_around(Vec2::new(4.0, 0.5), Vec2::new(8.0, 8.0)),
        ];
        let points = [
            Vec2::ZERO,
            Vec2::new(1.0, -1.0),
            Vec2::new(640.0, 480.0),
            Vec2::new(-1000.0, 3.25),
        ];

        for t in &transforms {
            let inverse = t.inverse();
            for &p in &points {
                assert_close(inverse.transform_point(t.transform_point(p)), p);
            }
        }
    }

    #[test]
    fn test_singular_inverse_is_identity() {
        let flatten = Transform::from_scale(Vec2::new(0.0, 1.0));
        assert_eq!(flatten.inverse(), Transform::IDENTITY);
    }

    #[test]
    fn test_transform_rect_bounds_rotation() {
        let t = Transform::IDENTITY.rotate(90.0);
        let bounds = t.transform_rect(Rect::new(0.0, 0.0, 10.0, 20.0));
        assert!((bounds.x + 20.0).abs() < 1e-4);
        assert!(bounds.y.abs() < 1e-4);
        assert!((bounds.width - 20.0).abs() < 1e-4);
        assert!((bounds.height - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_4x4_embedding_keeps_translation() {
        let t = Transform::from_translation(Vec2::new(3.0, 4.0));
        let cols = t.to_cols_array_4x4();
        assert_eq!(cols[3], [3.0, 4.0, 0.0, 1.0]);
        assert_eq!(cols[2], [0.0, 0.0, 1.0, 0.0]);
    }
}
