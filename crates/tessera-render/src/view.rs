//! 2D camera describing which part of the world is visible.

use glam::Vec2;
use tessera_core::geometry::Rect;

use crate::Transform;

/// A 2D camera: a rotated world-space rectangle mapped onto a viewport.
///
/// `viewport` and `scissor` are normalized `[0, 1]` fractions of the render
/// target. The projection transform is recomputed whenever a parameter
/// changes, together with its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    center: Vec2,
    size: Vec2,
    rotation: f32,
    viewport: Rect<f32>,
    scissor: Rect<f32>,
    transform: Transform,
    inverse_transform: Transform,
}

impl View {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        let mut view = Self {
            center,
            size,
            rotation: 0.0,
            viewport: Rect::UNIT,
            scissor: Rect::UNIT,
            transform: Transform::IDENTITY,
            inverse_transform: Transform::IDENTITY,
        };
        view.update();
        view
    }

    /// A view showing exactly `rect` in world space.
    pub fn from_rect(rect: Rect<f32>) -> Self {
        Self::new(
            Vec2::new(rect.x + rect.width / 2.0, rect.y + rect.height / 2.0),
            Vec2::new(rect.width, rect.height),
        )
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// Rotation in degrees, normalized to `[0, 360)`.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn viewport(&self) -> Rect<f32> {
        self.viewport
    }

    pub fn scissor(&self) -> Rect<f32> {
        self.scissor
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
        self.update();
    }

    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
        self.update();
    }

    pub fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees.rem_euclid(360.0);
        self.update();
    }

    pub fn set_viewport(&mut self, viewport: Rect<f32>) {
        self.viewport = viewport;
    }

    pub fn set_scissor(&mut self, scissor: Rect<f32>) {
        self.scissor = scissor;
    }

    /// Whether the scissor covers the whole target, i.e. clipping is off.
    pub fn has_full_scissor(&self) -> bool {
        self.scissor == Rect::UNIT
    }

    /// Reset to show exactly `rect`, keeping the viewport and scissor.
    pub fn reset(&mut self, rect: Rect<f32>) {
        self.center = Vec2::new(rect.x + rect.width / 2.0, rect.y + rect.height / 2.0);
        self.size = Vec2::new(rect.width, rect.height);
        self.rotation = 0.0;
        self.update();
    }

    pub fn move_by(&mut self, offset: Vec2) {
        self.set_center(self.center + offset);
    }

    pub fn rotate(&mut self, degrees: f32) {
        self.set_rotation(self.rotation + degrees);
    }

    /// Multiply the visible size by `factor`; values above 1 zoom out.
    pub fn zoom(&mut self, factor: f32) {
        self.set_size(self.size * factor);
    }

    /// World to normalized device coordinates (y up, `[-1, 1]`).
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn inverse_transform(&self) -> &Transform {
        &self.inverse_transform
    }

    fn update(&mut self) {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let Vec2 { x: cx, y: cy } = self.center;

        // Rotate around the center, then scale into [-1, 1] with y flipped.
        let tx = -cx * cos - cy * sin + cx;
        let ty = cx * sin - cy * cos + cy;
        let a = 2.0 / self.size.x;
        let b = -2.0 / self.size.y;
        let c = -a * cx;
        let d = -b * cy;

        self.transform = Transform::from_rows(
            a * cos,
            a * sin,
            a * tx + c,
            -b * sin,
            b * cos,
            b * ty + d,
            0.0,
            0.0,
            1.0,
        );
        self.inverse_transform = self.transform.inverse();
    }
}

impl Default for View {
    fn default() -> Self {
        Self::from_rect(Rect::new(0.0, 0.0, 1000.0, 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rect_maps_corners_to_ndc() {
        let view = View::from_rect(Rect::new(0.0, 0.0, 800.0, 600.0));
        let t = view.transform();
        let cases = [
            (Vec2::new(0.0, 0.0), Vec2::new(-1.0, 1.0)),
            (Vec2::new(800.0, 600.0), Vec2::new(1.0, -1.0)),
            (Vec2::new(400.0, 300.0), Vec2::ZERO),
        ];
        for (world, ndc) in cases {
            assert!((t.transform_point(world) - ndc).length() < 1e-5);
        }
    }

    #[test]
    fn test_rotation_is_normalized() {
        let mut view = View::default();
        view.set_rotation(-90.0);
        assert_eq!(view.rotation(), 270.0);
        view.rotate(180.0);
        assert_eq!(view.rotation(), 90.0);
    }

    #[test]
    fn test_rotated_view_keeps_center_fixed() {
        let mut view = View::new(Vec2::new(100.0, 50.0), Vec2::new(200.0, 100.0));
        view.set_rotation(30.0);
        let ndc = view.transform().transform_point(Vec2::new(100.0, 50.0));
        assert!(ndc.length() < 1e-5);
    }

    #[test]
    fn test_inverse_is_recomputed() {
        let mut view = View::default();
        view.move_by(Vec2::new(10.0, 20.0));
        view.zoom(2.0);
        let world = Vec2::new(123.0, 456.0);
        let back = view
            .inverse_transform()
            .transform_point(view.transform().transform_point(world));
        assert!((back - world).length() < 1e-3);
    }

    #[test]
    fn test_viewport_and_scissor_default_to_full_target() {
        let view = View::default();
        assert_eq!(view.viewport(), Rect::UNIT);
        assert!(view.has_full_scissor());
    }
}
