//! Objects that know how to draw themselves.

use glam::Vec2;

use crate::{GeometryBuffer, PrimitiveType, RenderStates, Transform, Vertex};

/// A sink for vertex submissions.
///
/// Implemented by [`RenderTarget`](crate::RenderTarget), which draws
/// immediately, and by the batcher's staging adapter, which defers.
pub trait DrawTarget {
    fn draw_vertices(&mut self, vertices: &[Vertex], primitive: PrimitiveType, states: &RenderStates);
}

/// Something that can submit its geometry to a [`DrawTarget`].
///
/// Implementations typically combine their own [`Transformable`] transform
/// into `states` and submit one or more vertex runs:
///
/// ```
/// use glam::Vec2;
/// use tessera_render::{
///     DrawTarget, Drawable, PrimitiveType, RenderStates, Transformable, Vertex,
/// };
///
/// struct Marker {
///     transformable: Transformable,
/// }
///
/// impl Drawable for Marker {
///     fn draw(&self, target: &mut dyn DrawTarget, states: &RenderStates) {
///         let states = states.with_local_transform(&self.transformable.transform());
///         let point = [Vertex::with_position(Vec2::ZERO)];
///         target.draw_vertices(&point, PrimitiveType::Points, &states);
///     }
/// }
/// ```
pub trait Drawable {
    fn draw(&self, target: &mut dyn DrawTarget, states: &RenderStates);
}

impl Drawable for GeometryBuffer {
    fn draw(&self, target: &mut dyn DrawTarget, states: &RenderStates) {
        target.draw_vertices(self.vertices(), self.primitive_type(), states);
    }
}

impl<T: Drawable + ?Sized> Drawable for &T {
    fn draw(&self, target: &mut dyn DrawTarget, states: &RenderStates) {
        (**self).draw(target, states);
    }
}

/// Position, rotation, scale and origin of a drawable object.
///
/// The origin is the local point that `position` refers to and that
/// rotation and scaling happen around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transformable {
    position: Vec2,
    rotation: f32,
    scale: Vec2,
    origin: Vec2,
}

impl Transformable {
    pub const fn new() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            origin: Vec2::ZERO,
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Rotation in degrees, normalized to `[0, 360)`.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees.rem_euclid(360.0);
    }

    pub fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
    }

    pub fn set_origin(&mut self, origin: Vec2) {
        self.origin = origin;
    }

    pub fn move_by(&mut self, offset: Vec2) {
        self.position += offset;
    }

    pub fn rotate(&mut self, degrees: f32) {
        self.set_rotation(self.rotation + degrees);
    }

    /// Local-to-parent transform: origin shift, scale, rotation, translation.
    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position)
            .rotate(self.rotation)
            .scale(self.scale)
            .translate(-self.origin)
    }

    pub fn inverse_transform(&self) -> Transform {
        self.transform().inverse()
    }
}

impl Default for Transformable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        runs: Vec<(usize, PrimitiveType, RenderStates)>,
    }

    impl DrawTarget for Recorder {
        fn draw_vertices(&mut self, vertices: &[Vertex], primitive: PrimitiveType, states: &RenderStates) {
            self.runs.push((vertices.len(), primitive, *states));
        }
    }

    #[test]
    fn test_geometry_buffer_submits_itself() {
        let mut buffer = GeometryBuffer::new(PrimitiveType::LineStrip);
        buffer.resize(3);

        let mut recorder = Recorder::default();
        buffer.draw(&mut recorder, &RenderStates::DEFAULT);
        assert_eq!(recorder.runs, vec![(3, PrimitiveType::LineStrip, RenderStates::DEFAULT)]);
    }

    #[test]
    fn test_transformable_applies_origin_first() {
        let mut t = Transformable::new();
        t.set_origin(Vec2::new(5.0, 5.0));
        t.set_position(Vec2::new(100.0, 100.0));
        t.set_scale(Vec2::splat(2.0));

        // The origin lands on the position.
        assert_eq!(t.transform().transform_point(Vec2::new(5.0, 5.0)), Vec2::new(100.0, 100.0));
        assert_eq!(t.transform().transform_point(Vec2::new(6.0, 5.0)), Vec2::new(102.0, 100.0));
    }

    #[test]
    fn test_transformable_rotation_wraps() {
        let mut t = Transformable::new();
        t.rotate(350.0);
        t.rotate(20.0);
        assert!((t.rotation() - 10.0).abs() < 1e-4);
    }
}
