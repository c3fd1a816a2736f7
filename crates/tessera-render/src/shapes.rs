//! Sprites and filled/outlined convex shapes.

use glam::Vec2;
use tessera_core::geometry::Rect;

use crate::{
    Color, DrawTarget, Drawable, PrimitiveType, RenderStates, TextureHandle, Transformable, Vertex,
};

/// A textured rectangle.
///
/// Its four vertices form a triangle strip, so a sprite is small enough to
/// take the pre-transformed vertex cache path on every draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    texture: TextureHandle,
    texture_rect: Rect<f32>,
    color: Color,
    vertices: [Vertex; 4],
    transformable: Transformable,
}

impl Sprite {
    /// A sprite showing the whole texture.
    pub fn new(texture: TextureHandle) -> Self {
        let size = texture.size();
        Self::with_rect(texture, Rect::new(0.0, 0.0, size.width as f32, size.height as f32))
    }

    /// A sprite showing `texture_rect` (in pixels) of the texture.
    pub fn with_rect(texture: TextureHandle, texture_rect: Rect<f32>) -> Self {
        let mut sprite = Self {
            texture,
            texture_rect,
            color: Color::WHITE,
            vertices: [Vertex::default(); 4],
            transformable: Transformable::new(),
        };
        sprite.update_vertices();
        sprite
    }

    pub fn texture(&self) -> &TextureHandle {
        &self.texture
    }

    /// Swap the texture, keeping the current texture rectangle.
    pub fn set_texture(&mut self, texture: TextureHandle) {
        self.texture = texture;
        self.update_vertices();
    }

    pub fn texture_rect(&self) -> Rect<f32> {
        self.texture_rect
    }

    pub fn set_texture_rect(&mut self, rect: Rect<f32>) {
        self.texture_rect = rect;
        self.update_vertices();
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        for vertex in &mut self.vertices {
            vertex.color = color;
        }
    }

    pub fn transformable(&self) -> &Transformable {
        &self.transformable
    }

    pub fn transformable_mut(&mut self) -> &mut Transformable {
        &mut self.transformable
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.transformable.set_position(position);
    }

    pub fn set_rotation(&mut self, degrees: f32) {
        self.transformable.set_rotation(degrees);
    }

    pub fn vertices(&self) -> &[Vertex; 4] {
        &self.vertices
    }

    /// Bounds in local coordinates, before the transform.
    pub fn local_bounds(&self) -> Rect<f32> {
        Rect::new(0.0, 0.0, self.texture_rect.width.abs(), self.texture_rect.height.abs())
    }

    pub fn global_bounds(&self) -> Rect<f32> {
        self.transformable.transform().transform_rect(self.local_bounds())
    }

    fn update_vertices(&mut self) {
        let bounds = self.local_bounds();
        let (uv_min, uv_max) = self.texture.normalize(self.texture_rect);

        let corners = [
            (Vec2::new(0.0, 0.0), Vec2::new(uv_min.x, uv_min.y)),
            (Vec2::new(0.0, bounds.height), Vec2::new(uv_min.x, uv_max.y)),
            (Vec2::new(bounds.width, 0.0), Vec2::new(uv_max.x, uv_min.y)),
            (Vec2::new(bounds.width, bounds.height), Vec2::new(uv_max.x, uv_max.y)),
        ];
        for (vertex, (position, tex_coords)) in self.vertices.iter_mut().zip(corners) {
            *vertex = Vertex::new(position, self.color, tex_coords);
        }
    }
}

impl Drawable for Sprite {
    fn draw(&self, target: &mut dyn DrawTarget, states: &RenderStates) {
        let states = states
            .with_local_transform(&self.transformable.transform())
            .with_texture(self.texture);
        target.draw_vertices(&self.vertices, PrimitiveType::TriangleStrip, &states);
    }
}

/// A convex polygon with an optional texture and outline.
///
/// The fill is a triangle fan around the centroid; the outline is a
/// triangle strip of `outline_thickness` extruded outward along the edge
/// normals (negative thickness extrudes inward).
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    points: Vec<Vec2>,
    fill_color: Color,
    outline_color: Color,
    outline_thickness: f32,
    texture: Option<TextureHandle>,
    texture_rect: Rect<f32>,
    fill: Vec<Vertex>,
    outline: Vec<Vertex>,
    transformable: Transformable,
}

impl Shape {
    /// A polygon through `points`, which must describe a convex outline.
    pub fn polygon(points: Vec<Vec2>) -> Self {
        let mut shape = Self {
            points,
            fill_color: Color::WHITE,
            outline_color: Color::WHITE,
            outline_thickness: 0.0,
            texture: None,
            texture_rect: Rect::default(),
            fill: Vec::new(),
            outline: Vec::new(),
            transformable: Transformable::new(),
        };
        shape.update();
        shape
    }

    pub fn rectangle(size: Vec2) -> Self {
        Self::polygon(vec![
            Vec2::ZERO,
            Vec2::new(size.x, 0.0),
            size,
            Vec2::new(0.0, size.y),
        ])
    }

    /// A regular polygon approximating a circle, bounded by the square
    /// `[0, 2 * radius]`.
    pub fn circle(radius: f32, point_count: usize) -> Self {
        let points = (0..point_count)
            .map(|i| {
                let angle = i as f32 / point_count as f32 * std::f32::consts::TAU
                    - std::f32::consts::FRAC_PI_2;
                Vec2::new(radius + angle.cos() * radius, radius + angle.sin() * radius)
            })
            .collect();
        Self::polygon(points)
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn set_points(&mut self, points: Vec<Vec2>) {
        self.points = points;
        self.update();
    }

    pub fn fill_color(&self) -> Color {
        self.fill_color
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.fill_color = color;
        for vertex in &mut self.fill {
            vertex.color = color;
        }
    }

    pub fn outline_color(&self) -> Color {
        self.outline_color
    }

    pub fn set_outline_color(&mut self, color: Color) {
        self.outline_color = color;
        for vertex in &mut self.outline {
            vertex.color = color;
        }
    }

    pub fn outline_thickness(&self) -> f32 {
        self.outline_thickness
    }

    pub fn set_outline_thickness(&mut self, thickness: f32) {
        self.outline_thickness = thickness;
        self.update_outline();
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        self.texture.as_ref()
    }

    /// Texture the fill, mapping `texture_rect` (pixels) onto the shape's
    /// bounding box.
    pub fn set_texture(&mut self, texture: TextureHandle, texture_rect: Rect<f32>) {
        self.texture = Some(texture);
        self.texture_rect = texture_rect;
        self.update_tex_coords();
    }

    pub fn clear_texture(&mut self) {
        self.texture = None;
        self.update_tex_coords();
    }

    pub fn transformable(&self) -> &Transformable {
        &self.transformable
    }

    pub fn transformable_mut(&mut self) -> &mut Transformable {
        &mut self.transformable
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.transformable.set_position(position);
    }

    /// Fill vertices (triangle fan). Empty for degenerate shapes.
    pub fn fill_vertices(&self) -> &[Vertex] {
        &self.fill
    }

    /// Outline vertices (triangle strip). Empty without an outline.
    pub fn outline_vertices(&self) -> &[Vertex] {
        &self.outline
    }

    /// Bounds of the points in local coordinates.
    pub fn local_bounds(&self) -> Rect<f32> {
        let Some(&first) = self.points.first() else {
            return Rect::default();
        };
        let (min, max) = self
            .points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    fn update(&mut self) {
        self.fill.clear();
        if self.points.len() < 3 {
            self.outline.clear();
            return;
        }

        let centroid = self.points.iter().copied().sum::<Vec2>() / self.points.len() as f32;
        self.fill.push(Vertex::colored(centroid, self.fill_color));
        for &point in &self.points {
            self.fill.push(Vertex::colored(point, self.fill_color));
        }
        self.fill.push(Vertex::colored(self.points[0], self.fill_color));

        self.update_tex_coords();
        self.update_outline();
    }

    fn update_tex_coords(&mut self) {
        let bounds = self.local_bounds();
        let (uv_min, uv_max) = match &self.texture {
            Some(texture) => texture.normalize(self.texture_rect),
            None => (Vec2::ZERO, Vec2::ZERO),
        };
        let extent = Vec2::new(bounds.width.max(f32::EPSILON), bounds.height.max(f32::EPSILON));

        for vertex in &mut self.fill {
            let ratio = (vertex.position - Vec2::new(bounds.x, bounds.y)) / extent;
            vertex.tex_coords = uv_min + (uv_max - uv_min) * ratio;
        }
    }

    fn update_outline(&mut self) {
        self.outline.clear();
        let count = self.points.len();
        if self.outline_thickness == 0.0 || count < 3 {
            return;
        }

        let centroid = self.fill[0].position;
        let outward = |normal: Vec2, point: Vec2| {
            if normal.dot(point - centroid) < 0.0 {
                -normal
            } else {
                normal
            }
        };

        for i in 0..=count {
            let index = i % count;
            let prev = self.points[(index + count - 1) % count];
            let point = self.points[index];
            let next = self.points[(index + 1) % count];

            let n1 = outward(edge_normal(prev, point), point);
            let n2 = outward(edge_normal(point, next), point);

            // Miter: offset along the bisector so both edges move by the thickness.
            let factor = 1.0 + n1.dot(n2);
            let normal = if factor.abs() > f32::EPSILON {
                (n1 + n2) / factor
            } else {
                n1
            };

            self.outline.push(Vertex::colored(point, self.outline_color));
            self.outline.push(Vertex::colored(
                point + normal * self.outline_thickness,
                self.outline_color,
            ));
        }
    }
}

fn edge_normal(from: Vec2, to: Vec2) -> Vec2 {
    Vec2::new(from.y - to.y, to.x - from.x).normalize_or_zero()
}

impl Drawable for Shape {
    fn draw(&self, target: &mut dyn DrawTarget, states: &RenderStates) {
        let mut states = states.with_local_transform(&self.transformable.transform());
        states.texture = self.texture;
        target.draw_vertices(&self.fill, PrimitiveType::TriangleFan, &states);

        if !self.outline.is_empty() {
            states.texture = None;
            target.draw_vertices(&self.outline, PrimitiveType::TriangleStrip, &states);
        }
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::geometry::Size;

    use super::*;

    #[test]
    fn test_sprite_uses_pixel_rect_for_uvs() {
        let texture = TextureHandle::new(0, Size::new(64, 64));
        let sprite = Sprite::with_rect(texture, Rect::new(32.0, 0.0, 32.0, 16.0));
        let v = sprite.vertices();
        assert_eq!(v[0].tex_coords, Vec2::new(0.5, 0.0));
        assert_eq!(v[3].tex_coords, Vec2::new(1.0, 0.25));
        assert_eq!(v[3].position, Vec2::new(32.0, 16.0));
    }

    #[test]
    fn test_sprite_color_reaches_vertices() {
        let mut sprite = Sprite::new(TextureHandle::new(0, Size::new(8, 8)));
        sprite.set_color(Color::RED);
        assert!(sprite.vertices().iter().all(|v| v.color == Color::RED));
    }

    #[test]
    fn test_rectangle_fill_closes_fan() {
        let shape = Shape::rectangle(Vec2::new(10.0, 20.0));
        let fill = shape.fill_vertices();
        assert_eq!(fill.len(), 6);
        assert_eq!(fill[0].position, Vec2::new(5.0, 10.0));
        assert_eq!(fill[5].position, fill[1].position);
        assert!(shape.outline_vertices().is_empty());
    }

    #[test]
    fn test_outline_extrudes_outward() {
        let mut shape = Shape::rectangle(Vec2::new(10.0, 10.0));
        shape.set_outline_thickness(2.0);
        let outline = shape.outline_vertices();
        assert_eq!(outline.len(), 10);

        // Top-left corner moves diagonally away from the center.
        assert_eq!(outline[0].position, Vec2::ZERO);
        let corner = outline[1].position;
        assert!((corner - Vec2::new(-2.0, -2.0)).length() < 1e-4, "{corner:?}");
    }

    #[test]
    fn test_degenerate_polygon_draws_nothing() {
        let mut shape = Shape::polygon(vec![Vec2::ZERO, Vec2::ONE]);
        shape.set_outline_thickness(1.0);
        assert!(shape.fill_vertices().is_empty());
        assert!(shape.outline_vertices().is_empty());
    }

    #[test]
    fn test_textured_fill_maps_bounds_to_rect() {
        let mut shape = Shape::rectangle(Vec2::new(10.0, 10.0));
        shape.set_texture(TextureHandle::new(0, Size::new(100, 100)), Rect::new(0.0, 0.0, 50.0, 100.0));
        let fill = shape.fill_vertices();
        assert_eq!(fill[0].tex_coords, Vec2::new(0.25, 0.5));
        assert_eq!(fill[3].tex_coords, Vec2::new(0.5, 1.0));
    }

    #[test]
    fn test_circle_bounds() {
        let shape = Shape::circle(5.0, 32);
        let bounds = shape.local_bounds();
        assert!((bounds.width - 10.0).abs() < 1e-3);
        assert!(bounds.x.abs() < 1e-3);
    }
}
