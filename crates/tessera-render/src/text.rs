//! Text laid out from glyphs in a texture atlas.
//!
//! Rasterizing fonts is not this crate's business; a [`GlyphSource`]
//! supplies glyph metrics and the atlas texture, and [`Text`] turns a string
//! into one triangle list that draws with a single texture bind.

use std::sync::Arc;

use glam::Vec2;
use tessera_core::geometry::Rect;

use crate::{
    Color, DrawTarget, Drawable, GeometryBuffer, PrimitiveType, RenderStates, TextureHandle,
    Transformable, Vertex,
};

/// Metrics and atlas location of one glyph.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Glyph {
    /// Horizontal pen advance after this glyph.
    pub advance: f32,
    /// Quad relative to the pen position on the baseline (y grows down).
    pub bounds: Rect<f32>,
    /// Glyph location in the atlas, in pixels.
    pub texture_rect: Rect<f32>,
}

/// Provides glyphs for a font at a given character size.
pub trait GlyphSource: Send + Sync {
    /// `None` for characters the font cannot render; they are skipped.
    fn glyph(&self, character: char, character_size: u32) -> Option<Glyph>;

    /// Distance between two consecutive baselines.
    fn line_spacing(&self, character_size: u32) -> f32;

    /// The atlas texture holding the glyphs for `character_size`.
    fn texture(&self, character_size: u32) -> TextureHandle;

    fn kerning(&self, _first: char, _second: char, _character_size: u32) -> f32 {
        0.0
    }
}

/// A drawable string.
pub struct Text {
    source: Arc<dyn GlyphSource>,
    string: String,
    character_size: u32,
    color: Color,
    geometry: GeometryBuffer,
    texture: TextureHandle,
    transformable: Transformable,
}

impl Text {
    pub fn new(source: Arc<dyn GlyphSource>, string: impl Into<String>, character_size: u32) -> Self {
        let texture = source.texture(character_size);
        let mut text = Self {
            source,
            string: string.into(),
            character_size,
            color: Color::WHITE,
            geometry: GeometryBuffer::new(PrimitiveType::Triangles),
            texture,
            transformable: Transformable::new(),
        };
        text.layout();
        text
    }

    pub fn string(&self) -> &str {
        &self.string
    }

    pub fn set_string(&mut self, string: impl Into<String>) {
        self.string = string.into();
        self.layout();
    }

    pub fn character_size(&self) -> u32 {
        self.character_size
    }

    pub fn set_character_size(&mut self, size: u32) {
        self.character_size = size;
        self.layout();
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        for vertex in self.geometry.vertices_mut() {
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

    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    pub fn local_bounds(&self) -> Rect<f32> {
        self.geometry.bounds()
    }

    /// Rebuild the glyph quads. Call after the source's atlas changed.
    pub fn layout(&mut self) {
        self.texture = self.source.texture(self.character_size);
        self.geometry.clear();

        let size = self.character_size;
        let line_spacing = self.source.line_spacing(size);
        let mut pen = Vec2::new(0.0, size as f32);
        let mut previous: Option<char> = None;

        let string = std::mem::take(&mut self.string);
        for character in string.chars() {
            if let Some(prev) = previous {
                pen.x += self.source.kerning(prev, character, size);
            }
            previous = Some(character);

            match character {
                '\n' => {
                    pen.x = 0.0;
                    pen.y += line_spacing;
                    continue;
                }
                '\r' => continue,
                _ => {}
            }

            let Some(glyph) = self.source.glyph(character, size) else {
                tracing::trace!(?character, size, "Glyph missing from source");
                continue;
            };

            if glyph.bounds.width > 0.0 && glyph.bounds.height > 0.0 {
                self.push_glyph(pen, &glyph);
            }
            pen.x += glyph.advance;
        }
        self.string = string;
    }

    fn push_glyph(&mut self, pen: Vec2, glyph: &Glyph) {
        let left = pen.x + glyph.bounds.x;
        let top = pen.y + glyph.bounds.y;
        let right = left + glyph.bounds.width;
        let bottom = top + glyph.bounds.height;
        let (uv_min, uv_max) = self.texture.normalize(glyph.texture_rect);

        let top_left = Vertex::new(Vec2::new(left, top), self.color, uv_min);
        let top_right = Vertex::new(Vec2::new(right, top), self.color, Vec2::new(uv_max.x, uv_min.y));
        let bottom_left =
            Vertex::new(Vec2::new(left, bottom), self.color, Vec2::new(uv_min.x, uv_max.y));
        let bottom_right = Vertex::new(Vec2::new(right, bottom), self.color, uv_max);

        self.geometry.extend([
            top_left,
            top_right,
            bottom_left,
            bottom_left,
            top_right,
            bottom_right,
        ]);
    }
}

impl Drawable for Text {
    fn draw(&self, target: &mut dyn DrawTarget, states: &RenderStates) {
        let states = states
            .with_local_transform(&self.transformable.transform())
            .with_texture(self.texture);
        self.geometry.draw(target, &states);
    }
}

impl std::fmt::Debug for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Text")
            .field("string", &self.string)
            .field("character_size", &self.character_size)
            .field("color", &self.color)
            .field("vertices", &self.geometry.len())
            .finish()
    }
}
