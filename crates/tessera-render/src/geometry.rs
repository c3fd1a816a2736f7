use std::ops::{Index, IndexMut};

use tessera_core::geometry::Rect;

use crate::{PrimitiveType, Vertex};

/// An ordered vertex sequence with a fixed primitive type.
///
/// The primitive type is chosen at construction and never changes. Clearing
/// keeps the allocation, so a buffer can be refilled every frame without
/// reallocating.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryBuffer {
    primitive_type: PrimitiveType,
    vertices: Vec<Vertex>,
}

impl GeometryBuffer {
    pub fn new(primitive_type: PrimitiveType) -> Self {
        Self {
            primitive_type,
            vertices: Vec::new(),
        }
    }

    pub fn with_capacity(primitive_type: PrimitiveType, capacity: usize) -> Self {
        Self {
            primitive_type,
            vertices: Vec::with_capacity(capacity),
        }
    }

    pub fn from_vertices(primitive_type: PrimitiveType, vertices: Vec<Vertex>) -> Self {
        Self {
            primitive_type,
            vertices,
        }
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    pub fn push(&mut self, vertex: Vertex) {
        self.vertices.push(vertex);
    }

    pub fn extend_from_slice(&mut self, vertices: &[Vertex]) {
        self.vertices.extend_from_slice(vertices);
    }

    /// Remove all vertices, retaining capacity.
    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// Resize to `len` vertices, filling new slots with [`Vertex::default`].
    pub fn resize(&mut self, len: usize) {
        self.vertices.resize(len, Vertex::default());
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.vertices.capacity()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vertex> {
        self.vertices.iter()
    }

    pub fn vertices_mut(&mut self) -> &mut [Vertex] {
        &mut self.vertices
    }

    pub fn get(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Vertex> {
        self.vertices.get_mut(index)
    }

    /// Axis-aligned bounding box of all vertex positions. Empty buffers have
    /// empty bounds at the origin.
    pub fn bounds(&self) -> Rect<f32> {
        let Some(first) = self.vertices.first() else {
            return Rect::default();
        };

        let (min, max) = self.vertices[1..]
            .iter()
            .fold((first.position, first.position), |(min, max), v| {
                (min.min(v.position), max.max(v.position))
            });

        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }
}

impl Index<usize> for GeometryBuffer {
    type Output = Vertex;

    fn index(&self, index: usize) -> &Vertex {
        &self.vertices[index]
    }
}

impl IndexMut<usize> for GeometryBuffer {
    fn index_mut(&mut self, index: usize) -> &mut Vertex {
        &mut self.vertices[index]
    }
}

impl<'a> IntoIterator for &'a GeometryBuffer {
    type Item = &'a Vertex;
    type IntoIter = std::slice::Iter<'a, Vertex>;

    fn into_iter(self) -> Self::IntoIter {
        self.vertices.iter()
    }
}

impl Extend<Vertex> for GeometryBuffer {
    fn extend<I: IntoIterator<Item = Vertex>>(&mut self, iter: I) {
        self.vertices.extend(iter);
    }
}
