//! Primitive topologies and their conversion to list form.
//!
//! Strips, fans and quads cannot be concatenated into one draw call without
//! connecting unrelated geometry, so both the batcher and the GPU backend
//! rewrite them as independent points, lines or triangles first.

use crate::{Transform, Vertex};

/// How a sequence of vertices is assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum PrimitiveType {
    #[default]
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    /// Independent quads of four vertices each. Legacy; prefer `Triangles`.
    Quads,
}

/// The independent-list family a primitive type reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveClass {
    Points,
    Lines,
    Triangles,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 7] = [
        PrimitiveType::Points,
        PrimitiveType::Lines,
        PrimitiveType::LineStrip,
        PrimitiveType::Triangles,
        PrimitiveType::TriangleStrip,
        PrimitiveType::TriangleFan,
        PrimitiveType::Quads,
    ];

    /// Dense index into lookup tables, in declaration order.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn class(self) -> PrimitiveClass {
        match self {
            PrimitiveType::Points => PrimitiveClass::Points,
            PrimitiveType::Lines | PrimitiveType::LineStrip => PrimitiveClass::Lines,
            PrimitiveType::Triangles
            | PrimitiveType::TriangleStrip
            | PrimitiveType::TriangleFan
            | PrimitiveType::Quads => PrimitiveClass::Triangles,
        }
    }

    /// Whether vertices are shared between consecutive primitives.
    pub const fn is_connected(self) -> bool {
        matches!(
            self,
            PrimitiveType::LineStrip | PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan
        )
    }
}

impl PrimitiveClass {
    pub const ALL: [PrimitiveClass; 3] = [
        PrimitiveClass::Points,
        PrimitiveClass::Lines,
        PrimitiveClass::Triangles,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// The list primitive type for this class.
    pub const fn list_type(self) -> PrimitiveType {
        match self {
            PrimitiveClass::Points => PrimitiveType::Points,
            PrimitiveClass::Lines => PrimitiveType::Lines,
            PrimitiveClass::Triangles => PrimitiveType::Triangles,
        }
    }
}

/// Append `vertices`, interpreted as `primitive`, to `out` as an independent
/// list of the primitive's class. Every emitted position is mapped through
/// `transform`. Trailing vertices that do not form a whole primitive are
/// dropped.
pub fn append_as_list(
    primitive: PrimitiveType,
    vertices: &[Vertex],
    transform: &Transform,
    out: &mut Vec<Vertex>,
) -> PrimitiveClass {
    let identity = transform.is_identity();
    let mut push = |index: usize| {
        let v = &vertices[index];
        out.push(if identity { *v } else { v.transformed(transform) });
    };
    let n = vertices.len();

    match primitive {
        PrimitiveType::Points => (0..n).for_each(&mut push),
        PrimitiveType::Lines => (0..n - n % 2).for_each(&mut push),
        PrimitiveType::Triangles => (0..n - n % 3).for_each(&mut push),
        PrimitiveType::LineStrip => {
            for i in 1..n {
                push(i - 1);
                push(i);
            }
        }
        PrimitiveType::TriangleStrip => {
            for i in 2..n {
                push(i - 2);
                push(i - 1);
                push(i);
            }
        }
        PrimitiveType::TriangleFan => {
            for i in 2..n {
                push(0);
                push(i - 1);
                push(i);
            }
        }
        PrimitiveType::Quads => {
            for quad in 0..n / 4 {
                let base = quad * 4;
                for offset in [0, 1, 2, 0, 2, 3] {
                    push(base + offset);
                }
            }
        }
    }

    primitive.class()
}
