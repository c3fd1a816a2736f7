//! Deferred batching of many small draws into few large ones.
//!
//! The [`Batcher`] stages geometry instead of drawing it. Each submission is
//! converted to an independent point, line or triangle list with its
//! transform already applied, so entries that share texture, blend mode,
//! stencil mode, shader and primitive class can be concatenated. [`Batcher::flush`] orders
//! the entries by the active [`BatchMode`], merges adjacent compatible runs
//! and issues one draw per run.

mod types;

pub use types::*;

use tessera_core::profiling::{profile_function, profile_scope};

use crate::driver::RenderDriver;
use crate::primitive::{self, PrimitiveClass};
use crate::{
    DrawTarget, Drawable, GeometryBuffer, PrimitiveType, RenderConfig, RenderStates, RenderTarget,
    Vertex,
};

/// Collects draws and submits them in merged runs.
///
/// All buffers keep their capacity across flushes, so a batcher reused
/// every frame stops allocating once it has seen its largest frame.
///
/// ```
/// use tessera_core::geometry::Size;
/// use tessera_render::{
///     mock::MockDriver, BatchMode, Batcher, RenderStates, RenderTarget, Shape,
/// };
///
/// let mut target = RenderTarget::new(MockDriver::new(Size::new(800, 600)));
/// let mut batcher = Batcher::new(BatchMode::Deferred);
///
/// for i in 0..10 {
///     let mut square = Shape::rectangle(glam::Vec2::splat(8.0));
///     square.set_position(glam::Vec2::new(i as f32 * 10.0, 0.0));
///     batcher.batch(&square, 0.0);
/// }
///
/// let stats = batcher.flush(&mut target, &RenderStates::DEFAULT);
/// assert_eq!(stats.draw_calls, 1);
/// ```
pub struct Batcher {
    mode: BatchMode,
    entries: Vec<BatchEntry>,
    vertices: Vec<Vertex>,
    order: Vec<usize>,
    merged: [GeometryBuffer; 3],
}

impl Batcher {
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
            vertices: Vec::new(),
            order: Vec::new(),
            merged: PrimitiveClass::ALL.map(|class| GeometryBuffer::new(class.list_type())),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.default_batch_mode)
    }

    pub fn batch_mode(&self) -> BatchMode {
        self.mode
    }

    /// Takes effect at the next flush.
    pub fn set_batch_mode(&mut self, mode: BatchMode) {
        self.mode = mode;
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Staged vertices, already transformed and in list form.
    pub fn staged_vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Drop everything staged without drawing it.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.vertices.clear();
        self.order.clear();
    }

    /// Stage a drawable. Its own transform and texture are captured the
    /// same way an immediate draw would see them. Blend mode, stencil mode
    /// and shader come from the states passed to [`flush`](Self::flush).
    pub fn batch<T: Drawable + ?Sized>(&mut self, drawable: &T, depth: f32) {
        self.stage_drawable(drawable, &RenderStates::DEFAULT, true, depth);
    }

    /// Stage a drawable under explicit parent states. Their blend mode,
    /// stencil mode and shader replace the ones given to the flush.
    pub fn batch_with_states<T: Drawable + ?Sized>(
        &mut self,
        drawable: &T,
        states: &RenderStates,
        depth: f32,
    ) {
        self.stage_drawable(drawable, states, false, depth);
    }

    /// Stage raw geometry under explicit states.
    pub fn batch_geometry(&mut self, geometry: &GeometryBuffer, states: &RenderStates, depth: f32) {
        self.stage(geometry.vertices(), geometry.primitive_type(), states, false, depth);
    }

    fn stage_drawable<T: Drawable + ?Sized>(
        &mut self,
        drawable: &T,
        states: &RenderStates,
        inherit: bool,
        depth: f32,
    ) {
        let mut staging = Staging {
            batcher: self,
            inherit,
            depth,
        };
        drawable.draw(&mut staging, states);
    }

    fn stage(
        &mut self,
        vertices: &[Vertex],
        primitive: PrimitiveType,
        states: &RenderStates,
        inherit: bool,
        depth: f32,
    ) {
        if vertices.is_empty() {
            return;
        }

        let first_vertex = self.vertices.len();
        let class = primitive::append_as_list(primitive, vertices, &states.transform, &mut self.vertices);
        let vertex_count = self.vertices.len() - first_vertex;
        if vertex_count == 0 {
            tracing::trace!(?primitive, vertices = vertices.len(), "Incomplete primitive dropped from batch");
            return;
        }

        let entry_states = if inherit {
            EntryStates::Inherit
        } else {
            EntryStates::Fixed {
                blend_mode: states.blend_mode,
                stencil_mode: states.stencil_mode,
                shader: states.shader,
            }
        };

        self.entries.push(BatchEntry {
            key: BatchKey::new(states.texture.as_ref(), states.coordinate_type, &entry_states, class),
            texture: states.texture,
            states: entry_states,
            depth,
            first_vertex,
            vertex_count,
        });
    }

    /// Entry indices in the order the next flush will draw them.
    pub fn order(&mut self) -> &[usize] {
        self.sort();
        &self.order
    }

    fn sort(&mut self) {
        profile_function!();

        self.order.clear();
        self.order.extend(0..self.entries.len());

        // Both sorts are stable: equal keys keep submission order.
        let entries = &self.entries;
        match self.mode {
            BatchMode::Deferred => {}
            BatchMode::TextureSort => self.order.sort_by_key(|&i| entries[i].key.texture),
            BatchMode::DepthSort => self
                .order
                .sort_by(|&a, &b| entries[a].depth.total_cmp(&entries[b].depth)),
        }
    }

    /// Draw every staged entry into `target` and clear the batcher.
    ///
    /// Adjacent entries (after ordering) with the same [`BatchKey`] are
    /// merged into one draw. Each draw starts from `base` and takes the
    /// entry's texture; entries staged with explicit states also override
    /// the blend mode, stencil mode and shader. Per-entry transforms are
    /// already baked into the vertices, so `base.transform` applies on top.
    pub fn flush<D: RenderDriver>(&mut self, target: &mut RenderTarget<D>, base: &RenderStates) -> FlushStats {
        profile_function!();

        let mut stats = FlushStats {
            entries: self.entries.len(),
            ..FlushStats::default()
        };
        if self.entries.is_empty() {
            return stats;
        }

        self.sort();

        let mut run: Option<BatchEntry> = None;
        for position in 0..self.order.len() {
            let entry = self.entries[self.order[position]];

            if let Some(current) = &run
                && current.key != entry.key
            {
                stats.vertices += self.submit_run(target, base, current);
                stats.draw_calls += 1;
                run = None;
            }

            let merged = &mut self.merged[entry.key.class.index()];
            merged.extend_from_slice(&self.vertices[entry.vertex_range()]);
            run.get_or_insert(entry);
        }

        if let Some(current) = &run {
            stats.vertices += self.submit_run(target, base, current);
            stats.draw_calls += 1;
        }

        tracing::trace!(
            mode = %self.mode,
            entries = stats.entries,
            draw_calls = stats.draw_calls,
            vertices = stats.vertices,
            "Batch flushed"
        );

        self.clear();
        stats
    }

    fn submit_run<D: RenderDriver>(
        &mut self,
        target: &mut RenderTarget<D>,
        base: &RenderStates,
        first: &BatchEntry,
    ) -> usize {
        profile_scope!("submit_run");

        let mut states = *base;
        states.texture = first.texture;
        states.coordinate_type = first.key.coordinate_type;
        first.states.resolve(&mut states);

        let merged = &mut self.merged[first.key.class.index()];
        let count = merged.len();
        target.draw(&*merged, &states);
        merged.clear();
        count
    }
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(BatchMode::default())
    }
}

/// Routes a drawable's submissions into the batcher at a fixed depth.
struct Staging<'a> {
    batcher: &'a mut Batcher,
    inherit: bool,
    depth: f32,
}

impl DrawTarget for Staging<'_> {
    fn draw_vertices(&mut self, vertices: &[Vertex], primitive: PrimitiveType, states: &RenderStates) {
        self.batcher
            .stage(vertices, primitive, states, self.inherit, self.depth);
    }
}
