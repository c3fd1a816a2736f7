//! wgpu implementation of [`RenderDriver`].
//!
//! wgpu has no immediate-mode context, so [`WgpuDriver`] records: every
//! `draw_primitives` appends vertices to a CPU staging buffer and remembers
//! the pipeline, texture, uniform slot, viewport, scissor and stencil
//! reference it needs. The recording is uploaded and replayed by
//! [`WgpuDriver::encode`], then cleared for the next frame.
//!
//! Every pass renders with a driver-owned `Stencil8` attachment. A stencil
//! clear issued after draws were recorded starts a new pass, since wgpu can
//! only clear attachments when a pass begins.

mod pipeline;

use std::ops::Range;

use ahash::HashMap;
use glam::Vec2;
use parking_lot::Mutex;
use tessera_core::geometry::{Rect, Size};
use tessera_core::profiling::{profile_function, profile_scope};

use crate::driver::{RenderDriver, TargetId};
use crate::primitive;
use crate::{
    BlendMode, Color, CoordinateType, PrimitiveType, RenderError, ShaderHandle, ShaderId,
    StencilMode, TextureHandle, TextureId, Transform, Vertex, VertexBufferHandle, VertexBufferId,
};

pub use pipeline::{DrawUniform, PipelineKey, StencilKey};
use pipeline::UNIFORM_STRIDE;

const INITIAL_VERTEX_CAPACITY: usize = 4096;
const INITIAL_UNIFORM_CAPACITY: usize = 64;

/// Tracked pipeline state, saved and restored by push/pop.
#[derive(Debug, Clone, Copy)]
struct DrawState {
    viewport: Rect<i32>,
    scissor: Option<Rect<i32>>,
    projection: Transform,
    model: Transform,
    blend_mode: BlendMode,
    stencil: Option<StencilMode>,
    texture: Option<TextureId>,
    tex_scale: Vec2,
    shader: Option<ShaderId>,
}

impl DrawState {
    fn baseline(size: Size<u32>) -> Self {
        Self {
            viewport: Rect::new(0, 0, size.width as i32, size.height as i32),
            scissor: None,
            projection: Transform::IDENTITY,
            model: Transform::IDENTITY,
            blend_mode: BlendMode::Alpha,
            stencil: None,
            texture: None,
            tex_scale: Vec2::ONE,
            shader: None,
        }
    }
}

/// Where a recorded draw reads its vertices from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexSource {
    Staging,
    Buffer(VertexBufferId),
}

#[derive(Debug, Clone)]
struct DrawCommand {
    pipeline: PipelineKey,
    texture: Option<TextureId>,
    uniform: u32,
    source: VertexSource,
    vertices: Range<u32>,
    viewport: Rect<i32>,
    scissor: Option<Rect<i32>>,
    stencil_reference: u32,
}

/// A render pass boundary within the recording.
#[derive(Debug, Clone, Copy, Default)]
struct PassStart {
    first_command: usize,
    stencil_clear: Option<u32>,
}

#[derive(Default)]
struct Recording {
    clear: Option<Color>,
    passes: Vec<PassStart>,
    vertices: Vec<Vertex>,
    uniforms: Vec<DrawUniform>,
    commands: Vec<DrawCommand>,
    uniform_dirty: bool,
}

impl Recording {
    fn reset(&mut self) {
        self.clear = None;
        self.passes.clear();
        self.passes.push(PassStart::default());
        self.vertices.clear();
        self.uniforms.clear();
        self.commands.clear();
        self.uniform_dirty = true;
    }

    /// The stencil value the most recent stencil clear wrote, if any.
    fn last_stencil_clear(&self) -> Option<u32> {
        self.passes.iter().rev().find_map(|pass| pass.stencil_clear)
    }

    /// Command ranges of each pass, with the pass's stencil clear.
    fn pass_ranges(&self) -> impl Iterator<Item = (Range<usize>, Option<u32>)> + '_ {
        self.passes.iter().enumerate().map(|(i, pass)| {
            let end = self
                .passes
                .get(i + 1)
                .map_or(self.commands.len(), |next| next.first_command);
            (pass.first_command..end, pass.stencil_clear)
        })
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: Size<u32>,
}

/// Fans and quads have no native topology. Their buffers stay on the CPU
/// and each drawn range is converted into the staging buffer.
enum GpuVertexBuffer {
    Native(wgpu::Buffer),
    Emulated(Vec<Vertex>),
}

struct StencilTarget {
    view: wgpu::TextureView,
    size: Size<u32>,
}

struct Inner {
    size: Size<u32>,
    active: Option<TargetId>,
    state: DrawState,
    saved: Vec<DrawState>,
    recording: Recording,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    textures: HashMap<TextureId, GpuTexture>,
    free_texture_slots: Vec<u32>,
    next_texture_slot: u32,
    shaders: HashMap<ShaderId, wgpu::ShaderModule>,
    next_shader_slot: u32,
    buffers: HashMap<VertexBufferId, GpuVertexBuffer>,
    free_buffer_slots: Vec<u32>,
    next_buffer_slot: u32,
    stencil: Option<StencilTarget>,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_capacity: usize,
    uniform_bind_group: wgpu::BindGroup,
}

/// Render driver backed by a wgpu device.
///
/// # Example
///
/// ```no_run
/// use tessera_core::geometry::Size;
/// use tessera_render::{gpu::WgpuDriver, wgpu, Color, RenderTarget};
///
/// # fn main() -> Result<(), tessera_render::RenderError> {
/// let driver = WgpuDriver::request_sync(Size::new(256, 256), wgpu::TextureFormat::Rgba8UnormSrgb)?;
/// let mut target = RenderTarget::new(&driver);
/// target.clear(Color::BLUE);
///
/// let output = driver.create_render_texture();
/// let view = output.create_view(&wgpu::TextureViewDescriptor::default());
/// let mut encoder = driver.device().create_command_encoder(&Default::default());
/// driver.encode(&mut encoder, &view);
/// driver.queue().submit(Some(encoder.finish()));
/// # Ok(())
/// # }
/// ```
pub struct WgpuDriver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    default_shader: wgpu::ShaderModule,
    sampler: wgpu::Sampler,
    white_bind_group: wgpu::BindGroup,
    inner: Mutex<Inner>,
}

impl WgpuDriver {
    /// Build a driver on an existing device rendering into `format`
    /// attachments of `size` pixels.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        size: Size<u32>,
    ) -> Self {
        profile_function!();

        let uniform_layout = pipeline::create_uniform_bind_group_layout(&device);
        let texture_layout = pipeline::create_texture_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tessera_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let default_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tessera_sprite_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/sprite.wgsl").into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tessera_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = Self::upload_rgba(&device, &queue, Size::new(1, 1), &[255; 4], "tessera_white");
        let white_view = white.create_view(&wgpu::TextureViewDescriptor::default());
        let white_bind_group =
            pipeline::create_texture_bind_group(&device, &texture_layout, &white_view, &sampler);

        let vertex_buffer =
            pipeline::create_vertex_buffer(&device, INITIAL_VERTEX_CAPACITY, "tessera_vertices");
        let uniform_buffer = pipeline::create_uniform_buffer(&device, INITIAL_UNIFORM_CAPACITY);
        let uniform_bind_group =
            pipeline::create_uniform_bind_group(&device, &uniform_layout, &uniform_buffer);

        tracing::info!(?format, width = size.width, height = size.height, "wgpu driver created");

        let mut recording = Recording::default();
        recording.reset();

        Self {
            device,
            queue,
            format,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            default_shader,
            sampler,
            white_bind_group,
            inner: Mutex::new(Inner {
                size,
                active: None,
                state: DrawState::baseline(size),
                saved: Vec::new(),
                recording,
                pipelines: HashMap::default(),
                textures: HashMap::default(),
                free_texture_slots: Vec::new(),
                next_texture_slot: 0,
                shaders: HashMap::default(),
                next_shader_slot: 0,
                buffers: HashMap::default(),
                free_buffer_slots: Vec::new(),
                next_buffer_slot: 0,
                stencil: None,
                vertex_buffer,
                vertex_capacity: INITIAL_VERTEX_CAPACITY,
                uniform_buffer,
                uniform_capacity: INITIAL_UNIFORM_CAPACITY,
                uniform_bind_group,
            }),
        }
    }

    /// Request an adapter and device without a surface.
    pub async fn request(size: Size<u32>, format: wgpu::TextureFormat) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::AdapterNotFound(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tessera_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| RenderError::DeviceRequest(e.to_string()))?;

        Ok(Self::new(device, queue, format, size))
    }

    /// Blocking version of [`WgpuDriver::request`].
    pub fn request_sync(size: Size<u32>, format: wgpu::TextureFormat) -> Result<Self, RenderError> {
        pollster::block_on(Self::request(size, format))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Change the attachment size reported to render targets.
    pub fn resize(&self, size: Size<u32>) {
        self.inner.lock().size = size;
    }

    /// A texture matching the driver's format and size, usable as the
    /// `view` passed to [`encode`](Self::encode).
    pub fn create_render_texture(&self) -> wgpu::Texture {
        let size = self.inner.lock().size;
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tessera_render_texture"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn upload_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        size: Size<u32>,
        rgba: &[u8],
        label: &str,
    ) -> wgpu::Texture {
        let extent = wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Self::write_rgba(queue, &texture, size, rgba);
        texture
    }

    fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, size: Size<u32>, rgba: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: Some(size.height),
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn check_rgba(size: Size<u32>, rgba: &[u8]) -> Result<(), RenderError> {
        if size.width == 0 || size.height == 0 {
            return Err(RenderError::EmptyTexture);
        }
        let expected = size.width as usize * size.height as usize * 4;
        if rgba.len() != expected {
            return Err(RenderError::TextureDataSize {
                expected,
                actual: rgba.len(),
            });
        }
        Ok(())
    }

    /// Upload an RGBA8 texture. Slots of destroyed textures are reused, but
    /// every returned handle carries a fresh identity.
    pub fn create_texture(&self, size: Size<u32>, rgba: &[u8]) -> Result<TextureHandle, RenderError> {
        profile_function!();
        Self::check_rgba(size, rgba)?;

        let texture = Self::upload_rgba(&self.device, &self.queue, size, rgba, "tessera_texture");
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group =
            pipeline::create_texture_bind_group(&self.device, &self.texture_layout, &view, &self.sampler);

        let mut inner = self.inner.lock();
        let slot = match inner.free_texture_slots.pop() {
            Some(slot) => slot,
            None => {
                inner.next_texture_slot += 1;
                inner.next_texture_slot - 1
            }
        };
        let handle = TextureHandle::new(slot, size);
        inner.textures.insert(
            handle.id(),
            GpuTexture {
                texture,
                bind_group,
                size,
            },
        );

        tracing::debug!(id = handle.id().get(), slot, width = size.width, height = size.height, "Texture created");
        Ok(handle)
    }

    /// Replace the full contents of a texture.
    pub fn update_texture(&self, handle: &TextureHandle, rgba: &[u8]) -> Result<(), RenderError> {
        let inner = self.inner.lock();
        let gpu = inner
            .textures
            .get(&handle.id())
            .ok_or(RenderError::UnknownTexture(handle.id()))?;
        Self::check_rgba(gpu.size, rgba)?;
        Self::write_rgba(&self.queue, &gpu.texture, gpu.size, rgba);
        Ok(())
    }

    /// Release a texture and recycle its slot.
    pub fn destroy_texture(&self, handle: &TextureHandle) -> Result<(), RenderError> {
        let mut inner = self.inner.lock();
        let gpu = inner
            .textures
            .remove(&handle.id())
            .ok_or(RenderError::UnknownTexture(handle.id()))?;
        gpu.texture.destroy();
        inner.free_texture_slots.push(handle.raw());
        if inner.state.texture == Some(handle.id()) {
            inner.state.texture = None;
        }
        Ok(())
    }

    /// Compile a WGSL shader. It must provide `vs_main` and `fs_main` with
    /// the same bindings and vertex inputs as the built-in sprite shader.
    ///
    /// A pipeline is built from the module before it is accepted, so
    /// missing entry points and layout mismatches are reported here instead
    /// of surfacing at the first draw.
    pub fn create_shader(&self, wgsl: &str) -> Result<ShaderHandle, RenderError> {
        profile_function!();

        let mut key = PipelineKey {
            shader: None,
            blend_mode: BlendMode::Alpha,
            topology: wgpu::PrimitiveTopology::TriangleList,
            stencil: StencilKey::DISABLED,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tessera_user_shader"),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });
        let validated = pipeline::create_pipeline(
            &self.device,
            &self.pipeline_layout,
            &module,
            self.format,
            &key,
        );
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            tracing::warn!(%error, "Shader rejected");
            return Err(RenderError::ShaderCompilation(error.to_string()));
        }

        let mut inner = self.inner.lock();
        let handle = ShaderHandle::new(inner.next_shader_slot);
        inner.next_shader_slot += 1;
        inner.shaders.insert(handle.id(), module);
        key.shader = Some(handle.id());
        inner.pipelines.insert(key, validated);
        Ok(handle)
    }

    /// Release a shader and every pipeline built from it.
    pub fn destroy_shader(&self, handle: &ShaderHandle) -> Result<(), RenderError> {
        let mut inner = self.inner.lock();
        inner
            .shaders
            .remove(&handle.id())
            .ok_or(RenderError::UnknownShader(handle.id()))?;
        inner.pipelines.retain(|key, _| key.shader != Some(handle.id()));
        if inner.state.shader == Some(handle.id()) {
            inner.state.shader = None;
        }
        Ok(())
    }

    /// Upload `vertices` into a new GPU-resident buffer. Slots of destroyed
    /// buffers are reused, but every returned handle carries a fresh identity.
    pub fn create_vertex_buffer(
        &self,
        primitive: PrimitiveType,
        vertices: &[Vertex],
    ) -> Result<VertexBufferHandle, RenderError> {
        profile_function!();
        if vertices.is_empty() {
            return Err(RenderError::EmptyVertexBuffer);
        }

        let storage = if pipeline::topology(primitive).is_some() {
            let buffer =
                pipeline::create_vertex_buffer(&self.device, vertices.len(), "tessera_vertex_buffer");
            self.queue.write_buffer(&buffer, 0, bytemuck::cast_slice(vertices));
            GpuVertexBuffer::Native(buffer)
        } else {
            GpuVertexBuffer::Emulated(vertices.to_vec())
        };

        let mut inner = self.inner.lock();
        let slot = match inner.free_buffer_slots.pop() {
            Some(slot) => slot,
            None => {
                inner.next_buffer_slot += 1;
                inner.next_buffer_slot - 1
            }
        };
        let handle = VertexBufferHandle::new(slot, vertices.len(), primitive);
        inner.buffers.insert(handle.id(), storage);

        tracing::debug!(id = handle.id().get(), slot, vertices = vertices.len(), ?primitive, "Vertex buffer created");
        Ok(handle)
    }

    /// Overwrite part of a buffer starting at vertex `offset`.
    pub fn update_vertex_buffer(
        &self,
        handle: &VertexBufferHandle,
        offset: usize,
        vertices: &[Vertex],
    ) -> Result<(), RenderError> {
        if offset + vertices.len() > handle.len() {
            return Err(RenderError::VertexBufferRange {
                offset,
                count: vertices.len(),
                len: handle.len(),
            });
        }

        let mut inner = self.inner.lock();
        match inner
            .buffers
            .get_mut(&handle.id())
            .ok_or(RenderError::UnknownVertexBuffer(handle.id()))?
        {
            GpuVertexBuffer::Native(buffer) => self.queue.write_buffer(
                buffer,
                (offset * std::mem::size_of::<Vertex>()) as u64,
                bytemuck::cast_slice(vertices),
            ),
            GpuVertexBuffer::Emulated(shadow) => {
                shadow[offset..offset + vertices.len()].copy_from_slice(vertices);
            }
        }
        Ok(())
    }

    /// Release a vertex buffer and recycle its slot.
    pub fn destroy_vertex_buffer(&self, handle: &VertexBufferHandle) -> Result<(), RenderError> {
        let mut inner = self.inner.lock();
        let storage = inner
            .buffers
            .remove(&handle.id())
            .ok_or(RenderError::UnknownVertexBuffer(handle.id()))?;
        if let GpuVertexBuffer::Native(buffer) = storage {
            buffer.destroy();
        }
        inner.free_buffer_slots.push(handle.raw());
        Ok(())
    }

    /// Number of draws recorded since the last [`encode`](Self::encode).
    pub fn recorded_draws(&self) -> usize {
        self.inner.lock().recording.commands.len()
    }

    /// Number of distinct pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.inner.lock().pipelines.len()
    }

    /// Upload the recorded frame and replay it into render passes on `view`,
    /// then start a new recording.
    ///
    /// A recorded clear becomes the first pass's load operation; without one
    /// the existing contents are kept. Each stencil clear becomes the stencil
    /// load operation of the pass it starts.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        profile_function!();

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        self.upload(inner);
        self.ensure_stencil(inner);

        let Some(stencil) = inner.stencil.as_ref() else {
            return;
        };
        let size = inner.size;

        for (pass_index, (commands, stencil_clear)) in inner.recording.pass_ranges().enumerate() {
            profile_scope!("replay");

            let load = match inner.recording.clear {
                Some(color) if pass_index == 0 => wgpu::LoadOp::Clear(color.to_wgpu()),
                _ => wgpu::LoadOp::Load,
            };
            let stencil_load = match stencil_clear {
                Some(value) => wgpu::LoadOp::Clear(value),
                None => wgpu::LoadOp::Load,
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tessera_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &stencil.view,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: stencil_load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut bound_source = None;
            for command in &inner.recording.commands[commands] {
                let Some(scissor) = clamp_scissor(command.scissor, size) else {
                    continue;
                };
                if command.viewport.width <= 0 || command.viewport.height <= 0 {
                    continue;
                }
                let Some(pipeline) = inner.pipelines.get(&command.pipeline) else {
                    continue;
                };

                if bound_source != Some(command.source) {
                    match command.source {
                        VertexSource::Staging => {
                            pass.set_vertex_buffer(0, inner.vertex_buffer.slice(..));
                        }
                        VertexSource::Buffer(id) => match inner.buffers.get(&id) {
                            Some(GpuVertexBuffer::Native(buffer)) => {
                                pass.set_vertex_buffer(0, buffer.slice(..));
                            }
                            _ => {
                                tracing::trace!(buffer = id.get(), "Vertex buffer destroyed before encode");
                                continue;
                            }
                        },
                    }
                    bound_source = Some(command.source);
                }

                let texture_bind_group = command
                    .texture
                    .and_then(|id| inner.textures.get(&id))
                    .map_or(&self.white_bind_group, |gpu| &gpu.bind_group);

                pass.set_pipeline(pipeline);
                pass.set_bind_group(
                    0,
                    &inner.uniform_bind_group,
                    &[command.uniform * UNIFORM_STRIDE as u32],
                );
                pass.set_bind_group(1, texture_bind_group, &[]);
                pass.set_viewport(
                    command.viewport.x as f32,
                    command.viewport.y as f32,
                    command.viewport.width as f32,
                    command.viewport.height as f32,
                    0.0,
                    1.0,
                );
                pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
                pass.set_stencil_reference(command.stencil_reference);
                pass.draw(command.vertices.clone(), 0..1);
            }
        }

        tracing::trace!(
            passes = inner.recording.passes.len(),
            draws = inner.recording.commands.len(),
            vertices = inner.recording.vertices.len(),
            "Frame encoded"
        );
        inner.recording.reset();
    }

    fn ensure_stencil(&self, inner: &mut Inner) {
        let size = inner.size;
        if inner.stencil.as_ref().is_some_and(|stencil| stencil.size == size) {
            return;
        }
        inner.stencil = Some(StencilTarget {
            view: pipeline::create_stencil_view(&self.device, size.width, size.height),
            size,
        });
        tracing::debug!(width = size.width, height = size.height, "Stencil attachment created");
    }

    fn upload(&self, inner: &mut Inner) {
        profile_function!();

        let vertex_count = inner.recording.vertices.len();
        if vertex_count > inner.vertex_capacity {
            inner.vertex_capacity = vertex_count.next_power_of_two();
            inner.vertex_buffer =
                pipeline::create_vertex_buffer(&self.device, inner.vertex_capacity, "tessera_vertices");
            tracing::debug!(capacity = inner.vertex_capacity, "Vertex buffer grown");
        }
        if vertex_count > 0 {
            self.queue.write_buffer(
                &inner.vertex_buffer,
                0,
                bytemuck::cast_slice(&inner.recording.vertices),
            );
        }

        let uniform_count = inner.recording.uniforms.len();
        if uniform_count > inner.uniform_capacity {
            inner.uniform_capacity = uniform_count.next_power_of_two();
            inner.uniform_buffer = pipeline::create_uniform_buffer(&self.device, inner.uniform_capacity);
            inner.uniform_bind_group = pipeline::create_uniform_bind_group(
                &self.device,
                &self.uniform_layout,
                &inner.uniform_buffer,
            );
            tracing::debug!(capacity = inner.uniform_capacity, "Uniform buffer grown");
        }
        if uniform_count > 0 {
            self.queue.write_buffer(
                &inner.uniform_buffer,
                0,
                bytemuck::cast_slice(&inner.recording.uniforms),
            );
        }
    }

    fn ensure_pipeline(&self, inner: &mut Inner, key: PipelineKey) {
        if inner.pipelines.contains_key(&key) {
            return;
        }
        let module = match key.shader {
            Some(id) => match inner.shaders.get(&id) {
                Some(module) => module,
                None => {
                    tracing::warn!(shader = id.get(), "Unknown shader, using built-in");
                    &self.default_shader
                }
            },
            None => &self.default_shader,
        };
        let pipeline = pipeline::create_pipeline(
            &self.device,
            &self.pipeline_layout,
            module,
            self.format,
            &key,
        );
        inner.pipelines.insert(key, pipeline);
    }

    fn record_draw(
        &self,
        inner: &mut Inner,
        topology: wgpu::PrimitiveTopology,
        source: VertexSource,
        vertices: Range<usize>,
    ) {
        if vertices.is_empty() {
            return;
        }

        if inner.recording.uniform_dirty || inner.recording.uniforms.is_empty() {
            let uniform = DrawUniform::new(
                &inner.state.projection,
                &inner.state.model,
                inner.state.tex_scale,
            );
            inner.recording.uniforms.push(uniform);
            inner.recording.uniform_dirty = false;
        }

        let key = PipelineKey {
            shader: inner.state.shader,
            blend_mode: inner.state.blend_mode,
            topology,
            stencil: StencilKey::new(inner.state.stencil.as_ref()),
        };
        self.ensure_pipeline(inner, key);

        inner.recording.commands.push(DrawCommand {
            pipeline: key,
            texture: inner.state.texture,
            uniform: (inner.recording.uniforms.len() - 1) as u32,
            source,
            vertices: vertices.start as u32..vertices.end as u32,
            viewport: inner.state.viewport,
            scissor: inner.state.scissor,
            stencil_reference: inner.state.stencil.map_or(0, |mode| mode.reference),
        });
    }
}

/// Clip a scissor rectangle to the attachment. `None` as input means the
/// whole attachment; `None` as output means nothing is visible.
fn clamp_scissor(scissor: Option<Rect<i32>>, size: Size<u32>) -> Option<Rect<u32>> {
    let full = Rect::new(0, 0, size.width as i32, size.height as i32);
    let rect = scissor.unwrap_or(full);

    let left = rect.x.clamp(0, full.width);
    let top = rect.y.clamp(0, full.height);
    let right = (rect.x + rect.width).clamp(0, full.width);
    let bottom = (rect.y + rect.height).clamp(0, full.height);

    (right > left && bottom > top).then(|| {
        Rect::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
    })
}

impl RenderDriver for WgpuDriver {
    fn activate(&self, target: TargetId, active: bool) -> bool {
        let mut inner = self.inner.lock();
        if active {
            inner.active = Some(target);
        } else if inner.active == Some(target) {
            inner.active = None;
        }
        true
    }

    fn active_target(&self) -> Option<TargetId> {
        self.inner.lock().active
    }

    fn target_size(&self) -> Size<u32> {
        self.inner.lock().size
    }

    fn reset_baseline(&self) {
        let mut inner = self.inner.lock();
        let viewport = inner.state.viewport;
        inner.state = DrawState {
            viewport,
            ..DrawState::baseline(inner.size)
        };
        inner.recording.uniform_dirty = true;
    }

    fn set_viewport(&self, viewport: Rect<i32>) {
        self.inner.lock().state.viewport = viewport;
    }

    fn set_scissor(&self, scissor: Option<Rect<i32>>) {
        self.inner.lock().state.scissor = scissor;
    }

    fn load_projection(&self, projection: &Transform) {
        let mut inner = self.inner.lock();
        inner.state.projection = *projection;
        inner.recording.uniform_dirty = true;
    }

    fn load_transform(&self, transform: &Transform) {
        let mut inner = self.inner.lock();
        inner.state.model = *transform;
        inner.recording.uniform_dirty = true;
    }

    fn load_identity(&self) {
        self.load_transform(&Transform::IDENTITY);
    }

    fn set_blend_mode(&self, mode: BlendMode) {
        self.inner.lock().state.blend_mode = mode;
    }

    fn set_stencil_mode(&self, mode: Option<&StencilMode>) {
        self.inner.lock().state.stencil = mode.copied();
    }

    fn bind_texture(&self, texture: Option<&TextureHandle>, coordinate_type: CoordinateType) {
        let mut inner = self.inner.lock();
        inner.state.texture = texture.map(|t| t.id());
        let tex_scale = coordinate_type.scale(texture);
        if tex_scale != inner.state.tex_scale {
            inner.state.tex_scale = tex_scale;
            inner.recording.uniform_dirty = true;
        }
    }

    fn bind_shader(&self, shader: Option<&ShaderHandle>) {
        self.inner.lock().state.shader = shader.map(|s| s.id());
    }

    fn draw_primitives(&self, primitive: PrimitiveType, vertices: &[Vertex]) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let first = inner.recording.vertices.len();
        let topology = match pipeline::topology(primitive) {
            Some(topology) => {
                inner.recording.vertices.extend_from_slice(vertices);
                topology
            }
            None => {
                primitive::append_as_list(
                    primitive,
                    vertices,
                    &Transform::IDENTITY,
                    &mut inner.recording.vertices,
                );
                wgpu::PrimitiveTopology::TriangleList
            }
        };
        let last = inner.recording.vertices.len();
        self.record_draw(inner, topology, VertexSource::Staging, first..last);
    }

    fn draw_buffer(&self, buffer: &VertexBufferHandle, range: Range<usize>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let recording = &mut inner.recording;
        let (topology, source, vertices) = match inner.buffers.get(&buffer.id()) {
            Some(GpuVertexBuffer::Native(_)) => match pipeline::topology(buffer.primitive_type()) {
                Some(topology) => (topology, VertexSource::Buffer(buffer.id()), range),
                None => return,
            },
            Some(GpuVertexBuffer::Emulated(shadow)) => {
                let Some(slice) = shadow.get(range) else {
                    return;
                };
                let first = recording.vertices.len();
                primitive::append_as_list(
                    buffer.primitive_type(),
                    slice,
                    &Transform::IDENTITY,
                    &mut recording.vertices,
                );
                (
                    wgpu::PrimitiveTopology::TriangleList,
                    VertexSource::Staging,
                    first..recording.vertices.len(),
                )
            }
            None => {
                tracing::warn!(buffer = buffer.id().get(), "Draw of unknown vertex buffer skipped");
                return;
            }
        };
        self.record_draw(inner, topology, source, vertices);
    }

    fn clear(&self, color: Color) {
        let mut inner = self.inner.lock();
        // Everything recorded so far is overwritten; the stencil contents are not.
        let stencil_clear = inner.recording.last_stencil_clear();
        inner.recording.reset();
        inner.recording.clear = Some(color);
        inner.recording.passes[0].stencil_clear = stencil_clear;
    }

    fn clear_stencil(&self, value: u32) {
        let mut inner = self.inner.lock();
        let recording = &mut inner.recording;
        let first_command = recording.commands.len();
        match recording.passes.last_mut() {
            Some(pass) if pass.first_command == first_command => pass.stencil_clear = Some(value),
            _ => recording.passes.push(PassStart {
                first_command,
                stencil_clear: Some(value),
            }),
        }
    }

    fn push_states(&self) {
        let mut inner = self.inner.lock();
        let state = inner.state;
        inner.saved.push(state);
    }

    fn pop_states(&self) {
        let mut inner = self.inner.lock();
        if let Some(state) = inner.saved.pop() {
            inner.state = state;
            inner.recording.uniform_dirty = true;
        } else {
            tracing::warn!("pop_states called without matching push_states");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_scissor_to_attachment() {
        let size = Size::new(100, 50);
        assert_eq!(clamp_scissor(None, size), Some(Rect::new(0, 0, 100, 50)));
        assert_eq!(
            clamp_scissor(Some(Rect::new(-10, 40, 30, 30)), size),
            Some(Rect::new(0, 40, 20, 10))
        );
        assert_eq!(clamp_scissor(Some(Rect::new(200, 0, 10, 10)), size), None);
    }
}
