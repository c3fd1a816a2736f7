//! Pipeline creation helpers for the wgpu backend.

use bytemuck::{Pod, Zeroable};

use glam::Vec2;

use crate::{BlendMode, PrimitiveType, ShaderId, StencilMode, Transform, Vertex};

/// Per-draw uniform: projection times model matrix, plus the factor that
/// brings texture coordinates into `0..1`.
///
/// Padded to 256 bytes, the largest `min_uniform_buffer_offset_alignment`
/// wgpu allows, so consecutive entries can be addressed with dynamic offsets.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniform {
    pub view_model: [[f32; 4]; 4],
    pub tex_scale: [f32; 4],
    _padding: [[f32; 4]; 11],
}

pub const UNIFORM_STRIDE: u64 = std::mem::size_of::<DrawUniform>() as u64;

/// Bytes of [`DrawUniform`] the shaders read.
pub const UNIFORM_BINDING_SIZE: u64 = 80;

/// Format of the stencil attachment every pipeline is built against.
pub const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;

static_assertions::const_assert_eq!(std::mem::size_of::<DrawUniform>(), 256);

impl DrawUniform {
    pub fn new(projection: &Transform, model: &Transform, tex_scale: Vec2) -> Self {
        Self {
            view_model: projection.combine(model).to_cols_array_4x4(),
            tex_scale: [tex_scale.x, tex_scale.y, 0.0, 0.0],
            _padding: [[0.0; 4]; 11],
        }
    }
}

/// Native topology per [`PrimitiveType`], indexed by [`PrimitiveType::index`].
/// `None` entries have no wgpu equivalent and are drawn as triangle lists.
pub const TOPOLOGY: [Option<wgpu::PrimitiveTopology>; 7] = [
    Some(wgpu::PrimitiveTopology::PointList),
    Some(wgpu::PrimitiveTopology::LineList),
    Some(wgpu::PrimitiveTopology::LineStrip),
    Some(wgpu::PrimitiveTopology::TriangleList),
    Some(wgpu::PrimitiveTopology::TriangleStrip),
    None,
    None,
];

pub fn topology(primitive: PrimitiveType) -> Option<wgpu::PrimitiveTopology> {
    TOPOLOGY[primitive.index()]
}

/// Stencil state baked into a pipeline. The reference value is set per
/// draw on the render pass instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilKey {
    pub mode: StencilMode,
}

impl StencilKey {
    pub const DISABLED: StencilKey = StencilKey {
        mode: StencilMode::DISABLED,
    };

    pub fn new(mode: Option<&StencilMode>) -> Self {
        mode.map_or(Self::DISABLED, |mode| StencilKey {
            mode: StencilMode {
                reference: 0,
                ..*mode
            },
        })
    }

    fn color_writes(&self) -> wgpu::ColorWrites {
        if self.mode.only {
            wgpu::ColorWrites::empty()
        } else {
            wgpu::ColorWrites::ALL
        }
    }
}

/// Everything a pipeline depends on besides the shared layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub shader: Option<ShaderId>,
    pub blend_mode: BlendMode,
    pub topology: wgpu::PrimitiveTopology,
    pub stencil: StencilKey,
}

/// Group 0: the draw uniform, addressed with a dynamic offset.
pub fn create_uniform_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("tessera_draw_uniform_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(UNIFORM_BINDING_SIZE),
            },
            count: None,
        }],
    })
}

/// Group 1: the bound texture and its sampler.
pub fn create_texture_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("tessera_texture_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub fn create_uniform_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("tessera_draw_uniforms"),
        size: capacity as u64 * UNIFORM_STRIDE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("tessera_draw_uniform_bg"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: wgpu::BufferSize::new(UNIFORM_BINDING_SIZE),
            }),
        }],
    })
}

pub fn create_vertex_buffer(device: &wgpu::Device, capacity: usize, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (capacity * std::mem::size_of::<Vertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("tessera_texture_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

pub fn create_stencil_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("tessera_stencil"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: STENCIL_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Create a render pipeline for one blend mode, topology, stencil state and
/// shader.
pub fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    tracing::debug!(?key, "Creating render pipeline");

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("tessera_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::buffer_layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                write_mask: key.stencil.color_writes(),
                ..key.blend_mode.to_color_target_state(format)
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: key.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: STENCIL_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: key.stencil.mode.to_stencil_state(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fans_and_quads_have_no_native_topology() {
        assert_eq!(topology(PrimitiveType::TriangleFan), None);
        assert_eq!(topology(PrimitiveType::Quads), None);
        assert_eq!(
            topology(PrimitiveType::LineStrip),
            Some(wgpu::PrimitiveTopology::LineStrip)
        );
    }

    #[test]
    fn test_uniform_combines_projection_and_model() {
        let projection = Transform::from_scale(Vec2::splat(2.0));
        let model = Transform::from_translation(Vec2::new(1.0, 0.0));
        let uniform = DrawUniform::new(&projection, &model, Vec2::new(0.5, 0.25));
        assert_eq!(uniform.view_model[3], [2.0, 0.0, 0.0, 1.0]);
        assert_eq!(uniform.tex_scale, [0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_stencil_key_ignores_reference() {
        use crate::{StencilComparison, StencilUpdateOperation};

        let one = StencilMode::new(StencilComparison::Equal, StencilUpdateOperation::Keep, 1);
        let two = StencilMode { reference: 2, ..one };
        assert_eq!(StencilKey::new(Some(&one)), StencilKey::new(Some(&two)));
        assert_eq!(StencilKey::new(None), StencilKey::DISABLED);
        assert_eq!(StencilKey::new(Some(&one.stencil_only())).color_writes(), wgpu::ColorWrites::empty());
    }
}
