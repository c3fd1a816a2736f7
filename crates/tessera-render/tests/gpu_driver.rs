//! wgpu driver tests. These need a GPU adapter.
//!
//! Run with: cargo test --test gpu_driver -- --ignored
#![cfg(feature = "wgpu")]

use glam::Vec2;
use tessera_core::geometry::Size;
use tessera_render::{
    Color, PrimitiveType, RenderError, RenderStates, RenderTarget, Shape, Sprite, StencilComparison,
    StencilMode, StencilUpdateOperation, Vertex, WgpuDriver, wgpu,
};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn driver() -> Option<WgpuDriver> {
    match WgpuDriver::request_sync(Size::new(64, 64), FORMAT) {
        Ok(driver) => Some(driver),
        Err(e) => {
            println!("GPU not available: {}", e);
            None
        }
    }
}

#[test]
#[ignore] // Requires GPU
fn test_texture_validation() {
    let Some(driver) = driver() else { return };

    assert_eq!(
        driver.create_texture(Size::new(0, 4), &[]),
        Err(RenderError::EmptyTexture)
    );
    assert_eq!(
        driver.create_texture(Size::new(2, 2), &[0; 15]),
        Err(RenderError::TextureDataSize { expected: 16, actual: 15 })
    );

    let texture = driver.create_texture(Size::new(2, 2), &[255; 16]).expect("valid texture");
    driver.destroy_texture(&texture).expect("first destroy");
    assert_eq!(
        driver.destroy_texture(&texture),
        Err(RenderError::UnknownTexture(texture.id()))
    );

    let recycled = driver.create_texture(Size::new(2, 2), &[255; 16]).expect("valid texture");
    assert_eq!(recycled.raw(), texture.raw());
    assert_ne!(recycled.id(), texture.id());
}

#[test]
#[ignore] // Requires GPU
fn test_invalid_shader_is_rejected() {
    let Some(driver) = driver() else { return };
    let result = driver.create_shader("fn vs_main( {");
    assert!(matches!(result, Err(RenderError::ShaderCompilation(_))));
}

#[test]
#[ignore] // Requires GPU
fn test_shader_without_fragment_entry_is_rejected() {
    let Some(driver) = driver() else { return };
    let wgsl = "
        @vertex
        fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
            return vec4<f32>(position, 0.0, 1.0);
        }
    ";
    let result = driver.create_shader(wgsl);
    assert!(matches!(result, Err(RenderError::ShaderCompilation(_))));
    assert_eq!(driver.pipeline_count(), 0);
}

#[test]
#[ignore] // Requires GPU
fn test_vertex_buffer_validation() {
    let Some(driver) = driver() else { return };
    let quad: Vec<Vertex> = [(0.0, 0.0), (8.0, 0.0), (0.0, 8.0), (8.0, 8.0)]
        .into_iter()
        .map(|(x, y)| Vertex::new(Vec2::new(x, y), Color::WHITE, Vec2::ZERO))
        .collect();

    assert_eq!(
        driver.create_vertex_buffer(PrimitiveType::TriangleStrip, &[]),
        Err(RenderError::EmptyVertexBuffer)
    );

    let buffer = driver
        .create_vertex_buffer(PrimitiveType::TriangleStrip, &quad)
        .expect("valid buffer");
    assert_eq!(buffer.len(), 4);
    driver.update_vertex_buffer(&buffer, 2, &quad[..2]).expect("in range");
    assert_eq!(
        driver.update_vertex_buffer(&buffer, 3, &quad[..2]),
        Err(RenderError::VertexBufferRange { offset: 3, count: 2, len: 4 })
    );

    driver.destroy_vertex_buffer(&buffer).expect("first destroy");
    assert_eq!(
        driver.destroy_vertex_buffer(&buffer),
        Err(RenderError::UnknownVertexBuffer(buffer.id()))
    );
}

#[test]
#[ignore] // Requires GPU
fn test_stencil_masked_frame_encodes() {
    let Some(driver) = driver() else { return };
    let fan: Vec<Vertex> = [(0.0, 0.0), (32.0, 0.0), (32.0, 32.0), (0.0, 32.0)]
        .into_iter()
        .map(|(x, y)| Vertex::new(Vec2::new(x, y), Color::WHITE, Vec2::ZERO))
        .collect();
    let buffer = driver
        .create_vertex_buffer(PrimitiveType::TriangleFan, &fan)
        .expect("valid buffer");

    let write = StencilMode::new(StencilComparison::Always, StencilUpdateOperation::Replace, 1)
        .stencil_only();
    let masked = StencilMode::new(StencilComparison::Equal, StencilUpdateOperation::Keep, 1);

    let mut target = RenderTarget::new(&driver);
    target.clear_with_stencil(Color::BLACK, 0);
    target.draw_buffer(&buffer, &RenderStates::DEFAULT.with_stencil_mode(write));
    target.draw(&Shape::circle(24.0, 16), &RenderStates::DEFAULT.with_stencil_mode(masked));
    target.clear_stencil(0);
    target.draw_buffer_range(&buffer, 0, 3, &RenderStates::DEFAULT);

    assert_eq!(driver.recorded_draws(), 3);

    let output = driver.create_render_texture();
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());
    let mut encoder = driver.device().create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    driver.encode(&mut encoder, &view);
    driver.queue().submit(Some(encoder.finish()));

    assert_eq!(driver.recorded_draws(), 0);
}

#[test]
#[ignore] // Requires GPU
fn test_frame_records_and_encodes() {
    let Some(driver) = driver() else { return };
    let texture = driver.create_texture(Size::new(1, 1), &[255; 4]).expect("valid texture");

    let mut target = RenderTarget::new(&driver);
    target.clear(Color::BLUE);
    target.draw(&Shape::circle(16.0, 24), &RenderStates::DEFAULT);
    let mut sprite = Sprite::new(texture);
    sprite.set_position(Vec2::new(8.0, 8.0));
    target.draw(&sprite, &RenderStates::DEFAULT);

    assert_eq!(driver.recorded_draws(), 2);
    // Fans are drawn as lists and sprites as strips.
    assert_eq!(driver.pipeline_count(), 2);

    let output = driver.create_render_texture();
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());
    let mut encoder = driver.device().create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    driver.encode(&mut encoder, &view);
    driver.queue().submit(Some(encoder.finish()));

    assert_eq!(driver.recorded_draws(), 0);
}
