//! Render target behavior observed through the recording driver.

use std::sync::Arc;

use glam::{IVec2, Vec2};
use tessera_core::geometry::{Rect, Size};
use tessera_render::mock::{DriverCall, MockDriver};
use tessera_render::{
    BlendMode, Color, CoordinateType, GeometryBuffer, PrimitiveType, RenderStates, RenderStats,
    RenderTarget, Shape, StencilComparison, StencilMode, StencilUpdateOperation, TargetState,
    TextureHandle, Transform, VERTEX_CACHE_SIZE, Vertex, VertexBufferHandle, View,
};

fn fan(count: usize) -> GeometryBuffer {
    let vertices = (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Vertex::colored(Vec2::new(angle.cos(), angle.sin()) * 10.0, Color::RED)
        })
        .collect();
    GeometryBuffer::from_vertices(PrimitiveType::TriangleFan, vertices)
}

fn assert_close(a: Vec2, b: Vec2) {
    assert!((a - b).length() < 1e-3, "{a} != {b}");
}

#[test]
fn test_identical_states_issue_no_state_changes() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());

    let texture = TextureHandle::new(0, Size::new(16, 16));
    let states = RenderStates::DEFAULT
        .with_transform(Transform::from_translation(Vec2::new(5.0, 5.0)))
        .with_blend_mode(BlendMode::Add)
        .with_texture(texture);
    let geometry = fan(8);

    target.draw(&geometry, &states);
    driver.clear_calls();

    target.draw(&geometry, &states);
    let calls = driver.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], DriverCall::Draw(_)));
}

#[test]
fn test_vertex_cache_boundary_preserves_world_positions() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());
    let transform = Transform::IDENTITY
        .translate(Vec2::new(100.0, 50.0))
        .rotate(30.0)
        .scale(Vec2::splat(2.0));
    let states = RenderStates::from(transform);

    for count in [VERTEX_CACHE_SIZE, VERTEX_CACHE_SIZE + 1] {
        let geometry = fan(count);
        target.draw(&geometry, &states);

        let draws = driver.draws();
        let draw = draws.last().expect("one draw per submission");
        let expected: Vec<Vec2> = geometry
            .vertices()
            .iter()
            .map(|v| transform.transform_point(v.position))
            .collect();

        for (actual, expected) in draw.world_positions().into_iter().zip(expected) {
            assert_close(actual, expected);
        }

        if count <= VERTEX_CACHE_SIZE {
            assert!(draw.transform.is_identity());
        } else {
            assert_eq!(draw.transform, transform);
        }
    }
}

#[test]
fn test_recycled_texture_slot_is_rebound() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());

    let first = TextureHandle::new(3, Size::new(8, 8));
    let recycled = TextureHandle::new(3, Size::new(8, 8));
    assert_ne!(first.id(), recycled.id());

    let geometry = fan(8);
    target.draw(&geometry, &first.into());
    target.draw(&geometry, &recycled.into());

    assert_eq!(driver.count_binds_of(&first), 1);
    assert_eq!(driver.count_binds_of(&recycled), 1);
    assert_eq!(driver.draws()[1].texture.map(|t| t.id()), Some(recycled.id()));
}

#[test]
fn test_empty_draw_touches_nothing() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());
    driver.clear_calls();

    target.draw(&GeometryBuffer::new(PrimitiveType::Triangles), &RenderStates::DEFAULT);
    target.draw_vertices(&[], PrimitiveType::Points, &BlendMode::Multiply.into());

    assert_eq!(driver.call_count(), 0);
    assert_eq!(target.stats().draw_calls, 0);
}

#[test]
fn test_pixel_mapping_round_trips_on_default_view() {
    let target = RenderTarget::new(MockDriver::new(Size::new(800, 600)));

    for pixel in [IVec2::new(0, 0), IVec2::new(799, 599), IVec2::new(123, 456), IVec2::new(400, 1)] {
        let coords = target.pixel_to_coords(pixel);
        assert_close(coords, pixel.as_vec2());
        assert_eq!(target.coords_to_pixel(coords), pixel);
    }
}

#[test]
fn test_pixel_mapping_round_trips_on_rotated_view() {
    let mut target = RenderTarget::new(MockDriver::new(Size::new(800, 600)));
    let mut view = View::new(Vec2::new(250.0, -40.0), Vec2::new(400.0, 300.0));
    view.set_rotation(33.0);
    view.set_viewport(Rect::new(0.25, 0.0, 0.5, 1.0));
    target.set_view(view);

    for pixel in [IVec2::new(200, 0), IVec2::new(599, 599), IVec2::new(321, 123)] {
        let back = target.coords_to_pixel(target.pixel_to_coords(pixel));
        assert!((back - pixel).abs().max_element() <= 1, "{pixel} -> {back}");
    }
}

#[test]
fn test_resize_keeps_custom_view() {
    let driver = Arc::new(MockDriver::new(Size::new(800, 600)));
    let mut target = RenderTarget::new(driver.clone());

    let custom = View::new(Vec2::ZERO, Vec2::new(100.0, 100.0));
    target.set_view(custom.clone());

    driver.set_target_size(Size::new(1024, 768));
    target.handle_resize();

    assert_eq!(target.view().size(), custom.size());
    assert_eq!(target.default_view().size(), Vec2::new(1024.0, 768.0));

    target.reset_view();
    driver.set_target_size(Size::new(320, 240));
    target.handle_resize();
    assert_eq!(target.view().size(), Vec2::new(320.0, 240.0));
}

#[test]
fn test_view_change_is_applied_on_next_draw() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());
    let shape = Shape::rectangle(Vec2::splat(10.0));

    target.draw(&shape, &RenderStates::DEFAULT);
    let loads = driver.count_projection_loads();

    target.draw(&shape, &RenderStates::DEFAULT);
    assert_eq!(driver.count_projection_loads(), loads);

    let mut view = target.view().clone();
    view.zoom(2.0);
    target.set_view(view);
    target.draw(&shape, &RenderStates::DEFAULT);

    assert_eq!(driver.count_projection_loads(), loads + 1);
    assert_eq!(driver.current_projection(), *target.view().transform());
}

#[test]
fn test_push_pop_states_restores_driver_state() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());
    let geometry = fan(8);
    let moved = RenderStates::from(Transform::from_translation(Vec2::new(7.0, 0.0)));

    target.draw(&geometry, &moved);
    target.push_states();
    target.draw(&geometry, &RenderStates::DEFAULT);
    target.pop_states();

    // The cache no longer trusts the restored state.
    assert!(!target.cache().is_enabled());

    driver.clear_calls();
    target.draw(&geometry, &moved);
    assert_eq!(driver.count_transform_loads(), 1);
}

#[test]
fn test_shared_context_between_targets() {
    let driver = Arc::new(MockDriver::default());
    let mut a = RenderTarget::new(driver.clone());
    let mut b = RenderTarget::new(driver.clone());
    let geometry = fan(8);
    let texture = TextureHandle::new(1, Size::new(2, 2));
    let states = RenderStates::from(texture);

    a.draw(&geometry, &states);
    b.draw(&geometry, &states);
    a.draw(&geometry, &states);

    assert!(a.is_active());
    assert!(!b.is_active());
    // Each switch forces the new owner to rebind.
    assert_eq!(driver.count_binds_of(&texture), 3);
}

#[test]
fn test_failed_activation_drops_clears_and_state_stack() {
    let driver = Arc::new(MockDriver::default());
    driver.set_fail_activation(true);
    let mut target = RenderTarget::new(driver.clone());
    let buffer = VertexBufferHandle::new(0, 6, PrimitiveType::Triangles);

    target.clear(Color::RED);
    target.clear_with_stencil(Color::RED, 1);
    target.push_states();
    target.pop_states();
    target.reset_states();
    target.draw_buffer(&buffer, &RenderStates::DEFAULT);

    let calls = driver.calls();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|call| matches!(call, DriverCall::Activate { .. })));
    assert_eq!(target.lifecycle(), TargetState::StatesNotYetSet);
    assert_eq!(*target.stats(), RenderStats::default());
}

#[test]
fn test_state_stack_keeps_lifecycle_once_set() {
    let mut target = RenderTarget::new(MockDriver::default());
    target.draw(&fan(8), &RenderStates::DEFAULT);
    assert_eq!(target.lifecycle(), TargetState::StatesSet);

    target.push_states();
    assert_eq!(target.lifecycle(), TargetState::StatesSet);
    target.pop_states();
    assert_eq!(target.lifecycle(), TargetState::StatesSet);

    target.push_states();
    target.push_states();
    target.pop_states();
    target.pop_states();
    assert_eq!(target.lifecycle(), TargetState::StatesSet);
}

#[test]
fn test_stencil_mode_applied_only_on_change() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());
    let geometry = fan(8);
    let write = StencilMode::new(StencilComparison::Always, StencilUpdateOperation::Replace, 1)
        .stencil_only();
    let test = StencilMode::new(StencilComparison::Equal, StencilUpdateOperation::Keep, 1);

    target.draw(&geometry, &RenderStates::DEFAULT);
    driver.clear_calls();

    target.draw(&geometry, &write.into());
    target.draw(&geometry, &write.into());
    target.draw(&geometry, &test.into());
    target.draw(&geometry, &RenderStates::DEFAULT);

    let stencil_calls: Vec<_> = driver
        .calls()
        .into_iter()
        .filter(|call| matches!(call, DriverCall::SetStencilMode(_)))
        .collect();
    assert_eq!(
        stencil_calls,
        vec![
            DriverCall::SetStencilMode(Some(write)),
            DriverCall::SetStencilMode(Some(test)),
            DriverCall::SetStencilMode(None),
        ]
    );

    let draws = driver.draws();
    assert_eq!(draws[1].stencil_mode, Some(write));
    assert_eq!(draws[3].stencil_mode, None);
}

#[test]
fn test_stencil_clears() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());

    target.clear_stencil(3);
    target.clear_with_stencil(Color::BLACK, 0);

    assert_eq!(driver.count_stencil_clears(), 2);
    assert_eq!(driver.count_clears(), 1);
    assert_eq!(target.stats().stencil_clears, 2);
    assert!(driver.calls().contains(&DriverCall::ClearStencil(3)));
}

#[test]
fn test_coordinate_type_change_rebinds_texture() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());
    let texture = TextureHandle::new(0, Size::new(16, 16));
    let geometry = fan(8);
    let normalized = RenderStates::from(texture);
    let pixels = normalized.with_coordinate_type(CoordinateType::Pixels);

    target.draw(&geometry, &normalized);
    target.draw(&geometry, &normalized);
    target.draw(&geometry, &pixels);

    assert_eq!(driver.count_binds_of(&texture), 2);
    assert!(driver
        .calls()
        .contains(&DriverCall::BindTexture(Some(texture), CoordinateType::Pixels)));
    assert_eq!(driver.draws()[2].coordinate_type, CoordinateType::Pixels);
}

#[test]
fn test_buffer_range_draw_goes_through_cache() {
    let driver = Arc::new(MockDriver::default());
    let mut target = RenderTarget::new(driver.clone());
    let buffer = VertexBufferHandle::new(2, 12, PrimitiveType::Triangles);
    let moved = RenderStates::from(Transform::from_translation(Vec2::new(3.0, 0.0)));

    // Three vertices would fit the vertex cache, but buffers are never pre-transformed.
    target.draw_buffer_range(&buffer, 9, 100, &moved);
    target.draw_buffer_range(&buffer, 12, 1, &moved);
    target.draw_buffer_range(&buffer, 0, 0, &moved);

    let draws = driver.buffer_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].range, 9..12);
    assert_eq!(draws[0].transform, moved.transform);
    assert!(!target.cache().uses_vertex_cache());

    driver.clear_calls();
    target.draw_buffer(&buffer, &moved);
    let calls = driver.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(&calls[0], DriverCall::DrawBuffer(draw) if draw.range == (0..12)));
}
