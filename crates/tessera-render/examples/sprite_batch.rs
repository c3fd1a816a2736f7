//! Sprite Batch - headless batching demo
//!
//! Scatters a few thousand sprites over four textures and renders them three
//! ways: immediately, batched in submission order and batched sorted by
//! texture. Prints the draw calls and state changes each approach needed.
//!
//! Runs against the recording MockDriver, so no GPU is required.

use std::sync::Arc;

use glam::Vec2;
use rand::Rng;
use tessera_core::geometry::{Rect, Size};
use tessera_core::config::{Config, ProfilingMode};
use tessera_core::profiling::GlobalProfiler;
use tessera_render::mock::MockDriver;
use tessera_render::{
    BatchMode, Batcher, Color, RenderStates, RenderTarget, Sprite, TextureHandle,
};

const SPRITE_COUNT: usize = 4000;

fn main() {
    Config {
        profiling: ProfilingMode::On,
        ..Config::default()
    }
    .apply();

    let textures: Vec<TextureHandle> = (0..4)
        .map(|slot| TextureHandle::new(slot, Size::new(64, 64)))
        .collect();

    let mut rng = rand::rng();
    let sprites: Vec<Sprite> = (0..SPRITE_COUNT)
        .map(|_| {
            let texture = textures[rng.random_range(0..textures.len())];
            let mut sprite = Sprite::with_rect(texture, Rect::new(0.0, 0.0, 32.0, 32.0));
            sprite.set_position(Vec2::new(rng.random_range(0.0..1280.0), rng.random_range(0.0..720.0)));
            sprite.set_rotation(rng.random_range(0.0..360.0));
            sprite.set_color(Color::rgba(255, 255, 255, rng.random_range(128..=255)));
            sprite
        })
        .collect();

    // Immediate mode
    let driver = Arc::new(MockDriver::new(Size::new(1280, 720)));
    let mut target = RenderTarget::new(driver.clone());
    target.clear(Color::BLACK);
    for sprite in &sprites {
        target.draw(sprite, &RenderStates::DEFAULT);
    }
    let stats = target.stats();
    tracing::info!(
        draw_calls = stats.draw_calls,
        texture_binds = stats.texture_binds,
        transform_loads = stats.transform_loads,
        "Immediate"
    );
    GlobalProfiler::lock().new_frame();

    for mode in [BatchMode::Deferred, BatchMode::TextureSort] {
        let driver = Arc::new(MockDriver::new(Size::new(1280, 720)));
        let mut target = RenderTarget::new(driver.clone());
        let mut batcher = Batcher::new(mode);

        target.clear(Color::BLACK);
        for sprite in &sprites {
            batcher.batch(sprite, 0.0);
        }
        let flushed = batcher.flush(&mut target, &RenderStates::DEFAULT);

        tracing::info!(
            %mode,
            entries = flushed.entries,
            draw_calls = flushed.draw_calls,
            vertices = flushed.vertices,
            texture_binds = target.stats().texture_binds,
            "Batched"
        );
        GlobalProfiler::lock().new_frame();
    }
}
