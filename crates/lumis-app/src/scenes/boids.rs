//! boids 群体模拟
//!
//! 模拟在 CPU 上做（SoA 布局），渲染走 instanced 纯色方块：
//! 所有实例数据每帧 restage 一遍，这正是线性堆的设计用途。

use glam::{Vec2, Vec4, vec2};
use rand::Rng;

use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_render::engine::GraphicsEngine;
use lumis_render::error::RenderError;
use lumis_render::rendering::box_renderer::draw_solid_boxes;
use lumis_render::settings::FrameData;

use crate::Scene;

const BOID_COUNT: usize = 1024;
const BOID_SIZE: f32 = 6.0;
const MAX_SPEED: f32 = 180.0;
const NEIGHBOR_RADIUS: f32 = 60.0;
const SEPARATION_RADIUS: f32 = 18.0;

pub struct BoidsScene {
    xs: Vec<f32>,
    ys: Vec<f32>,
    velocities: Vec<Vec2>,
    colors: Vec<Vec4>,

    bounds: Vec2,
}

impl BoidsScene {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let bounds = vec2(1200.0, 800.0);

        let mut xs = Vec::with_capacity(BOID_COUNT);
        let mut ys = Vec::with_capacity(BOID_COUNT);
        let mut velocities = Vec::with_capacity(BOID_COUNT);
        let mut colors = Vec::with_capacity(BOID_COUNT);
        for _ in 0..BOID_COUNT {
            xs.push(rng.gen_range(0.0..bounds.x));
            ys.push(rng.gen_range(0.0..bounds.y));
            velocities.push(vec2(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)).normalize_or_zero() * MAX_SPEED);
            colors.push(Vec4::new(0.4 + rng.r#gen::<f32>() * 0.6, 0.6, 1.0 - rng.r#gen::<f32>() * 0.4, 1.0));
        }

        Self {
            xs,
            ys,
            velocities,
            colors,
            bounds,
        }
    }

    /// 经典三规则：聚集、对齐、分离；边界环绕
    fn step(&mut self, dt: f32) {
        let positions = self.xs.iter().zip(self.ys.iter()).map(|(x, y)| vec2(*x, *y)).collect::<Vec<_>>();

        for i in 0..positions.len() {
            let mut center = Vec2::ZERO;
            let mut heading = Vec2::ZERO;
            let mut separation = Vec2::ZERO;
            let mut neighbors = 0.0;

            for j in 0..positions.len() {
                if i == j {
                    continue;
                }
                let offset = positions[j] - positions[i];
                let dist = offset.length();
                if dist < NEIGHBOR_RADIUS {
                    center += positions[j];
                    heading += self.velocities[j];
                    neighbors += 1.0;
                    if dist < SEPARATION_RADIUS && dist > 0.0 {
                        separation -= offset / dist;
                    }
                }
            }

            let mut accel = separation * 60.0;
            if neighbors > 0.0 {
                accel += (center / neighbors - positions[i]) * 1.2;
                accel += (heading / neighbors - self.velocities[i]) * 0.8;
            }

            let velocity = (self.velocities[i] + accel * dt).clamp_length_max(MAX_SPEED);
            self.velocities[i] = velocity;
            self.xs[i] = (self.xs[i] + velocity.x * dt).rem_euclid(self.bounds.x);
            self.ys[i] = (self.ys[i] + velocity.y * dt).rem_euclid(self.bounds.y);
        }
    }
}

impl Scene for BoidsScene {
    fn title(&self) -> &str {
        "lumis-boids"
    }

    fn init(&mut self, _engine: &mut GraphicsEngine) {}

    fn update(&mut self, frame_data: &FrameData) {
        self.bounds = vec2(frame_data.width as f32, frame_data.height as f32);
        self.step(1.0 / 60.0);
    }

    fn render(
        &mut self,
        engine: &GraphicsEngine,
        cmd: &GfxCommandBuffer,
        _frame_data: &FrameData,
    ) -> Result<(), RenderError> {
        engine.frame.begin_main_pass(cmd);

        let ctx = engine.render_ctx(cmd, glam::Mat4::IDENTITY, glam::Mat4::IDENTITY);
        draw_solid_boxes(&ctx, &self.xs, &self.ys, &self.colors, vec2(BOID_SIZE, BOID_SIZE), false)?;

        engine.frame.end_main_pass(cmd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boids_stay_inside_bounds() {
        let mut scene = BoidsScene::new();
        for _ in 0..30 {
            scene.step(1.0 / 60.0);
        }
        for (x, y) in scene.xs.iter().zip(scene.ys.iter()) {
            assert!(*x >= 0.0 && *x < scene.bounds.x);
            assert!(*y >= 0.0 && *y < scene.bounds.y);
        }
    }

    #[test]
    fn speed_is_clamped() {
        let mut scene = BoidsScene::new();
        for _ in 0..30 {
            scene.step(1.0 / 60.0);
        }
        for velocity in &scene.velocities {
            assert!(velocity.length() <= MAX_SPEED + 1e-3);
        }
    }
}
