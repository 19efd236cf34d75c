//! 2D 街机：玩家、子弹、外星人
//!
//! 全部状态都在 CPU（SoA 布局），渲染只用两种例程：
//! instanced 纯色方块 + 带纹理的玩家方块。

use glam::{Vec2, Vec4, vec2};

use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_render::containers::texture_container::TextureId;
use lumis_render::engine::GraphicsEngine;
use lumis_render::error::RenderError;
use lumis_render::rendering::box_renderer::{draw_solid_boxes, draw_textured_box};
use lumis_render::settings::FrameData;

use crate::Scene;

const SPRITE_SIZE: f32 = 24.0;
const ALIEN_ROWS: u32 = 6;
const ALIEN_COLS: u32 = 12;
const MAX_BULLETS: usize = 1000;

const DT: f32 = 1.0 / 60.0;

struct Player {
    position: Vec2,
    speed: f32,
    since_last_fire: f32,
    weapon_cooldown: f32,
}

#[derive(Default)]
struct Bullets {
    xs: Vec<f32>,
    ys: Vec<f32>,
}

struct Aliens {
    xs: Vec<f32>,
    ys: Vec<f32>,
    colors: Vec<Vec4>,
    speed: f32,
    direction: f32,
}

pub struct InvadersScene {
    player: Player,
    bullets: Bullets,
    aliens: Aliens,
    player_texture: Option<TextureId>,
    screen: Vec2,
}

impl InvadersScene {
    pub fn new() -> Self {
        let mut aliens = Aliens {
            xs: vec![],
            ys: vec![],
            colors: vec![],
            speed: 40.0,
            direction: 1.0,
        };
        for row in 0..ALIEN_ROWS {
            for col in 0..ALIEN_COLS {
                aliens.xs.push(60.0 + col as f32 * (SPRITE_SIZE + 12.0));
                aliens.ys.push(500.0 + row as f32 * (SPRITE_SIZE + 12.0));
                aliens.colors.push(Vec4::new(0.3, 1.0, 0.4 + 0.1 * (row as f32 % 3.0), 1.0));
            }
        }

        Self {
            player: Player {
                position: vec2(600.0, 40.0),
                speed: 300.0,
                since_last_fire: 0.0,
                weapon_cooldown: 0.25,
            },
            bullets: Bullets::default(),
            aliens,
            player_texture: None,
            screen: vec2(1200.0, 800.0),
        }
    }

    fn fire_bullet(&mut self) {
        if self.bullets.xs.len() >= MAX_BULLETS {
            return;
        }
        self.bullets.xs.push(self.player.position.x + SPRITE_SIZE * 0.5 - 2.0);
        self.bullets.ys.push(self.player.position.y + SPRITE_SIZE);
    }

    /// 子弹前进并与外星人做 AABB 碰撞，命中双方一起移除
    fn step_bullets(&mut self) {
        let mut bullet = 0;
        while bullet < self.bullets.xs.len() {
            self.bullets.ys[bullet] += 500.0 * DT;

            let bx = self.bullets.xs[bullet];
            let by = self.bullets.ys[bullet];
            let hit_alien = (0..self.aliens.xs.len()).find(|i| {
                bx < self.aliens.xs[*i] + SPRITE_SIZE
                    && bx + 4.0 > self.aliens.xs[*i]
                    && by < self.aliens.ys[*i] + SPRITE_SIZE
                    && by + 8.0 > self.aliens.ys[*i]
            });

            if let Some(alien) = hit_alien {
                self.aliens.xs.swap_remove(alien);
                self.aliens.ys.swap_remove(alien);
                self.aliens.colors.swap_remove(alien);
            }

            if hit_alien.is_some() || by > self.screen.y {
                self.bullets.xs.swap_remove(bullet);
                self.bullets.ys.swap_remove(bullet);
            } else {
                bullet += 1;
            }
        }
    }

    fn step_aliens(&mut self) {
        let step = self.aliens.speed * self.aliens.direction * DT;
        let hit_edge = self
            .aliens
            .xs
            .iter()
            .any(|x| x + step < 0.0 || x + step + SPRITE_SIZE > self.screen.x);

        if hit_edge {
            self.aliens.direction = -self.aliens.direction;
            for y in self.aliens.ys.iter_mut() {
                *y -= SPRITE_SIZE;
            }
        } else {
            for x in self.aliens.xs.iter_mut() {
                *x += step;
            }
        }
    }
}

/// 玩家贴图：程序生成的棋盘格（asset 导入不在引擎范围内）
fn checkerboard_pixels(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let on = (x / 4 + y / 4) % 2 == 0;
            pixels.extend_from_slice(if on { &[230, 230, 60, 255] } else { &[40, 40, 40, 255] });
        }
    }
    pixels
}

impl Scene for InvadersScene {
    fn title(&self) -> &str {
        "lumis-invaders"
    }

    fn init(&mut self, engine: &mut GraphicsEngine) {
        let texture = engine.textures.create_texture_2d(
            &engine.gfx,
            ash::vk::Extent2D { width: 32, height: 32 },
            &checkerboard_pixels(32),
            "player-sprite",
        );
        engine.textures.setup_descriptor_sets(&engine.gfx);
        self.player_texture = Some(texture);
    }

    fn update(&mut self, frame_data: &FrameData) {
        self.screen = vec2(frame_data.width as f32, frame_data.height as f32);

        // 玩家移动，按边界 clamp
        let player = &mut self.player;
        player.position.x -= frame_data.keys.left as u32 as f32 * player.speed * DT;
        player.position.x += frame_data.keys.right as u32 as f32 * player.speed * DT;
        player.position.x = player.position.x.clamp(0.0, self.screen.x - SPRITE_SIZE);

        player.since_last_fire += DT;
        if frame_data.keys.space && player.since_last_fire > player.weapon_cooldown {
            player.since_last_fire = 0.0;
            self.fire_bullet();
        }

        self.step_bullets();
        self.step_aliens();
    }

    fn render(
        &mut self,
        engine: &GraphicsEngine,
        cmd: &GfxCommandBuffer,
        _frame_data: &FrameData,
    ) -> Result<(), RenderError> {
        engine.frame.begin_main_pass(cmd);
        let ctx = engine.render_ctx(cmd, glam::Mat4::IDENTITY, glam::Mat4::IDENTITY);

        if !self.aliens.xs.is_empty() {
            draw_solid_boxes(
                &ctx,
                &self.aliens.xs,
                &self.aliens.ys,
                &self.aliens.colors,
                vec2(SPRITE_SIZE, SPRITE_SIZE),
                false,
            )?;
        }
        if !self.bullets.xs.is_empty() {
            draw_solid_boxes(
                &ctx,
                &self.bullets.xs,
                &self.bullets.ys,
                &[Vec4::new(1.0, 0.9, 0.3, 1.0)],
                vec2(4.0, 8.0),
                true,
            )?;
        }
        draw_textured_box(
            &ctx,
            Vec4::new(self.player.position.x, self.player.position.y, SPRITE_SIZE, SPRITE_SIZE),
            self.player_texture.unwrap(),
        )?;

        engine.frame.end_main_pass(cmd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullet_removes_alien_on_hit() {
        let mut scene = InvadersScene::new();
        let alien_count = scene.aliens.xs.len();

        // 把一颗子弹放在第一个外星人正下方
        scene.bullets.xs.push(scene.aliens.xs[0] + SPRITE_SIZE * 0.5);
        scene.bullets.ys.push(scene.aliens.ys[0] - 4.0);
        scene.step_bullets();

        assert_eq!(scene.aliens.xs.len(), alien_count - 1);
        assert!(scene.bullets.xs.is_empty());
    }

    #[test]
    fn aliens_drop_and_reverse_at_edge() {
        let mut scene = InvadersScene::new();
        scene.aliens.xs = vec![scene.screen.x - SPRITE_SIZE];
        scene.aliens.ys = vec![400.0];
        scene.aliens.colors = vec![Vec4::ONE];
        scene.aliens.direction = 1.0;

        scene.step_aliens();

        assert_eq!(scene.aliens.direction, -1.0);
        assert_eq!(scene.aliens.ys[0], 400.0 - SPRITE_SIZE);
    }
}
