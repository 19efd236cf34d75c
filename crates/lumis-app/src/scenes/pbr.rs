//! glTF PBR 渲染路径的演示
//!
//! glTF 导入不在引擎范围内，场景用程序生成的 mesh 和纹理
//! 走完 PBR 的提交路径（metallic-roughness 材质、bindless 纹理索引）。

use glam::{Mat4, Vec4};

use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_render::containers::mesh_container::MeshId;
use lumis_render::engine::GraphicsEngine;
use lumis_render::error::RenderError;
use lumis_render::rendering::mesh_renderer::{PbrMaterial, draw_pbr_mesh};
use lumis_render::settings::FrameData;

use crate::Scene;
use crate::camera::OrbitCamera;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VertexPnu {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// 立方体：每面 4 个顶点（法线、uv 独立）
pub fn cube_mesh_pnu(half: f32) -> (Vec<VertexPnu>, Vec<u32>) {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = vec![];
    let mut indices = vec![];
    for (normal, tangent, bitangent) in faces {
        let n = glam::Vec3::from(normal);
        let t = glam::Vec3::from(tangent);
        let b = glam::Vec3::from(bitangent);
        let base = vertices.len() as u32;
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let position = (n + t * (u * 2.0 - 1.0) + b * (v * 2.0 - 1.0)) * half;
            vertices.push(VertexPnu {
                position: position.to_array(),
                normal,
                uv: [u, v],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    (vertices, indices)
}

fn uv_grid_pixels(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let edge = x % 16 == 0 || y % 16 == 0;
            pixels.extend_from_slice(if edge { &[40, 40, 40, 255] } else { &[200, 120, 80, 255] });
        }
    }
    pixels
}

pub struct PbrScene {
    camera: OrbitCamera,
    mesh: Option<MeshId>,
    material: Option<PbrMaterial>,
}

impl PbrScene {
    pub fn new() -> Self {
        Self {
            camera: OrbitCamera::new(glam::Vec3::ZERO, 5.0),
            mesh: None,
            material: None,
        }
    }
}

impl Scene for PbrScene {
    fn title(&self) -> &str {
        "lumis-pbr"
    }

    fn init(&mut self, engine: &mut GraphicsEngine) {
        let (vertices, indices) = cube_mesh_pnu(1.0);
        self.mesh = Some(engine.meshes.create_mesh(&engine.gfx, &vertices, &indices));

        let texture = engine.textures.create_texture_2d(
            &engine.gfx,
            ash::vk::Extent2D { width: 256, height: 256 },
            &uv_grid_pixels(256),
            "pbr-base-color",
        );
        engine.textures.setup_descriptor_sets(&engine.gfx);

        self.material = Some(PbrMaterial {
            base_color_factor: Vec4::ONE,
            metallic_factor: 0.1,
            roughness_factor: 0.7,
            base_color_texture: texture,
        });
    }

    fn update(&mut self, frame_data: &FrameData) {
        if frame_data.mouse.left {
            self.camera.handle_drag(frame_data.mouse.xy - frame_data.mouse.prev_xy);
        } else {
            self.camera.yaw += 0.003;
        }
    }

    fn render(
        &mut self,
        engine: &GraphicsEngine,
        cmd: &GfxCommandBuffer,
        frame_data: &FrameData,
    ) -> Result<(), RenderError> {
        let aspect = frame_data.width as f32 / frame_data.height.max(1) as f32;

        engine.frame.begin_main_pass(cmd);
        let ctx = engine.render_ctx(cmd, self.camera.projection(aspect), self.camera.view());

        draw_pbr_mesh(
            &ctx,
            self.mesh.unwrap(),
            Mat4::IDENTITY,
            self.material.as_ref().unwrap(),
            self.camera.position(),
        )?;

        engine.frame.end_main_pass(cmd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_mesh_has_six_faces() {
        let (vertices, indices) = cube_mesh_pnu(1.0);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);

        // 顶点都在立方体表面上
        for vertex in &vertices {
            let max_coord = vertex.position.iter().map(|c| c.abs()).fold(0.0f32, f32::max);
            assert!((max_coord - 1.0).abs() < 1e-6);
        }
    }
}
