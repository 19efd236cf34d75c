//! 稀疏体素化
//!
//! 初始化时把 mesh 体素化一次（同步提交 + 读回），之后每帧把非空体素
//! 画成小立方体。octree 的构建算法本身不在引擎范围内，这里只保留
//! 体素化的提交模式和结果的可视化。

use glam::{Mat4, UVec2, Vec3, Vec4};

use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_render::containers::mesh_container::MeshId;
use lumis_render::engine::GraphicsEngine;
use lumis_render::error::RenderError;
use lumis_render::rendering::mesh_renderer::draw_mesh;
use lumis_render::rendering::voxelizer::voxelize_mesh;
use lumis_render::settings::FrameData;

use crate::Scene;
use crate::camera::OrbitCamera;
use crate::scenes::pbr::cube_mesh_pnu;

const OCTREE_LEVEL: u32 = 5;
/// 单帧的 uniform arena 有限，体素数量超出时只画前面这些
const MAX_DRAWN_VOXELS: usize = 8192;

/// 体素坐标打包：x | y << 10 | z << 20
fn unpack_voxel(voxel: UVec2) -> Vec3 {
    Vec3::new(
        (voxel.x & 0x3ff) as f32,
        ((voxel.x >> 10) & 0x3ff) as f32,
        ((voxel.x >> 20) & 0x3ff) as f32,
    )
}

pub struct OctreeScene {
    camera: OrbitCamera,
    voxel_cube: Option<MeshId>,
    voxels: Vec<UVec2>,
}

impl OctreeScene {
    pub fn new() -> Self {
        Self {
            camera: OrbitCamera::new(Vec3::splat(0.5), 2.5),
            voxel_cube: None,
            voxels: vec![],
        }
    }
}

impl Scene for OctreeScene {
    fn title(&self) -> &str {
        "lumis-octree"
    }

    fn init(&mut self, engine: &mut GraphicsEngine) {
        let (vertices, indices) = cube_mesh_pnu(0.4);
        let mesh = engine.meshes.create_mesh(&engine.gfx, &vertices, &indices);

        let (cube_vertices, cube_indices) = cube_mesh_pnu(0.5);
        self.voxel_cube = Some(engine.meshes.create_mesh(&engine.gfx, &cube_vertices, &cube_indices));

        // 一次性的同步体素化，带 fence + device idle 的读回
        match voxelize_mesh(engine, mesh, OCTREE_LEVEL) {
            Ok(voxels) => {
                log::info!("octree scene got {} voxels", voxels.len());
                self.voxels = voxels;
            }
            Err(e) => {
                log::error!("voxelization failed: {e}");
            }
        }
        if self.voxels.len() > MAX_DRAWN_VOXELS {
            log::warn!("drawing only {} of {} voxels", MAX_DRAWN_VOXELS, self.voxels.len());
            self.voxels.truncate(MAX_DRAWN_VOXELS);
        }
    }

    fn update(&mut self, frame_data: &FrameData) {
        if frame_data.mouse.left {
            self.camera.handle_drag(frame_data.mouse.xy - frame_data.mouse.prev_xy);
        } else {
            self.camera.yaw += 0.002;
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

        let resolution = (1u32 << OCTREE_LEVEL) as f32;
        let voxel_size = 1.0 / resolution;
        for voxel in &self.voxels {
            let position = unpack_voxel(*voxel) * voxel_size;
            let model = Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(voxel_size));
            draw_mesh(&ctx, self.voxel_cube.unwrap(), model, Vec4::new(0.8, 0.6, 0.3, 1.0))?;
        }

        engine.frame.end_main_pass(cmd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voxel_coords_unpack() {
        let packed = UVec2::new(3 | (5 << 10) | (7 << 20), 0);
        assert_eq!(unpack_voxel(packed), Vec3::new(3.0, 5.0, 7.0));
    }
}
