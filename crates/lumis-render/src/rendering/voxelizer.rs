//! mesh 体素化
//!
//! 一次性的同步提交：借助 MSAA 光栅化（无 attachment 的空 render pass），
//! fragment shader 把覆盖到的体素原子地追加进 storage arena 的一段分配，
//! fence + device idle 之后 CPU 直接从 mapped 内存读回。这是刻意为之的
//! 一次性停顿，不会出现在逐帧路径上。

use ash::vk;
use glam::UVec2;
use lumis_gfx::render_pass::{GfxFramebuffer, GfxRenderPass};

use crate::binding::SetBindingList;
use crate::containers::mesh_container::MeshId;
use crate::engine::GraphicsEngine;
use crate::error::RenderError;
use crate::pipelines::shader_catalog::ShaderId;
use crate::pipelines::state::{PipelineStateDesc, VertexLayoutId};

/// 体素输出的容量：values[0].x 是计数，体素从 values[1] 开始
const MAX_VOXELS: usize = 256 * 1024;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct VoxelizerUbo {
    resolution: u32,
    _padding: [u32; 3],
}

/// 将 mesh 光栅化到 (1 << octree_level)^3 的体素网格
///
/// 返回 (morton 编码的体素坐标, 体素 payload) 列表
pub fn voxelize_mesh(
    engine: &GraphicsEngine,
    mesh_id: MeshId,
    octree_level: u32,
) -> Result<Vec<UVec2>, RenderError> {
    let resolution = 1u32 << octree_level;

    let empty_pass = GfxRenderPass::new_empty(&engine.gfx, "voxelizer-empty-pass");
    let framebuffer = GfxFramebuffer::new_empty(
        &engine.gfx,
        &empty_pass,
        vk::Extent2D {
            width: resolution,
            height: resolution,
        },
        "voxelizer-framebuffer",
    );

    let mut desc = PipelineStateDesc::graphics(ShaderId::Voxelizer, engine.layouts.standard.handle, empty_pass.handle(), 0);
    desc.vertex_layout(VertexLayoutId::Pos3Nrm3)
        .cull(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
        .depth(false, false)
        .color_attachments(0)
        .samples(vk::SampleCountFlags::TYPE_8);
    let pipeline = engine.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = engine.heap.alloc_uniform::<VoxelizerUbo>()?;
    *ubo = VoxelizerUbo {
        resolution,
        _padding: [0; 3],
    };

    let mut voxels = engine.heap.alloc_storage::<UVec2>(MAX_VOXELS)?;
    voxels.fill(UVec2::ZERO);
    engine.heap.flush_frame();

    let mesh = engine.meshes.get(mesh_id);
    engine.gfx.one_time_exec(
        |cmd| {
            let begin_info = vk::RenderPassBeginInfo::default()
                .render_pass(empty_pass.handle())
                .framebuffer(framebuffer.handle())
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent: framebuffer.extent(),
                });
            cmd.cmd_begin_render_pass(&begin_info);
            cmd.cmd_set_viewport(
                0,
                &[vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: resolution as f32,
                    height: resolution as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                }],
            );
            cmd.cmd_set_scissor(
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent: framebuffer.extent(),
                }],
            );

            SetBindingList::new()
                .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
                .dynamic(1, voxels.set, voxels.offset, Some(voxels.generation))
                .bind(cmd, vk::PipelineBindPoint::GRAPHICS, &engine.layouts.standard, &engine.heap);

            cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
            cmd.cmd_bind_vertex_buffer(0, mesh.buffer.vk_buffer(), 0);
            cmd.cmd_bind_index_buffer(mesh.buffer.vk_buffer(), mesh.index_offset, vk::IndexType::UINT32);
            cmd.cmd_draw_indexed(mesh.index_count, 1, 0);

            cmd.cmd_end_render_pass();
        },
        "voxelize-mesh",
    );

    // fence 已经等过了，device idle 再兜底一次，之后 CPU 读回才是安全的
    engine.gfx.wait_idle();
    engine.heap.invalidate_storage(voxels.offset, (MAX_VOXELS * size_of::<UVec2>()) as vk::DeviceSize);

    let count = voxels[0].x as usize;
    assert!(count < MAX_VOXELS, "voxelizer output overflowed its storage allocation");
    let result = voxels[1..=count].to_vec();

    log::info!("voxelized mesh at level {} -> {} voxels", octree_level, result.len());
    Ok(result)
}
