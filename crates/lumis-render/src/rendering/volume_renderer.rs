//! volume rendering 的三个 pass
//!
//! front/back MRT 记录视线进出包围盒的位置，raymarch pass 读它们
//! 和 3D 纹理做积分，最后 denoise pass 输出到 present pass。

use ash::vk;
use glam::{Mat4, Vec3, Vec4};

use crate::binding::SetBindingList;
use crate::containers::texture_container::TextureId;
use crate::error::RenderError;
use crate::pipelines::shader_catalog::ShaderId;
use crate::pipelines::state::{PipelineStateDesc, VertexLayoutId};
use crate::rendering::{RenderContext, TextureIndices, push_texture_indices};

/// volume 数据集的包围盒与标量范围
#[derive(Clone, Copy)]
pub struct VolumeInfo {
    pub corner: Vec3,
    pub size: Vec3,
    /// 标量场的最小/最大值
    pub min: f32,
    pub max: f32,
    pub texture: TextureId,
}

impl VolumeInfo {
    pub fn box_to_world(&self) -> Mat4 {
        Mat4::from_translation(self.corner) * Mat4::from_scale(self.size)
    }

    pub fn world_to_box(&self) -> Mat4 {
        self.box_to_world().inverse()
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FrontAndBackUbo {
    mvp: Mat4,
    world_to_box: Mat4,
}

/// 包围盒的 36 个索引（两面各两个三角形）
const CUBE_INDICES: [u32; 36] = [
    0, 1, 2, 2, 3, 0, // -z
    4, 6, 5, 6, 4, 7, // +z
    0, 4, 1, 4, 5, 1, // -y
    2, 6, 3, 6, 7, 3, // +y
    0, 3, 7, 7, 4, 0, // -x
    1, 5, 6, 6, 2, 1, // +x
];

/// 把包围盒的正反面写进两个 color attachment（offscreen MRT pass）
pub fn draw_front_and_back(ctx: &RenderContext, volume: &VolumeInfo) -> Result<(), RenderError> {
    let mut desc =
        PipelineStateDesc::graphics(ShaderId::FrontAndBack, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.vertex_layout(VertexLayoutId::Pos3)
        .cull(vk::CullModeFlags::NONE, vk::FrontFace::CLOCKWISE)
        .depth(false, false)
        .color_attachments(2);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<FrontAndBackUbo>()?;
    *ubo = FrontAndBackUbo {
        mvp: ctx.projection * ctx.view,
        world_to_box: volume.world_to_box(),
    };

    // 包围盒顶点逐帧 stage，和原始数据一样走通用 arena
    let corner = volume.corner;
    let size = volume.size;
    let mut vertices = ctx.heap.alloc_buffer::<[f32; 3]>(8)?;
    vertices.copy_from_slice(&[
        [corner.x, corner.y, corner.z],
        [corner.x + size.x, corner.y, corner.z],
        [corner.x + size.x, corner.y + size.y, corner.z],
        [corner.x, corner.y + size.y, corner.z],
        [corner.x, corner.y, corner.z + size.z],
        [corner.x + size.x, corner.y, corner.z + size.z],
        [corner.x + size.x, corner.y + size.y, corner.z + size.z],
        [corner.x, corner.y + size.y, corner.z + size.z],
    ]);

    let mut indices = ctx.heap.alloc_buffer::<u32>(CUBE_INDICES.len())?;
    indices.copy_from_slice(&CUBE_INDICES);

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.standard, ctx.heap);

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_bind_vertex_buffer(0, vertices.buffer, vertices.offset);
    ctx.cmd.cmd_bind_index_buffer(indices.buffer, indices.offset, vk::IndexType::UINT32);
    ctx.cmd.cmd_draw_indexed(CUBE_INDICES.len() as u32, 1, 0);

    Ok(())
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct VolumeUbo {
    color: Vec4,
    /// (min, max, iso, 0)
    min_max_iso_value: Vec4,
    box_to_world: Mat4,
    world_to_box: Mat4,
    mv: Mat4,
    camera_position: Vec4,
}

/// raymarch：全屏三角形，从 front/back 纹理取视线区间，对 3D 纹理积分
pub fn draw_volume(
    ctx: &RenderContext,
    volume: &VolumeInfo,
    camera_position: Vec3,
    iso_value: f32,
    front: TextureId,
    back: TextureId,
) -> Result<(), RenderError> {
    let mut desc = PipelineStateDesc::graphics(ShaderId::Volume, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.cull(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE).depth(false, false);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<VolumeUbo>()?;
    *ubo = VolumeUbo {
        color: Vec4::new(1.0, 0.0, 0.0, 1.0),
        min_max_iso_value: Vec4::new(volume.min, volume.max, iso_value, 0.0),
        box_to_world: volume.box_to_world(),
        world_to_box: volume.world_to_box(),
        mv: ctx.view,
        camera_position: camera_position.extend(1.0),
    };

    push_texture_indices(
        ctx,
        pipeline.layout,
        &TextureIndices {
            index_0: ctx.textures.texture_index(back),
            index_1: ctx.textures.texture_index(front),
            index_2: ctx.textures.texture_index(volume.texture),
            ..Default::default()
        },
    );

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .dynamic(1, ctx.heap.storage_set(), 0, None)
        .fixed(2, ctx.textures.descriptor_set_2d())
        .fixed(3, ctx.textures.descriptor_set_3d())
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.standard, ctx.heap);

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_draw(3, 1, 0, 0);

    Ok(())
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DenoiseUbo {
    color: Vec4,
}

/// 把 raymarch 的结果降噪后画到当前 pass
pub fn draw_denoise(ctx: &RenderContext, color_texture: TextureId) -> Result<(), RenderError> {
    let mut desc =
        PipelineStateDesc::graphics(ShaderId::Denoise, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.cull(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE).depth(false, false);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<DenoiseUbo>()?;
    *ubo = DenoiseUbo {
        color: Vec4::new(1.0, 0.0, 0.0, 1.0),
    };

    push_texture_indices(
        ctx,
        pipeline.layout,
        &TextureIndices {
            index_0: ctx.textures.texture_index(color_texture),
            ..Default::default()
        },
    );

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .dynamic(1, ctx.heap.storage_set(), 0, None)
        .fixed(2, ctx.textures.descriptor_set_2d())
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.standard, ctx.heap);

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_draw(3, 1, 0, 0);

    Ok(())
}
