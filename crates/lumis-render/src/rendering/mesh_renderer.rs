//! mesh 的提交例程：单色 mesh 和 PBR mesh

use ash::vk;
use glam::{Mat4, Vec3, Vec4};

use crate::binding::SetBindingList;
use crate::containers::mesh_container::MeshId;
use crate::containers::texture_container::TextureId;
use crate::error::RenderError;
use crate::pipelines::shader_catalog::ShaderId;
use crate::pipelines::state::{PipelineStateDesc, VertexLayoutId};
use crate::rendering::{RenderContext, TextureIndices, push_texture_indices};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SolidColorUbo {
    mvp: Mat4,
    color: Vec4,
}

/// 用统一颜色绘制 mesh container 里的一个 mesh（octree 的体素 cube 等）
pub fn draw_mesh(ctx: &RenderContext, mesh_id: MeshId, model: Mat4, color: Vec4) -> Result<(), RenderError> {
    let mut desc =
        PipelineStateDesc::graphics(ShaderId::SolidColor, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.vertex_layout(VertexLayoutId::Pos3Nrm3);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<SolidColorUbo>()?;
    *ubo = SolidColorUbo {
        mvp: ctx.projection * ctx.view * model,
        color,
    };

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .dynamic(1, ctx.heap.storage_set(), 0, None)
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.standard, ctx.heap);

    let mesh = ctx.meshes.get(mesh_id);
    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_bind_vertex_buffer(0, mesh.buffer.vk_buffer(), 0);
    ctx.cmd.cmd_bind_index_buffer(mesh.buffer.vk_buffer(), mesh.index_offset, vk::IndexType::UINT32);
    ctx.cmd.cmd_draw_indexed(mesh.index_count, 1, 0);

    Ok(())
}

/// glTF PBR 的材质参数（metallic-roughness 模型）
#[derive(Clone, Copy)]
pub struct PbrMaterial {
    pub base_color_factor: Vec4,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub base_color_texture: TextureId,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PbrUbo {
    mvp: Mat4,
    model: Mat4,
    camera_position: Vec4,
    base_color_factor: Vec4,
    /// x = metallic, y = roughness
    material_factors: Vec4,
}

/// glTF PBR 风格的 mesh 提交
pub fn draw_pbr_mesh(
    ctx: &RenderContext,
    mesh_id: MeshId,
    model: Mat4,
    material: &PbrMaterial,
    camera_position: Vec3,
) -> Result<(), RenderError> {
    let mut desc = PipelineStateDesc::graphics(ShaderId::Pbr, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.vertex_layout(VertexLayoutId::Pos3Nrm3Uv2);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<PbrUbo>()?;
    *ubo = PbrUbo {
        mvp: ctx.projection * ctx.view * model,
        model,
        camera_position: camera_position.extend(1.0),
        base_color_factor: material.base_color_factor,
        material_factors: Vec4::new(material.metallic_factor, material.roughness_factor, 0.0, 0.0),
    };

    push_texture_indices(
        ctx,
        pipeline.layout,
        &TextureIndices {
            index_0: ctx.textures.texture_index(material.base_color_texture),
            ..Default::default()
        },
    );

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .dynamic(1, ctx.heap.storage_set(), 0, None)
        .fixed(2, ctx.textures.descriptor_set_2d())
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.standard, ctx.heap);

    let mesh = ctx.meshes.get(mesh_id);
    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_bind_vertex_buffer(0, mesh.buffer.vk_buffer(), 0);
    ctx.cmd.cmd_bind_index_buffer(mesh.buffer.vk_buffer(), mesh.index_offset, vk::IndexType::UINT32);
    ctx.cmd.cmd_draw_indexed(mesh.index_count, 1, 0);

    Ok(())
}
