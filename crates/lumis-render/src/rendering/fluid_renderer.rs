//! 流体密度场的全屏绘制

use ash::vk;
use glam::UVec4;

use crate::binding::SetBindingList;
use crate::containers::storage_container::StorageId;
use crate::error::RenderError;
use crate::pipelines::shader_catalog::ShaderId;
use crate::pipelines::state::PipelineStateDesc;
use crate::rendering::RenderContext;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FluidUbo {
    screen_size: UVec4,
}

/// 全屏三角形采样 GPU 求解出来的密度场
pub fn render_fluid(ctx: &RenderContext, density: StorageId) -> Result<(), RenderError> {
    let mut desc = PipelineStateDesc::graphics(ShaderId::Fluid, ctx.layouts.storage.handle, ctx.render_pass, ctx.subpass);
    desc.depth(false, false);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<FluidUbo>()?;
    *ubo = FluidUbo {
        screen_size: UVec4::new(ctx.viewport_extent.width, ctx.viewport_extent.height, 0, 0),
    };

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .dynamic(1, ctx.storages.get(density).descriptor_set, 0, None)
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.storage, ctx.heap);

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_draw(3, 1, 0, 0);

    Ok(())
}

/// CPU 求解的密度场：每帧把整个场 restage 进 storage arena 再绘制
pub fn render_fluid_raw(ctx: &RenderContext, density: &[f32]) -> Result<(), RenderError> {
    let mut desc =
        PipelineStateDesc::graphics(ShaderId::FluidRaw, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.depth(false, false);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut field = ctx.heap.alloc_storage::<f32>(density.len())?;
    field.copy_from_slice(density);

    let mut ubo = ctx.heap.alloc_uniform::<FluidUbo>()?;
    *ubo = FluidUbo {
        screen_size: UVec4::new(ctx.viewport_extent.width, ctx.viewport_extent.height, 0, 0),
    };

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .dynamic(1, field.set, field.offset, Some(field.generation))
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.standard, ctx.heap);

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_draw(3, 1, 0, 0);

    Ok(())
}
