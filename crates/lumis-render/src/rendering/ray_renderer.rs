//! ray tracing 的提交例程
//!
//! SBT 不是持久对象：每次 trace 把 shader group handle 写进通用 arena
//! 的一段分配里，region 地址指向 arena buffer（device address + offset）。

use ash::vk;
use glam::{Mat4, Vec4};

use crate::binding::SetBindingList;
use crate::containers::texture_container::TextureId;
use crate::error::RenderError;
use crate::pipelines::container::RT_SHADER_GROUP_COUNT;
use crate::pipelines::shader_catalog::ShaderId;
use crate::pipelines::state::PipelineStateDesc;
use crate::rendering::{RenderContext, TextureIndices, push_texture_indices};

/// round x up to a multiple of align
///
/// * align must be a power of 2
fn align_up(x: u32, align: u32) -> u32 {
    (x + (align - 1)) & !(align - 1)
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct RayUbo {
    proj_inverse: Mat4,
    view_inverse: Mat4,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SphereStorage {
    /// (center.xyz, radius)
    sphere: Vec4,
}

/// 对程序化球体做一次 trace，结果写进 storage image
///
/// tlas_set / storage_image_set 由场景持有（ray_tracing layout 的 set3 / set2）
pub fn trace_procedural(
    ctx: &RenderContext,
    sphere: Vec4,
    storage_image_set: vk::DescriptorSet,
    tlas_set: vk::DescriptorSet,
) -> Result<(), RenderError> {
    let pipeline = ctx.pipelines.borrow_mut().create_ray_tracing_pipeline(
        &ctx.layouts.ray_tracing,
        ShaderId::ProceduralRay,
        1,
    )?;

    let rt_props = &ctx.gfx.physical_device.rt_pipeline_properties;
    let handle_size = rt_props.shader_group_handle_size;
    let aligned_handle_size = align_up(handle_size, rt_props.shader_group_handle_alignment);
    // 每个 region 需要使用 base alignment 对齐
    let region_size = align_up(aligned_handle_size, rt_props.shader_group_base_alignment);

    // SBT 整体是一段通用 arena 的分配，三个 region 紧凑排布
    let mut sbt = ctx.heap.alloc_buffer_with_align::<u8>(
        (region_size * RT_SHADER_GROUP_COUNT) as usize,
        rt_props.shader_group_base_alignment as vk::DeviceSize,
    )?;

    let handles = unsafe {
        ctx.gfx
            .device
            .ray_tracing_pipeline()
            .get_ray_tracing_shader_group_handles(
                pipeline.pipeline,
                0,
                RT_SHADER_GROUP_COUNT,
                (RT_SHADER_GROUP_COUNT * handle_size) as usize,
            )
            .map_err(|code| RenderError::PipelineBuild {
                shader: ShaderId::ProceduralRay,
                code,
            })?
    };
    for group in 0..RT_SHADER_GROUP_COUNT as usize {
        let src = &handles[group * handle_size as usize..(group + 1) * handle_size as usize];
        let dst_start = group * region_size as usize;
        sbt[dst_start..dst_start + handle_size as usize].copy_from_slice(src);
    }

    let sbt_address = ctx.heap.buffer_arena_device_address() + sbt.offset;
    let region = |index: u32| {
        vk::StridedDeviceAddressRegionKHR::default()
            .device_address(sbt_address + (index * region_size) as vk::DeviceSize)
            .stride(region_size as vk::DeviceSize)
            .size(region_size as vk::DeviceSize)
    };

    let mut ubo = ctx.heap.alloc_uniform::<RayUbo>()?;
    *ubo = RayUbo {
        proj_inverse: ctx.projection.inverse(),
        view_inverse: ctx.view.inverse(),
    };

    let mut sphere_data = ctx.heap.alloc_storage::<SphereStorage>(1)?;
    sphere_data[0] = SphereStorage { sphere };

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .dynamic(1, sphere_data.set, sphere_data.offset, Some(sphere_data.generation))
        .fixed(2, storage_image_set)
        .fixed(3, tlas_set)
        .bind(ctx.cmd, vk::PipelineBindPoint::RAY_TRACING_KHR, &ctx.layouts.ray_tracing, ctx.heap);

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::RAY_TRACING_KHR, pipeline.pipeline);
    ctx.cmd.trace_rays(
        &region(0),
        &region(1),
        &region(2),
        &vk::StridedDeviceAddressRegionKHR::default(),
        [ctx.viewport_extent.width, ctx.viewport_extent.height, 1],
    );

    Ok(())
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct RayOutputUbo {
    tint: Vec4,
}

/// 全屏绘制 trace 的输出（storage image 已在之前转成可采样布局由调用方保证）
pub fn draw_ray_output(ctx: &RenderContext, output_texture: TextureId) -> Result<(), RenderError> {
    let mut desc =
        PipelineStateDesc::graphics(ShaderId::RayOutput, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.cull(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE).depth(false, false);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<RayOutputUbo>()?;
    *ubo = RayOutputUbo {
        tint: Vec4::ONE,
    };

    push_texture_indices(
        ctx,
        pipeline.layout,
        &TextureIndices {
            index_0: ctx.textures.texture_index(output_texture),
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
