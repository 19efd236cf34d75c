//! 通用的 compute 提交例程
//!
//! 流体求解的每个步骤都是一次 dispatch：uniform 走线性堆，
//! 参与计算的场是 storage container 里的持久 buffer。

use ash::vk;
use bytemuck::Pod;
use lumis_gfx::commands::barrier::GfxMemoryBarrier;

use crate::binding::SetBindingList;
use crate::containers::storage_container::StorageId;
use crate::error::RenderError;
use crate::pipelines::shader_catalog::ShaderId;
use crate::rendering::RenderContext;

/// 录制一次 compute dispatch
///
/// storage_fields 依次绑定到 set1..setN（storage layout 的布局），
/// dispatch 之后插入一个 write-then-read 的 memory barrier，
/// 后续的 compute 或 fragment 阶段读取结果之前无需额外同步。
pub fn dispatch_compute<U: Pod>(
    ctx: &RenderContext,
    shader: ShaderId,
    uniform_data: &U,
    storage_fields: &[StorageId],
    group_count: glam::UVec3,
) -> Result<(), RenderError> {
    assert!(
        storage_fields.len() < ctx.layouts.storage.meta.set_count(),
        "storage layout supports at most {} fields",
        ctx.layouts.storage.meta.set_count() - 1
    );

    let pipeline = ctx.pipelines.borrow_mut().create_compute_pipeline(&ctx.layouts.storage, shader)?;

    let mut ubo = ctx.heap.alloc_uniform::<U>()?;
    *ubo = *uniform_data;

    let mut bindings = SetBindingList::new().dynamic(0, ubo.set, ubo.offset, Some(ubo.generation));
    for (idx, field) in storage_fields.iter().enumerate() {
        bindings = bindings.dynamic(idx as u32 + 1, ctx.storages.get(*field).descriptor_set, 0, None);
    }

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipeline.pipeline);
    bindings.bind(ctx.cmd, vk::PipelineBindPoint::COMPUTE, &ctx.layouts.storage, ctx.heap);
    ctx.cmd.cmd_dispatch(group_count);

    // 保证本次 dispatch 的写入对后续阶段可见
    ctx.cmd.memory_barrier(&[GfxMemoryBarrier::new()
        .src_mask(
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_WRITE | vk::AccessFlags2::SHADER_READ,
        )
        .dst_mask(
            vk::PipelineStageFlags2::COMPUTE_SHADER | vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_WRITE | vk::AccessFlags2::SHADER_READ,
        )]);

    Ok(())
}
