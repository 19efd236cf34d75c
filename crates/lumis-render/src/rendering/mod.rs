//! 渲染提交例程
//!
//! 每个例程都是无状态函数，遵循同一个模式：
//! (a) 从 pipeline container 解析/构建 pipeline；
//! (b) 通过线性堆 stage 本次 draw 的 uniform/storage/vertex/index 数据；
//! (c) 构建显式的 descriptor 绑定列表并绑定；
//! (d) 录制恰好一条 draw 或 dispatch。
//! 所有数据每次调用都重新 stage，arena 不做任何去重。

use std::cell::RefCell;

use ash::vk;
use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_gfx::gfx::Gfx;

use crate::containers::mesh_container::MeshContainer;
use crate::containers::storage_container::StorageContainer;
use crate::containers::texture_container::TextureContainer;
use crate::heap::LinearHeapAllocator;
use crate::layouts::PipelineLayouts;
use crate::pipelines::container::PipelineContainer;

pub mod box_renderer;
pub mod compute;
pub mod fluid_renderer;
pub mod mesh_renderer;
pub mod ray_renderer;
pub mod volume_renderer;
pub mod voxelizer;

/// 一次提交所需的全部上下文，按值传入每个例程
///
/// 字段全部是引用或句柄，场景可以用 struct update 语法换掉目标 pass
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub gfx: &'a Gfx,
    pub layouts: &'a PipelineLayouts,
    pub pipelines: &'a RefCell<PipelineContainer>,
    pub heap: &'a LinearHeapAllocator,
    pub meshes: &'a MeshContainer,
    pub textures: &'a TextureContainer,
    pub storages: &'a StorageContainer,

    pub cmd: &'a GfxCommandBuffer,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub viewport_extent: vk::Extent2D,

    pub projection: glam::Mat4,
    pub view: glam::Mat4,
}

impl RenderContext<'_> {
    /// 屏幕空间的正交投影（2D 场景）
    pub fn screen_ortho(&self) -> glam::Mat4 {
        glam::Mat4::orthographic_rh(
            0.0,
            self.viewport_extent.width as f32,
            0.0,
            self.viewport_extent.height as f32,
            -10.0,
            10.0,
        )
    }
}

/// push constant 里的纹理索引，所有 raster shader 共享这个布局
#[repr(C)]
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextureIndices {
    pub index_0: u32,
    pub index_1: u32,
    pub index_2: u32,
    pub _padding: u32,
}

pub(crate) fn push_texture_indices(ctx: &RenderContext, layout: vk::PipelineLayout, indices: &TextureIndices) {
    ctx.cmd.cmd_push_constants(layout, vk::ShaderStageFlags::ALL, 0, bytemuck::bytes_of(indices));
}
