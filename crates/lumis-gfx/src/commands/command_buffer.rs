use std::ffi::CString;
use std::rc::Rc;

use ash::vk;

use crate::commands::barrier::{GfxBufferBarrier, GfxImageBarrier, GfxMemoryBarrier};
use crate::commands::command_pool::GfxCommandPool;
use crate::commands::synchronize::GfxFence;
use crate::foundation::device::GfxDevice;
use crate::gfx::GfxQueue;

/// debug label 使用的颜色
pub struct LabelColor;
impl LabelColor {
    pub const COLOR_PASS: glam::Vec4 = glam::vec4(1.0, 0.78, 0.05, 1.0);
    pub const COLOR_CMD: glam::Vec4 = glam::vec4(0.0, 0.6, 0.88, 1.0);
    pub const COLOR_STAGE: glam::Vec4 = glam::vec4(0.13, 0.54, 0.13, 1.0);
}

/// 命令缓冲封装
///
/// 提供图形、计算、光线追踪、屏障、调试标签的录制接口。
#[derive(Clone)]
pub struct GfxCommandBuffer {
    handle: vk::CommandBuffer,
    command_pool_handle: vk::CommandPool,

    device: Rc<GfxDevice>,
}

// new & free
impl GfxCommandBuffer {
    pub fn new(device: Rc<GfxDevice>, command_pool: &GfxCommandPool, debug_name: &str) -> Self {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { device.allocate_command_buffers(&info).unwrap()[0] };
        device.set_object_debug_name(command_buffer, debug_name);

        Self {
            handle: command_buffer,
            command_pool_handle: command_pool.handle(),
            device,
        }
    }

    /// 将 command buffer 归还给 pool
    pub fn free(self) {
        unsafe {
            self.device.free_command_buffers(self.command_pool_handle, std::slice::from_ref(&self.handle));
        }
    }

    /// 录制一个立即执行的 command buffer，提交后同步等待其完成
    ///
    /// 隐含一次 fence 等待，适合初始化阶段的数据上传和一次性的 voxelize 等操作，
    /// 不应该出现在逐帧路径上
    pub fn one_time_exec<F, R>(device: Rc<GfxDevice>, pool: &GfxCommandPool, queue: &GfxQueue, f: F, name: &str) -> R
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let cmd = Self::new(device.clone(), pool, &format!("one-time-{}", name));
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name);
        let result = f(&cmd);
        cmd.end();

        let fence = GfxFence::new(device.clone(), false, &format!("one-time-fence-{}", name));
        queue.submit_one(&cmd, Some(&fence));
        fence.wait();

        cmd.free();
        result
    }
}

// basic
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// 开始录制，自动设置 debug label
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) {
        unsafe {
            self.device
                .begin_command_buffer(self.handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))
                .unwrap();
        }
        self.begin_label(debug_label_name, LabelColor::COLOR_CMD);
    }

    /// 结束录制，结束 debug label
    #[inline]
    pub fn end(&self) {
        self.end_label();
        unsafe { self.device.end_command_buffer(self.handle).unwrap() }
    }

    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        let name = CString::new(label_name).unwrap();
        let label = vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into());
        unsafe {
            self.device.debug_utils.cmd_begin_debug_utils_label(self.handle, &label);
        }
    }

    pub fn end_label(&self) {
        unsafe {
            self.device.debug_utils.cmd_end_debug_utils_label(self.handle);
        }
    }
}

// render pass 与固定功能状态
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_begin_render_pass(&self, begin_info: &vk::RenderPassBeginInfo) {
        unsafe {
            self.device.cmd_begin_render_pass(self.handle, begin_info, vk::SubpassContents::INLINE);
        }
    }

    #[inline]
    pub fn cmd_end_render_pass(&self) {
        unsafe {
            self.device.cmd_end_render_pass(self.handle);
        }
    }

    #[inline]
    pub fn cmd_set_viewport(&self, first_viewport: u32, viewports: &[vk::Viewport]) {
        unsafe {
            self.device.cmd_set_viewport(self.handle, first_viewport, viewports);
        }
    }

    #[inline]
    pub fn cmd_set_scissor(&self, first_scissor: u32, scissors: &[vk::Rect2D]) {
        unsafe {
            self.device.cmd_set_scissor(self.handle, first_scissor, scissors);
        }
    }
}

// 绑定与绘制
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(self.handle, bind_point, pipeline);
        }
    }

    #[inline]
    pub fn bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(self.handle, bind_point, layout, first_set, sets, dynamic_offsets);
        }
    }

    #[inline]
    pub fn cmd_bind_vertex_buffer(&self, binding: u32, buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                self.handle,
                binding,
                std::slice::from_ref(&buffer),
                std::slice::from_ref(&offset),
            );
        }
    }

    #[inline]
    pub fn cmd_bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        unsafe {
            self.device.cmd_bind_index_buffer(self.handle, buffer, offset, index_type);
        }
    }

    #[inline]
    pub fn cmd_push_constants(
        &self,
        pipeline_layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(self.handle, pipeline_layout, stage, offset, data);
        }
    }

    #[inline]
    pub fn cmd_draw(&self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device.cmd_draw(self.handle, vertex_count, instance_count, first_vertex, first_instance);
        }
    }

    #[inline]
    pub fn cmd_draw_indexed(&self, index_count: u32, instance_count: u32, first_index: u32) {
        unsafe {
            self.device.cmd_draw_indexed(self.handle, index_count, instance_count, first_index, 0, 0);
        }
    }

    #[inline]
    pub fn cmd_dispatch(&self, group_cnt: glam::UVec3) {
        unsafe {
            self.device.cmd_dispatch(self.handle, group_cnt.x, group_cnt.y, group_cnt.z);
        }
    }
}

// barrier
impl GfxCommandBuffer {
    pub fn memory_barrier(&self, barriers: &[GfxMemoryBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect::<Vec<_>>();
        let dependency_info = vk::DependencyInfo::default().memory_barriers(&barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.handle, &dependency_info);
        }
    }

    pub fn image_memory_barrier(&self, barriers: &[GfxImageBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect::<Vec<_>>();
        let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.handle, &dependency_info);
        }
    }

    pub fn buffer_memory_barrier(&self, barriers: &[GfxBufferBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect::<Vec<_>>();
        let dependency_info = vk::DependencyInfo::default().buffer_memory_barriers(&barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.handle, &dependency_info);
        }
    }
}

// transfer
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe {
            self.device.cmd_copy_buffer(self.handle, src, dst, regions);
        }
    }

    #[inline]
    pub fn cmd_copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.cmd_copy_buffer_to_image(self.handle, src, dst, dst_layout, regions);
        }
    }
}

// ray tracing
impl GfxCommandBuffer {
    pub fn trace_rays(
        &self,
        raygen_region: &vk::StridedDeviceAddressRegionKHR,
        miss_region: &vk::StridedDeviceAddressRegionKHR,
        hit_region: &vk::StridedDeviceAddressRegionKHR,
        callable_region: &vk::StridedDeviceAddressRegionKHR,
        extent: [u32; 3],
    ) {
        unsafe {
            self.device.ray_tracing_pipeline.cmd_trace_rays(
                self.handle,
                raygen_region,
                miss_region,
                hit_region,
                callable_region,
                extent[0],
                extent[1],
                extent[2],
            );
        }
    }

    pub fn build_acceleration_structure(
        &self,
        geometry_info: &vk::AccelerationStructureBuildGeometryInfoKHR,
        range_infos: &[vk::AccelerationStructureBuildRangeInfoKHR],
    ) {
        unsafe {
            self.device.acceleration_structure.cmd_build_acceleration_structures(
                self.handle,
                std::slice::from_ref(geometry_info),
                &[range_infos],
            );
        }
    }
}
