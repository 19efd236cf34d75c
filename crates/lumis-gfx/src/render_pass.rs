use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::foundation::device::GfxDevice;
use crate::gfx::Gfx;

/// 单 subpass 的 render pass 封装
///
/// 覆盖三种形态：present 用的 color+depth，offscreen MRT，以及
/// voxelizer 用的无 attachment 空 pass。
pub struct GfxRenderPass {
    handle: vk::RenderPass,
    color_attachment_count: u32,
    device: Rc<GfxDevice>,
}

impl GfxRenderPass {
    /// - final_layout: 对 swapchain attachment 使用 PRESENT_SRC_KHR，
    ///   对 offscreen attachment 使用 SHADER_READ_ONLY_OPTIMAL
    pub fn new(
        gfx: &Gfx,
        color_formats: &[vk::Format],
        color_final_layout: vk::ImageLayout,
        depth_format: Option<vk::Format>,
        samples: vk::SampleCountFlags,
        debug_name: &str,
    ) -> Self {
        let mut attachments = color_formats
            .iter()
            .map(|format| {
                vk::AttachmentDescription::default()
                    .format(*format)
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(color_final_layout)
            })
            .collect_vec();

        let color_refs = (0..color_formats.len() as u32)
            .map(|idx| {
                vk::AttachmentReference::default()
                    .attachment(idx)
                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            })
            .collect_vec();

        let depth_ref = vk::AttachmentReference::default()
            .attachment(color_formats.len() as u32)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        if let Some(depth_format) = depth_format {
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(depth_format)
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
        }

        let mut subpass =
            vk::SubpassDescription::default().pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS).color_attachments(&color_refs);
        if depth_format.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }

        // 外部依赖：attachment 写入需要等待之前对同一资源的读写完成
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );

        let render_pass_ci = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = unsafe { gfx.device.create_render_pass(&render_pass_ci, None).unwrap() };
        gfx.device.set_object_debug_name(render_pass, debug_name);

        Self {
            handle: render_pass,
            color_attachment_count: color_formats.len() as u32,
            device: gfx.device.clone(),
        }
    }

    /// 无 attachment 的空 render pass，voxelizer 借助 MSAA 光栅化写 storage buffer 时使用
    pub fn new_empty(gfx: &Gfx, debug_name: &str) -> Self {
        let subpass = vk::SubpassDescription::default().pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS);
        let render_pass_ci = vk::RenderPassCreateInfo::default().subpasses(std::slice::from_ref(&subpass));

        let render_pass = unsafe { gfx.device.create_render_pass(&render_pass_ci, None).unwrap() };
        gfx.device.set_object_debug_name(render_pass, debug_name);

        Self {
            handle: render_pass,
            color_attachment_count: 0,
            device: gfx.device.clone(),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    #[inline]
    pub fn color_attachment_count(&self) -> u32 {
        self.color_attachment_count
    }
}

impl Drop for GfxRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.handle, None);
        }
    }
}

pub struct GfxFramebuffer {
    handle: vk::Framebuffer,
    extent: vk::Extent2D,
    device: Rc<GfxDevice>,
}

impl GfxFramebuffer {
    pub fn new(
        gfx: &Gfx,
        render_pass: &GfxRenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
        debug_name: &str,
    ) -> Self {
        let framebuffer_ci = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { gfx.device.create_framebuffer(&framebuffer_ci, None).unwrap() };
        gfx.device.set_object_debug_name(framebuffer, debug_name);

        Self {
            handle: framebuffer,
            extent,
            device: gfx.device.clone(),
        }
    }

    /// voxelizer 的空 pass 也需要一个 framebuffer 来提供光栅化范围
    pub fn new_empty(gfx: &Gfx, render_pass: &GfxRenderPass, extent: vk::Extent2D, debug_name: &str) -> Self {
        Self::new(gfx, render_pass, &[], extent, debug_name)
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for GfxFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.handle, None);
        }
    }
}
