use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::commands::barrier::GfxImageBarrier;
use crate::foundation::device::GfxDevice;
use crate::gfx::Gfx;
use crate::resources::buffer::GfxBuffer;

/// 2D 或 3D 的 image 封装，由 VMA 分配 device local 内存
pub struct GfxImage {
    handle: vk::Image,
    allocation: vk_mem::Allocation,

    extent: vk::Extent3D,
    format: vk::Format,

    allocator: Rc<vk_mem::Allocator>,
}

// init & destroy
impl GfxImage {
    pub fn new_2d(
        gfx: &Gfx,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        samples: vk::SampleCountFlags,
        name: impl AsRef<str>,
    ) -> Self {
        let extent = vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        };
        Self::new(gfx, vk::ImageType::TYPE_2D, extent, format, usage, samples, name)
    }

    pub fn new_3d(
        gfx: &Gfx,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        name: impl AsRef<str>,
    ) -> Self {
        Self::new(gfx, vk::ImageType::TYPE_3D, extent, format, usage, vk::SampleCountFlags::TYPE_1, name)
    }

    fn new(
        gfx: &Gfx,
        image_type: vk::ImageType,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        samples: vk::SampleCountFlags,
        name: impl AsRef<str>,
    ) -> Self {
        let image_ci = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .extent(extent)
            .format(format)
            .usage(usage)
            .samples(samples)
            .mip_levels(1)
            .array_layers(1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (image, allocation) = unsafe { gfx.allocator().create_image(&image_ci, &alloc_ci).unwrap() };
        gfx.device.set_object_debug_name(image, format!("Image::{}", name.as_ref()));

        Self {
            handle: image,
            allocation,
            extent,
            format,
            allocator: gfx.vm_allocator.clone(),
        }
    }
}

impl Drop for GfxImage {
    fn drop(&mut self) {
        unsafe {
            self.allocator.destroy_image(self.handle, &mut self.allocation);
        }
    }
}

// getters
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }
}

// tools
impl GfxImage {
    /// 通过 stage buffer 上传像素，并将 layout 转换为 SHADER_READ_ONLY_OPTIMAL
    ///
    /// 同步等待传输完成，只应该在初始化阶段调用
    pub fn upload_pixels_sync(&self, gfx: &Gfx, pixels: &[u8], name: &str) {
        let stage_buffer = GfxBuffer::new_stage_buffer(gfx, pixels.len() as vk::DeviceSize, format!("{name}-pixels"));
        stage_buffer.transfer_data_by_mmap(pixels);

        gfx.one_time_exec(
            |cmd| {
                cmd.image_memory_barrier(&[GfxImageBarrier::new()
                    .image(self.handle)
                    .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                    .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)]);

                cmd.cmd_copy_buffer_to_image(
                    stage_buffer.vk_buffer(),
                    self.handle,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[vk::BufferImageCopy::default()
                        .image_subresource(
                            vk::ImageSubresourceLayers::default()
                                .aspect_mask(vk::ImageAspectFlags::COLOR)
                                .layer_count(1),
                        )
                        .image_extent(self.extent)],
                );

                cmd.image_memory_barrier(&[GfxImageBarrier::new()
                    .image(self.handle)
                    .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                    .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                    .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)]);
            },
            &format!("{name}-upload"),
        );
    }

    /// 单独的 layout 转换，storage image 初始化时使用
    pub fn transfer_layout_sync(&self, gfx: &Gfx, new_layout: vk::ImageLayout, name: &str) {
        gfx.one_time_exec(
            |cmd| {
                cmd.image_memory_barrier(&[GfxImageBarrier::new()
                    .image(self.handle)
                    .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, new_layout)
                    .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                    .dst_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::empty())]);
            },
            &format!("{name}-layout"),
        );
    }
}

pub struct GfxImageView {
    handle: vk::ImageView,
    device: Rc<GfxDevice>,
}

impl GfxImageView {
    pub fn new(
        gfx: &Gfx,
        image: vk::Image,
        view_type: vk::ImageViewType,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
        name: impl AsRef<str>,
    ) -> Self {
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default().aspect_mask(aspect).level_count(1).layer_count(1),
            );

        let view = unsafe { gfx.device.create_image_view(&view_ci, None).unwrap() };
        gfx.device.set_object_debug_name(view, format!("ImageView::{}", name.as_ref()));

        Self {
            handle: view,
            device: gfx.device.clone(),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
}

impl Drop for GfxImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.handle, None);
        }
    }
}

pub struct GfxSampler {
    handle: vk::Sampler,
    device: Rc<GfxDevice>,
}

impl GfxSampler {
    pub fn new_linear(gfx: &Gfx, name: impl AsRef<str>) -> Self {
        let sampler_ci = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE);

        let sampler = unsafe { gfx.device.create_sampler(&sampler_ci, None).unwrap() };
        gfx.device.set_object_debug_name(sampler, format!("Sampler::{}", name.as_ref()));

        Self {
            handle: sampler,
            device: gfx.device.clone(),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}

impl Drop for GfxSampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.handle, None);
        }
    }
}
