use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::commands::synchronize::GfxSemaphore;
use crate::foundation::device::GfxDevice;
use crate::gfx::{Gfx, GfxQueue};
use crate::resources::image::GfxImageView;

pub struct GfxSurface {
    pub handle: vk::SurfaceKHR,
    pub pf: ash::khr::surface::Instance,
}

impl GfxSurface {
    pub fn new(gfx: &Gfx, display_handle: RawDisplayHandle, window_handle: RawWindowHandle) -> Self {
        let surface = unsafe {
            ash_window::create_surface(&gfx.vk_pf, &gfx.instance, display_handle, window_handle, None).unwrap()
        };
        let surface_pf = ash::khr::surface::Instance::new(&gfx.vk_pf, &gfx.instance);

        Self {
            handle: surface,
            pf: surface_pf,
        }
    }

    pub fn destroy(self) {
        unsafe {
            self.pf.destroy_surface(self.handle, None);
        }
    }
}

/// swapchain 封装
///
/// acquire 记录当前 present image 的 index，present 时使用。
/// 窗口尺寸变化时整体重建。
pub struct GfxSwapchain {
    handle: vk::SwapchainKHR,

    images: Vec<vk::Image>,
    image_views: Vec<GfxImageView>,

    extent: vk::Extent2D,
    format: vk::SurfaceFormatKHR,

    current_image_index: std::cell::Cell<u32>,

    device: Rc<GfxDevice>,
}

// init & destroy
impl GfxSwapchain {
    /// 重建时传入 old_swapchain，让旧的 swapchain 退役
    pub fn new(
        gfx: &Gfx,
        surface: &GfxSurface,
        surface_format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        old_swapchain: Option<&GfxSwapchain>,
    ) -> Self {
        let capabilities = unsafe {
            surface
                .pf
                .get_physical_device_surface_capabilities(gfx.physical_device.handle, surface.handle)
                .unwrap()
        };

        // min_image_count + 1 可以减少 acquire 的等待
        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let extent = capabilities.current_extent;

        let swapchain_ci = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain.map_or(vk::SwapchainKHR::null(), |sc| sc.handle));

        let swapchain = unsafe { gfx.device.swapchain().create_swapchain(&swapchain_ci, None).unwrap() };
        gfx.device.set_object_debug_name(swapchain, "swapchain");

        let images = unsafe { gfx.device.swapchain().get_swapchain_images(swapchain).unwrap() };
        let image_views = images
            .iter()
            .enumerate()
            .map(|(idx, image)| {
                GfxImageView::new(
                    gfx,
                    *image,
                    vk::ImageViewType::TYPE_2D,
                    surface_format.format,
                    vk::ImageAspectFlags::COLOR,
                    format!("swapchain-present-{idx}"),
                )
            })
            .collect_vec();

        Self {
            handle: swapchain,
            images,
            image_views,
            extent,
            format: surface_format,
            current_image_index: std::cell::Cell::new(0),
            device: gfx.device.clone(),
        }
    }
}

impl Drop for GfxSwapchain {
    fn drop(&mut self) {
        self.image_views.clear();
        unsafe {
            self.device.swapchain().destroy_swapchain(self.handle, None);
        }
    }
}

// getters
impl GfxSwapchain {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image_views(&self) -> Vec<vk::ImageView> {
        self.image_views.iter().map(|view| view.handle()).collect_vec()
    }

    #[inline]
    pub fn current_image_index(&self) -> usize {
        self.current_image_index.get() as usize
    }

    #[inline]
    pub fn current_image(&self) -> vk::Image {
        self.images[self.current_image_index()]
    }
}

// phase methods
impl GfxSwapchain {
    /// 获取下一张 present image，semaphore 在 image 可用时被 signal
    pub fn acquire(&self, semaphore: &GfxSemaphore) {
        let (image_index, _suboptimal) = unsafe {
            self.device
                .swapchain()
                .acquire_next_image(self.handle, u64::MAX, semaphore.handle(), vk::Fence::null())
                .unwrap()
        };
        self.current_image_index.set(image_index);
    }

    pub fn present(&self, queue: &GfxQueue, wait_semaphores: &[vk::Semaphore]) {
        let image_indices = [self.current_image_index.get()];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(std::slice::from_ref(&self.handle))
            .image_indices(&image_indices);

        unsafe {
            // ERROR_OUT_OF_DATE 由外层的 resize 流程处理，这里容忍 suboptimal
            match self.device.swapchain().queue_present(queue.handle, &present_info) {
                Ok(_) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {}
                Err(e) => panic!("queue_present failed: {e}"),
            }
        }
    }
}
