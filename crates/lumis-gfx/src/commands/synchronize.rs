use std::rc::Rc;

use ash::vk;

use crate::foundation::device::GfxDevice;

pub struct GfxFence {
    handle: vk::Fence,
    device: Rc<GfxDevice>,
}

impl GfxFence {
    pub fn new(device: Rc<GfxDevice>, signaled: bool, debug_name: &str) -> Self {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence =
            unsafe { device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None).unwrap() };
        device.set_object_debug_name(fence, debug_name);

        Self { handle: fence, device }
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }

    /// 阻塞等待 fence 被 signal
    #[inline]
    pub fn wait(&self) {
        unsafe {
            self.device.wait_for_fences(std::slice::from_ref(&self.handle), true, u64::MAX).unwrap();
        }
    }

    #[inline]
    pub fn reset(&self) {
        unsafe {
            self.device.reset_fences(std::slice::from_ref(&self.handle)).unwrap();
        }
    }
}

impl Drop for GfxFence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.handle, None);
        }
    }
}

pub struct GfxSemaphore {
    handle: vk::Semaphore,
    device: Rc<GfxDevice>,
}

impl GfxSemaphore {
    pub fn new(device: Rc<GfxDevice>, debug_name: &str) -> Self {
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None).unwrap() };
        device.set_object_debug_name(semaphore, debug_name);

        Self { handle: semaphore, device }
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for GfxSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.handle, None);
        }
    }
}
