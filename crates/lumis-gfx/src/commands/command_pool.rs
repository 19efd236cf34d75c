use std::rc::Rc;

use ash::vk;

use crate::foundation::device::GfxDevice;

pub struct GfxCommandPool {
    handle: vk::CommandPool,
    queue_family_index: u32,

    device: Rc<GfxDevice>,
}

impl GfxCommandPool {
    pub fn new(
        device: Rc<GfxDevice>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> Self {
        let pool = unsafe {
            device
                .create_command_pool(
                    &vk::CommandPoolCreateInfo::default().flags(flags).queue_family_index(queue_family_index),
                    None,
                )
                .unwrap()
        };
        device.set_object_debug_name(pool, debug_name);

        Self {
            handle: pool,
            queue_family_index,
            device,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// 这个调用并不会释放资源，而是将 pool 内的 command buffer 设置到初始状态
    pub fn reset_all_buffers(&self) {
        unsafe {
            self.device.reset_command_pool(self.handle, vk::CommandPoolResetFlags::empty()).unwrap();
        }
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
    }
}
