use std::rc::Rc;

use ash::vk;

use crate::foundation::device::GfxDevice;

/// descriptor set layout 封装
///
/// layout 由 binding 列表在运行期构建；bindless 的 binding 需要额外的 binding flags。
pub struct GfxDescriptorSetLayout {
    handle: vk::DescriptorSetLayout,
    device: Rc<GfxDevice>,
}

impl GfxDescriptorSetLayout {
    pub fn new(
        device: Rc<GfxDevice>,
        bindings: &[vk::DescriptorSetLayoutBinding],
        binding_flags: &[vk::DescriptorBindingFlags],
        flags: vk::DescriptorSetLayoutCreateFlags,
        debug_name: &str,
    ) -> Self {
        let mut flags_ci = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(binding_flags);
        let mut create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings).flags(flags);
        if !binding_flags.is_empty() {
            create_info = create_info.push_next(&mut flags_ci);
        }

        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None).unwrap() };
        device.set_object_debug_name(layout, debug_name);

        Self { handle: layout, device }
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    /// 从 pool 中分配一个该 layout 的 descriptor set
    pub fn allocate_set(&self, pool: vk::DescriptorPool, debug_name: &str) -> vk::DescriptorSet {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(std::slice::from_ref(&self.handle));
        let set = unsafe { self.device.allocate_descriptor_sets(&alloc_info).unwrap()[0] };
        self.device.set_object_debug_name(set, debug_name);
        set
    }
}

impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.handle, None);
        }
    }
}
