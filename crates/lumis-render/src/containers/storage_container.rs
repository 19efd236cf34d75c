//! 跨帧存活的 storage buffer 容器
//!
//! 与线性堆的 storage arena 不同，这里的 buffer 是持久的（流体求解的
//! 速度场、密度场等），每个条目带一个与 dynamic-storage set layout 兼容的
//! descriptor set，绑定时 dynamic offset 恒为 0。

use std::collections::HashMap;

use ash::vk;
use bytemuck::Pod;
use lumis_gfx::gfx::Gfx;
use lumis_gfx::resources::buffer::GfxBuffer;

use crate::layouts::PipelineLayouts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageId(u64);

pub struct StorageEntry {
    pub buffer: GfxBuffer,
    pub descriptor_set: vk::DescriptorSet,
    pub size: vk::DeviceSize,
}

#[derive(Default)]
pub struct StorageContainer {
    entries: HashMap<StorageId, StorageEntry>,
    next_id: u64,
}

impl StorageContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建一个 device local 的 storage buffer 并填入初始数据
    pub fn create_storage<T: Pod>(&mut self, gfx: &Gfx, layouts: &PipelineLayouts, data: &[T]) -> StorageId {
        let id = StorageId(self.next_id);
        self.next_id += 1;

        let size = size_of_val(data) as vk::DeviceSize;
        let buffer = GfxBuffer::new_device_buffer(
            gfx,
            size,
            vk::BufferUsageFlags::STORAGE_BUFFER,
            format!("storage-{}", id.0),
        );
        buffer.transfer_data_sync(gfx, data);

        let descriptor_set =
            layouts.storage_set_layout.allocate_set(gfx.descriptor_pool(), &format!("storage-set-{}", id.0));
        let buffer_info = vk::DescriptorBufferInfo::default().buffer(buffer.vk_buffer()).offset(0).range(size);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER_DYNAMIC)
            .buffer_info(std::slice::from_ref(&buffer_info));
        unsafe {
            gfx.device.update_descriptor_sets(std::slice::from_ref(&write), &[]);
        }

        self.entries.insert(
            id,
            StorageEntry {
                buffer,
                descriptor_set,
                size,
            },
        );
        id
    }

    #[inline]
    pub fn get(&self, id: StorageId) -> &StorageEntry {
        self.entries.get(&id).expect("unknown storage id")
    }

    /// 调用方需要保证 GPU 不再引用这个 buffer
    pub fn remove_storage(&mut self, id: StorageId) {
        self.entries.remove(&id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
