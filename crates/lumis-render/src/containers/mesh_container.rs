//! device local 的 mesh 容器
//!
//! 每个 mesh 是一个 buffer：顶点在前，index 紧随其后（单 buffer 双用途）。

use std::collections::HashMap;

use ash::vk;
use bytemuck::Pod;
use lumis_gfx::gfx::Gfx;
use lumis_gfx::resources::buffer::GfxBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(u64);

pub struct MeshEntry {
    pub buffer: GfxBuffer,
    /// index 数据在 buffer 内的起始位置
    pub index_offset: vk::DeviceSize,
    pub index_count: u32,
}

#[derive(Default)]
pub struct MeshContainer {
    entries: HashMap<MeshId, MeshEntry>,
    next_id: u64,
}

impl MeshContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_mesh<V: Pod>(&mut self, gfx: &Gfx, vertices: &[V], indices: &[u32]) -> MeshId {
        let id = MeshId(self.next_id);
        self.next_id += 1;

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        // index 起始按 4 字节对齐，顶点数据都是 f32，天然满足
        let index_offset = vertex_bytes.len() as vk::DeviceSize;
        assert_eq!(index_offset % 4, 0);

        let mut data = Vec::with_capacity(vertex_bytes.len() + index_bytes.len());
        data.extend_from_slice(vertex_bytes);
        data.extend_from_slice(index_bytes);

        let buffer = GfxBuffer::new_device_buffer(
            gfx,
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER,
            format!("mesh-{}", id.0),
        );
        buffer.transfer_data_sync(gfx, &data);

        self.entries.insert(
            id,
            MeshEntry {
                buffer,
                index_offset,
                index_count: indices.len() as u32,
            },
        );
        id
    }

    #[inline]
    pub fn get(&self, id: MeshId) -> &MeshEntry {
        self.entries.get(&id).expect("unknown mesh id")
    }

    /// 调用方需要保证 GPU 不再引用这个 mesh
    pub fn remove_mesh(&mut self, id: MeshId) {
        self.entries.remove(&id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
