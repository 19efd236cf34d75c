use std::ptr;
use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::gfx::Gfx;

/// 基于 VMA 的 buffer 封装
///
/// mem_map 为 true 时，buffer 在整个生命周期内保持 persistent mapping。
pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在创建阶段写死
    map_ptr: Option<*mut u8>,
    /// 只有在 buffer usage 包含 SHADER_DEVICE_ADDRESS 时才有值
    device_addr: Option<vk::DeviceAddress>,

    debug_name: String,

    allocator: Rc<vk_mem::Allocator>,
}

// init & destroy
impl GfxBuffer {
    /// - align: 指定 buffer 起始地址的额外对齐要求，None 表示使用默认的 8 字节
    pub fn new(
        gfx: &Gfx,
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        align: Option<vk::DeviceSize>,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> Self {
        let buffer_ci = vk::BufferCreateInfo::default().size(buffer_size).usage(buffer_usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let align = align.unwrap_or(8);
        let (buffer, mut allocation) =
            unsafe { gfx.allocator().create_buffer_with_alignment(&buffer_ci, &alloc_ci, align).unwrap() };

        let mut map_ptr = None;
        if mem_map {
            map_ptr = Some(unsafe { gfx.allocator().map_memory(&mut allocation).unwrap() });
        }

        let mut device_addr = None;
        if buffer_usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            device_addr = Some(unsafe {
                gfx.device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer))
            });
        }

        gfx.device.set_object_debug_name(buffer, format!("Buffer::{}", name.as_ref()));
        Self {
            handle: buffer,
            allocation,
            size: buffer_size,
            map_ptr,
            device_addr,
            debug_name: name.as_ref().to_string(),
            allocator: gfx.vm_allocator.clone(),
        }
    }

    #[inline]
    pub fn new_stage_buffer(gfx: &Gfx, size: vk::DeviceSize, debug_name: impl AsRef<str>) -> Self {
        Self::new(gfx, size, vk::BufferUsageFlags::TRANSFER_SRC, None, true, debug_name)
    }

    #[inline]
    pub fn new_device_buffer(
        gfx: &Gfx,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        debug_name: impl AsRef<str>,
    ) -> Self {
        Self::new(gfx, size, usage | vk::BufferUsageFlags::TRANSFER_DST, None, false, debug_name)
    }
}

impl Drop for GfxBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.map_ptr.is_some() {
                self.allocator.unmap_memory(&mut self.allocation);
            }
            self.allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.device_addr.expect(
            "Buffer does not have device address, please make sure the buffer usage contains SHADER_DEVICE_ADDRESS",
        )
    }

    #[inline]
    pub fn mapped_ptr(&self) -> *mut u8 {
        self.map_ptr.expect("Buffer is not mapped")
    }
}

// tools
impl GfxBuffer {
    #[inline]
    pub fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) {
        self.allocator.flush_allocation(&self.allocation, offset, size).unwrap();
    }

    /// CPU 读取 GPU 写入的数据之前调用（非 host-coherent 内存）
    #[inline]
    pub fn invalidate(&self, offset: vk::DeviceSize, size: vk::DeviceSize) {
        self.allocator.invalidate_allocation(&self.allocation, offset, size).unwrap();
    }

    /// 通过 mem map 的方式将 data 传入到 buffer 中
    pub fn transfer_data_by_mmap<T>(&self, data: &[T])
    where
        T: Sized + Copy,
    {
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr() as *const u8, self.mapped_ptr(), size_of_val(data));
        }
        self.flush(0, size_of_val(data) as vk::DeviceSize);
    }

    /// 创建一个临时的 stage buffer，先将数据放入 stage buffer，再 transfer 到 self
    ///
    /// 同步等待传输完成，只应该用于初始化阶段的大块数据
    pub fn transfer_data_sync(&self, gfx: &Gfx, data: &[impl Sized + Copy]) {
        let stage_buffer =
            Self::new_stage_buffer(gfx, size_of_val(data) as vk::DeviceSize, format!("{}-stage", self.debug_name));
        stage_buffer.transfer_data_by_mmap(data);

        gfx.one_time_exec(
            |cmd| {
                cmd.cmd_copy_buffer(
                    stage_buffer.vk_buffer(),
                    self.handle,
                    &[vk::BufferCopy {
                        size: size_of_val(data) as vk::DeviceSize,
                        ..Default::default()
                    }],
                );
            },
            &format!("{}-transfer-data", self.debug_name),
        );
    }
}
