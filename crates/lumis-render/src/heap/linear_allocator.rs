//! 每帧的瞬态 GPU 资源都从这里分配
//!
//! 三个相互独立的 arena（uniform / storage / 通用 buffer）按 frames-in-flight
//! 各复制一份。分配只会单调推进 offset，帧边界整体归零；没有逐个释放。
//!
//! 任何分配返回的指针/句柄都不允许被「arena 被后续帧复用之后才提交」的 GPU
//! 工作读取。分配器本身不检测这种情况，generation 标签把它变成绑定时的断言。

use std::cell::Cell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use ash::vk;
use bytemuck::Pod;
use lumis_gfx::gfx::Gfx;
use lumis_gfx::resources::buffer::GfxBuffer;

use crate::error::RenderError;
use crate::layouts::PipelineLayouts;
use crate::settings::{EngineSettings, FrameLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaKind {
    Uniform,
    Storage,
    Buffer,
}

/// arena 的代数标签
///
/// 每次 reset_frame 都会让对应 frame slot 的代数 +1；
/// 绑定 descriptor 时校验分配结果的代数是否仍是当前代，
/// 把 use-after-reset 从静默的显存损坏升级为明确的断言失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaGeneration(pub(crate) u64);

/// 超出容量时的记录，由调用方换成带 ArenaKind 的 RenderError
#[derive(Debug)]
struct ArenaOverflow {
    requested: vk::DeviceSize,
    offset: vk::DeviceSize,
    capacity: vk::DeviceSize,
}

#[inline]
fn align_up(x: vk::DeviceSize, align: vk::DeviceSize) -> vk::DeviceSize {
    (x + align - 1) & !(align - 1)
}

/// offset 记账，与 GPU 内存无关，可以独立测试
///
/// offset 永远是 min_align 的倍数；每次分配把 offset 推进
/// align(size, min_align)，推进会越界时整体失败，已有分配不受影响。
struct ArenaCursor {
    offset: Cell<vk::DeviceSize>,
    capacity: vk::DeviceSize,
    min_align: vk::DeviceSize,
}

impl ArenaCursor {
    fn new(capacity: vk::DeviceSize, min_align: vk::DeviceSize) -> Self {
        assert!(min_align.is_power_of_two(), "arena alignment must be a power of two: {min_align}");
        Self {
            offset: Cell::new(0),
            capacity,
            min_align,
        }
    }

    /// 返回分配的起始 offset
    ///
    /// align 可以高于 min_align（SBT 需要 base alignment），此时起点会额外取整
    fn alloc(&self, size: vk::DeviceSize, align: vk::DeviceSize) -> Result<vk::DeviceSize, ArenaOverflow> {
        let align = align.max(self.min_align);
        assert!(align.is_power_of_two(), "allocation alignment must be a power of two: {align}");

        let start = align_up(self.offset.get(), align);
        let end = start + align_up(size, self.min_align);
        if end > self.capacity {
            return Err(ArenaOverflow {
                requested: size,
                offset: self.offset.get(),
                capacity: self.capacity,
            });
        }

        self.offset.set(end);
        Ok(start)
    }

    /// 归零需要独占访问，保证所有未归还的写入 slice 都已经结束借用
    fn reset(&mut self) {
        self.offset.set(0);
    }

    #[inline]
    fn used(&self) -> vk::DeviceSize {
        self.offset.get()
    }
}

/// 指向 mapped GPU 内存的类型化写入窗口
///
/// 生命周期锚定在分配器上：reset_frame 需要 &mut 分配器，
/// 因此不可能有 slice 活过下一次 reset。
pub struct GpuWriteSlice<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> GpuWriteSlice<'a, T> {
    /// # Safety
    /// ptr 指向的区域必须至少容纳 len 个 T，且在 'a 内没有别的访问者
    pub(crate) unsafe fn new(ptr: *mut T, len: usize) -> Self {
        Self {
            ptr: NonNull::new(ptr).expect("mapped arena pointer is null"),
            len,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Deref for GpuWriteSlice<'a, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<'a, T> DerefMut for GpuWriteSlice<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// alloc_uniform 的结果：单个 T 的写入窗口 + 绑定所需的全部信息
pub struct UniformAlloc<'a, T> {
    slice: GpuWriteSlice<'a, T>,

    pub buffer: vk::Buffer,
    /// 绑定时的 dynamic offset
    pub offset: u32,
    /// arena 的固定 descriptor set，逐 draw 只变化 dynamic offset
    pub set: vk::DescriptorSet,
    pub generation: ArenaGeneration,
}

impl<'a, T> Deref for UniformAlloc<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.slice[0]
    }
}

impl<'a, T> DerefMut for UniformAlloc<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.slice[0]
    }
}

/// alloc_storage 的结果
pub struct StorageAlloc<'a, T> {
    slice: GpuWriteSlice<'a, T>,

    pub buffer: vk::Buffer,
    pub offset: u32,
    pub set: vk::DescriptorSet,
    pub generation: ArenaGeneration,
}

impl<'a, T> Deref for StorageAlloc<'a, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.slice
    }
}

impl<'a, T> DerefMut for StorageAlloc<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.slice
    }
}

/// alloc_buffer 的结果，vertex/index/SBT 等调用方自行绑定的数据
pub struct BufferAlloc<'a, T> {
    slice: GpuWriteSlice<'a, T>,

    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub generation: ArenaGeneration,
}

impl<'a, T> Deref for BufferAlloc<'a, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.slice
    }
}

impl<'a, T> DerefMut for BufferAlloc<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.slice
    }
}

/// 单个 arena：persistent mapped 的 buffer + cursor + 可选的固定 descriptor set
struct HeapArena {
    buffer: GfxBuffer,
    cursor: ArenaCursor,
    set: Option<vk::DescriptorSet>,
}

impl HeapArena {
    fn new(
        gfx: &Gfx,
        capacity: vk::DeviceSize,
        min_align: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        set: Option<vk::DescriptorSet>,
        name: &str,
    ) -> Self {
        let buffer = GfxBuffer::new(gfx, capacity, usage, None, true, name);
        Self {
            buffer,
            cursor: ArenaCursor::new(capacity, min_align),
            set,
        }
    }

    /// # Safety
    /// 返回的指针窗口 [offset, offset+size) 在 arena 归零前只有这一个使用者
    unsafe fn write_ptr<T>(&self, offset: vk::DeviceSize) -> *mut T {
        unsafe { self.buffer.mapped_ptr().add(offset as usize) as *mut T }
    }

    fn flush_used(&self) {
        let used = self.cursor.used();
        if used > 0 {
            self.buffer.flush(0, used);
        }
    }
}

struct FrameHeap {
    uniform: HeapArena,
    storage: HeapArena,
    buffer: HeapArena,
    generation: u64,
}

/// 每帧的线性堆分配器
///
/// 单线程使用；分配走 &self（内部 Cell 记账），因此一个 draw 里可以同时持有
/// uniform/storage/vertex/index 多个分配。reset_frame 独占 &mut self。
pub struct LinearHeapAllocator {
    frames: Vec<FrameHeap>,
    crt: usize,
}

// init
impl LinearHeapAllocator {
    pub fn new(gfx: &Gfx, layouts: &PipelineLayouts, settings: &EngineSettings) -> Self {
        let uniform_align = gfx.physical_device.min_uniform_offset_align();
        let storage_align = gfx.physical_device.min_storage_offset_align();

        let frames = (0..settings.frames_in_flight)
            .map(|fif| {
                let label = FrameLabel::from_usize(fif);

                let uniform = HeapArena::new(
                    gfx,
                    settings.uniform_arena_size,
                    uniform_align,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    Some(layouts.uniform_set_layout.allocate_set(gfx.descriptor_pool(), &format!("heap-uniform-{label}"))),
                    &format!("heap-uniform-{label}"),
                );
                let storage = HeapArena::new(
                    gfx,
                    settings.storage_arena_size,
                    storage_align,
                    vk::BufferUsageFlags::STORAGE_BUFFER,
                    Some(layouts.storage_set_layout.allocate_set(gfx.descriptor_pool(), &format!("heap-storage-{label}"))),
                    &format!("heap-storage-{label}"),
                );
                let buffer = HeapArena::new(
                    gfx,
                    settings.buffer_arena_size,
                    // 通用 arena 按请求类型的自然对齐来分配，这里只设置一个下限
                    16,
                    vk::BufferUsageFlags::VERTEX_BUFFER
                        | vk::BufferUsageFlags::INDEX_BUFFER
                        | vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR
                        | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
                    None,
                    &format!("heap-buffer-{label}"),
                );

                // arena 的 descriptor set 只在这里写一次：
                // binding 固定指向 arena buffer 的起始，逐 draw 的位置完全由 dynamic offset 表达
                let uniform_info = vk::DescriptorBufferInfo::default()
                    .buffer(uniform.buffer.vk_buffer())
                    .offset(0)
                    .range(settings.uniform_descriptor_range);
                let storage_info = vk::DescriptorBufferInfo::default()
                    .buffer(storage.buffer.vk_buffer())
                    .offset(0)
                    .range(settings.storage_descriptor_range);
                let writes = [
                    vk::WriteDescriptorSet::default()
                        .dst_set(uniform.set.unwrap())
                        .dst_binding(0)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                        .buffer_info(std::slice::from_ref(&uniform_info)),
                    vk::WriteDescriptorSet::default()
                        .dst_set(storage.set.unwrap())
                        .dst_binding(0)
                        .descriptor_type(vk::DescriptorType::STORAGE_BUFFER_DYNAMIC)
                        .buffer_info(std::slice::from_ref(&storage_info)),
                ];
                unsafe {
                    gfx.device.update_descriptor_sets(&writes, &[]);
                }

                FrameHeap {
                    uniform,
                    storage,
                    buffer,
                    generation: 1,
                }
            })
            .collect();

        Self { frames, crt: 0 }
    }
}

// 分配入口
impl LinearHeapAllocator {
    /// 分配一个 T 的 uniform 空间，返回写入窗口和绑定信息
    pub fn alloc_uniform<T: Pod>(&self) -> Result<UniformAlloc<'_, T>, RenderError> {
        let frame = &self.frames[self.crt];
        let arena = &frame.uniform;

        let offset = arena
            .cursor
            .alloc(size_of::<T>() as vk::DeviceSize, align_of::<T>() as vk::DeviceSize)
            .map_err(|e| self.exhausted(ArenaKind::Uniform, e))?;

        Ok(UniformAlloc {
            slice: unsafe { GpuWriteSlice::new(arena.write_ptr::<T>(offset), 1) },
            buffer: arena.buffer.vk_buffer(),
            offset: offset as u32,
            set: arena.set.unwrap(),
            generation: ArenaGeneration(frame.generation),
        })
    }

    /// 分配 count 个 T 的 storage 空间
    pub fn alloc_storage<T: Pod>(&self, count: usize) -> Result<StorageAlloc<'_, T>, RenderError> {
        let frame = &self.frames[self.crt];
        let arena = &frame.storage;

        let offset = arena
            .cursor
            .alloc((count * size_of::<T>()) as vk::DeviceSize, align_of::<T>() as vk::DeviceSize)
            .map_err(|e| self.exhausted(ArenaKind::Storage, e))?;

        Ok(StorageAlloc {
            slice: unsafe { GpuWriteSlice::new(arena.write_ptr::<T>(offset), count) },
            buffer: arena.buffer.vk_buffer(),
            offset: offset as u32,
            set: arena.set.unwrap(),
            generation: ArenaGeneration(frame.generation),
        })
    }

    /// 分配 count 个 T 的通用 buffer 空间（vertex/index 数据）
    pub fn alloc_buffer<T: Pod>(&self, count: usize) -> Result<BufferAlloc<'_, T>, RenderError> {
        self.alloc_buffer_with_align(count, align_of::<T>() as vk::DeviceSize)
    }

    /// 带显式对齐要求的通用分配，SBT 需要 shader group base alignment
    pub fn alloc_buffer_with_align<T: Pod>(
        &self,
        count: usize,
        align: vk::DeviceSize,
    ) -> Result<BufferAlloc<'_, T>, RenderError> {
        let frame = &self.frames[self.crt];
        let arena = &frame.buffer;

        let offset = arena
            .cursor
            .alloc((count * size_of::<T>()) as vk::DeviceSize, align)
            .map_err(|e| self.exhausted(ArenaKind::Buffer, e))?;

        Ok(BufferAlloc {
            slice: unsafe { GpuWriteSlice::new(arena.write_ptr::<T>(offset), count) },
            buffer: arena.buffer.vk_buffer(),
            offset,
            generation: ArenaGeneration(frame.generation),
        })
    }

    fn exhausted(&self, kind: ArenaKind, e: ArenaOverflow) -> RenderError {
        RenderError::ArenaExhausted {
            kind,
            requested: e.requested,
            offset: e.offset,
            capacity: e.capacity,
        }
    }
}

// frame 生命周期
impl LinearHeapAllocator {
    /// 帧边界调用且只调用一次
    ///
    /// 调用方（frame controller）必须已经确认 label 对应 slot 的上一次 GPU
    /// 消费全部 retire（fence 等待），这是本分配器最锋利的契约。
    pub fn reset_frame(&mut self, label: FrameLabel) {
        self.crt = *label;
        let frame = &mut self.frames[self.crt];
        frame.uniform.cursor.reset();
        frame.storage.cursor.reset();
        frame.buffer.cursor.reset();
        frame.generation += 1;
    }

    /// 当前 frame slot 的代数
    #[inline]
    pub fn current_generation(&self) -> ArenaGeneration {
        ArenaGeneration(self.frames[self.crt].generation)
    }

    /// 通用 arena 当前帧 buffer 的 device address（SBT region 计算用）
    #[inline]
    pub fn buffer_arena_device_address(&self) -> vk::DeviceAddress {
        self.frames[self.crt].buffer.buffer.device_address()
    }

    /// uniform arena 的固定 descriptor set
    #[inline]
    pub fn uniform_set(&self) -> vk::DescriptorSet {
        self.frames[self.crt].uniform.set.unwrap()
    }

    /// storage arena 的固定 descriptor set
    ///
    /// layout 里有 storage set 而当前 draw 不消费它时，以 offset 0 作占位绑定
    #[inline]
    pub fn storage_set(&self) -> vk::DescriptorSet {
        self.frames[self.crt].storage.set.unwrap()
    }

    /// voxelizer 读回 GPU 写入的 storage 数据之前调用
    pub fn invalidate_storage(&self, offset: u32, size: vk::DeviceSize) {
        self.frames[self.crt].storage.buffer.invalidate(offset as vk::DeviceSize, size);
    }

    /// 提交之前把本帧写过的区间 flush 出去（非 host-coherent 内存的要求）
    pub fn flush_frame(&self) {
        let frame = &self.frames[self.crt];
        frame.uniform.flush_used();
        frame.storage.flush_used();
        frame.buffer.flush_used();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ArenaCursor 是分配逻辑的全部，GPU buffer 只是它旁边的一块 mapped 内存，
    // 因此下面的测试覆盖的是分配器的核心性质。

    #[test]
    fn allocations_are_disjoint_and_ordered() {
        let cursor = ArenaCursor::new(1024 * 1024, 256);

        let mut regions = vec![];
        for size in [64u64, 300, 256, 1, 4096] {
            let offset = cursor.alloc(size, 1).unwrap();
            regions.push((offset, size));
        }

        // 调用顺序决定 offset 单调递增
        for pair in regions.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
        // 区间两两不相交
        for (i, (off_a, size_a)) in regions.iter().enumerate() {
            for (off_b, size_b) in regions.iter().skip(i + 1) {
                assert!(off_a + size_a <= *off_b || off_b + size_b <= *off_a);
            }
        }
    }

    #[test]
    fn offsets_respect_min_alignment() {
        let cursor = ArenaCursor::new(4096, 256);
        for _ in 0..8 {
            let offset = cursor.alloc(100, 1).unwrap();
            assert_eq!(offset % 256, 0);
        }
    }

    #[test]
    fn overflow_fails_at_the_overflowing_call() {
        let cursor = ArenaCursor::new(1024, 64);

        // 300 对齐到 64 是 320：三次分配占用 960，第四次越界
        assert_eq!(cursor.alloc(300, 1).unwrap(), 0);
        assert_eq!(cursor.alloc(300, 1).unwrap(), 320);
        assert_eq!(cursor.alloc(300, 1).unwrap(), 640);

        let err = cursor.alloc(300, 1).unwrap_err();
        assert_eq!(err.offset, 960);
        assert_eq!(err.capacity, 1024);
        assert_eq!(err.requested, 300);

        // 失败的分配不会推进 offset，小一点的请求仍然可以成功
        assert_eq!(cursor.alloc(64, 1).unwrap(), 960);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut cursor = ArenaCursor::new(4096, 64);
        cursor.alloc(1000, 1).unwrap();
        cursor.alloc(1000, 1).unwrap();

        cursor.reset();
        assert_eq!(cursor.alloc(64, 1).unwrap(), 0);
    }

    #[test]
    fn separate_arenas_start_at_zero() {
        // uniform 64B 和 storage 4096B 落在不同 arena，offset 都是 0
        let uniform = ArenaCursor::new(1024 * 1024, 256);
        let storage = ArenaCursor::new(1024 * 1024, 64);

        assert_eq!(uniform.alloc(64, 1).unwrap(), 0);
        assert_eq!(storage.alloc(4096, 1).unwrap(), 0);
    }

    #[test]
    fn explicit_alignment_rounds_start_up() {
        let cursor = ArenaCursor::new(4096, 16);
        cursor.alloc(10, 1).unwrap();

        // SBT 一类的请求要求更大的对齐
        let offset = cursor.alloc(32, 64).unwrap();
        assert_eq!(offset % 64, 0);
    }

    #[test]
    fn exact_fit_succeeds() {
        let cursor = ArenaCursor::new(1024, 64);
        assert_eq!(cursor.alloc(1024, 1).unwrap(), 0);
        assert!(cursor.alloc(1, 1).is_err());
    }

    #[test]
    fn write_slice_reads_back() {
        let mut backing = vec![0u32; 64];
        {
            let mut slice = unsafe { GpuWriteSlice::new(backing.as_mut_ptr(), 4) };
            slice.copy_from_slice(&[1, 2, 3, 4]);
            assert_eq!(slice[3], 4);
        }
        assert_eq!(&backing[0..4], &[1, 2, 3, 4]);
    }
}
