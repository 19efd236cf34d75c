mod linear_allocator;

pub use linear_allocator::{
    ArenaGeneration, ArenaKind, BufferAlloc, GpuWriteSlice, LinearHeapAllocator, StorageAlloc, UniformAlloc,
};
