//! 加速结构构建
//!
//! ray demo 只需要一个程序化 AABB 的 BLAS 和单 instance 的 TLAS。
//! 构建走一次性的同步提交（场景初始化阶段），与体素化相同的刻意停顿。

use std::rc::Rc;

use ash::vk;
use lumis_gfx::foundation::device::GfxDevice;
use lumis_gfx::gfx::Gfx;
use lumis_gfx::resources::buffer::GfxBuffer;

pub struct AccelerationStructure {
    handle: vk::AccelerationStructureKHR,
    /// AS 的 backing 内存
    _buffer: GfxBuffer,
    device_address: vk::DeviceAddress,

    device: Rc<GfxDevice>,
}

impl AccelerationStructure {
    #[inline]
    pub fn handle(&self) -> vk::AccelerationStructureKHR {
        self.handle
    }

    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.device_address
    }
}

impl Drop for AccelerationStructure {
    fn drop(&mut self) {
        unsafe {
            self.device.acceleration_structure().destroy_acceleration_structure(self.handle, None);
        }
    }
}

/// 程序化几何（AABB）的 BLAS
pub fn build_procedural_blas(gfx: &Gfx, aabb: vk::AabbPositionsKHR) -> AccelerationStructure {
    let aabb_buffer = GfxBuffer::new(
        gfx,
        size_of::<vk::AabbPositionsKHR>() as vk::DeviceSize,
        vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        None,
        true,
        "blas-aabb-data",
    );
    aabb_buffer.transfer_data_by_mmap(std::slice::from_ref(&aabb));

    let geometry = vk::AccelerationStructureGeometryKHR::default()
        .geometry_type(vk::GeometryTypeKHR::AABBS)
        .flags(vk::GeometryFlagsKHR::OPAQUE)
        .geometry(vk::AccelerationStructureGeometryDataKHR {
            aabbs: vk::AccelerationStructureGeometryAabbsDataKHR::default()
                .data(vk::DeviceOrHostAddressConstKHR {
                    device_address: aabb_buffer.device_address(),
                })
                .stride(size_of::<vk::AabbPositionsKHR>() as vk::DeviceSize),
        });

    build(gfx, vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL, geometry, 1, "procedural-blas")
}

/// 单 instance 的 TLAS
pub fn build_tlas(gfx: &Gfx, blas: &AccelerationStructure) -> AccelerationStructure {
    let instance = vk::AccelerationStructureInstanceKHR {
        transform: vk::TransformMatrixKHR {
            matrix: [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        },
        instance_custom_index_and_mask: vk::Packed24_8::new(0, 0xff),
        instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(0, 0),
        acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
            device_handle: blas.device_address(),
        },
    };

    let instance_buffer = GfxBuffer::new(
        gfx,
        size_of::<vk::AccelerationStructureInstanceKHR>() as vk::DeviceSize,
        vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        None,
        true,
        "tlas-instance-data",
    );
    unsafe {
        std::ptr::copy_nonoverlapping(
            &instance as *const _ as *const u8,
            instance_buffer.mapped_ptr(),
            size_of::<vk::AccelerationStructureInstanceKHR>(),
        );
    }
    instance_buffer.flush(0, size_of::<vk::AccelerationStructureInstanceKHR>() as vk::DeviceSize);

    let geometry = vk::AccelerationStructureGeometryKHR::default()
        .geometry_type(vk::GeometryTypeKHR::INSTANCES)
        .geometry(vk::AccelerationStructureGeometryDataKHR {
            instances: vk::AccelerationStructureGeometryInstancesDataKHR::default()
                .data(vk::DeviceOrHostAddressConstKHR {
                    device_address: instance_buffer.device_address(),
                }),
        });

    build(gfx, vk::AccelerationStructureTypeKHR::TOP_LEVEL, geometry, 1, "tlas")
}

fn build(
    gfx: &Gfx,
    as_type: vk::AccelerationStructureTypeKHR,
    geometry: vk::AccelerationStructureGeometryKHR,
    primitive_count: u32,
    name: &str,
) -> AccelerationStructure {
    let mut build_info = vk::AccelerationStructureBuildGeometryInfoKHR::default()
        .ty(as_type)
        .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
        .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
        .geometries(std::slice::from_ref(&geometry));

    let mut size_info = vk::AccelerationStructureBuildSizesInfoKHR::default();
    unsafe {
        gfx.device.acceleration_structure().get_acceleration_structure_build_sizes(
            vk::AccelerationStructureBuildTypeKHR::DEVICE,
            &build_info,
            &[primitive_count],
            &mut size_info,
        );
    }

    let as_buffer = GfxBuffer::new(
        gfx,
        size_info.acceleration_structure_size,
        vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        None,
        false,
        &format!("{name}-buffer"),
    );
    let scratch_buffer = GfxBuffer::new(
        gfx,
        size_info.build_scratch_size,
        vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        Some(256),
        false,
        &format!("{name}-scratch"),
    );

    let create_info = vk::AccelerationStructureCreateInfoKHR::default()
        .buffer(as_buffer.vk_buffer())
        .size(size_info.acceleration_structure_size)
        .ty(as_type);
    let handle = unsafe {
        gfx.device.acceleration_structure().create_acceleration_structure(&create_info, None).unwrap()
    };

    build_info = build_info.dst_acceleration_structure(handle).scratch_data(vk::DeviceOrHostAddressKHR {
        device_address: scratch_buffer.device_address(),
    });

    let range_info = vk::AccelerationStructureBuildRangeInfoKHR::default().primitive_count(primitive_count);
    gfx.one_time_exec(
        |cmd| {
            cmd.build_acceleration_structure(&build_info, std::slice::from_ref(&range_info));
        },
        &format!("build-{name}"),
    );

    let device_address = unsafe {
        gfx.device.acceleration_structure().get_acceleration_structure_device_address(
            &vk::AccelerationStructureDeviceAddressInfoKHR::default().acceleration_structure(handle),
        )
    };

    AccelerationStructure {
        handle,
        _buffer: as_buffer,
        device_address,
        device: gfx.device.clone(),
    }
}
