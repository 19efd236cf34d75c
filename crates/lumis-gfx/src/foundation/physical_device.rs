use ash::vk;
use itertools::Itertools;

/// 物理设备封装
///
/// 选择一块独显（没有独显就退回第一块设备），并缓存后续会频繁用到的属性：
/// 内存属性、基础 limits、光线追踪管线属性。
pub struct GfxPhysicalDevice {
    pub handle: vk::PhysicalDevice,

    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub rt_pipeline_properties: vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'static>,

    /// graphics + compute + transfer 的 queue family
    pub graphics_queue_family: u32,
}

impl GfxPhysicalDevice {
    pub fn new_discrete_gpu(instance: &ash::Instance) -> Self {
        let pdevices = unsafe { instance.enumerate_physical_devices().unwrap() };
        let pdevice = pdevices
            .iter()
            .copied()
            .find(|pdevice| {
                let props = unsafe { instance.get_physical_device_properties(*pdevice) };
                props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
            })
            .unwrap_or(pdevices[0]);

        let properties = unsafe { instance.get_physical_device_properties(pdevice) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(pdevice) };

        let mut rt_pipeline_properties = vk::PhysicalDeviceRayTracingPipelinePropertiesKHR::default();
        let mut properties2 = vk::PhysicalDeviceProperties2::default().push_next(&mut rt_pipeline_properties);
        unsafe { instance.get_physical_device_properties2(pdevice, &mut properties2) };

        let graphics_queue_family = Self::find_graphics_queue_family(instance, pdevice);

        let device_name = properties.device_name_as_c_str().unwrap_or(c"unknown").to_string_lossy().into_owned();
        log::info!("physical device: {}", device_name);

        Self {
            handle: pdevice,
            properties,
            memory_properties,
            rt_pipeline_properties,
            graphics_queue_family,
        }
    }

    fn find_graphics_queue_family(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> u32 {
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        queue_families
            .iter()
            .enumerate()
            .filter(|(_, prop)| {
                prop.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)
            })
            .map(|(idx, _)| idx as u32)
            .collect_vec()[0]
    }
}

// getters
impl GfxPhysicalDevice {
    /// uniform buffer 的动态 offset 对齐要求
    #[inline]
    pub fn min_uniform_offset_align(&self) -> vk::DeviceSize {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }

    /// storage buffer 的动态 offset 对齐要求
    #[inline]
    pub fn min_storage_offset_align(&self) -> vk::DeviceSize {
        self.properties.limits.min_storage_buffer_offset_alignment
    }
}
