use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use raw_window_handle::RawDisplayHandle;

use crate::commands::command_buffer::GfxCommandBuffer;
use crate::commands::command_pool::GfxCommandPool;
use crate::commands::submit_info::GfxSubmitInfo;
use crate::commands::synchronize::GfxFence;
use crate::foundation::debug_messenger::GfxDebugMsger;
use crate::foundation::device::GfxDevice;
use crate::foundation::physical_device::GfxPhysicalDevice;

pub struct GfxQueue {
    pub handle: vk::Queue,
    pub family_index: u32,

    device: Rc<GfxDevice>,
}

impl GfxQueue {
    pub fn submit(&self, submit_infos: &[GfxSubmitInfo], fence: Option<&GfxFence>) {
        let infos = submit_infos.iter().map(|info| info.submit_info()).collect_vec();
        unsafe {
            self.device
                .queue_submit2(self.handle, &infos, fence.map_or(vk::Fence::null(), |f| f.handle()))
                .unwrap();
        }
    }

    #[inline]
    pub fn submit_one(&self, cmd: &GfxCommandBuffer, fence: Option<&GfxFence>) {
        self.submit(&[GfxSubmitInfo::new(std::slice::from_ref(cmd))], fence);
    }
}

/// Vulkan 设备上下文
///
/// 在应用启动时创建一次，之后以引用的形式传递给所有需要它的组件；
/// 没有任何全局状态。
pub struct Gfx {
    pub vk_pf: ash::Entry,
    pub instance: ash::Instance,
    debug_msger: GfxDebugMsger,

    pub physical_device: GfxPhysicalDevice,
    pub device: Rc<GfxDevice>,

    pub vm_allocator: Rc<vk_mem::Allocator>,

    pub graphics_queue: GfxQueue,
    pub graphics_command_pool: Rc<GfxCommandPool>,

    descriptor_pool: vk::DescriptorPool,
}

// init & destroy
impl Gfx {
    const ENGINE_NAME: &'static CStr = c"Lumis";

    pub fn new(app_name: &CStr, display_handle: RawDisplayHandle) -> Self {
        let vk_pf = unsafe { ash::Entry::load() }.expect("Failed to load vulkan entry");

        let instance = Self::create_instance(&vk_pf, app_name, display_handle);
        let debug_msger = GfxDebugMsger::new(&vk_pf, &instance);

        let physical_device = GfxPhysicalDevice::new_discrete_gpu(&instance);
        let device = Rc::new(GfxDevice::new(&instance, &physical_device));
        device.set_object_debug_name(instance.handle(), "instance");
        device.set_object_debug_name(physical_device.handle, "physical-device");
        device.set_object_debug_name(device.vk_handle(), "device");

        let graphics_queue = GfxQueue {
            handle: unsafe { device.get_device_queue(physical_device.graphics_queue_family, 0) },
            family_index: physical_device.graphics_queue_family,
            device: device.clone(),
        };
        device.set_object_debug_name(graphics_queue.handle, "main-graphics-queue");

        let vm_allocator = {
            let mut allocator_ci =
                vk_mem::AllocatorCreateInfo::new(&instance, &device, physical_device.handle);
            allocator_ci.vulkan_api_version = vk::API_VERSION_1_3;
            allocator_ci.flags = vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;
            Rc::new(unsafe { vk_mem::Allocator::new(allocator_ci).unwrap() })
        };

        let graphics_command_pool = Rc::new(GfxCommandPool::new(
            device.clone(),
            physical_device.graphics_queue_family,
            vk::CommandPoolCreateFlags::empty(),
            "gfx-graphics-command-pool",
        ));

        let descriptor_pool = Self::create_descriptor_pool(&device);

        Self {
            vk_pf,
            instance,
            debug_msger,
            physical_device,
            device,
            vm_allocator,
            graphics_queue,
            graphics_command_pool,
            descriptor_pool,
        }
    }

    fn create_instance(vk_pf: &ash::Entry, app_name: &CStr, display_handle: RawDisplayHandle) -> ash::Instance {
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .engine_name(Self::ENGINE_NAME)
            .api_version(vk::API_VERSION_1_3);

        let mut instance_exts =
            ash_window::enumerate_required_extensions(display_handle).unwrap().to_vec();
        instance_exts.push(ash::ext::debug_utils::NAME.as_ptr());

        // debug 构建下开启 validation layer
        let mut layers = vec![];
        if cfg!(debug_assertions) {
            layers.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
        }

        let instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&instance_exts)
            .enabled_layer_names(&layers);

        unsafe { vk_pf.create_instance(&instance_ci, None).unwrap() }
    }

    fn create_descriptor_pool(device: &GfxDevice) -> vk::DescriptorPool {
        let pool_sizes = [
            vk::DescriptorPoolSize::default().ty(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC).descriptor_count(128),
            vk::DescriptorPoolSize::default().ty(vk::DescriptorType::STORAGE_BUFFER_DYNAMIC).descriptor_count(256),
            vk::DescriptorPoolSize::default().ty(vk::DescriptorType::STORAGE_BUFFER).descriptor_count(256),
            vk::DescriptorPoolSize::default().ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER).descriptor_count(1024),
            vk::DescriptorPoolSize::default().ty(vk::DescriptorType::STORAGE_IMAGE).descriptor_count(64),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
                .descriptor_count(16),
        ];
        let pool_ci = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
            .max_sets(1024)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_ci, None).unwrap() };
        device.set_object_debug_name(pool, "gfx-descriptor-pool");
        pool
    }

    /// 需要在所有持有 device 资源的对象销毁之后调用
    pub fn destroy(self) {
        let Gfx {
            instance,
            debug_msger,
            device,
            vm_allocator,
            graphics_command_pool,
            descriptor_pool,
            ..
        } = self;

        device.wait_idle();
        unsafe {
            device.destroy_descriptor_pool(descriptor_pool, None);
        }
        drop(graphics_command_pool);
        drop(vm_allocator);
        device.destroy();
        drop(debug_msger);
        unsafe {
            instance.destroy_instance(None);
        }
    }
}

// getters
impl Gfx {
    #[inline]
    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.vm_allocator
    }

    #[inline]
    pub fn descriptor_pool(&self) -> vk::DescriptorPool {
        self.descriptor_pool
    }

    #[inline]
    pub fn graphics_queue_family(&self) -> u32 {
        self.physical_device.graphics_queue_family
    }

    #[inline]
    pub fn wait_idle(&self) {
        self.device.wait_idle();
    }
}

// tools
impl Gfx {
    /// 录制、提交并同步等待一个一次性的 command buffer
    pub fn one_time_exec<F, R>(&self, f: F, name: &str) -> R
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        GfxCommandBuffer::one_time_exec(self.device.clone(), &self.graphics_command_pool, &self.graphics_queue, f, name)
    }
}
