//! 固定的 pipeline layout 注册表
//!
//! 引擎只使用三种命名 layout（standard / storage / ray-tracing），
//! 所有 shader 都按这三种布局编写，渲染例程据此构建绑定列表。

use std::rc::Rc;

use ash::vk;
use lumis_gfx::descriptors::GfxDescriptorSetLayout;
use lumis_gfx::foundation::device::GfxDevice;
use lumis_gfx::gfx::Gfx;

/// bindless 2D 纹理表的容量
pub const MAX_BINDLESS_TEXTURES_2D: u32 = 128;
/// bindless 3D（volume）纹理表的容量
pub const MAX_BINDLESS_TEXTURES_3D: u32 = 16;
/// push constant 固定为 4 个 u32（纹理索引等）
pub const PUSH_CONSTANT_SIZE: u32 = 16;

/// layout 的静态描述，绑定列表的能力检查靠它；与设备无关，可以独立测试
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineLayoutMeta {
    /// 每个 set 含有的 dynamic binding 数量，下标即 set index
    pub set_dynamic_counts: Vec<u32>,
}

impl PipelineLayoutMeta {
    #[inline]
    pub fn set_count(&self) -> usize {
        self.set_dynamic_counts.len()
    }

    /// 绑定前 bound_sets 个 set 所需要的 dynamic offset 数量
    #[inline]
    pub fn dynamic_offsets_for(&self, bound_sets: usize) -> u32 {
        self.set_dynamic_counts[..bound_sets].iter().sum()
    }
}

pub struct PipelineLayoutInfo {
    pub handle: vk::PipelineLayout,
    pub meta: PipelineLayoutMeta,
}

/// 引擎初始化时创建的全部 set layout 与 pipeline layout
pub struct PipelineLayouts {
    /// set: binding0 = UNIFORM_BUFFER_DYNAMIC
    pub uniform_set_layout: GfxDescriptorSetLayout,
    /// set: binding0 = STORAGE_BUFFER_DYNAMIC
    pub storage_set_layout: GfxDescriptorSetLayout,
    /// set: binding0 = COMBINED_IMAGE_SAMPLER x128，bindless
    pub textures_2d_set_layout: GfxDescriptorSetLayout,
    /// set: binding0 = COMBINED_IMAGE_SAMPLER x16，volume 纹理
    pub textures_3d_set_layout: GfxDescriptorSetLayout,
    /// set: binding0 = STORAGE_IMAGE
    pub storage_image_set_layout: GfxDescriptorSetLayout,
    /// set: binding0 = ACCELERATION_STRUCTURE_KHR
    pub accel_set_layout: GfxDescriptorSetLayout,

    /// [uniform, storage, tex2d, tex3d]
    pub standard: PipelineLayoutInfo,
    /// [uniform, storage, storage, storage, storage]，流体求解一次绑定多个场
    pub storage: PipelineLayoutInfo,
    /// [uniform, storage, storage image, tlas]
    pub ray_tracing: PipelineLayoutInfo,

    device: Rc<GfxDevice>,
}

impl PipelineLayouts {
    pub fn new(gfx: &Gfx) -> Self {
        let device = gfx.device.clone();

        let dynamic_buffer_layout = |ty: vk::DescriptorType, name: &str| {
            GfxDescriptorSetLayout::new(
                device.clone(),
                &[vk::DescriptorSetLayoutBinding::default()
                    .binding(0)
                    .descriptor_type(ty)
                    .descriptor_count(1)
                    .stage_flags(vk::ShaderStageFlags::ALL)],
                &[],
                vk::DescriptorSetLayoutCreateFlags::empty(),
                name,
            )
        };
        let uniform_set_layout = dynamic_buffer_layout(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, "set-layout-uniform");
        let storage_set_layout = dynamic_buffer_layout(vk::DescriptorType::STORAGE_BUFFER_DYNAMIC, "set-layout-storage");

        let bindless_layout = |count: u32, name: &str| {
            GfxDescriptorSetLayout::new(
                device.clone(),
                &[vk::DescriptorSetLayoutBinding::default()
                    .binding(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .descriptor_count(count)
                    .stage_flags(vk::ShaderStageFlags::FRAGMENT)],
                &[vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND],
                vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL,
                name,
            )
        };
        let textures_2d_set_layout = bindless_layout(MAX_BINDLESS_TEXTURES_2D, "set-layout-textures-2d");
        let textures_3d_set_layout = bindless_layout(MAX_BINDLESS_TEXTURES_3D, "set-layout-textures-3d");

        let storage_image_set_layout = GfxDescriptorSetLayout::new(
            device.clone(),
            &[vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT | vk::ShaderStageFlags::RAYGEN_KHR)],
            &[],
            vk::DescriptorSetLayoutCreateFlags::empty(),
            "set-layout-storage-image",
        );
        let accel_set_layout = GfxDescriptorSetLayout::new(
            device.clone(),
            &[vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::RAYGEN_KHR)],
            &[],
            vk::DescriptorSetLayoutCreateFlags::empty(),
            "set-layout-accel",
        );

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::ALL)
            .offset(0)
            .size(PUSH_CONSTANT_SIZE);

        let create_pipeline_layout = |set_layouts: &[&GfxDescriptorSetLayout], dynamic_counts: Vec<u32>, name: &str| {
            let handles = set_layouts.iter().map(|layout| layout.handle()).collect::<Vec<_>>();
            let layout_ci = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&handles)
                .push_constant_ranges(std::slice::from_ref(&push_constant_range));
            let handle = unsafe { device.create_pipeline_layout(&layout_ci, None).unwrap() };
            device.set_object_debug_name(handle, name);
            PipelineLayoutInfo {
                handle,
                meta: PipelineLayoutMeta {
                    set_dynamic_counts: dynamic_counts,
                },
            }
        };

        let standard = create_pipeline_layout(
            &[&uniform_set_layout, &storage_set_layout, &textures_2d_set_layout, &textures_3d_set_layout],
            vec![1, 1, 0, 0],
            "pipeline-layout-standard",
        );
        let storage = create_pipeline_layout(
            &[
                &uniform_set_layout,
                &storage_set_layout,
                &storage_set_layout,
                &storage_set_layout,
                &storage_set_layout,
            ],
            vec![1, 1, 1, 1, 1],
            "pipeline-layout-storage",
        );
        let ray_tracing = create_pipeline_layout(
            &[&uniform_set_layout, &storage_set_layout, &storage_image_set_layout, &accel_set_layout],
            vec![1, 1, 0, 0],
            "pipeline-layout-ray-tracing",
        );

        Self {
            uniform_set_layout,
            storage_set_layout,
            textures_2d_set_layout,
            textures_3d_set_layout,
            storage_image_set_layout,
            accel_set_layout,
            standard,
            storage,
            ray_tracing,
            device,
        }
    }
}

impl Drop for PipelineLayouts {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.standard.handle, None);
            self.device.destroy_pipeline_layout(self.storage.handle, None);
            self.device.destroy_pipeline_layout(self.ray_tracing.handle, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_offsets_accumulate_per_bound_set() {
        let meta = PipelineLayoutMeta {
            set_dynamic_counts: vec![1, 1, 0, 0],
        };
        assert_eq!(meta.set_count(), 4);
        assert_eq!(meta.dynamic_offsets_for(1), 1);
        assert_eq!(meta.dynamic_offsets_for(2), 2);
        assert_eq!(meta.dynamic_offsets_for(4), 2);
    }
}
