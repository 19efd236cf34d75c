//! pipeline 容器
//!
//! 以 PipelineStateDesc 为 key 的惰性缓存：第一次请求同步构建 device
//! pipeline 并缓存，之后逐字段相等的描述直接命中。首次构建是一次昂贵的
//! 同步操作，热路径上的调用方应该在场景初始化时预创建；即便每帧调用，
//! 容器也保持正确，只是慢。

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use lumis_gfx::foundation::device::GfxDevice;
use lumis_gfx::pipelines::shader::{GfxShaderError, GfxShaderModule};

use crate::error::RenderError;
use crate::layouts::PipelineLayoutInfo;
use crate::pipelines::shader_catalog::{ShaderId, ShaderStagePaths};
use crate::pipelines::state::{BlendMode, PipelineKind, PipelineStateDesc};

/// 构建完成的 pipeline
///
/// 由容器独占所有权；渲染例程在一次提交期间借用句柄，不会销毁或修改它。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

/// 纯粹的缓存映射，和设备无关
pub(crate) struct PipelineCache {
    map: HashMap<PipelineStateDesc, Pipeline>,
}

impl PipelineCache {
    fn new() -> Self {
        Self { map: HashMap::new() }
    }

    #[inline]
    fn get(&self, desc: &PipelineStateDesc) -> Option<Pipeline> {
        self.map.get(desc).copied()
    }

    #[inline]
    fn insert(&mut self, desc: PipelineStateDesc, pipeline: Pipeline) {
        let previous = self.map.insert(desc, pipeline);
        debug_assert!(previous.is_none(), "pipeline cache overwrote an existing entry");
    }

    /// 清空缓存，交出所有 pipeline 以便销毁
    fn drain(&mut self) -> Vec<Pipeline> {
        self.map.drain().map(|(_, pipeline)| pipeline).collect_vec()
    }

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }
}

pub struct PipelineContainer {
    cache: PipelineCache,
    /// 统计量，也用于测试「同一描述只构建一次」
    build_count: usize,

    device: Rc<GfxDevice>,
}

// init & destroy
impl PipelineContainer {
    pub fn new(device: Rc<GfxDevice>) -> Self {
        Self {
            cache: PipelineCache::new(),
            build_count: 0,
            device,
        }
    }

    /// 销毁所有缓存的 pipeline 并清空缓存
    ///
    /// 用于 shader 热重载；调用方必须先等待 device idle，
    /// 确保没有 in-flight 的 command buffer 还引用着缓存里的 pipeline。
    pub fn reset(&mut self) {
        let pipelines = self.cache.drain();
        log::info!("resetting pipeline container, destroying {} pipelines", pipelines.len());
        for pipeline in pipelines {
            unsafe {
                self.device.destroy_pipeline(pipeline.pipeline, None);
            }
        }
    }
}

impl Drop for PipelineContainer {
    fn drop(&mut self) {
        if self.cache.len() > 0 {
            log::warn!("pipeline container dropped with {} live pipelines, call reset() first", self.cache.len());
        }
    }
}

// 缓存入口
impl PipelineContainer {
    /// 获取或构建描述对应的 pipeline
    ///
    /// 命中缓存时 O(1) 返回已构建的对象；否则按 kind 走各自的构建路径。
    pub fn get_or_create_pipeline(&mut self, desc: &PipelineStateDesc) -> Result<Pipeline, RenderError> {
        if let Some(pipeline) = self.cache.get(desc) {
            return Ok(pipeline);
        }

        let pipeline = match desc.kind {
            PipelineKind::Graphics => self.build_graphics(desc)?,
            PipelineKind::Compute => self.build_compute(desc)?,
            PipelineKind::RayTracing => self.build_ray_tracing(desc)?,
        };
        self.build_count += 1;
        self.cache.insert(desc.clone(), pipeline);

        log::info!("built {:?} pipeline for {:?} (cache size {})", desc.kind, desc.shader, self.cache.len());
        Ok(pipeline)
    }

    /// compute pipeline 的便捷入口，与图形管线共享缓存
    pub fn create_compute_pipeline(
        &mut self,
        layout: &PipelineLayoutInfo,
        shader: ShaderId,
    ) -> Result<Pipeline, RenderError> {
        self.get_or_create_pipeline(&PipelineStateDesc::compute(shader, layout.handle))
    }

    /// ray tracing pipeline 的便捷入口
    pub fn create_ray_tracing_pipeline(
        &mut self,
        layout: &PipelineLayoutInfo,
        shader: ShaderId,
        max_ray_recursion: u32,
    ) -> Result<Pipeline, RenderError> {
        self.get_or_create_pipeline(&PipelineStateDesc::ray_tracing(shader, layout.handle, max_ray_recursion))
    }

    #[inline]
    pub fn build_count(&self) -> usize {
        self.build_count
    }
}

// 构建路径
impl PipelineContainer {
    fn load_shader(&self, shader: ShaderId, path: &'static str) -> Result<GfxShaderModule, RenderError> {
        GfxShaderModule::new(self.device.clone(), Path::new(path)).map_err(|e| match e {
            GfxShaderError::Io(_) => RenderError::ShaderLoad { shader, source: e },
            GfxShaderError::Vk(code) => RenderError::PipelineBuild { shader, code },
        })
    }

    fn build_graphics(&self, desc: &PipelineStateDesc) -> Result<Pipeline, RenderError> {
        let ShaderStagePaths::Raster { vertex, fragment } = desc.shader.stages() else {
            panic!("graphics pipeline requested for non-raster shader {:?}", desc.shader);
        };

        let vertex_module = self.load_shader(desc.shader, vertex)?;
        let fragment_module = self.load_shader(desc.shader, fragment)?;

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module.handle())
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module.handle())
                .name(c"main"),
        ];

        let vertex_bindings = desc.vertex_layout.input_bindings();
        let vertex_attributes = desc.vertex_layout.input_attributes();
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // viewport 和 scissor 的具体值由 dynamic state 决定，数量固定为 1
        let viewport_info = vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        let rasterization_info = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face);

        let msaa_info = vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(desc.sample_count);

        let blend_attachment = match desc.blend {
            BlendMode::Disabled => vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(false)
                .color_write_mask(vk::ColorComponentFlags::RGBA),
            BlendMode::Alpha => vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .color_write_mask(vk::ColorComponentFlags::RGBA),
        };
        // 每个 color attachment 一份相同的 blend 设置
        let blend_attachments = vec![blend_attachment; desc.color_attachment_count as usize];
        let blend_info = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let depth_stencil_info = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(if desc.depth_test { vk::CompareOp::LESS } else { vk::CompareOp::NEVER });

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state_info = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_ci = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly_info)
            .viewport_state(&viewport_info)
            .rasterization_state(&rasterization_info)
            .multisample_state(&msaa_info)
            .color_blend_state(&blend_info)
            .depth_stencil_state(&depth_stencil_info)
            .dynamic_state(&dynamic_state_info)
            .layout(desc.pipeline_layout)
            .render_pass(desc.render_pass)
            .subpass(desc.subpass);

        let result = unsafe {
            self.device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_ci), None)
        };

        vertex_module.destroy();
        fragment_module.destroy();

        let pipeline = result.map_err(|(_, code)| RenderError::PipelineBuild {
            shader: desc.shader,
            code,
        })?[0];

        Ok(Pipeline {
            pipeline,
            layout: desc.pipeline_layout,
        })
    }

    fn build_compute(&self, desc: &PipelineStateDesc) -> Result<Pipeline, RenderError> {
        let ShaderStagePaths::Compute { compute } = desc.shader.stages() else {
            panic!("compute pipeline requested for non-compute shader {:?}", desc.shader);
        };

        let module = self.load_shader(desc.shader, compute)?;
        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(module.handle())
            .name(c"main");

        let pipeline_ci = vk::ComputePipelineCreateInfo::default().stage(stage_info).layout(desc.pipeline_layout);
        let result = unsafe {
            self.device.create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_ci), None)
        };

        module.destroy();

        let pipeline = result.map_err(|(_, code)| RenderError::PipelineBuild {
            shader: desc.shader,
            code,
        })?[0];

        Ok(Pipeline {
            pipeline,
            layout: desc.pipeline_layout,
        })
    }

    fn build_ray_tracing(&self, desc: &PipelineStateDesc) -> Result<Pipeline, RenderError> {
        let ShaderStagePaths::RayTracing {
            raygen,
            miss,
            closest_hit,
            intersection,
        } = desc.shader.stages()
        else {
            panic!("ray tracing pipeline requested for non-rt shader {:?}", desc.shader);
        };

        let modules = [
            (vk::ShaderStageFlags::RAYGEN_KHR, self.load_shader(desc.shader, raygen)?),
            (vk::ShaderStageFlags::MISS_KHR, self.load_shader(desc.shader, miss)?),
            (vk::ShaderStageFlags::CLOSEST_HIT_KHR, self.load_shader(desc.shader, closest_hit)?),
            (vk::ShaderStageFlags::INTERSECTION_KHR, self.load_shader(desc.shader, intersection)?),
        ];
        let stage_infos = modules
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default().stage(*stage).module(module.handle()).name(c"main")
            })
            .collect_vec();

        // group 顺序即 SBT 顺序：raygen, miss, hit(procedural)
        let shader_groups = [
            vk::RayTracingShaderGroupCreateInfoKHR::default()
                .ty(vk::RayTracingShaderGroupTypeKHR::GENERAL)
                .general_shader(0)
                .any_hit_shader(vk::SHADER_UNUSED_KHR)
                .closest_hit_shader(vk::SHADER_UNUSED_KHR)
                .intersection_shader(vk::SHADER_UNUSED_KHR),
            vk::RayTracingShaderGroupCreateInfoKHR::default()
                .ty(vk::RayTracingShaderGroupTypeKHR::GENERAL)
                .general_shader(1)
                .any_hit_shader(vk::SHADER_UNUSED_KHR)
                .closest_hit_shader(vk::SHADER_UNUSED_KHR)
                .intersection_shader(vk::SHADER_UNUSED_KHR),
            vk::RayTracingShaderGroupCreateInfoKHR::default()
                .ty(vk::RayTracingShaderGroupTypeKHR::PROCEDURAL_HIT_GROUP)
                .general_shader(vk::SHADER_UNUSED_KHR)
                .any_hit_shader(vk::SHADER_UNUSED_KHR)
                .closest_hit_shader(2)
                .intersection_shader(3),
        ];

        let pipeline_ci = vk::RayTracingPipelineCreateInfoKHR::default()
            .stages(&stage_infos)
            .groups(&shader_groups)
            .max_pipeline_ray_recursion_depth(desc.max_ray_recursion)
            .layout(desc.pipeline_layout);

        let result = unsafe {
            self.device.ray_tracing_pipeline().create_ray_tracing_pipelines(
                vk::DeferredOperationKHR::null(),
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_ci),
                None,
            )
        };

        for (_, module) in modules {
            module.destroy();
        }

        let pipeline = result.map_err(|(_, code)| RenderError::PipelineBuild {
            shader: desc.shader,
            code,
        })?[0];

        Ok(Pipeline {
            pipeline,
            layout: desc.pipeline_layout,
        })
    }
}

/// ray tracing 的 shader group 数量（raygen + miss + hit）
pub const RT_SHADER_GROUP_COUNT: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(shader: ShaderId) -> PipelineStateDesc {
        PipelineStateDesc::graphics(shader, vk::PipelineLayout::null(), vk::RenderPass::null(), 0)
    }

    fn dummy_pipeline(raw: u64) -> Pipeline {
        use ash::vk::Handle;
        Pipeline {
            pipeline: vk::Pipeline::from_raw(raw),
            layout: vk::PipelineLayout::null(),
        }
    }

    #[test]
    fn equal_descs_hit_the_same_entry() {
        let mut cache = PipelineCache::new();
        cache.insert(desc(ShaderId::Solid), dummy_pipeline(1));

        // 逐字段相等的描述拿到同一个 pipeline 句柄
        assert_eq!(cache.get(&desc(ShaderId::Solid)), Some(dummy_pipeline(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_descs_are_distinct_entries() {
        let mut cache = PipelineCache::new();
        cache.insert(desc(ShaderId::Solid), dummy_pipeline(1));

        let mut depth_variant = desc(ShaderId::Solid);
        depth_variant.depth(false, false);
        assert_eq!(cache.get(&depth_variant), None);

        cache.insert(depth_variant.clone(), dummy_pipeline(2));
        assert_eq!(cache.len(), 2);
        assert_ne!(cache.get(&desc(ShaderId::Solid)), cache.get(&depth_variant));
    }

    #[test]
    fn drain_empties_the_cache() {
        let mut cache = PipelineCache::new();
        cache.insert(desc(ShaderId::Solid), dummy_pipeline(1));
        cache.insert(desc(ShaderId::SolidColor), dummy_pipeline(2));

        let drained = cache.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(cache.len(), 0);
        // reset 之后同样的描述需要重新构建
        assert_eq!(cache.get(&desc(ShaderId::Solid)), None);
    }
}
