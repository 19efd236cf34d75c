//! pipeline 的状态描述
//!
//! 逐字段相等的两个描述就是同一条 pipeline，这是缓存的唯一性定义。

use std::mem::offset_of;

use ash::vk;

use crate::pipelines::shader_catalog::ShaderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Graphics,
    Compute,
    RayTracing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Disabled,
    /// 经典的 src-alpha / one-minus-src-alpha
    Alpha,
}

/// 顶点布局的标识
///
/// 具体的 binding/attribute 描述由这里统一给出，
/// 状态描述里只记录标识，保证可哈希。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayoutId {
    /// 没有顶点输入（fullscreen triangle 等）
    None,
    /// vec3 position
    Pos3,
    /// vec4 = (pos.xy, uv.xy)
    Pos2Uv2,
    /// vec3 position + vec3 normal
    Pos3Nrm3,
    /// vec3 position + vec3 normal + vec2 uv
    Pos3Nrm3Uv2,
}

#[repr(C)]
struct VertexPos3 {
    position: [f32; 3],
}

#[repr(C)]
struct VertexPos3Nrm3 {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
struct VertexPos3Nrm3Uv2 {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

impl VertexLayoutId {
    pub fn input_bindings(&self) -> Vec<vk::VertexInputBindingDescription> {
        let stride = match self {
            Self::None => return vec![],
            Self::Pos3 => size_of::<VertexPos3>(),
            Self::Pos2Uv2 => size_of::<[f32; 4]>(),
            Self::Pos3Nrm3 => size_of::<VertexPos3Nrm3>(),
            Self::Pos3Nrm3Uv2 => size_of::<VertexPos3Nrm3Uv2>(),
        };
        vec![
            vk::VertexInputBindingDescription::default()
                .binding(0)
                .stride(stride as u32)
                .input_rate(vk::VertexInputRate::VERTEX),
        ]
    }

    pub fn input_attributes(&self) -> Vec<vk::VertexInputAttributeDescription> {
        let attr = |location: u32, format: vk::Format, offset: u32| {
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(location)
                .format(format)
                .offset(offset)
        };

        match self {
            Self::None => vec![],
            Self::Pos3 => vec![attr(0, vk::Format::R32G32B32_SFLOAT, 0)],
            Self::Pos2Uv2 => vec![attr(0, vk::Format::R32G32B32A32_SFLOAT, 0)],
            Self::Pos3Nrm3 => vec![
                attr(0, vk::Format::R32G32B32_SFLOAT, offset_of!(VertexPos3Nrm3, position) as u32),
                attr(1, vk::Format::R32G32B32_SFLOAT, offset_of!(VertexPos3Nrm3, normal) as u32),
            ],
            Self::Pos3Nrm3Uv2 => vec![
                attr(0, vk::Format::R32G32B32_SFLOAT, offset_of!(VertexPos3Nrm3Uv2, position) as u32),
                attr(1, vk::Format::R32G32B32_SFLOAT, offset_of!(VertexPos3Nrm3Uv2, normal) as u32),
                attr(2, vk::Format::R32G32_SFLOAT, offset_of!(VertexPos3Nrm3Uv2, uv) as u32),
            ],
        }
    }
}

/// pipeline 的不可变状态描述，pipeline container 的缓存 key
///
/// 不变量：查找时描述引用的 render pass / pipeline layout 必须仍然存活。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineStateDesc {
    pub kind: PipelineKind,
    pub shader: ShaderId,

    pub pipeline_layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,

    pub vertex_layout: VertexLayoutId,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub blend: BlendMode,
    pub color_attachment_count: u32,
    pub sample_count: vk::SampleCountFlags,

    /// 只对 ray tracing pipeline 有意义
    pub max_ray_recursion: u32,
}

impl PipelineStateDesc {
    pub fn graphics(
        shader: ShaderId,
        pipeline_layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        subpass: u32,
    ) -> Self {
        Self {
            kind: PipelineKind::Graphics,
            shader,
            pipeline_layout,
            render_pass,
            subpass,
            vertex_layout: VertexLayoutId::None,
            cull_mode: vk::CullModeFlags::BACK,
            // 按照 OpenGL 的传统，将 CCW 视为 front face
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_write: true,
            blend: BlendMode::Disabled,
            color_attachment_count: 1,
            sample_count: vk::SampleCountFlags::TYPE_1,
            max_ray_recursion: 0,
        }
    }

    pub fn compute(shader: ShaderId, pipeline_layout: vk::PipelineLayout) -> Self {
        Self {
            kind: PipelineKind::Compute,
            shader,
            pipeline_layout,
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            vertex_layout: VertexLayoutId::None,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: false,
            depth_write: false,
            blend: BlendMode::Disabled,
            color_attachment_count: 0,
            sample_count: vk::SampleCountFlags::TYPE_1,
            max_ray_recursion: 0,
        }
    }

    pub fn ray_tracing(shader: ShaderId, pipeline_layout: vk::PipelineLayout, max_ray_recursion: u32) -> Self {
        Self {
            max_ray_recursion,
            kind: PipelineKind::RayTracing,
            ..Self::compute(shader, pipeline_layout)
        }
    }

    /// builder
    #[inline]
    pub fn vertex_layout(&mut self, layout: VertexLayoutId) -> &mut Self {
        self.vertex_layout = layout;
        self
    }

    /// builder
    #[inline]
    pub fn cull(&mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> &mut Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    /// builder
    #[inline]
    pub fn depth(&mut self, test: bool, write: bool) -> &mut Self {
        self.depth_test = test;
        self.depth_write = write;
        self
    }

    /// builder
    #[inline]
    pub fn blend(&mut self, blend: BlendMode) -> &mut Self {
        self.blend = blend;
        self
    }

    /// builder
    #[inline]
    pub fn color_attachments(&mut self, count: u32) -> &mut Self {
        self.color_attachment_count = count;
        self
    }

    /// builder
    #[inline]
    pub fn samples(&mut self, sample_count: vk::SampleCountFlags) -> &mut Self {
        self.sample_count = sample_count;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_desc() -> PipelineStateDesc {
        PipelineStateDesc::graphics(ShaderId::Solid, vk::PipelineLayout::null(), vk::RenderPass::null(), 0)
    }

    #[test]
    fn field_wise_equal_descs_are_the_same_key() {
        let mut map = HashMap::new();
        map.insert(base_desc(), 1);

        let again = base_desc();
        assert_eq!(map.get(&again), Some(&1));
    }

    #[test]
    fn any_field_difference_is_a_different_key() {
        let base = base_desc();

        let mut depth_off = base.clone();
        depth_off.depth(false, true);
        assert_ne!(base, depth_off);

        let mut other_shader = base.clone();
        other_shader.shader = ShaderId::SolidColor;
        assert_ne!(base, other_shader);

        let mut other_subpass = base.clone();
        other_subpass.subpass = 1;
        assert_ne!(base, other_subpass);

        let mut other_cull = base.clone();
        other_cull.cull(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_ne!(base, other_cull);
    }

    #[test]
    fn vertex_layout_strides_match_attribute_span() {
        assert_eq!(VertexLayoutId::Pos3.input_bindings()[0].stride, 12);
        assert_eq!(VertexLayoutId::Pos2Uv2.input_bindings()[0].stride, 16);
        assert_eq!(VertexLayoutId::Pos3Nrm3Uv2.input_bindings()[0].stride, 32);
        assert_eq!(VertexLayoutId::Pos3Nrm3Uv2.input_attributes().len(), 3);
        assert!(VertexLayoutId::None.input_bindings().is_empty());
    }
}
