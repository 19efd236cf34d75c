use ash::vk;

use crate::heap::ArenaKind;
use crate::pipelines::shader_catalog::ShaderId;

/// 引擎核心的错误类型
///
/// 这里的每一种错误都意味着静态的配置缺陷（shader 无效、arena 容量不足），
/// 不存在重试的价值；上层捕获后直接终止当前帧并退出。
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// 设备拒绝构建 pipeline
    #[error("failed to build pipeline for shader {shader:?}: {code}")]
    PipelineBuild { shader: ShaderId, code: vk::Result },

    /// shader 的 spv 文件不存在或不合法
    #[error("failed to load shader {shader:?}: {source}")]
    ShaderLoad {
        shader: ShaderId,
        #[source]
        source: lumis_gfx::pipelines::shader::GfxShaderError,
    },

    /// 一帧内的分配总量超过了 arena 的容量
    #[error("{kind:?} arena exhausted: requested {requested}B at offset {offset}B, capacity {capacity}B")]
    ArenaExhausted {
        kind: ArenaKind,
        requested: vk::DeviceSize,
        offset: vk::DeviceSize,
        capacity: vk::DeviceSize,
    },
}
