//! shader 标识与 spv 产物路径的对应表
//!
//! spv 由外部的 shader 构建流程产出，放置在 shaders/build/ 下；
//! 引擎只认这里列出的标识。

/// 所有 demo 用到的 shader 程序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderId {
    /// instanced 纯色方块（boids / invaders）
    Solid,
    /// 带纹理的方块
    TextureBox,
    /// 可视化 depth 纹理的方块
    DepthBox,
    /// 单色 mesh
    SolidColor,
    /// glTF PBR 风格的 mesh
    Pbr,
    /// 流体密度场的全屏绘制（persistent storage）
    Fluid,
    /// 流体密度场的全屏绘制（逐帧 restage 的 CPU 数据）
    FluidRaw,
    /// volume：正反面入射点 MRT
    FrontAndBack,
    /// volume：raymarch
    Volume,
    /// volume：降噪 / 输出
    Denoise,
    /// ray tracing 输出的全屏绘制
    RayOutput,
    /// mesh 体素化
    Voxelizer,
    /// 流体求解的 compute 步骤
    AddSource,
    Diffuse,
    Advect,
    Project,
    /// 程序化球体的 ray tracing 管线
    ProceduralRay,
}

/// 一个 shader 程序包含的各 stage 的 spv 路径
pub enum ShaderStagePaths {
    Raster {
        vertex: &'static str,
        fragment: &'static str,
    },
    Compute {
        compute: &'static str,
    },
    RayTracing {
        raygen: &'static str,
        miss: &'static str,
        closest_hit: &'static str,
        intersection: &'static str,
    },
}

impl ShaderId {
    pub fn stages(self) -> ShaderStagePaths {
        match self {
            Self::Solid => ShaderStagePaths::Raster {
                vertex: "shaders/build/solid.vert.spv",
                fragment: "shaders/build/solid.frag.spv",
            },
            Self::TextureBox => ShaderStagePaths::Raster {
                vertex: "shaders/build/texture_box.vert.spv",
                fragment: "shaders/build/texture_box.frag.spv",
            },
            Self::DepthBox => ShaderStagePaths::Raster {
                vertex: "shaders/build/depth_box.vert.spv",
                fragment: "shaders/build/depth_box.frag.spv",
            },
            Self::SolidColor => ShaderStagePaths::Raster {
                vertex: "shaders/build/solid_color.vert.spv",
                fragment: "shaders/build/solid_color.frag.spv",
            },
            Self::Pbr => ShaderStagePaths::Raster {
                vertex: "shaders/build/pbr.vert.spv",
                fragment: "shaders/build/pbr.frag.spv",
            },
            Self::Fluid => ShaderStagePaths::Raster {
                vertex: "shaders/build/fullscreen.vert.spv",
                fragment: "shaders/build/fluid.frag.spv",
            },
            Self::FluidRaw => ShaderStagePaths::Raster {
                vertex: "shaders/build/fullscreen.vert.spv",
                fragment: "shaders/build/fluid_raw.frag.spv",
            },
            Self::FrontAndBack => ShaderStagePaths::Raster {
                vertex: "shaders/build/front_and_back.vert.spv",
                fragment: "shaders/build/front_and_back.frag.spv",
            },
            Self::Volume => ShaderStagePaths::Raster {
                vertex: "shaders/build/fullscreen.vert.spv",
                fragment: "shaders/build/volume.frag.spv",
            },
            Self::Denoise => ShaderStagePaths::Raster {
                vertex: "shaders/build/fullscreen.vert.spv",
                fragment: "shaders/build/denoise.frag.spv",
            },
            Self::RayOutput => ShaderStagePaths::Raster {
                vertex: "shaders/build/fullscreen.vert.spv",
                fragment: "shaders/build/ray_output.frag.spv",
            },
            Self::Voxelizer => ShaderStagePaths::Raster {
                vertex: "shaders/build/voxelizer.vert.spv",
                fragment: "shaders/build/voxelizer.frag.spv",
            },
            Self::AddSource => ShaderStagePaths::Compute {
                compute: "shaders/build/fluid_add_source.comp.spv",
            },
            Self::Diffuse => ShaderStagePaths::Compute {
                compute: "shaders/build/fluid_diffuse.comp.spv",
            },
            Self::Advect => ShaderStagePaths::Compute {
                compute: "shaders/build/fluid_advect.comp.spv",
            },
            Self::Project => ShaderStagePaths::Compute {
                compute: "shaders/build/fluid_project.comp.spv",
            },
            Self::ProceduralRay => ShaderStagePaths::RayTracing {
                raygen: "shaders/build/procedural.rgen.spv",
                miss: "shaders/build/procedural.rmiss.spv",
                closest_hit: "shaders/build/procedural.rchit.spv",
                intersection: "shaders/build/procedural.rint.spv",
            },
        }
    }
}
