//! Stam 风格的流体模拟
//!
//! 六个场（速度 u/v、上一帧 u0/v0、密度 d、源 s）是 storage container
//! 里的持久 buffer；每个求解步骤是一次 compute dispatch，步骤之间的
//! write-then-read 顺序由 dispatch_compute 内置的 barrier 保证。

use glam::{UVec3, Vec4};

use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_render::containers::storage_container::StorageId;
use lumis_render::engine::GraphicsEngine;
use lumis_render::error::RenderError;
use lumis_render::pipelines::shader_catalog::ShaderId;
use lumis_render::rendering::compute::dispatch_compute;
use lumis_render::rendering::fluid_renderer::render_fluid;
use lumis_render::settings::FrameData;

use crate::Scene;

/// 网格内部分辨率，(N+2)^2 个 cell（带边界）
const N: u32 = 254;
const CELL_COUNT: usize = ((N + 2) * (N + 2)) as usize;
/// compute shader 的 local size
const GROUP_SIZE: u32 = 256;

const DT: f32 = 1.0 / 60.0;
const DIFFUSION: f32 = 0.0001;
const VISCOSITY: f32 = 0.00005;

struct Fields {
    u: StorageId,
    v: StorageId,
    u0: StorageId,
    v0: StorageId,
    d: StorageId,
    s: StorageId,
}

pub struct FluidScene {
    fields: Option<Fields>,
    mouse_source: Option<(Vec4, Vec4)>,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct AddSourceUbo {
    /// (grid.x, grid.y, 密度增量, 半径)
    source: Vec4,
    /// (force.x, force.y, 0, 0)
    force: Vec4,
    n: u32,
    dt: f32,
    _padding: [u32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DiffuseUbo {
    dt: f32,
    n: u32,
    diff: f32,
    b: u32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct AdvectUbo {
    dt: f32,
    n: u32,
    b: u32,
    _padding: u32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ProjectUbo {
    n: u32,
    /// 0 = divergence, 1 = jacobi, 2 = subtract gradient
    stage: u32,
    _padding: [u32; 2],
}

impl FluidScene {
    pub fn new() -> Self {
        Self {
            fields: None,
            mouse_source: None,
        }
    }

    fn groups() -> UVec3 {
        UVec3::new(CELL_COUNT as u32 / GROUP_SIZE, 1, 1)
    }

    fn diffuse(
        ctx: &lumis_render::rendering::RenderContext,
        b: u32,
        x: StorageId,
        x0: StorageId,
        diff: f32,
    ) -> Result<(), RenderError> {
        dispatch_compute(
            ctx,
            ShaderId::Diffuse,
            &DiffuseUbo {
                dt: DT,
                n: N,
                diff,
                b,
            },
            &[x, x0],
            Self::groups(),
        )
    }

    fn advect(
        ctx: &lumis_render::rendering::RenderContext,
        b: u32,
        d: StorageId,
        d0: StorageId,
        u: StorageId,
        v: StorageId,
    ) -> Result<(), RenderError> {
        dispatch_compute(
            ctx,
            ShaderId::Advect,
            &AdvectUbo {
                dt: DT,
                n: N,
                b,
                _padding: 0,
            },
            &[d, d0, u, v],
            Self::groups(),
        )
    }

    /// 三个 stage 的 dispatch 序列，把速度场投影回无散度
    fn project(
        ctx: &lumis_render::rendering::RenderContext,
        u: StorageId,
        v: StorageId,
        p: StorageId,
        div: StorageId,
    ) -> Result<(), RenderError> {
        for stage in [0, 1, 2] {
            dispatch_compute(
                ctx,
                ShaderId::Project,
                &ProjectUbo {
                    n: N,
                    stage,
                    _padding: [0; 2],
                },
                &[u, v, p, div],
                Self::groups(),
            )?;
        }
        Ok(())
    }
}

impl Scene for FluidScene {
    fn title(&self) -> &str {
        "lumis-fluid"
    }

    fn init(&mut self, engine: &mut GraphicsEngine) {
        let empty = vec![0.0f32; CELL_COUNT];
        let mut create = || engine.storages.create_storage(&engine.gfx, &engine.layouts, &empty);
        self.fields = Some(Fields {
            u: create(),
            v: create(),
            u0: create(),
            v0: create(),
            d: create(),
            s: create(),
        });
    }

    fn update(&mut self, frame_data: &FrameData) {
        // 左键拖动注入密度与动量，坐标换算到网格空间
        self.mouse_source = frame_data.mouse.left.then(|| {
            let scale = N as f32 / frame_data.width.max(1) as f32;
            let grid = frame_data.mouse.xy * scale;
            let force = (frame_data.mouse.xy - frame_data.mouse.prev_xy) * scale;
            (
                Vec4::new(grid.x, grid.y, 80.0 * DT, 4.0),
                Vec4::new(force.x, force.y, 0.0, 0.0),
            )
        });
    }

    fn render(
        &mut self,
        engine: &GraphicsEngine,
        cmd: &GfxCommandBuffer,
        _frame_data: &FrameData,
    ) -> Result<(), RenderError> {
        let fields = self.fields.as_ref().unwrap();
        let ctx = engine.render_ctx(cmd, glam::Mat4::IDENTITY, glam::Mat4::IDENTITY);

        // 求解在 render pass 之外 dispatch，fragment 阶段消费结果
        if let Some((source, force)) = self.mouse_source {
            dispatch_compute(
                &ctx,
                ShaderId::AddSource,
                &AddSourceUbo {
                    source,
                    force,
                    n: N,
                    dt: DT,
                    _padding: [0; 2],
                },
                &[fields.d, fields.u, fields.v],
                Self::groups(),
            )?;
        }

        // velocity step
        Self::diffuse(&ctx, 1, fields.u0, fields.u, VISCOSITY)?;
        Self::diffuse(&ctx, 2, fields.v0, fields.v, VISCOSITY)?;
        Self::project(&ctx, fields.u0, fields.v0, fields.u, fields.v)?;
        Self::advect(&ctx, 1, fields.u, fields.u0, fields.u0, fields.v0)?;
        Self::advect(&ctx, 2, fields.v, fields.v0, fields.u0, fields.v0)?;
        Self::project(&ctx, fields.u, fields.v, fields.u0, fields.v0)?;

        // density step
        Self::diffuse(&ctx, 0, fields.s, fields.d, DIFFUSION)?;
        Self::advect(&ctx, 0, fields.d, fields.s, fields.u, fields.v)?;

        engine.frame.begin_main_pass(cmd);
        render_fluid(&ctx, fields.d)?;
        engine.frame.end_main_pass(cmd);

        Ok(())
    }

    fn destroy(&mut self, engine: &mut GraphicsEngine) {
        if let Some(fields) = self.fields.take() {
            for id in [fields.u, fields.v, fields.u0, fields.v0, fields.d, fields.s] {
                engine.storages.remove_storage(id);
            }
        }
    }
}
