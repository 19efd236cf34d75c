pub mod app;
pub mod camera;
pub mod scenes;

use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_render::engine::GraphicsEngine;
use lumis_render::error::RenderError;
use lumis_render::settings::FrameData;

/// 一个 demo 场景
///
/// 场景只负责驱动：拥有自己的模拟状态，每帧调用渲染例程；
/// 资源管理完全依赖引擎核心的契约。
pub trait Scene {
    fn title(&self) -> &str;

    /// window 与引擎就绪之后调用一次
    fn init(&mut self, engine: &mut GraphicsEngine);

    /// 每帧的模拟
    fn update(&mut self, frame_data: &FrameData);

    /// 每帧的绘制：命令已经开始录制，场景自行 begin/end 需要的 render pass
    fn render(
        &mut self,
        engine: &GraphicsEngine,
        cmd: &GfxCommandBuffer,
        frame_data: &FrameData,
    ) -> Result<(), RenderError>;

    fn on_resize(&mut self, _engine: &mut GraphicsEngine) {}

    /// 退出前清理场景持有的引擎资源
    fn destroy(&mut self, _engine: &mut GraphicsEngine) {}
}

/// 场景可执行文件的入口
pub fn run_scene(scene: Box<dyn Scene>) -> anyhow::Result<()> {
    lumis_crate_tools::init_log::init_log();
    app::WinitApp::run(scene)
}
