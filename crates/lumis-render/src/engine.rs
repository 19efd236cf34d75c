//! 引擎上下文
//!
//! 启动时构建一次，引用传递给所有组件和渲染例程；运行中途不会重建。
//! 源于一个简单的约定：设备上下文、layout 注册表、arena、pipeline 缓存
//! 都不是全局单例，而是这个对象的字段。

use std::cell::RefCell;
use std::ffi::CStr;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_gfx::gfx::Gfx;
use lumis_gfx::swapchain::GfxSurface;

use crate::containers::mesh_container::MeshContainer;
use crate::containers::storage_container::StorageContainer;
use crate::containers::texture_container::TextureContainer;
use crate::frame::frame_controller::FrameController;
use crate::heap::LinearHeapAllocator;
use crate::layouts::PipelineLayouts;
use crate::pipelines::container::PipelineContainer;
use crate::rendering::RenderContext;
use crate::settings::EngineSettings;

pub struct GraphicsEngine {
    pub gfx: Gfx,
    pub layouts: PipelineLayouts,
    /// 渲染例程在 &engine 下借用，因此用 RefCell；单线程录制，没有并发访问
    pub pipelines: RefCell<PipelineContainer>,
    pub heap: LinearHeapAllocator,
    pub frame: FrameController,

    pub meshes: MeshContainer,
    pub textures: TextureContainer,
    pub storages: StorageContainer,
}

// init & destroy
impl GraphicsEngine {
    pub fn new(
        app_name: &CStr,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        settings: EngineSettings,
    ) -> Self {
        let gfx = Gfx::new(app_name, display_handle);
        let surface = GfxSurface::new(&gfx, display_handle, window_handle);

        let layouts = PipelineLayouts::new(&gfx);
        let heap = LinearHeapAllocator::new(&gfx, &layouts, &settings);
        let frame = FrameController::new(&gfx, &settings, surface);
        let pipelines = RefCell::new(PipelineContainer::new(gfx.device.clone()));

        let textures = TextureContainer::new(&gfx, &layouts);

        Self {
            gfx,
            layouts,
            pipelines,
            heap,
            frame,
            meshes: MeshContainer::new(),
            textures,
            storages: StorageContainer::new(),
        }
    }

    /// 退出流程：等待 device idle 之后按依赖逆序销毁
    pub fn destroy(self) {
        let Self {
            gfx,
            layouts,
            pipelines,
            heap,
            frame,
            meshes,
            textures,
            storages,
        } = self;

        gfx.wait_idle();

        drop(meshes);
        drop(textures);
        drop(storages);
        pipelines.into_inner().reset();
        drop(heap);
        drop(layouts);
        frame.destroy();
        gfx.destroy();
    }
}

// frame 生命周期
impl GraphicsEngine {
    /// 等待 frame slot 可复用，归零线性堆，acquire present image
    pub fn begin_frame(&mut self) {
        self.frame.begin_frame(&mut self.heap);
    }

    /// flush 本帧 staged 的数据，提交并 present
    pub fn end_frame(&mut self, cmd: &GfxCommandBuffer) {
        self.heap.flush_frame();
        self.frame.submit_and_present(&self.gfx, cmd);
    }

    pub fn resize(&mut self) {
        self.frame.resize(&self.gfx);
    }

    /// 销毁所有缓存的 pipeline（shader 热重载）
    ///
    /// 必须保证没有 in-flight 的命令还在引用缓存条目，因此先等 device idle
    pub fn reset_pipeline_container(&self) {
        self.gfx.wait_idle();
        self.pipelines.borrow_mut().reset();
    }
}

// tools
impl GraphicsEngine {
    /// 以 present pass 为目标的渲染上下文
    pub fn render_ctx<'a>(
        &'a self,
        cmd: &'a GfxCommandBuffer,
        projection: glam::Mat4,
        view: glam::Mat4,
    ) -> RenderContext<'a> {
        RenderContext {
            gfx: &self.gfx,
            layouts: &self.layouts,
            pipelines: &self.pipelines,
            heap: &self.heap,
            meshes: &self.meshes,
            textures: &self.textures,
            storages: &self.storages,
            cmd,
            render_pass: self.frame.main_render_pass().handle(),
            subpass: 0,
            viewport_extent: self.frame.viewport_extent(),
            projection,
            view,
        }
    }
}
