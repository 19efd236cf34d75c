//! winit 窗口层
//!
//! 把窗口事件折叠成每帧一份的 FrameData 快照，并驱动
//! begin_frame / render / end_frame 的循环。

use std::ffi::CString;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use lumis_render::engine::GraphicsEngine;
use lumis_render::settings::{EngineSettings, FrameData};

use crate::Scene;

pub struct WinitApp {
    scene: Box<dyn Scene>,

    engine: Option<GraphicsEngine>,
    window: Option<Window>,

    frame_data: FrameData,
}

// 总的 main 函数
impl WinitApp {
    pub fn run(scene: Box<dyn Scene>) -> anyhow::Result<()> {
        let event_loop = winit::event_loop::EventLoop::new()?;

        let mut app = Self {
            scene,
            engine: None,
            window: None,
            frame_data: FrameData::default(),
        };

        event_loop.run_app(&mut app)?;

        log::info!("end run.");
        app.destroy();
        Ok(())
    }

    fn destroy(mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.gfx.wait_idle();
            self.scene.destroy(&mut engine);
            engine.destroy();
        }
        self.window = None;
    }
}

// new & init
impl WinitApp {
    /// 在 window 创建之后调用，初始化引擎和场景
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) {
        let window_attr = Window::default_attributes()
            .with_title(self.scene.title().to_string())
            .with_inner_size(winit::dpi::LogicalSize::new(1200.0, 800.0));
        let window = event_loop.create_window(window_attr).unwrap();

        let app_name = CString::new(self.scene.title()).unwrap();
        let mut engine = GraphicsEngine::new(
            &app_name,
            window.display_handle().unwrap().as_raw(),
            window.window_handle().unwrap().as_raw(),
            EngineSettings::default(),
        );
        self.scene.init(&mut engine);

        let size = window.inner_size();
        self.frame_data.width = size.width;
        self.frame_data.height = size.height;

        self.engine = Some(engine);
        self.window = Some(window);
    }
}

// 每帧的驱动
impl WinitApp {
    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let frame_data = self.frame_data;

        if frame_data.keys.r {
            engine.reset_pipeline_container();
        }
        if frame_data.resize {
            engine.resize();
            self.scene.on_resize(engine);
            self.frame_data.resize = false;
        }

        self.scene.update(&frame_data);

        engine.begin_frame();
        let cmd = engine.frame.alloc_command_buffer("scene");
        cmd.begin(ash::vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "scene");

        let render_result = self.scene.render(engine, &cmd, &frame_data);

        cmd.end();
        engine.end_frame(&cmd);

        // pipeline 构建失败和 arena 耗尽都是配置缺陷，终止而不是重试
        if let Err(e) = render_result {
            log::error!("fatal render error: {e}");
            event_loop.exit();
        }

        self.frame_data.mouse.prev_xy = self.frame_data.mouse.xy;
    }

    fn handle_key(&mut self, code: KeyCode, pressed: bool) {
        let keys = &mut self.frame_data.keys;
        match code {
            KeyCode::KeyR => keys.r = pressed,
            KeyCode::KeyN => keys.n = pressed,
            KeyCode::KeyM => keys.m = pressed,
            KeyCode::ArrowLeft | KeyCode::KeyA => keys.left = pressed,
            KeyCode::ArrowRight | KeyCode::KeyD => keys.right = pressed,
            KeyCode::Space => keys.space = pressed,
            _ => {}
        }
    }
}

impl ApplicationHandler for WinitApp {
    // 建议在这里创建 window 和引擎
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            log::info!("winit event: resumed");
            self.init_after_window(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                // 折叠进快照，真正的重建发生在下一次 render_frame
                if size.width > 0 && size.height > 0 {
                    self.frame_data.width = size.width;
                    self.frame_data.height = size.height;
                    self.frame_data.resize = true;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.frame_data.mouse.xy = glam::vec2(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.frame_data.mouse.left = pressed,
                    MouseButton::Middle => self.frame_data.mouse.middle = pressed,
                    MouseButton::Right => self.frame_data.mouse.right = pressed,
                    _ => {}
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.handle_key(code, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::RedrawRequested => {
                self.render_frame(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
