//! volume rendering
//!
//! 三段流水线：offscreen MRT（包围盒正反面）→ offscreen raymarch →
//! present pass 的降噪输出。前两段的 color attachment 同时注册进
//! bindless 纹理表，下一段直接按索引采样。

use ash::vk;
use glam::{Vec3, Vec4};

use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_gfx::render_pass::{GfxFramebuffer, GfxRenderPass};
use lumis_gfx::resources::image::{GfxImage, GfxImageView};
use lumis_render::containers::texture_container::TextureId;
use lumis_render::engine::GraphicsEngine;
use lumis_render::error::RenderError;
use lumis_render::rendering::RenderContext;
use lumis_render::rendering::volume_renderer::{VolumeInfo, draw_denoise, draw_front_and_back, draw_volume};
use lumis_render::settings::FrameData;

use crate::Scene;
use crate::camera::OrbitCamera;

const VOLUME_DIM: u32 = 64;
const ENTRY_EXIT_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;
const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// offscreen 的一段：render pass + 附件 + framebuffer + bindless 注册
struct OffscreenPass {
    render_pass: GfxRenderPass,
    framebuffer: GfxFramebuffer,
    /// (image, 采样视图的 bindless id)
    attachments: Vec<(GfxImage, TextureId)>,
    _attachment_views: Vec<GfxImageView>,
}

impl OffscreenPass {
    fn new(
        engine: &mut GraphicsEngine,
        formats: &[vk::Format],
        extent: vk::Extent2D,
        name: &str,
    ) -> Self {
        let render_pass = GfxRenderPass::new(
            &engine.gfx,
            formats,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            None,
            vk::SampleCountFlags::TYPE_1,
            &format!("{name}-pass"),
        );

        let mut attachments = vec![];
        let mut views = vec![];
        for (idx, format) in formats.iter().enumerate() {
            let image = GfxImage::new_2d(
                &engine.gfx,
                extent,
                *format,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                vk::SampleCountFlags::TYPE_1,
                &format!("{name}-attachment-{idx}"),
            );
            let texture =
                engine.textures.register_attachment(&engine.gfx, image.handle(), *format, &format!("{name}-{idx}"));
            views.push(GfxImageView::new(
                &engine.gfx,
                image.handle(),
                vk::ImageViewType::TYPE_2D,
                *format,
                vk::ImageAspectFlags::COLOR,
                &format!("{name}-attachment-view-{idx}"),
            ));
            attachments.push((image, texture));
        }

        let framebuffer = GfxFramebuffer::new(
            &engine.gfx,
            &render_pass,
            &views.iter().map(|view| view.handle()).collect::<Vec<_>>(),
            extent,
            &format!("{name}-framebuffer"),
        );

        Self {
            render_pass,
            framebuffer,
            attachments,
            _attachment_views: views,
        }
    }

    fn begin(&self, cmd: &GfxCommandBuffer) {
        let clear_values =
            vec![
                vk::ClearValue {
                    color: vk::ClearColorValue { float32: [0.0; 4] },
                };
                self.attachments.len()
            ];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(self.framebuffer.handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: self.framebuffer.extent(),
            })
            .clear_values(&clear_values);

        cmd.cmd_begin_render_pass(&begin_info);
        let extent = self.framebuffer.extent();
        cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        cmd.cmd_set_scissor(
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            }],
        );
    }
}

/// 合成的标量场：中心一个球形衰减
fn synthetic_volume() -> Vec<f32> {
    let dim = VOLUME_DIM as usize;
    let mut voxels = Vec::with_capacity(dim * dim * dim);
    let center = (dim as f32 - 1.0) * 0.5;
    for z in 0..dim {
        for y in 0..dim {
            for x in 0..dim {
                let d = Vec3::new(x as f32 - center, y as f32 - center, z as f32 - center).length();
                voxels.push((100.0 - d * (200.0 / dim as f32)).max(0.0));
            }
        }
    }
    voxels
}

pub struct VolumeScene {
    camera: OrbitCamera,
    iso_value: f32,

    volume: Option<VolumeInfo>,
    entry_exit_pass: Option<OffscreenPass>,
    color_pass: Option<OffscreenPass>,
}

impl VolumeScene {
    pub fn new() -> Self {
        Self {
            camera: OrbitCamera::new(Vec3::ZERO, 4.0),
            iso_value: 50.0,
            volume: None,
            entry_exit_pass: None,
            color_pass: None,
        }
    }

    fn create_passes(&mut self, engine: &mut GraphicsEngine) {
        let extent = engine.frame.viewport_extent();
        self.entry_exit_pass = Some(OffscreenPass::new(
            engine,
            &[ENTRY_EXIT_FORMAT, ENTRY_EXIT_FORMAT],
            extent,
            "volume-entry-exit",
        ));
        self.color_pass = Some(OffscreenPass::new(engine, &[COLOR_FORMAT], extent, "volume-color"));
        engine.textures.setup_descriptor_sets(&engine.gfx);
    }
}

impl Scene for VolumeScene {
    fn title(&self) -> &str {
        "lumis-volume"
    }

    fn init(&mut self, engine: &mut GraphicsEngine) {
        let texture = engine.textures.create_texture_3d(
            &engine.gfx,
            vk::Extent3D {
                width: VOLUME_DIM,
                height: VOLUME_DIM,
                depth: VOLUME_DIM,
            },
            &synthetic_volume(),
            "volume-data",
        );
        self.volume = Some(VolumeInfo {
            corner: Vec3::splat(-1.0),
            size: Vec3::splat(2.0),
            min: 0.0,
            max: 100.0,
            texture,
        });

        self.create_passes(engine);
    }

    fn update(&mut self, frame_data: &FrameData) {
        if frame_data.mouse.left {
            self.camera.handle_drag(frame_data.mouse.xy - frame_data.mouse.prev_xy);
        }
        // n/m 调整 iso 面
        if frame_data.keys.n {
            self.iso_value -= 0.25;
        }
        if frame_data.keys.m {
            self.iso_value += 0.25;
        }
    }

    fn render(
        &mut self,
        engine: &GraphicsEngine,
        cmd: &GfxCommandBuffer,
        frame_data: &FrameData,
    ) -> Result<(), RenderError> {
        let volume = self.volume.as_ref().unwrap();
        let entry_exit_pass = self.entry_exit_pass.as_ref().unwrap();
        let color_pass = self.color_pass.as_ref().unwrap();

        let aspect = frame_data.width as f32 / frame_data.height.max(1) as f32;
        let base_ctx = engine.render_ctx(cmd, self.camera.projection(aspect), self.camera.view());

        // pass 1: 包围盒正反面（2 个 attachment）
        entry_exit_pass.begin(cmd);
        draw_front_and_back(
            &RenderContext {
                render_pass: entry_exit_pass.render_pass.handle(),
                ..base_ctx
            },
            volume,
        )?;
        cmd.cmd_end_render_pass();

        // pass 2: raymarch
        color_pass.begin(cmd);
        draw_volume(
            &RenderContext {
                render_pass: color_pass.render_pass.handle(),
                ..base_ctx
            },
            volume,
            self.camera.position(),
            self.iso_value,
            entry_exit_pass.attachments[0].1,
            entry_exit_pass.attachments[1].1,
        )?;
        cmd.cmd_end_render_pass();

        // pass 3: 输出到 swapchain
        engine.frame.begin_main_pass(cmd);
        draw_denoise(&base_ctx, color_pass.attachments[0].1)?;
        engine.frame.end_main_pass(cmd);

        Ok(())
    }

    fn on_resize(&mut self, engine: &mut GraphicsEngine) {
        // attachment 跟随窗口尺寸重建，旧的 bindless 槽位一并移除
        for pass in [self.entry_exit_pass.take(), self.color_pass.take()].into_iter().flatten() {
            for (_, texture) in pass.attachments {
                engine.textures.remove_texture(texture);
            }
        }
        self.create_passes(engine);
    }
}
