//! 程序化球体的 ray tracing
//!
//! 初始化阶段构建 AABB BLAS + 单 instance 的 TLAS（一次性的同步停顿），
//! 每帧 trace 进 storage image，再全屏画出来。storage image 在
//! GENERAL 和 SHADER_READ_ONLY 之间来回转换。

use ash::vk;
use glam::{Vec3, Vec4};

use lumis_gfx::commands::barrier::GfxImageBarrier;
use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_gfx::resources::image::{GfxImage, GfxImageView};
use lumis_render::acceleration::{AccelerationStructure, build_procedural_blas, build_tlas};
use lumis_render::containers::texture_container::TextureId;
use lumis_render::engine::GraphicsEngine;
use lumis_render::error::RenderError;
use lumis_render::rendering::ray_renderer::{draw_ray_output, trace_procedural};
use lumis_render::settings::FrameData;

use crate::Scene;
use crate::camera::OrbitCamera;

struct RayTargets {
    image: GfxImage,
    _view: GfxImageView,
    storage_image_set: vk::DescriptorSet,
    output_texture: TextureId,
}

pub struct RayScene {
    camera: OrbitCamera,
    sphere: Vec4,

    _blas: Option<AccelerationStructure>,
    _tlas: Option<AccelerationStructure>,
    tlas_set: Option<vk::DescriptorSet>,
    targets: Option<RayTargets>,
}

impl RayScene {
    pub fn new() -> Self {
        Self {
            camera: OrbitCamera::new(Vec3::ZERO, 4.0),
            sphere: Vec4::new(0.0, 0.0, 0.0, 0.5),
            _blas: None,
            _tlas: None,
            tlas_set: None,
            targets: None,
        }
    }

    fn create_targets(&mut self, engine: &mut GraphicsEngine) {
        let extent = engine.frame.viewport_extent();
        let image = GfxImage::new_2d(
            &engine.gfx,
            extent,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            vk::SampleCountFlags::TYPE_1,
            "ray-output",
        );
        // 先转成可采样布局，逐帧再在 GENERAL 之间切换
        image.transfer_layout_sync(&engine.gfx, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, "ray-output");

        let view = GfxImageView::new(
            &engine.gfx,
            image.handle(),
            vk::ImageViewType::TYPE_2D,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageAspectFlags::COLOR,
            "ray-output",
        );

        let storage_image_set =
            engine.layouts.storage_image_set_layout.allocate_set(engine.gfx.descriptor_pool(), "ray-storage-image");
        let image_info = vk::DescriptorImageInfo::default()
            .image_view(view.handle())
            .image_layout(vk::ImageLayout::GENERAL);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(storage_image_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
            .image_info(std::slice::from_ref(&image_info));
        unsafe {
            engine.gfx.device.update_descriptor_sets(std::slice::from_ref(&write), &[]);
        }

        let output_texture =
            engine.textures.register_attachment(&engine.gfx, image.handle(), vk::Format::R8G8B8A8_UNORM, "ray-output");
        engine.textures.setup_descriptor_sets(&engine.gfx);

        self.targets = Some(RayTargets {
            image,
            _view: view,
            storage_image_set,
            output_texture,
        });
    }
}

impl Scene for RayScene {
    fn title(&self) -> &str {
        "lumis-ray"
    }

    fn init(&mut self, engine: &mut GraphicsEngine) {
        let radius = self.sphere.w;
        let blas = build_procedural_blas(
            &engine.gfx,
            vk::AabbPositionsKHR {
                min_x: self.sphere.x - radius,
                min_y: self.sphere.y - radius,
                min_z: self.sphere.z - radius,
                max_x: self.sphere.x + radius,
                max_y: self.sphere.y + radius,
                max_z: self.sphere.z + radius,
            },
        );
        let tlas = build_tlas(&engine.gfx, &blas);

        let tlas_set = engine.layouts.accel_set_layout.allocate_set(engine.gfx.descriptor_pool(), "ray-tlas");
        let tlas_handles = [tlas.handle()];
        let mut accel_write =
            vk::WriteDescriptorSetAccelerationStructureKHR::default().acceleration_structures(&tlas_handles);
        let mut write = vk::WriteDescriptorSet::default()
            .dst_set(tlas_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
            .push_next(&mut accel_write);
        write.descriptor_count = 1;
        unsafe {
            engine.gfx.device.update_descriptor_sets(std::slice::from_ref(&write), &[]);
        }

        self._blas = Some(blas);
        self._tlas = Some(tlas);
        self.tlas_set = Some(tlas_set);

        self.create_targets(engine);
    }

    fn update(&mut self, frame_data: &FrameData) {
        if frame_data.mouse.left {
            self.camera.handle_drag(frame_data.mouse.xy - frame_data.mouse.prev_xy);
        }
    }

    fn render(
        &mut self,
        engine: &GraphicsEngine,
        cmd: &GfxCommandBuffer,
        frame_data: &FrameData,
    ) -> Result<(), RenderError> {
        let targets = self.targets.as_ref().unwrap();
        let aspect = frame_data.width as f32 / frame_data.height.max(1) as f32;
        let ctx = engine.render_ctx(cmd, self.camera.projection(aspect), self.camera.view());

        // 采样布局 -> GENERAL，上一帧的采样完成之后才允许本帧写入
        cmd.image_memory_barrier(&[GfxImageBarrier::new()
            .image(targets.image.handle())
            .image_aspect_flag(vk::ImageAspectFlags::COLOR)
            .layout_transfer(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::GENERAL)
            .src_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
            .dst_mask(vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR, vk::AccessFlags2::SHADER_STORAGE_WRITE)]);

        trace_procedural(&ctx, self.sphere, targets.storage_image_set, self.tlas_set.unwrap())?;

        // trace 的写入对 fragment 采样可见
        cmd.image_memory_barrier(&[GfxImageBarrier::new()
            .image(targets.image.handle())
            .image_aspect_flag(vk::ImageAspectFlags::COLOR)
            .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_mask(vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR, vk::AccessFlags2::SHADER_STORAGE_WRITE)
            .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)]);

        engine.frame.begin_main_pass(cmd);
        draw_ray_output(&ctx, targets.output_texture)?;
        engine.frame.end_main_pass(cmd);

        Ok(())
    }

    fn on_resize(&mut self, engine: &mut GraphicsEngine) {
        if let Some(targets) = self.targets.take() {
            engine.textures.remove_texture(targets.output_texture);
        }
        self.create_targets(engine);
    }
}
