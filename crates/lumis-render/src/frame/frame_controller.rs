//! 帧生命周期
//!
//! begin_frame / end_frame 把一帧的命令录制夹在中间，并保证线性堆的
//! reset_frame 只发生在「上一次使用该 slot 的 GPU 工作确认 retire」之后
//! （per-fif 的 fence 等待）。

use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use lumis_gfx::commands::command_buffer::GfxCommandBuffer;
use lumis_gfx::commands::command_pool::GfxCommandPool;
use lumis_gfx::commands::submit_info::GfxSubmitInfo;
use lumis_gfx::commands::synchronize::{GfxFence, GfxSemaphore};
use lumis_gfx::foundation::device::GfxDevice;
use lumis_gfx::gfx::Gfx;
use lumis_gfx::render_pass::{GfxFramebuffer, GfxRenderPass};
use lumis_gfx::resources::image::{GfxImage, GfxImageView};
use lumis_gfx::swapchain::{GfxSurface, GfxSwapchain};

use crate::heap::LinearHeapAllocator;
use crate::settings::{DefaultEngineSettings, EngineSettings, FrameLabel};

pub struct FrameController {
    surface: GfxSurface,
    swapchain: GfxSwapchain,

    /// color + depth 的 present pass
    main_render_pass: GfxRenderPass,
    /// 每张 swapchain image 一个
    framebuffers: Vec<GfxFramebuffer>,
    _depth_image: GfxImage,
    _depth_view: GfxImageView,

    /// 当前处在 in-flight 的第几帧：A, B, C
    label: FrameLabel,
    /// 当前的帧序号，一直累加
    frame_id: usize,
    fif_count: usize,

    /// 为每个 frame 分配一个 command pool
    graphics_command_pools: Vec<Rc<GfxCommandPool>>,
    /// 每个 pool 已经分配出去的 command buffer，用于集中 free
    allocated_command_buffers: Vec<Vec<GfxCommandBuffer>>,

    present_complete_semaphores: Vec<GfxSemaphore>,
    render_complete_semaphores: Vec<GfxSemaphore>,
    fence_frame_in_flight: Vec<GfxFence>,

    device: Rc<GfxDevice>,
}

// init
impl FrameController {
    pub fn new(gfx: &Gfx, settings: &EngineSettings, surface: GfxSurface) -> Self {
        let swapchain = GfxSwapchain::new(
            gfx,
            &surface,
            DefaultEngineSettings::DEFAULT_SURFACE_FORMAT,
            DefaultEngineSettings::DEFAULT_PRESENT_MODE,
            None,
        );

        let main_render_pass = GfxRenderPass::new(
            gfx,
            &[swapchain.format()],
            vk::ImageLayout::PRESENT_SRC_KHR,
            Some(DefaultEngineSettings::DEPTH_FORMAT),
            vk::SampleCountFlags::TYPE_1,
            "main-render-pass",
        );
        let (depth_image, depth_view, framebuffers) = Self::create_frame_targets(gfx, &swapchain, &main_render_pass);

        let fif_count = settings.frames_in_flight;
        let create_semaphores = |name: &str| {
            (0..fif_count)
                .map(|i| FrameLabel::from_usize(i))
                .map(|label| GfxSemaphore::new(gfx.device.clone(), &format!("{name}_{label}")))
                .collect_vec()
        };
        let present_complete_semaphores = create_semaphores("present_complete_semaphore");
        let render_complete_semaphores = create_semaphores("render_complete_semaphore");

        let fence_frame_in_flight = (0..fif_count)
            .map(|i| FrameLabel::from_usize(i))
            .map(|label| GfxFence::new(gfx.device.clone(), true, &format!("frame_in_flight_fence_{label}")))
            .collect_vec();

        let graphics_command_pools = (0..fif_count)
            .map(|i| {
                Rc::new(GfxCommandPool::new(
                    gfx.device.clone(),
                    gfx.graphics_queue_family(),
                    vk::CommandPoolCreateFlags::TRANSIENT,
                    &format!("frame_graphics_command_pool_{}", i),
                ))
            })
            .collect_vec();

        Self {
            surface,
            swapchain,
            main_render_pass,
            framebuffers,
            _depth_image: depth_image,
            _depth_view: depth_view,

            label: FrameLabel::A,
            frame_id: 0,
            fif_count,

            graphics_command_pools,
            allocated_command_buffers: vec![Vec::new(); fif_count],

            present_complete_semaphores,
            render_complete_semaphores,
            fence_frame_in_flight,

            device: gfx.device.clone(),
        }
    }

    fn create_frame_targets(
        gfx: &Gfx,
        swapchain: &GfxSwapchain,
        render_pass: &GfxRenderPass,
    ) -> (GfxImage, GfxImageView, Vec<GfxFramebuffer>) {
        let extent = swapchain.extent();

        let depth_image = GfxImage::new_2d(
            gfx,
            extent,
            DefaultEngineSettings::DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::SampleCountFlags::TYPE_1,
            "depth-image",
        );
        let depth_view = GfxImageView::new(
            gfx,
            depth_image.handle(),
            vk::ImageViewType::TYPE_2D,
            DefaultEngineSettings::DEPTH_FORMAT,
            vk::ImageAspectFlags::DEPTH,
            "depth-image-view",
        );

        let framebuffers = swapchain
            .image_views()
            .into_iter()
            .enumerate()
            .map(|(idx, view)| {
                GfxFramebuffer::new(
                    gfx,
                    render_pass,
                    &[view, depth_view.handle()],
                    extent,
                    &format!("main-framebuffer-{idx}"),
                )
            })
            .collect_vec();

        (depth_image, depth_view, framebuffers)
    }

    /// 窗口尺寸变化，重建 swapchain 和 framebuffer
    pub fn resize(&mut self, gfx: &Gfx) {
        self.device.wait_idle();

        self.framebuffers.clear();
        self.swapchain = GfxSwapchain::new(
            gfx,
            &self.surface,
            DefaultEngineSettings::DEFAULT_SURFACE_FORMAT,
            DefaultEngineSettings::DEFAULT_PRESENT_MODE,
            Some(&self.swapchain),
        );
        let (depth_image, depth_view, framebuffers) =
            Self::create_frame_targets(gfx, &self.swapchain, &self.main_render_pass);
        self._depth_image = depth_image;
        self._depth_view = depth_view;
        self.framebuffers = framebuffers;
    }

    /// 需要在 device 资源销毁前手动调用
    pub fn destroy(self) {
        // command buffer 必须先于 pool 归还，surface 要在 swapchain 之后销毁；
        // 其余字段按 Drop 顺序自行清理
        let Self {
            surface,
            swapchain,
            framebuffers,
            allocated_command_buffers,
            graphics_command_pools,
            ..
        } = self;

        for cmds in allocated_command_buffers {
            cmds.into_iter().for_each(|cmd| cmd.free());
        }
        drop(graphics_command_pools);
        drop(framebuffers);
        drop(swapchain);
        surface.destroy();
    }
}

// getters
impl FrameController {
    /// 当前处在第几帧：A, B, C
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        self.label
    }

    /// 当前帧的编号，一直增加
    #[inline]
    pub fn frame_id(&self) -> usize {
        self.frame_id
    }

    /// 当前帧的 debug prefix，例如：`[F13A]`
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.label)
    }

    #[inline]
    pub fn main_render_pass(&self) -> &GfxRenderPass {
        &self.main_render_pass
    }

    #[inline]
    pub fn viewport_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

// phase methods
impl FrameController {
    /// 等待当前 slot 的上一次 GPU 工作 retire，然后回收 command buffer、
    /// 归零线性堆，最后 acquire 下一张 present image
    ///
    /// 线性堆的 reset 只允许发生在这里：fence 等待保证了 arena 的上一次
    /// 使用已经结束，use-after-reuse 的契约由此成立
    pub fn begin_frame(&mut self, heap: &mut LinearHeapAllocator) {
        {
            let fence = &self.fence_frame_in_flight[*self.label];
            fence.wait();
            fence.reset();
        }

        {
            std::mem::take(&mut self.allocated_command_buffers[*self.label])
                .into_iter()
                .for_each(|cmd| cmd.free());
            self.graphics_command_pools[*self.label].reset_all_buffers();
        }

        heap.reset_frame(self.label);

        self.swapchain.acquire(&self.present_complete_semaphores[*self.label]);
    }

    /// 分配 command buffer，在当前 frame 使用
    pub fn alloc_command_buffer(&mut self, debug_name: &str) -> GfxCommandBuffer {
        let name = format!("{}{}", self.frame_name(), debug_name);
        let cmd = GfxCommandBuffer::new(self.device.clone(), &self.graphics_command_pools[*self.label], &name);

        self.allocated_command_buffers[*self.label].push(cmd.clone());
        cmd
    }

    /// 开始 present pass，并把 viewport/scissor 设置为全屏
    pub fn begin_main_pass(&self, cmd: &GfxCommandBuffer) {
        let extent = self.swapchain.extent();
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.main_render_pass.handle())
            .framebuffer(self.framebuffers[self.swapchain.current_image_index()].handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .clear_values(&clear_values);

        cmd.cmd_begin_render_pass(&begin_info);
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

    pub fn end_main_pass(&self, cmd: &GfxCommandBuffer) {
        cmd.cmd_end_render_pass();
    }

    /// 提交当前帧的命令并 present，然后推进 frame label
    pub fn submit_and_present(&mut self, gfx: &Gfx, cmd: &GfxCommandBuffer) {
        let submit_info = GfxSubmitInfo::new(std::slice::from_ref(cmd))
            .wait(&self.present_complete_semaphores[*self.label], vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .signal(&self.render_complete_semaphores[*self.label], vk::PipelineStageFlags2::ALL_COMMANDS);
        gfx.graphics_queue.submit(&[submit_info], Some(&self.fence_frame_in_flight[*self.label]));

        self.swapchain.present(&gfx.graphics_queue, &[self.render_complete_semaphores[*self.label].handle()]);

        self.frame_id += 1;
        self.label.next_frame(self.fif_count);
    }
}
