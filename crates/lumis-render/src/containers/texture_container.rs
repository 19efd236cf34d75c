//! bindless 纹理表
//!
//! 2D 和 3D（volume）各一张 descriptor set，内部是运行期大小的
//! combined image sampler 数组。逐 draw 不再切换纹理 set，shader 通过
//! push constant 里的索引取纹理。表内容只在注册纹理之后整体重写一次
//! （update-after-bind，需要调用方保证时机安全）。

use std::collections::HashMap;

use ash::vk;
use itertools::Itertools;
use lumis_gfx::gfx::Gfx;
use lumis_gfx::resources::image::{GfxImage, GfxImageView, GfxSampler};

use crate::layouts::{MAX_BINDLESS_TEXTURES_2D, MAX_BINDLESS_TEXTURES_3D, PipelineLayouts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureDim {
    D2,
    D3,
}

struct TextureEntry {
    /// attachment 纹理由外部持有 image，这里只有采样视图
    _image: Option<GfxImage>,
    view: GfxImageView,
    dim: TextureDim,
    /// bindless 数组中的下标，setup_descriptor_sets 时分配
    index: u32,
}

pub struct TextureContainer {
    set_2d: vk::DescriptorSet,
    set_3d: vk::DescriptorSet,
    sampler: GfxSampler,

    entries: HashMap<TextureId, TextureEntry>,
    next_id: u64,
}

// init
impl TextureContainer {
    pub fn new(gfx: &Gfx, layouts: &PipelineLayouts) -> Self {
        let set_2d = layouts.textures_2d_set_layout.allocate_set(gfx.descriptor_pool(), "bindless-textures-2d");
        let set_3d = layouts.textures_3d_set_layout.allocate_set(gfx.descriptor_pool(), "bindless-textures-3d");
        let sampler = GfxSampler::new_linear(gfx, "bindless-sampler");

        Self {
            set_2d,
            set_3d,
            sampler,
            entries: HashMap::new(),
            next_id: 0,
        }
    }
}

// 注册纹理
impl TextureContainer {
    /// RGBA8 像素创建 2D 纹理
    pub fn create_texture_2d(&mut self, gfx: &Gfx, extent: vk::Extent2D, pixels: &[u8], name: &str) -> TextureId {
        assert_eq!(pixels.len(), (extent.width * extent.height * 4) as usize);

        let image = GfxImage::new_2d(
            gfx,
            extent,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            vk::SampleCountFlags::TYPE_1,
            name,
        );
        image.upload_pixels_sync(gfx, pixels, name);

        let view = GfxImageView::new(
            gfx,
            image.handle(),
            vk::ImageViewType::TYPE_2D,
            image.format(),
            vk::ImageAspectFlags::COLOR,
            name,
        );
        self.insert(Some(image), view, TextureDim::D2)
    }

    /// R32_SFLOAT 体素数据创建 3D 纹理（volume rendering）
    pub fn create_texture_3d(&mut self, gfx: &Gfx, extent: vk::Extent3D, voxels: &[f32], name: &str) -> TextureId {
        assert_eq!(voxels.len() as u32, extent.width * extent.height * extent.depth);

        let image = GfxImage::new_3d(
            gfx,
            extent,
            vk::Format::R32_SFLOAT,
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            name,
        );
        image.upload_pixels_sync(gfx, bytemuck::cast_slice(voxels), name);

        let view = GfxImageView::new(
            gfx,
            image.handle(),
            vk::ImageViewType::TYPE_3D,
            image.format(),
            vk::ImageAspectFlags::COLOR,
            name,
        );
        self.insert(Some(image), view, TextureDim::D3)
    }

    /// 注册一个 offscreen attachment 的采样视图（volume 的 front/back 等）
    ///
    /// image 的生命周期由调用方管理
    pub fn register_attachment(&mut self, gfx: &Gfx, image: vk::Image, format: vk::Format, name: &str) -> TextureId {
        let view =
            GfxImageView::new(gfx, image, vk::ImageViewType::TYPE_2D, format, vk::ImageAspectFlags::COLOR, name);
        self.insert(None, view, TextureDim::D2)
    }

    fn insert(&mut self, image: Option<GfxImage>, view: GfxImageView, dim: TextureDim) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            TextureEntry {
                _image: image,
                view,
                dim,
                index: u32::MAX,
            },
        );
        id
    }

    pub fn remove_texture(&mut self, id: TextureId) {
        self.entries.remove(&id);
    }
}

// descriptor set 维护
impl TextureContainer {
    /// 重写两张 bindless 表
    ///
    /// 在注册/移除纹理之后调用一次；update-after-bind 的 layout 允许
    /// 在 set 已被绑定的情况下更新，但调用方要保证没有 in-flight 的
    /// 工作正在读被覆盖的槽位。
    pub fn setup_descriptor_sets(&mut self, gfx: &Gfx) {
        let mut infos_2d = vec![];
        let mut infos_3d = vec![];

        let mut ids = self.entries.keys().copied().collect_vec();
        ids.sort();
        for id in ids {
            let entry = self.entries.get_mut(&id).unwrap();
            let infos = match entry.dim {
                TextureDim::D2 => &mut infos_2d,
                TextureDim::D3 => &mut infos_3d,
            };
            entry.index = infos.len() as u32;
            infos.push(
                vk::DescriptorImageInfo::default()
                    .sampler(self.sampler.handle())
                    .image_view(entry.view.handle())
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            );
        }
        assert!(infos_2d.len() as u32 <= MAX_BINDLESS_TEXTURES_2D);
        assert!(infos_3d.len() as u32 <= MAX_BINDLESS_TEXTURES_3D);

        let mut writes = vec![];
        if !infos_2d.is_empty() {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(self.set_2d)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&infos_2d),
            );
        }
        if !infos_3d.is_empty() {
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(self.set_3d)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&infos_3d),
            );
        }
        if !writes.is_empty() {
            unsafe {
                gfx.device.update_descriptor_sets(&writes, &[]);
            }
        }
    }
}

// getters
impl TextureContainer {
    #[inline]
    pub fn descriptor_set_2d(&self) -> vk::DescriptorSet {
        self.set_2d
    }

    #[inline]
    pub fn descriptor_set_3d(&self) -> vk::DescriptorSet {
        self.set_3d
    }

    /// shader 里用的 bindless 下标
    #[inline]
    pub fn texture_index(&self, id: TextureId) -> u32 {
        let entry = self.entries.get(&id).expect("unknown texture id");
        assert_ne!(entry.index, u32::MAX, "setup_descriptor_sets has not run since this texture was registered");
        entry.index
    }
}
