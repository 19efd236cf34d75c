use std::fmt::Display;
use std::ops::Deref;

use ash::vk;

pub struct DefaultEngineSettings;
impl DefaultEngineSettings {
    pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;
    pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
}

/// 引擎创建时确定，整个运行期间不变
#[derive(Copy, Clone)]
pub struct EngineSettings {
    pub frames_in_flight: usize,

    /// 三个 arena 的容量，按照一帧内最大的工作量来配置。
    /// arena 耗尽是配置错误，不是运行期可恢复的状况。
    pub uniform_arena_size: vk::DeviceSize,
    pub storage_arena_size: vk::DeviceSize,
    pub buffer_arena_size: vk::DeviceSize,

    /// 动态 descriptor 的 range，决定单次绑定可见的窗口大小
    pub uniform_descriptor_range: vk::DeviceSize,
    pub storage_descriptor_range: vk::DeviceSize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: FrameLabel::FRAMES_IN_FLIGHT,
            uniform_arena_size: 8 * 1024 * 1024,
            storage_arena_size: 64 * 1024 * 1024,
            buffer_arena_size: 64 * 1024 * 1024,
            uniform_descriptor_range: 64 * 1024,
            storage_descriptor_range: 16 * 1024 * 1024,
        }
    }
}

/// frames in flight 中每一帧的 label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    A,
    B,
    C,
}

impl Deref for FrameLabel {
    type Target = usize;

    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
            Self::C => &Self::INDEX[2],
        }
    }
}

impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}

impl FrameLabel {
    pub const FRAMES_IN_FLIGHT: usize = 3;

    const INDEX: [usize; 3] = [0, 1, 2];

    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => panic!("invalid frame label index: {idx}"),
        }
    }

    #[inline]
    pub fn next_frame(&mut self, fif_count: usize) {
        *self = Self::from_usize((**self + 1) % fif_count);
    }
}

/// 每帧由窗口层生成的快照，按值传递给场景
#[derive(Copy, Clone, Default)]
pub struct FrameData {
    pub width: u32,
    pub height: u32,
    pub resize: bool,

    pub mouse: MouseState,
    pub keys: KeyState,
}

#[derive(Copy, Clone, Default)]
pub struct MouseState {
    pub xy: glam::Vec2,
    pub prev_xy: glam::Vec2,
    pub left: bool,
    pub middle: bool,
    pub right: bool,
}

#[derive(Copy, Clone, Default)]
pub struct KeyState {
    /// 重建 pipeline container（shader 热重载）
    pub r: bool,
    pub n: bool,
    pub m: bool,
    pub left: bool,
    pub right: bool,
    pub space: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_label_wraps_around() {
        let mut label = FrameLabel::A;
        label.next_frame(3);
        assert_eq!(label, FrameLabel::B);
        label.next_frame(3);
        assert_eq!(label, FrameLabel::C);
        label.next_frame(3);
        assert_eq!(label, FrameLabel::A);
    }

    #[test]
    fn frame_label_respects_fif_count() {
        let mut label = FrameLabel::B;
        label.next_frame(2);
        assert_eq!(label, FrameLabel::A);
    }
}
