use std::ffi::CStr;
use std::path::Path;
use std::rc::Rc;

use ash::vk;

use crate::foundation::device::GfxDevice;

/// shader module 加载失败的原因
///
/// 上层会将其与 shader 标识一起包装为 pipeline 构建错误
#[derive(Debug, thiserror::Error)]
pub enum GfxShaderError {
    #[error("failed to read spv file: {0}")]
    Io(#[from] std::io::Error),
    #[error("device rejected shader module: {0}")]
    Vk(vk::Result),
}

pub struct ShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub entry_point: &'static CStr,
    pub path: &'static str,
}

pub struct GfxShaderModule {
    handle: vk::ShaderModule,
    device: Rc<GfxDevice>,
}

impl GfxShaderModule {
    pub fn new(device: Rc<GfxDevice>, path: &Path) -> Result<Self, GfxShaderError> {
        let mut file = std::fs::File::open(path)?;
        let shader_code = ash::util::read_spv(&mut file)?;

        let shader_module_ci = vk::ShaderModuleCreateInfo::default().code(&shader_code);
        let shader_module = unsafe {
            device.create_shader_module(&shader_module_ci, None).map_err(GfxShaderError::Vk)?
        };
        device.set_object_debug_name(shader_module, path.to_string_lossy());

        Ok(Self {
            handle: shader_module,
            device,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    pub fn destroy(self) {
        unsafe {
            self.device.destroy_shader_module(self.handle, None);
        }
    }
}
