use std::ops::Deref;

use ash::vk;

use crate::foundation::destroyer::GfxResourceDestroyer;
use crate::gfx_error::{GfxResult, VkResultExt};
use crate::resources::memory_block::GfxMemoryBlock;

/// Vulkan 逻辑设备封装
///
/// 只持有核心设备 API；device 的创建（extension、feature 选择）由平台层负责，
/// 这里接收已经创建好的 `ash::Device`。
pub struct GfxDevice {
    pub(crate) device: ash::Device,

    #[cfg(debug_assertions)]
    destroyed: bool,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(device: ash::Device) -> Self {
        log::info!("gfx device wrapped: {:?}", device.handle());
        Self {
            device,
            #[cfg(debug_assertions)]
            destroyed: false,
        }
    }

    /// 销毁 device 本身
    ///
    /// 调用前必须确保 device idle，且所有资源已经销毁
    pub fn destroy(mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
        #[cfg(debug_assertions)]
        {
            self.destroyed = true;
        }
    }
}

impl Drop for GfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        if !self.destroyed {
            log::error!("GfxDevice dropped without destroy()");
        }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

// tools
impl GfxDevice {
    /// 阻塞等待 device 上所有工作完成
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device.device_wait_idle() }.vk_context("vkDeviceWaitIdle")
    }
}

impl GfxResourceDestroyer for GfxDevice {
    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }

    fn destroy_image_view(&self, image_view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(image_view, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    fn destroy_buffer_view(&self, buffer_view: vk::BufferView) {
        unsafe { self.device.destroy_buffer_view(buffer_view, None) }
    }

    fn free_memory(&self, block: GfxMemoryBlock) {
        unsafe { self.device.free_memory(block.memory(), None) }
    }
}
