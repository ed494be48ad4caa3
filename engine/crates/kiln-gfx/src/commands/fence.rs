use ash::vk;

use crate::gfx_error::{GfxResult, VkResultExt};

/// # Destroy
/// 不应该实现 Drop，因为可以 Clone，需要手动 destroy
///
/// 所有方法接受 `&ash::Device`，`&GfxDevice` 可以直接 deref 传入
#[derive(Clone)]
pub struct GfxFence {
    fence: vk::Fence,
}

// 创建与销毁
impl GfxFence {
    /// # param
    /// * signaled - 是否创建时就 signaled
    pub fn new(device: &ash::Device, signaled: bool) -> GfxResult<Self> {
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None) }
            .vk_context("vkCreateFence")?;
        Ok(Self { fence })
    }

    #[inline]
    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

// tools
impl GfxFence {
    /// 阻塞等待 fence
    #[inline]
    pub fn wait(&self, device: &ash::Device) -> GfxResult<()> {
        unsafe { device.wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX) }
            .vk_context("vkWaitForFences")
    }

    #[inline]
    pub fn reset(&self, device: &ash::Device) -> GfxResult<()> {
        unsafe { device.reset_fences(std::slice::from_ref(&self.fence)) }.vk_context("vkResetFences")
    }
}
