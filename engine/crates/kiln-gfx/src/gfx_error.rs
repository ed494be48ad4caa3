use ash::vk;

/// GFX 层的错误
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    /// Vulkan API 调用失败
    #[error("vulkan call `{call}` failed: {result:?}")]
    Vk { call: &'static str, result: vk::Result },

    /// 对一个没有原生句柄的资源执行了需要句柄的操作
    #[error("resource `{0}` has no native handle")]
    NullResource(String),

    /// 调用前置条件不满足（例如对 depth image 执行 color clear）
    #[error("precondition violated: {0}")]
    Precondition(&'static str),
}

pub type GfxResult<T> = Result<T, GfxError>;

/// 将 `ash` 的 `VkResult` 映射为 [`GfxError`]
pub(crate) trait VkResultExt<T> {
    fn vk_context(self, call: &'static str) -> GfxResult<T>;
}

impl<T> VkResultExt<T> for ash::prelude::VkResult<T> {
    #[inline]
    fn vk_context(self, call: &'static str) -> GfxResult<T> {
        self.map_err(|result| GfxError::Vk { call, result })
    }
}
