use ash::vk;

/// 资源背后的一段 device memory
///
/// 当前实现中每个资源独占一块 `vk::DeviceMemory`，`offset` 与 `size` 仅用于调试输出。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxMemoryBlock {
    memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
}
// new & init
impl GfxMemoryBlock {
    pub fn new(memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        Self { memory, offset, size }
    }
}
// getters
impl GfxMemoryBlock {
    #[inline]
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    #[inline]
    pub fn offset(&self) -> vk::DeviceSize {
        self.offset
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}
