use ash::vk;

use crate::resources::memory_block::GfxMemoryBlock;

/// 原生句柄的销毁接口
///
/// 只有在确认 GPU 不再引用这些句柄后才能调用：
/// 要么是帧槽位的 fence 已经 signal，要么 device 已经 idle。
pub trait GfxResourceDestroyer {
    fn destroy_image(&self, image: vk::Image);
    fn destroy_image_view(&self, image_view: vk::ImageView);
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn destroy_buffer_view(&self, buffer_view: vk::BufferView);
    fn free_memory(&self, block: GfxMemoryBlock);
}
