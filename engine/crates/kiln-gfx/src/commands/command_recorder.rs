use ash::vk;

use crate::commands::barrier::GfxBarrier;

/// 命令录制接缝
///
/// `GfxResourceContext` 只通过这个 trait 发出命令，
/// 真实实现是 [`GfxCommandBuffer`](crate::commands::command_buffer::GfxCommandBuffer)，
/// [`GfxCommandLog`](crate::commands::command_log::GfxCommandLog) 则只在内存中记录，用于回放与检查。
pub trait GfxCommandRecorder {
    /// - command type: synchronize
    fn pipeline_barrier(&mut self, barrier: &GfxBarrier);

    /// - command type: action
    fn clear_color_image(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: [f32; 4],
        range: vk::ImageSubresourceRange,
    );

    /// - command type: action
    fn clear_depth_stencil_image(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: vk::ClearDepthStencilValue,
        range: vk::ImageSubresourceRange,
    );

    /// - command type: action
    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32);
}
