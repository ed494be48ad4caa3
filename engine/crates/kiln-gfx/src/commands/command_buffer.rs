use ash::vk;

use crate::commands::{barrier::GfxBarrier, command_recorder::GfxCommandRecorder};
use crate::foundation::device::GfxDevice;
use crate::gfx_error::{GfxResult, VkResultExt};

/// 命令缓冲封装
///
/// 只借用 device，command buffer 本身由外部的 command pool 分配和回收。
///
/// # 使用示例
/// ```ignore
/// let mut cmd = GfxCommandBuffer::new(&device, vk_cmd);
/// cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
/// texture_ctx.transition(&mut cmd, layout, stage, access);
/// cmd.end()?;
/// ```
pub struct GfxCommandBuffer<'a> {
    device: &'a GfxDevice,
    vk_handle: vk::CommandBuffer,
}
// new & init
impl<'a> GfxCommandBuffer<'a> {
    pub fn new(device: &'a GfxDevice, vk_handle: vk::CommandBuffer) -> Self {
        Self { device, vk_handle }
    }
}
// getters
impl GfxCommandBuffer<'_> {
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}
// Basic 命令
impl GfxCommandBuffer<'_> {
    /// 开始录制 command
    #[inline]
    pub fn begin(&mut self, usage_flag: vk::CommandBufferUsageFlags) -> GfxResult<()> {
        unsafe {
            self.device
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))
        }
        .vk_context("vkBeginCommandBuffer")
    }

    /// 结束录制 command
    #[inline]
    pub fn end(&mut self) -> GfxResult<()> {
        unsafe { self.device.end_command_buffer(self.vk_handle) }.vk_context("vkEndCommandBuffer")
    }
}

impl GfxCommandRecorder for GfxCommandBuffer<'_> {
    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    fn pipeline_barrier(&mut self, barrier: &GfxBarrier) {
        let dependency_info = vk::DependencyInfo::default();
        match barrier {
            GfxBarrier::Image(image_barrier) => {
                let barriers = [*image_barrier.inner()];
                let dependency_info = dependency_info.image_memory_barriers(&barriers);
                unsafe { self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info) }
            }
            GfxBarrier::Buffer(buffer_barrier) => {
                let barriers = [*buffer_barrier.inner()];
                let dependency_info = dependency_info.buffer_memory_barriers(&barriers);
                unsafe { self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info) }
            }
        }
    }

    /// - command type: action
    /// - supported queue types: graphics, compute
    fn clear_color_image(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: [f32; 4],
        range: vk::ImageSubresourceRange,
    ) {
        let clear_value = vk::ClearColorValue { float32: color };
        unsafe {
            self.device.cmd_clear_color_image(self.vk_handle, image, layout, &clear_value, std::slice::from_ref(&range))
        }
    }

    /// - command type: action
    /// - supported queue types: graphics
    fn clear_depth_stencil_image(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: vk::ClearDepthStencilValue,
        range: vk::ImageSubresourceRange,
    ) {
        unsafe {
            self.device.cmd_clear_depth_stencil_image(
                self.vk_handle,
                image,
                layout,
                &value,
                std::slice::from_ref(&range),
            )
        }
    }

    /// - command type: action
    /// - supported queue types: graphics, compute, transfer
    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32) {
        unsafe { self.device.cmd_fill_buffer(self.vk_handle, buffer, offset, size, data) }
    }
}
