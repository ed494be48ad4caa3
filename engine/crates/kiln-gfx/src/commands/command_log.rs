use ash::vk;

use crate::commands::{barrier::GfxBarrier, command_recorder::GfxCommandRecorder};

/// 被记录下来的一条命令
#[derive(Clone, Copy, Debug)]
pub enum GfxRecordedCommand {
    Barrier(GfxBarrier),
    ClearColorImage {
        image: vk::Image,
        layout: vk::ImageLayout,
        color: [f32; 4],
        range: vk::ImageSubresourceRange,
    },
    ClearDepthStencilImage {
        image: vk::Image,
        layout: vk::ImageLayout,
        value: vk::ClearDepthStencilValue,
        range: vk::ImageSubresourceRange,
    },
    FillBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        data: u32,
    },
}

/// 内存中的命令序列
///
/// 不依赖 device，可以先录制再 [`replay`](Self::replay) 到真实的 command buffer 上。
#[derive(Default, Debug)]
pub struct GfxCommandLog {
    commands: Vec<GfxRecordedCommand>,
}
// new & init
impl GfxCommandLog {
    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl GfxCommandLog {
    #[inline]
    pub fn commands(&self) -> &[GfxRecordedCommand] {
        &self.commands
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn barriers(&self) -> impl Iterator<Item = &GfxBarrier> {
        self.commands.iter().filter_map(|c| match c {
            GfxRecordedCommand::Barrier(b) => Some(b),
            _ => None,
        })
    }

    #[inline]
    pub fn barrier_count(&self) -> usize {
        self.barriers().count()
    }
}
// tools
impl GfxCommandLog {
    #[inline]
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// 按录制顺序重放到另一个 recorder 上，并清空自身
    pub fn replay(&mut self, target: &mut impl GfxCommandRecorder) {
        for command in self.commands.drain(..) {
            match command {
                GfxRecordedCommand::Barrier(barrier) => target.pipeline_barrier(&barrier),
                GfxRecordedCommand::ClearColorImage {
                    image,
                    layout,
                    color,
                    range,
                } => target.clear_color_image(image, layout, color, range),
                GfxRecordedCommand::ClearDepthStencilImage {
                    image,
                    layout,
                    value,
                    range,
                } => target.clear_depth_stencil_image(image, layout, value, range),
                GfxRecordedCommand::FillBuffer {
                    buffer,
                    offset,
                    size,
                    data,
                } => target.fill_buffer(buffer, offset, size, data),
            }
        }
    }
}

impl GfxCommandRecorder for GfxCommandLog {
    fn pipeline_barrier(&mut self, barrier: &GfxBarrier) {
        self.commands.push(GfxRecordedCommand::Barrier(*barrier));
    }

    fn clear_color_image(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: [f32; 4],
        range: vk::ImageSubresourceRange,
    ) {
        self.commands.push(GfxRecordedCommand::ClearColorImage {
            image,
            layout,
            color,
            range,
        });
    }

    fn clear_depth_stencil_image(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: vk::ClearDepthStencilValue,
        range: vk::ImageSubresourceRange,
    ) {
        self.commands.push(GfxRecordedCommand::ClearDepthStencilImage {
            image,
            layout,
            value,
            range,
        });
    }

    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32) {
        self.commands.push(GfxRecordedCommand::FillBuffer {
            buffer,
            offset,
            size,
            data,
        });
    }
}
