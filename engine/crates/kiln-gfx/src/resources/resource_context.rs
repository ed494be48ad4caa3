use ash::vk;

use crate::commands::barrier::{GfxBarrier, GfxBufferBarrier, GfxImageBarrier};
use crate::commands::command_recorder::GfxCommandRecorder;
use crate::foundation::destroyer::GfxResourceDestroyer;
use crate::gfx_error::{GfxError, GfxResult};
use crate::resources::access::write_access_bits;
use crate::resources::memory_block::GfxMemoryBlock;
use crate::resources::pending_destroy::GfxPendingDestroy;

/// image 资源的描述信息
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxImageDesc {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub aspect_mask: vk::ImageAspectFlags,
}

impl GfxImageDesc {
    pub fn new_2d(format: vk::Format, width: u32, height: u32, aspect_mask: vk::ImageAspectFlags) -> Self {
        Self {
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            aspect_mask,
        }
    }
}

/// 单个 GPU 资源（image 或 buffer）在某个 GPU context 上的状态
///
/// 记录当前 layout 以及上一次写、之前所有读所在的 pipeline stage，
/// 只在真正发生冲突的访问上插入 barrier：
/// - 读之后的读：不需要 barrier
/// - layout 变化或写：等待之前的写和所有读
/// - 写之后的读：等待之前的写
///
/// image 与 buffer 只会有一种句柄是非空的，barrier 的形状跟随非空的那一种。
#[derive(Debug)]
pub struct GfxResourceContext {
    image: vk::Image,
    image_views: Vec<vk::ImageView>,
    buffer: vk::Buffer,
    buffer_views: Vec<vk::BufferView>,
    block: Option<GfxMemoryBlock>,

    format: vk::Format,
    extent: vk::Extent3D,
    mip_levels: u32,
    array_layers: u32,
    aspect_mask: vk::ImageAspectFlags,

    layout: vk::ImageLayout,
    write_stage_mask: vk::PipelineStageFlags2,
    write_access_mask: vk::AccessFlags2,
    read_stage_mask: vk::PipelineStageFlags2,

    /// release 时写入：在该 epoch 之前不得回收
    destroy_epoch: Option<u64>,

    name: String,
}

// new & init
impl GfxResourceContext {
    pub fn new_image(
        image: vk::Image,
        image_views: Vec<vk::ImageView>,
        block: Option<GfxMemoryBlock>,
        desc: GfxImageDesc,
        name: impl Into<String>,
    ) -> Self {
        Self {
            image,
            image_views,
            buffer: vk::Buffer::null(),
            buffer_views: Vec::new(),
            block,
            format: desc.format,
            extent: desc.extent,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
            aspect_mask: desc.aspect_mask,
            layout: vk::ImageLayout::UNDEFINED,
            write_stage_mask: vk::PipelineStageFlags2::NONE,
            write_access_mask: vk::AccessFlags2::NONE,
            read_stage_mask: vk::PipelineStageFlags2::NONE,
            destroy_epoch: None,
            name: name.into(),
        }
    }

    /// buffer 纹理（texel buffer）或普通 buffer
    pub fn new_buffer(
        buffer: vk::Buffer,
        buffer_views: Vec<vk::BufferView>,
        block: Option<GfxMemoryBlock>,
        format: vk::Format,
        name: impl Into<String>,
    ) -> Self {
        Self {
            image: vk::Image::null(),
            image_views: Vec::new(),
            buffer,
            buffer_views,
            block,
            format,
            extent: vk::Extent3D::default(),
            mip_levels: 1,
            array_layers: 1,
            aspect_mask: vk::ImageAspectFlags::empty(),
            layout: vk::ImageLayout::UNDEFINED,
            write_stage_mask: vk::PipelineStageFlags2::NONE,
            write_access_mask: vk::AccessFlags2::NONE,
            read_stage_mask: vk::PipelineStageFlags2::NONE,
            destroy_epoch: None,
            name: name.into(),
        }
    }
}

// getters
impl GfxResourceContext {
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn image_view(&self, index: usize) -> Option<vk::ImageView> {
        self.image_views.get(index).copied()
    }

    #[inline]
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn buffer_view(&self, index: usize) -> Option<vk::BufferView> {
        self.buffer_views.get(index).copied()
    }

    /// 当前 layout；使用者必须以此为准，不能自行假设
    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    #[inline]
    pub fn write_stage_mask(&self) -> vk::PipelineStageFlags2 {
        self.write_stage_mask
    }

    #[inline]
    pub fn write_access_mask(&self) -> vk::AccessFlags2 {
        self.write_access_mask
    }

    #[inline]
    pub fn read_stage_mask(&self) -> vk::PipelineStageFlags2 {
        self.read_stage_mask
    }

    #[inline]
    pub fn destroy_epoch(&self) -> Option<u64> {
        self.destroy_epoch
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_image(&self) -> bool {
        self.image != vk::Image::null()
    }

    #[inline]
    pub fn is_buffer(&self) -> bool {
        self.buffer != vk::Buffer::null()
    }

    /// image 与 buffer 都为空：已经 release 或从未创建
    #[inline]
    pub fn is_null(&self) -> bool {
        !self.is_image() && !self.is_buffer()
    }

    #[inline]
    fn full_range(&self, aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.array_layers,
        }
    }
}

// hazard tracking
impl GfxResourceContext {
    /// 把资源转换到新的 layout，并插入防止 RAW/WAW/WAR 的 barrier
    ///
    /// buffer 会忽略 `layout` 参数。根据 access 隐式地记录读或写。
    ///
    /// # 返回
    /// 是否录制了 barrier。读之后的读、以及没有句柄的资源不会录制任何命令。
    pub fn transition(
        &mut self,
        cmd: &mut impl GfxCommandRecorder,
        layout: vk::ImageLayout,
        dst_stage_mask: vk::PipelineStageFlags2,
        dst_access_mask: vk::AccessFlags2,
    ) -> bool {
        if self.is_null() {
            log::debug!("transition on released resource `{}` ignored", self.name);
            return false;
        }

        let layout = if self.is_image() { layout } else { self.layout };
        let write_mask = write_access_bits(dst_access_mask);
        let is_write = !write_mask.is_empty();
        let read_stages = dst_stage_mask & !vk::PipelineStageFlags2::BOTTOM_OF_PIPE;

        // 最近的写（或 layout 转换）必须先完成
        let mut src_stage_mask = self.write_stage_mask;
        if self.layout != layout || is_write {
            // layout 转换或写之前，之前所有的读都必须完成
            src_stage_mask |= self.read_stage_mask;
            if src_stage_mask.is_empty() {
                src_stage_mask = vk::PipelineStageFlags2::TOP_OF_PIPE;
            }
        } else if src_stage_mask.is_empty() {
            // read-after-read
            self.read_stage_mask |= read_stages;
            return false;
        }

        let barrier = if self.is_image() {
            GfxBarrier::Image(
                GfxImageBarrier::new()
                    .image(self.image)
                    .layout_transfer(self.layout, layout)
                    .src_mask(src_stage_mask, self.write_access_mask)
                    .dst_mask(dst_stage_mask, dst_access_mask)
                    .subresource(self.aspect_mask, self.mip_levels, self.array_layers),
            )
        } else {
            GfxBarrier::Buffer(
                GfxBufferBarrier::new()
                    .buffer(self.buffer, 0, vk::WHOLE_SIZE)
                    .src_mask(src_stage_mask, self.write_access_mask)
                    .dst_mask(dst_stage_mask, dst_access_mask),
            )
        };
        cmd.pipeline_barrier(&barrier);

        self.layout = layout;
        if is_write {
            self.write_stage_mask = dst_stage_mask;
            self.write_access_mask = write_mask;
            self.read_stage_mask = vk::PipelineStageFlags2::NONE;
        } else {
            // barrier 已经让之前的写可见
            self.write_stage_mask = vk::PipelineStageFlags2::NONE;
            self.write_access_mask = vk::AccessFlags2::NONE;
            self.read_stage_mask |= read_stages;
        }
        true
    }

    /// 记录一次未经 `transition` 的读（例如与上一次访问处于同一个 barrier 作用域）
    #[inline]
    pub fn mark_read(&mut self, stage_mask: vk::PipelineStageFlags2) {
        self.read_stage_mask |= stage_mask & !vk::PipelineStageFlags2::BOTTOM_OF_PIPE;
    }

    /// 记录一次未经 `transition` 的写，例如 context 自己发出的 fill
    #[inline]
    pub fn mark_written(&mut self, stage_mask: vk::PipelineStageFlags2, access_mask: vk::AccessFlags2) {
        self.write_stage_mask = stage_mask;
        self.write_access_mask = access_mask;
        self.read_stage_mask = vk::PipelineStageFlags2::NONE;
    }

    /// 不再关心资源的现有内容
    ///
    /// layout 回到 UNDEFINED，下一次 transition 不需要保留内容；
    /// 之前的读写 stage 仍然保留，避免与仍在执行的访问产生 WAR/WAW
    #[inline]
    pub fn discard(&mut self) {
        if self.is_image() {
            self.layout = vk::ImageLayout::UNDEFINED;
        }
        self.write_access_mask = vk::AccessFlags2::NONE;
    }
}

// clear
impl GfxResourceContext {
    pub fn clear_color_image(&mut self, cmd: &mut impl GfxCommandRecorder, color: [f32; 4]) -> GfxResult<()> {
        if !self.is_image() {
            return Err(GfxError::NullResource(self.name.clone()));
        }
        if self.aspect_mask != vk::ImageAspectFlags::COLOR {
            return Err(GfxError::Precondition("clear_color_image requires a color image"));
        }

        self.discard();
        self.transition(
            cmd,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        );
        cmd.clear_color_image(self.image, self.layout, color, self.full_range(vk::ImageAspectFlags::COLOR));
        Ok(())
    }

    pub fn clear_depth_stencil_image(
        &mut self,
        cmd: &mut impl GfxCommandRecorder,
        value: vk::ClearDepthStencilValue,
    ) -> GfxResult<()> {
        if !self.is_image() {
            return Err(GfxError::NullResource(self.name.clone()));
        }
        if self.aspect_mask == vk::ImageAspectFlags::COLOR {
            return Err(GfxError::Precondition("clear_depth_stencil_image requires a depth/stencil image"));
        }

        self.discard();
        self.transition(
            cmd,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        );
        cmd.clear_depth_stencil_image(self.image, self.layout, value, self.full_range(self.aspect_mask));
        Ok(())
    }

    /// 用 `fill` 填充整个 buffer
    ///
    /// 与之前的访问之间的同步由调用方负责，这里只记录本次写
    pub fn clear_buffer(&mut self, cmd: &mut impl GfxCommandRecorder, fill: u32) -> GfxResult<()> {
        if !self.is_buffer() {
            return Err(GfxError::NullResource(self.name.clone()));
        }

        cmd.fill_buffer(self.buffer, 0, vk::WHOLE_SIZE, fill);
        self.mark_written(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);
        Ok(())
    }
}

// destroy
impl GfxResourceContext {
    /// 把所有原生句柄移交给当前帧的待销毁列表
    ///
    /// 不会同步销毁任何东西：GPU 可能仍在使用这些句柄，
    /// 真正的销毁在 `destroy_epoch` 对应的帧槽位被确认完成之后发生。
    pub fn release(&mut self, pending: &mut GfxPendingDestroy, destroy_epoch: u64) {
        if self.is_image() {
            log::debug!(
                "Scheduling image {:?} with views {:?} of `{}` for deletion at epoch {}",
                self.image,
                self.image_views,
                self.name,
                destroy_epoch
            );
            pending.images.push(std::mem::replace(&mut self.image, vk::Image::null()));
        }
        pending.image_views.append(&mut self.image_views);

        if self.is_buffer() {
            log::debug!(
                "Scheduling buffer {:?} with views {:?} of `{}` for deletion at epoch {}",
                self.buffer,
                self.buffer_views,
                self.name,
                destroy_epoch
            );
            pending.buffers.push(std::mem::replace(&mut self.buffer, vk::Buffer::null()));
        }
        pending.buffer_views.append(&mut self.buffer_views);

        // memory 在帧结束前必须保持不动
        if let Some(block) = self.block.take() {
            pending.memory_blocks.push(block);
        }

        self.destroy_epoch = Some(destroy_epoch);
        self.reset_tracking();
    }

    /// 立即销毁所有原生句柄
    ///
    /// 只有在确认 device idle（例如关闭时）后才能调用
    pub fn destroy_now(&mut self, destroyer: &impl GfxResourceDestroyer) {
        for image_view in self.image_views.drain(..) {
            destroyer.destroy_image_view(image_view);
        }
        if self.is_image() {
            destroyer.destroy_image(std::mem::replace(&mut self.image, vk::Image::null()));
        }

        for buffer_view in self.buffer_views.drain(..) {
            destroyer.destroy_buffer_view(buffer_view);
        }
        if self.is_buffer() {
            destroyer.destroy_buffer(std::mem::replace(&mut self.buffer, vk::Buffer::null()));
        }

        if let Some(block) = self.block.take() {
            destroyer.free_memory(block);
        }

        self.reset_tracking();
    }

    fn reset_tracking(&mut self) {
        self.format = vk::Format::UNDEFINED;
        self.layout = vk::ImageLayout::UNDEFINED;
        self.write_stage_mask = vk::PipelineStageFlags2::NONE;
        self.write_access_mask = vk::AccessFlags2::NONE;
        self.read_stage_mask = vk::PipelineStageFlags2::NONE;
    }
}
