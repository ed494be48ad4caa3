use ash::vk;

use crate::foundation::destroyer::GfxResourceDestroyer;
use crate::resources::memory_block::GfxMemoryBlock;

/// 等待销毁的原生句柄
///
/// `GfxResourceContext::release` 把句柄移交到这里；
/// 只有帧槽位确认完成后，才会通过 [`destroy_all`](Self::destroy_all) 真正销毁。
#[derive(Default, Debug)]
pub struct GfxPendingDestroy {
    pub(crate) images: Vec<vk::Image>,
    pub(crate) image_views: Vec<vk::ImageView>,
    pub(crate) buffers: Vec<vk::Buffer>,
    pub(crate) buffer_views: Vec<vk::BufferView>,
    pub(crate) memory_blocks: Vec<GfxMemoryBlock>,
}
// new & init
impl GfxPendingDestroy {
    pub fn new() -> Self {
        Self::default()
    }
}
// getters
impl GfxPendingDestroy {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有待销毁句柄（包括 memory block）的数量
    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
            + self.image_views.len()
            + self.buffers.len()
            + self.buffer_views.len()
            + self.memory_blocks.len()
    }

    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    #[inline]
    pub fn buffers(&self) -> &[vk::Buffer] {
        &self.buffers
    }
}
// tools
impl GfxPendingDestroy {
    /// 把 `other` 中的句柄全部并入自身
    pub fn append(&mut self, other: &mut GfxPendingDestroy) {
        self.images.append(&mut other.images);
        self.image_views.append(&mut other.image_views);
        self.buffers.append(&mut other.buffers);
        self.buffer_views.append(&mut other.buffer_views);
        self.memory_blocks.append(&mut other.memory_blocks);
    }

    /// 销毁所有句柄并清空列表
    ///
    /// view 先于 image/buffer 销毁，memory 最后释放
    pub fn destroy_all(&mut self, destroyer: &impl GfxResourceDestroyer) -> usize {
        let _span = tracy_client::span!("GfxPendingDestroy::destroy_all");
        let count = self.len();
        for image_view in self.image_views.drain(..) {
            destroyer.destroy_image_view(image_view);
        }
        for image in self.images.drain(..) {
            destroyer.destroy_image(image);
        }
        for buffer_view in self.buffer_views.drain(..) {
            destroyer.destroy_buffer_view(buffer_view);
        }
        for buffer in self.buffers.drain(..) {
            destroyer.destroy_buffer(buffer);
        }
        for block in self.memory_blocks.drain(..) {
            destroyer.free_memory(block);
        }
        count
    }
}
