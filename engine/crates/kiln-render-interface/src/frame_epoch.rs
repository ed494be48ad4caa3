use ash::vk;
use kiln_gfx::commands::fence::GfxFence;
use kiln_gfx::foundation::destroyer::GfxResourceDestroyer;
use kiln_gfx::gfx_error::{GfxError, GfxResult};
use kiln_gfx::resources::pending_destroy::GfxPendingDestroy;

use crate::frame_counter::FrameCounter;

/// 观察帧槽位上 GPU 工作是否完成
pub trait GfxFrameSync {
    /// 阻塞直到 `slot` 上一次提交的工作全部完成
    fn wait_slot(&mut self, slot: usize) -> GfxResult<()>;
}

/// 每个帧槽位一个 fence
///
/// fence 创建时即为 signaled，所以第一轮的等待不会阻塞。
/// 提交某一帧的命令时，使用 [`submit_fence`](Self::submit_fence) 取得该槽位的 fence。
pub struct GfxFrameFences {
    device: ash::Device,
    fences: Vec<GfxFence>,
}
// new & init
impl GfxFrameFences {
    pub fn new(device: &ash::Device, pipeline_depth: usize) -> GfxResult<Self> {
        let fences = (0..pipeline_depth)
            .map(|_| GfxFence::new(device, true))
            .collect::<GfxResult<Vec<_>>>()?;
        Ok(Self {
            device: device.clone(),
            fences,
        })
    }
}
// tools
impl GfxFrameFences {
    /// reset 并返回槽位的 fence，用于本帧的 queue submit
    pub fn submit_fence(&self, slot: usize) -> GfxResult<vk::Fence> {
        let fence = self.fences.get(slot).ok_or(GfxError::Precondition("frame slot out of range"))?;
        fence.reset(&self.device)?;
        Ok(fence.handle())
    }
}
// destroy
impl GfxFrameFences {
    pub fn destroy(self) {
        for fence in self.fences {
            fence.destroy(&self.device);
        }
    }
}
impl GfxFrameSync for GfxFrameFences {
    fn wait_slot(&mut self, slot: usize) -> GfxResult<()> {
        let _span = tracy_client::span!("GfxFrameFences::wait_slot");
        let fence = self.fences.get(slot).ok_or(GfxError::Precondition("frame slot out of range"))?;
        fence.wait(&self.device)
    }
}

/// 按帧槽位延迟销毁原生资源
///
/// 持有一个长度为 `pipeline_depth` 的待销毁列表环：
/// - `begin_frame`：前进到下一帧，等待被复用的槽位完成，然后销毁该槽位的列表
/// - `end_frame`：本帧 release 的句柄成为当前槽位的列表
///
/// 于是帧 N 中 release 的资源，会在帧 N + pipeline_depth 的 `begin_frame`
/// 确认帧 N 的 GPU 工作完成之后才被销毁。
pub struct FrameEpochAllocator {
    frame_counter: FrameCounter,
    /// 每个槽位等待销毁的句柄
    slots: Vec<GfxPendingDestroy>,
    /// 当前帧 release 的句柄
    current: GfxPendingDestroy,
    in_frame: bool,
}
// new & init
impl FrameEpochAllocator {
    pub fn new(pipeline_depth: usize) -> GfxResult<Self> {
        if !(FrameCounter::MIN_PIPELINE_DEPTH..=FrameCounter::MAX_PIPELINE_DEPTH).contains(&pipeline_depth) {
            return Err(GfxError::Precondition("pipeline depth must be 2 or 3"));
        }
        let frame_counter = FrameCounter::new(0, pipeline_depth);
        Ok(Self {
            frame_counter,
            slots: (0..pipeline_depth).map(|_| GfxPendingDestroy::new()).collect(),
            current: GfxPendingDestroy::new(),
            in_frame: false,
        })
    }
}
// getters
impl FrameEpochAllocator {
    /// 当前帧的 epoch，第一帧为 1
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.frame_counter.frame_id()
    }

    #[inline]
    pub fn pipeline_depth(&self) -> usize {
        self.frame_counter.pipeline_depth()
    }

    #[inline]
    pub fn slot_index(&self) -> usize {
        self.frame_counter.slot_index()
    }

    #[inline]
    pub fn frame_name(&self) -> String {
        self.frame_counter.frame_name()
    }

    #[inline]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// 现在 release 的资源最早可以被回收的 epoch
    #[inline]
    pub fn release_epoch(&self) -> u64 {
        self.epoch() + self.pipeline_depth() as u64
    }

    /// 本帧的待销毁列表，`GfxResourceContext::release` 的目标
    #[inline]
    pub fn pending_mut(&mut self) -> &mut GfxPendingDestroy {
        &mut self.current
    }

    /// 所有尚未销毁的句柄数量
    pub fn pending_count(&self) -> usize {
        self.current.len() + self.slots.iter().map(GfxPendingDestroy::len).sum::<usize>()
    }
}
// update
impl FrameEpochAllocator {
    /// 开始新的一帧
    ///
    /// 等待即将复用的槽位完成，再销毁该槽位积累的句柄。返回新帧的 epoch。
    pub fn begin_frame(
        &mut self,
        sync: &mut impl GfxFrameSync,
        destroyer: &impl GfxResourceDestroyer,
    ) -> GfxResult<u64> {
        let _span = tracy_client::span!("FrameEpochAllocator::begin_frame");
        if self.in_frame {
            return Err(GfxError::Precondition("begin_frame called twice without end_frame"));
        }

        self.frame_counter.next_frame();
        let slot = self.frame_counter.slot_index();
        sync.wait_slot(slot)?;

        let destroyed = self.slots[slot].destroy_all(destroyer);
        if destroyed > 0 {
            log::debug!("{} destroyed {} deferred handles", self.frame_name(), destroyed);
        }

        self.in_frame = true;
        Ok(self.epoch())
    }

    /// 结束当前帧，本帧 release 的句柄归入当前槽位
    pub fn end_frame(&mut self) -> GfxResult<()> {
        let _span = tracy_client::span!("FrameEpochAllocator::end_frame");
        if !self.in_frame {
            return Err(GfxError::Precondition("end_frame called without begin_frame"));
        }

        let slot = self.frame_counter.slot_index();
        self.slots[slot].append(&mut self.current);
        self.in_frame = false;
        Ok(())
    }
}
// destroy
impl FrameEpochAllocator {
    /// 立即销毁所有待销毁的句柄
    ///
    /// 只能在 device idle 之后调用，例如关闭时
    pub fn flush_all(&mut self, destroyer: &impl GfxResourceDestroyer) -> usize {
        let _span = tracy_client::span!("FrameEpochAllocator::flush_all");
        let mut count = self.current.destroy_all(destroyer);
        for slot in &mut self.slots {
            count += slot.destroy_all(destroyer);
        }
        log::info!("flushed {} deferred handles", count);
        count
    }
}
impl Drop for FrameEpochAllocator {
    fn drop(&mut self) {
        let pending = self.pending_count();
        if pending > 0 {
            log::error!("FrameEpochAllocator dropped with {} handles still pending destruction", pending);
        }
    }
}
