use kiln_gfx::foundation::destroyer::GfxResourceDestroyer;
use kiln_gfx::resources::resource_context::GfxResourceContext;
use slotmap::{SecondaryMap, SlotMap};

use crate::frame_epoch::FrameEpochAllocator;
use crate::handles::{GfxContextId, GfxResourceHandle};
use crate::residency::{GfxResidencyFuture, ResidencyState, spawn_residency};

/// 单个 GPU context 的资源管理器
///
/// 使用 SlotMap 存储每个资源的 [`GfxResourceContext`]，对外提供轻量级的 Handle。
/// release 之后 handle 立即失效，原生句柄交给 [`FrameEpochAllocator`] 延迟销毁。
pub struct GfxResourceManager {
    context_id: GfxContextId,
    resources: SlotMap<GfxResourceHandle, GfxResourceContext>,
    /// 仍在上传或上传失败的资源；不在表中的资源视为已驻留
    uploads: SecondaryMap<GfxResourceHandle, GfxResidencyFuture>,

    destroyed: bool,
}
// new & init
impl GfxResourceManager {
    pub fn new(context_id: GfxContextId) -> Self {
        Self {
            context_id,
            resources: SlotMap::with_key(),
            uploads: SecondaryMap::new(),
            destroyed: false,
        }
    }
}
// getters
impl GfxResourceManager {
    #[inline]
    pub fn context_id(&self) -> GfxContextId {
        self.context_id
    }

    #[inline]
    pub fn get(&self, handle: GfxResourceHandle) -> Option<&GfxResourceContext> {
        self.resources.get(handle)
    }

    #[inline]
    pub fn get_mut(&mut self, handle: GfxResourceHandle) -> Option<&mut GfxResourceContext> {
        self.resources.get_mut(handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// 资源存在、持有原生句柄，且没有未完成的上传
    pub fn is_resident(&self, handle: GfxResourceHandle) -> bool {
        let Some(resource) = self.resources.get(handle) else {
            return false;
        };
        if resource.is_null() {
            return false;
        }
        self.uploads.get(handle).is_none_or(GfxResidencyFuture::is_ready)
    }
}
// Subsystem API
impl GfxResourceManager {
    /// 注册已经持有数据的资源
    pub fn prepare(&mut self, resource: GfxResourceContext) -> GfxResourceHandle {
        log::debug!("{} prepare `{}`", self.context_id, resource.name());
        self.resources.insert(resource)
    }

    /// 注册资源，并在后台执行数据上传；上传完成前 `is_resident` 为 false
    pub fn prepare_with_upload<F>(&mut self, resource: GfxResourceContext, upload: F) -> (GfxResourceHandle, GfxResidencyFuture)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        let future = spawn_residency(resource.name(), upload);
        let handle = self.prepare(resource);
        self.uploads.insert(handle, future.clone());
        (handle, future)
    }

    /// 取得资源的驻留结果
    ///
    /// 已驻留的资源立即返回 Ready；仍在上传的资源返回同一个 future 的副本。
    pub fn ensure_resident(&mut self, handle: GfxResourceHandle) -> GfxResidencyFuture {
        let Some(resource) = self.resources.get(handle) else {
            return GfxResidencyFuture::failed("unknown or released resource");
        };
        if resource.is_null() {
            return GfxResidencyFuture::failed(format!("resource `{}` has no native handle", resource.name()));
        }

        let Some(future) = self.uploads.get(handle).cloned() else {
            return GfxResidencyFuture::ready();
        };
        if future.poll() == ResidencyState::Ready {
            self.uploads.remove(handle);
        }
        future
    }

    /// 把资源交给当前帧延迟销毁，handle 随即失效
    ///
    /// # 返回
    /// handle 是否有效
    pub fn release(&mut self, handle: GfxResourceHandle, allocator: &mut FrameEpochAllocator) -> bool {
        let Some(mut resource) = self.resources.remove(handle) else {
            log::warn!("{} release of unknown handle {:?}", self.context_id, handle);
            return false;
        };
        // 上传仍可能在进行，只是不再关心结果
        if let Some(future) = self.uploads.remove(handle) {
            future.abandon();
        }

        let epoch = allocator.release_epoch();
        resource.release(allocator.pending_mut(), epoch);
        true
    }
}
// destroy
impl GfxResourceManager {
    /// 立即销毁所有资源，调用前必须确认 device idle
    pub fn destroy_all_now(&mut self, destroyer: &impl GfxResourceDestroyer) {
        let _span = tracy_client::span!("GfxResourceManager::destroy_all_now");
        let count = self.resources.len();
        for (_, mut resource) in self.resources.drain() {
            resource.destroy_now(destroyer);
        }
        self.uploads.clear();
        log::info!("{} destroyed {} resources", self.context_id, count);
        self.destroyed = true;
    }
}
impl Drop for GfxResourceManager {
    fn drop(&mut self) {
        if !self.destroyed && !self.resources.is_empty() {
            log::error!(
                "{} resource manager dropped with {} live resources",
                self.context_id,
                self.resources.len()
            );
        }
    }
}
