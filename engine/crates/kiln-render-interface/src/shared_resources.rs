use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::Mutex;

use crate::handles::{GfxContextId, GfxResourceHandle, GfxSharedResourceKey};

/// 跨 context 共享资源的查找表
///
/// 同一个逻辑资源（例如一张纹理）在每个 GPU context 上各有一个 handle。
/// 锁只在查找或创建 per-context handle 时持有，绝不跨越 transition 或 draw。
#[derive(Default)]
pub struct GfxSharedResources {
    handles: Mutex<HashMap<(GfxSharedResourceKey, GfxContextId), GfxResourceHandle>>,
}

static GLOBAL_SHARED_RESOURCES: LazyLock<GfxSharedResources> = LazyLock::new(GfxSharedResources::default);

// new & init
impl GfxSharedResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程内唯一的共享表
    #[inline]
    pub fn global() -> &'static Self {
        &GLOBAL_SHARED_RESOURCES
    }
}
// tools
impl GfxSharedResources {
    #[inline]
    pub fn find(&self, key: GfxSharedResourceKey, context: GfxContextId) -> Option<GfxResourceHandle> {
        self.handles.lock().get(&(key, context)).copied()
    }

    /// 查找 `key` 在 `context` 上的 handle，不存在时调用 `create` 创建
    ///
    /// `create` 在持锁期间执行，只应当做登记，例如 `GfxResourceManager::prepare`
    pub fn find_or_create(
        &self,
        key: GfxSharedResourceKey,
        context: GfxContextId,
        create: impl FnOnce() -> GfxResourceHandle,
    ) -> GfxResourceHandle {
        *self.handles.lock().entry((key, context)).or_insert_with(create)
    }

    /// 移除 `key` 在 `context` 上的登记，返回原来的 handle 以便 release
    pub fn forget(&self, key: GfxSharedResourceKey, context: GfxContextId) -> Option<GfxResourceHandle> {
        self.handles.lock().remove(&(key, context))
    }

    /// context 销毁时移除它的所有登记
    pub fn forget_context(&self, context: GfxContextId) -> Vec<GfxResourceHandle> {
        let mut handles = self.handles.lock();
        let mut removed = Vec::new();
        handles.retain(|(_, ctx), handle| {
            if *ctx == context {
                removed.push(*handle);
                false
            } else {
                true
            }
        });
        removed
    }
}
