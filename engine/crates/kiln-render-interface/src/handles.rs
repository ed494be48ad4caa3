use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};

use slotmap::new_key_type;

new_key_type! { pub struct GfxResourceHandle; }

/// GPU context 的标识
///
/// munger 缓存与共享资源表都以它为 key；同一进程内唯一。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GfxContextId(u32);

impl GfxContextId {
    /// 分配一个新的 id
    pub fn next() -> Self {
        static NEXT_ID: AtomicU32 = AtomicU32::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl Display for GfxContextId {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// 跨 context 共享的逻辑资源（例如同一张纹理）的标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxSharedResourceKey(pub u64);
