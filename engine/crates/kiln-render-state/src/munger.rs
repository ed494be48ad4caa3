use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use kiln_render_interface::handles::GfxContextId;
use parking_lot::Mutex;

use crate::render_state::{ColorAttrib, RenderState, RenderStateId};

/// 针对某个 context 与某个状态，顶点数据需要做的转换
#[derive(Clone, Debug, PartialEq)]
pub struct GeomMunger {
    pub context_id: GfxContextId,
    pub state_id: RenderStateId,
    /// 顶点颜色是否需要保留
    pub keep_vertex_colors: bool,
    /// 绘制需要的 texcoord 组数
    pub texcoord_sets: usize,
}

impl GeomMunger {
    pub fn for_state(context_id: GfxContextId, state: &RenderState) -> Self {
        Self {
            context_id,
            state_id: state.id(),
            keep_vertex_colors: matches!(state.color, ColorAttrib::Vertex),
            texcoord_sets: state.texture.stages().len(),
        }
    }
}

/// munger 所属的 GPU context
///
/// 记录自己在哪些状态上缓存了 munger；注销时逐个移除
pub struct MungerContext {
    id: GfxContextId,
    registered: AtomicBool,
    states: Mutex<Vec<Weak<RenderState>>>,
}

// new & init
impl MungerContext {
    pub fn new(id: GfxContextId) -> Arc<Self> {
        Arc::new(Self {
            id,
            registered: AtomicBool::new(true),
            states: Mutex::new(Vec::new()),
        })
    }
}
// getters
impl MungerContext {
    #[inline]
    pub fn id(&self) -> GfxContextId {
        self.id
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// 仍然存活、且缓存了本 context munger 的状态数量
    pub fn tracked_state_count(&self) -> usize {
        self.states.lock().iter().filter(|s| s.strong_count() > 0).count()
    }
}
// tools
impl MungerContext {
    fn track(&self, state: &Arc<RenderState>) {
        let mut states = self.states.lock();
        states.retain(|s| s.strong_count() > 0);
        states.push(Arc::downgrade(state));
    }

    /// 注销 context，并从所有仍存活的状态中移除它的 munger
    pub fn unregister(&self) -> usize {
        self.registered.store(false, Ordering::Release);

        // 先取出列表再逐个加锁，避免与 lookup 的加锁顺序相反
        let states = std::mem::take(&mut *self.states.lock());
        let mut evicted = 0;
        for state in states.iter().filter_map(Weak::upgrade) {
            let mut cache = state.mungers.lock();
            if cache.entries.remove(&self.id).is_some() {
                evicted += 1;
            }
            if cache.last.as_ref().is_some_and(|(id, _)| *id == self.id) {
                cache.last = None;
            }
        }
        log::debug!("{} unregistered, evicted {} mungers", self.id, evicted);
        evicted
    }
}

/// 在 `state` 上查找 `context` 的 munger，不存在时用 `make` 创建并缓存
///
/// 查找时顺带移除已经注销的 context 的缓存
pub fn get_or_create_munger(
    state: &Arc<RenderState>,
    context: &Arc<MungerContext>,
    make: impl FnOnce() -> GeomMunger,
) -> Arc<GeomMunger> {
    let created = {
        let mut cache = state.mungers.lock();

        // 快速路径：与上一次是同一个 context
        if let Some((id, munger)) = &cache.last
            && *id == context.id()
            && context.is_registered()
        {
            return munger.clone();
        }

        cache
            .entries
            .retain(|_, (owner, _)| owner.upgrade().is_some_and(|owner| owner.is_registered()));

        if let Some((_, munger)) = cache.entries.get(&context.id()) {
            let munger = munger.clone();
            cache.last = Some((context.id(), munger.clone()));
            return munger;
        }

        let munger = Arc::new(make());
        if context.is_registered() {
            cache.entries.insert(context.id(), (Arc::downgrade(context), munger.clone()));
            cache.last = Some((context.id(), munger.clone()));
        }
        munger
    };

    if context.is_registered() {
        context.track(state);
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_munger_is_cached_per_context() {
        let state = RenderState::builder().color(ColorAttrib::Vertex).build();
        let ctx_a = MungerContext::new(GfxContextId::next());
        let ctx_b = MungerContext::new(GfxContextId::next());

        let a1 = get_or_create_munger(&state, &ctx_a, || GeomMunger::for_state(ctx_a.id(), &state));
        let a2 = get_or_create_munger(&state, &ctx_a, || unreachable!());
        let b = get_or_create_munger(&state, &ctx_b, || GeomMunger::for_state(ctx_b.id(), &state));

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(a1.keep_vertex_colors);
        assert_eq!(b.context_id, ctx_b.id());
        assert_eq!(state.munger_count(), 2);
    }

    #[test]
    fn test_unregister_evicts_entries() {
        let state = RenderState::empty();
        let ctx = MungerContext::new(GfxContextId::next());
        get_or_create_munger(&state, &ctx, || GeomMunger::for_state(ctx.id(), &state));
        assert_eq!(ctx.tracked_state_count(), 1);

        assert_eq!(ctx.unregister(), 1);
        assert_eq!(state.munger_count(), 0);
        assert!(!ctx.is_registered());
    }

    #[test]
    fn test_dropped_context_is_evicted_on_lookup() {
        let state = RenderState::empty();
        let gone = MungerContext::new(GfxContextId::next());
        get_or_create_munger(&state, &gone, || GeomMunger::for_state(gone.id(), &state));
        drop(gone);

        let live = MungerContext::new(GfxContextId::next());
        get_or_create_munger(&state, &live, || GeomMunger::for_state(live.id(), &state));
        assert_eq!(state.munger_count(), 1);
    }
}
