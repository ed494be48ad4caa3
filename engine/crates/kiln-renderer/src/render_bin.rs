use std::sync::Arc;

use kiln_render_interface::gfx_resource_manager::GfxResourceManager;
use kiln_render_interface::residency::ResidencyState;
use kiln_render_state::render_state::{RenderState, TransformState};
use kiln_render_state::state_error::StateError;
use kiln_render_state::state_reconciler::StateReconciler;

use crate::drawable::{Drawable, DrawableKind, DrawTarget};
use crate::errors::RenderError;

/// bin 中的一项，只在一帧内有效
#[derive(Clone, Debug)]
pub struct DrawableEntry<K> {
    pub drawable: Arc<Drawable>,
    pub state: Arc<RenderState>,
    pub transform: TransformState,
    pub order_key: K,
}

/// 一次 `draw` 的结果
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinDrawReport {
    pub drawn: usize,
    /// 数据尚未驻留而跳过
    pub skipped: usize,
    /// 绘制失败，bin 继续
    pub failed: usize,
}

/// 绘制一个 bin 需要的 context 状态
pub struct BinDrawContext<'a, T: DrawTarget> {
    pub reconciler: &'a mut StateReconciler,
    pub resources: &'a mut GfxResourceManager,
    pub target: &'a mut T,
}

/// `export_result` 的消费者，按绘制顺序接收每一项
pub trait ResultBuilder<K> {
    fn add_entry(&mut self, entry: &DrawableEntry<K>);
}

impl<K: Clone> ResultBuilder<K> for Vec<DrawableEntry<K>> {
    fn add_entry(&mut self, entry: &DrawableEntry<K>) {
        self.push(entry.clone());
    }
}

enum DrawOutcome {
    Drawn,
    Skipped,
    Failed,
}

/// 收集一次遍历提交的对象，按 `order_key` 稳定排序后绘制
///
/// key 相同的对象保持提交顺序
pub struct RenderBin<K = i32> {
    name: String,
    entries: Vec<DrawableEntry<K>>,
    finished: bool,
}

// new & init
impl<K: Ord + Copy> RenderBin<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            finished: false,
        }
    }
}
// getters
impl<K: Ord + Copy> RenderBin<K> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 当前顺序；`finish` 之前为提交顺序
    pub fn iter(&self) -> impl Iterator<Item = &DrawableEntry<K>> {
        self.entries.iter()
    }
}
// submit
impl<K: Ord + Copy> RenderBin<K> {
    pub fn add(&mut self, drawable: Arc<Drawable>, state: Arc<RenderState>, transform: TransformState, order_key: K) {
        self.entries.push(DrawableEntry {
            drawable,
            state,
            transform,
            order_key,
        });
        self.finished = false;
    }

    /// 以单位变换提交
    #[inline]
    pub fn submit(&mut self, drawable: Arc<Drawable>, state: Arc<RenderState>, order_key: K) {
        self.add(drawable, state, TransformState::IDENTITY, order_key);
    }

    /// 所有对象提交完毕，按 key 稳定排序
    pub fn finish(&mut self) {
        let _span = tracy_client::span!("RenderBin::finish");
        self.entries.sort_by_key(|e| e.order_key);
        self.finished = true;
    }

    fn ensure_finished(&mut self) {
        if !self.finished {
            log::warn!("render bin `{}` used before finish()", self.name);
            self.finish();
        }
    }

    /// 丢弃所有对象，通常在绘制之后
    pub fn clear(&mut self) {
        self.entries.clear();
        self.finished = false;
    }
}
// draw
impl<K: Ord + Copy> RenderBin<K> {
    /// 按排序后的顺序绘制每个对象
    ///
    /// 单个对象失败只计入报告，不会中止 bin；
    /// 状态同步失败（例如没有 scene）与致命错误会立即返回。
    ///
    /// # param
    /// * force - 等待尚未驻留的数据，而不是跳过该对象
    pub fn draw<T: DrawTarget>(
        &mut self,
        ctx: &mut BinDrawContext<'_, T>,
        force: bool,
    ) -> Result<BinDrawReport, RenderError> {
        let _span = tracy_client::span!("RenderBin::draw");
        self.ensure_finished();

        let mut report = BinDrawReport::default();
        for entry in &self.entries {
            match Self::draw_entry(entry, ctx, force)? {
                DrawOutcome::Drawn => report.drawn += 1,
                DrawOutcome::Skipped => report.skipped += 1,
                DrawOutcome::Failed => report.failed += 1,
            }
        }
        log::debug!("render bin `{}` drawn: {:?}", self.name, report);
        Ok(report)
    }

    fn draw_entry<T: DrawTarget>(
        entry: &DrawableEntry<K>,
        ctx: &mut BinDrawContext<'_, T>,
        force: bool,
    ) -> Result<DrawOutcome, RenderError> {
        let drawable = &entry.drawable;

        for resource in &drawable.resources {
            let future = ctx.resources.ensure_resident(resource.handle);
            let state = if force { future.wait() } else { future.poll() };
            match state {
                ResidencyState::Ready => {}
                ResidencyState::Pending => return Ok(DrawOutcome::Skipped),
                ResidencyState::Failed(reason) => {
                    log::warn!("`{}` not drawn: {}", drawable.name, reason);
                    return Ok(DrawOutcome::Failed);
                }
            }
        }

        // 不支持 compute 时，不能为不会发生的 dispatch 录制任何命令
        if matches!(drawable.kind, DrawableKind::Compute(_)) && !ctx.reconciler.caps().supports_compute {
            return Err(StateError::Unsupported("compute dispatch").into());
        }

        ctx.reconciler.apply(&mut *ctx.target, &entry.state, &entry.transform)?;

        for resource in &drawable.resources {
            if let Some(context) = ctx.resources.get_mut(resource.handle) {
                let (layout, stage, access) = resource.access.transition_masks(&drawable.kind);
                context.transition(&mut *ctx.target, layout, stage, access);
            }
        }

        match &drawable.kind {
            DrawableKind::Geom(geom) => {
                let munger = ctx.reconciler.geom_munger(&entry.state);
                if ctx.target.draw_geom(geom, &munger) {
                    Ok(DrawOutcome::Drawn)
                } else {
                    log::debug!("`{}` failed to draw", drawable.name);
                    Ok(DrawOutcome::Failed)
                }
            }
            DrawableKind::Compute(compute) => {
                ctx.reconciler.dispatch_compute(&mut *ctx.target, compute.group_counts)?;
                Ok(DrawOutcome::Drawn)
            }
        }
    }

    /// 按与 `draw` 相同的顺序交给另一个消费者，不会重新排序
    pub fn export_result(&mut self, builder: &mut impl ResultBuilder<K>) {
        let _span = tracy_client::span!("RenderBin::export_result");
        self.ensure_finished();
        for entry in &self.entries {
            builder.add_entry(entry);
        }
    }
}
