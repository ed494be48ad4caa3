use crossbeam_channel::{Receiver, Sender, TrySendError};
use kiln_gfx::foundation::destroyer::GfxResourceDestroyer;
use kiln_gfx::foundation::device_caps::GfxDeviceCaps;
use kiln_gfx::resources::resource_context::GfxResourceContext;
use kiln_render_interface::frame_epoch::{FrameEpochAllocator, GfxFrameSync};
use kiln_render_interface::gfx_resource_manager::GfxResourceManager;
use kiln_render_interface::handles::{GfxContextId, GfxResourceHandle, GfxSharedResourceKey};
use kiln_render_interface::shared_resources::GfxSharedResources;
use kiln_render_state::scene::SceneSetup;
use kiln_render_state::state_reconciler::StateReconciler;

use crate::drawable::DrawTarget;
use crate::errors::RenderError;
use crate::render_bin::{BinDrawContext, BinDrawReport, RenderBin};
use crate::settings::RendererSettings;

/// 应用可见的渲染器事件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RendererEvent {
    FrameBegan { epoch: u64 },
    FrameEnded { epoch: u64 },
    /// context 遇到无法恢复的错误，之后的帧都会被拒绝
    PanicDeactivate { context: String, reason: String },
}

/// 一个 GPU context 的逐帧驱动
///
/// 调用顺序：
/// ```text
/// begin_frame
///     begin_scene
///         draw_bin ...
///     end_scene
/// end_frame
/// ```
/// 帧内 release 的资源交给 [`FrameEpochAllocator`]，在槽位被复用时才真正销毁。
///
/// 事件队列有容量上限，没有人消费时丢弃最旧的事件。
pub struct FrameRenderer<S: GfxFrameSync, D: GfxResourceDestroyer> {
    settings: RendererSettings,

    reconciler: StateReconciler,
    resources: GfxResourceManager,
    epochs: FrameEpochAllocator,

    sync: S,
    destroyer: D,

    event_tx: Sender<RendererEvent>,
    event_rx: Receiver<RendererEvent>,

    active: bool,
    closed: bool,
}
// new & init
impl<S: GfxFrameSync, D: GfxResourceDestroyer> FrameRenderer<S, D> {
    /// 事件队列的容量
    pub const EVENT_CAPACITY: usize = 64;

    pub fn new(settings: RendererSettings, caps: GfxDeviceCaps, sync: S, destroyer: D) -> Result<Self, RenderError> {
        settings.validate()?;

        let context_id = GfxContextId::next();
        let reconciler = StateReconciler::new(context_id, caps, settings.reconciler_settings());
        let epochs = FrameEpochAllocator::new(settings.pipeline_depth)?;
        let (event_tx, event_rx) = crossbeam_channel::bounded(Self::EVENT_CAPACITY);

        log::info!(
            "{} `{}` created, pipeline depth {}",
            context_id,
            settings.context_name,
            settings.pipeline_depth
        );

        Ok(Self {
            settings,
            reconciler,
            resources: GfxResourceManager::new(context_id),
            epochs,
            sync,
            destroyer,
            event_tx,
            event_rx,
            active: true,
            closed: false,
        })
    }
}
// getters
impl<S: GfxFrameSync, D: GfxResourceDestroyer> FrameRenderer<S, D> {
    #[inline]
    pub fn context_id(&self) -> GfxContextId {
        self.resources.context_id()
    }

    #[inline]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    #[inline]
    pub fn reconciler(&self) -> &StateReconciler {
        &self.reconciler
    }

    #[inline]
    pub fn resources(&self) -> &GfxResourceManager {
        &self.resources
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut GfxResourceManager {
        &mut self.resources
    }

    #[inline]
    pub fn epochs(&self) -> &FrameEpochAllocator {
        &self.epochs
    }

    #[inline]
    pub fn sync(&self) -> &S {
        &self.sync
    }

    #[inline]
    pub fn destroyer(&self) -> &D {
        &self.destroyer
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 事件的接收端，可以被 clone 给多个观察者
    ///
    /// 所有接收端共享同一个队列，每个事件只会被其中一个取走
    #[inline]
    pub fn events(&self) -> Receiver<RendererEvent> {
        self.event_rx.clone()
    }
}
// update
impl<S: GfxFrameSync, D: GfxResourceDestroyer> FrameRenderer<S, D> {
    /// 开始新的一帧，返回该帧的 epoch
    pub fn begin_frame(&mut self) -> Result<u64, RenderError> {
        let _span = tracy_client::span!("FrameRenderer::begin_frame");
        self.ensure_active()?;

        let result = self.epochs.begin_frame(&mut self.sync, &self.destroyer).map_err(RenderError::from);
        let epoch = self.check(result)?;
        log::debug!("{} begin", self.epochs.frame_name());
        self.publish(RendererEvent::FrameBegan { epoch });
        Ok(epoch)
    }

    pub fn begin_scene(&mut self, target: &mut impl DrawTarget, scene: SceneSetup) -> Result<(), RenderError> {
        self.ensure_active()?;
        if !self.epochs.in_frame() {
            return Err(RenderError::Unbalanced("begin_scene outside of a frame"));
        }
        let result = self.reconciler.begin_scene(target, scene).map_err(RenderError::from);
        self.check(result)
    }

    /// 按配置中的 `force_draw` 绘制 bin
    pub fn draw_bin<T: DrawTarget>(&mut self, target: &mut T, bin: &mut RenderBin) -> Result<BinDrawReport, RenderError> {
        let force = self.settings.force_draw;
        self.draw_bin_with(target, bin, force)
    }

    pub fn draw_bin_with<T: DrawTarget>(
        &mut self,
        target: &mut T,
        bin: &mut RenderBin,
        force: bool,
    ) -> Result<BinDrawReport, RenderError> {
        self.ensure_active()?;
        let mut ctx = BinDrawContext {
            reconciler: &mut self.reconciler,
            resources: &mut self.resources,
            target,
        };
        let result = bin.draw(&mut ctx, force);
        self.check(result)
    }

    pub fn end_scene(&mut self, target: &mut impl DrawTarget) -> Result<(), RenderError> {
        self.ensure_active()?;
        let result = self.reconciler.end_scene(target).map_err(RenderError::from);
        self.check(result)
    }

    pub fn end_frame(&mut self) -> Result<(), RenderError> {
        let _span = tracy_client::span!("FrameRenderer::end_frame");
        self.ensure_active()?;
        if self.reconciler.in_scene() {
            return Err(RenderError::Unbalanced("end_frame inside a scene"));
        }

        let epoch = self.epochs.epoch();
        let result = self.epochs.end_frame().map_err(RenderError::from);
        self.check(result)?;
        log::debug!("{} end", self.epochs.frame_name());
        self.publish(RendererEvent::FrameEnded { epoch });
        Ok(())
    }
}
// resources
impl<S: GfxFrameSync, D: GfxResourceDestroyer> FrameRenderer<S, D> {
    #[inline]
    pub fn prepare_resource(&mut self, resource: GfxResourceContext) -> GfxResourceHandle {
        self.resources.prepare(resource)
    }

    /// 资源在当前帧的槽位被复用之后才会销毁
    pub fn release_resource(&mut self, handle: GfxResourceHandle) -> bool {
        self.resources.release(handle, &mut self.epochs)
    }

    /// 取得共享资源在本 context 上的 handle，第一次使用时登记 `create` 的结果
    pub fn prepare_shared(
        &mut self,
        key: GfxSharedResourceKey,
        create: impl FnOnce() -> GfxResourceContext,
    ) -> GfxResourceHandle {
        let context = self.context_id();
        let resources = &mut self.resources;
        GfxSharedResources::global().find_or_create(key, context, || resources.prepare(create()))
    }

    /// 取消本 context 对共享资源的登记，并按帧延迟销毁
    pub fn release_shared(&mut self, key: GfxSharedResourceKey) -> bool {
        match GfxSharedResources::global().forget(key, self.context_id()) {
            Some(handle) => self.release_resource(handle),
            None => false,
        }
    }
}
// tools
impl<S: GfxFrameSync, D: GfxResourceDestroyer> FrameRenderer<S, D> {
    fn ensure_active(&self) -> Result<(), RenderError> {
        if self.active && !self.closed {
            Ok(())
        } else {
            Err(RenderError::Deactivated(self.settings.context_name.clone()))
        }
    }

    /// 致命错误使 context 失效
    fn check<T>(&mut self, result: Result<T, RenderError>) -> Result<T, RenderError> {
        if let Err(e) = &result
            && e.is_fatal()
        {
            self.panic_deactivate(e.to_string());
        }
        result
    }

    /// 标记 context 失效并通知应用，之后的帧都会被拒绝
    pub fn panic_deactivate(&mut self, reason: impl Into<String>) {
        if !self.active {
            return;
        }
        let reason = reason.into();
        log::error!("{} `{}` deactivated: {}", self.context_id(), self.settings.context_name, reason);
        self.active = false;
        self.publish(RendererEvent::PanicDeactivate {
            context: self.settings.context_name.clone(),
            reason,
        });
    }

    /// 队列已满时丢弃最旧的事件，保证最新的事件可见
    fn publish(&self, event: RendererEvent) {
        let Err(TrySendError::Full(event)) = self.event_tx.try_send(event) else {
            return;
        };
        if let Ok(dropped) = self.event_rx.try_recv() {
            log::trace!("{} event queue full, dropped {:?}", self.context_id(), dropped);
        }
        if let Err(e) = self.event_tx.try_send(event) {
            log::warn!("{} failed to publish {:?}", self.context_id(), e.into_inner());
        }
    }
}
// destroy
impl<S: GfxFrameSync, D: GfxResourceDestroyer> FrameRenderer<S, D> {
    /// 等待所有槽位完成，然后立即销毁全部资源
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        let _span = tracy_client::span!("FrameRenderer::shutdown");

        for slot in 0..self.epochs.pipeline_depth() {
            if let Err(e) = self.sync.wait_slot(slot) {
                log::error!("{} failed to wait frame slot {}: {}", self.context_id(), slot, e);
            }
        }
        self.reconciler.clear_state();
        let shared = GfxSharedResources::global().forget_context(self.context_id());
        log::debug!("{} forgot {} shared resources", self.context_id(), shared.len());
        self.resources.destroy_all_now(&self.destroyer);
        self.epochs.flush_all(&self.destroyer);

        self.closed = true;
        log::info!("{} `{}` shut down", self.context_id(), self.settings.context_name);
    }
}
impl<S: GfxFrameSync, D: GfxResourceDestroyer> Drop for FrameRenderer<S, D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
