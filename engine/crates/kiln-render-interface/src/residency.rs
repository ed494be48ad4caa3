use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// 资源驻留状态
///
/// 状态流转: Pending -> Ready
///                  \-> Failed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResidencyState {
    /// 数据仍在后台上传
    Pending,
    /// 可以直接用于绘制
    Ready,
    /// 上传失败，附带原因
    Failed(String),
}

impl ResidencyState {
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

struct ResidencyShared {
    state: Mutex<ResidencyState>,
    settled: Condvar,
}

impl ResidencyShared {
    fn new(state: ResidencyState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            settled: Condvar::new(),
        })
    }

    fn settle(&self, result: ResidencyState) {
        let mut state = self.state.lock();
        if state.is_pending() {
            *state = result;
            self.settled.notify_all();
        }
    }
}

/// 驻留请求的结果
///
/// 可以 `poll` 或阻塞 `wait`，也可以 `abandon`；
/// 放弃只是不再关心结果，后台任务不会被取消。
#[derive(Clone)]
pub struct GfxResidencyFuture {
    shared: Arc<ResidencyShared>,
}

/// 后台任务持有的一端，负责写入结果
///
/// 未写入结果就被 drop 时，future 进入 `Failed`
pub struct GfxResidencyPromise {
    shared: Arc<ResidencyShared>,
}

/// 创建一对尚未完成的 promise / future
pub fn residency_channel() -> (GfxResidencyPromise, GfxResidencyFuture) {
    let shared = ResidencyShared::new(ResidencyState::Pending);
    (
        GfxResidencyPromise {
            shared: shared.clone(),
        },
        GfxResidencyFuture { shared },
    )
}

/// 在 rayon 全局线程池上执行上传任务
pub fn spawn_residency<F>(name: impl Into<String>, upload: F) -> GfxResidencyFuture
where
    F: FnOnce() -> Result<(), String> + Send + 'static,
{
    let name = name.into();
    let (promise, future) = residency_channel();
    rayon::spawn(move || {
        let _span = tracy_client::span!("residency::upload");
        match upload() {
            Ok(()) => promise.complete(),
            Err(reason) => {
                log::warn!("residency upload of `{}` failed: {}", name, reason);
                promise.fail(reason);
            }
        }
    });
    future
}

// new & init
impl GfxResidencyFuture {
    /// 已经驻留的资源
    pub fn ready() -> Self {
        Self {
            shared: ResidencyShared::new(ResidencyState::Ready),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            shared: ResidencyShared::new(ResidencyState::Failed(reason.into())),
        }
    }
}
// tools
impl GfxResidencyFuture {
    /// 非阻塞地查询当前状态
    #[inline]
    pub fn poll(&self) -> ResidencyState {
        self.shared.state.lock().clone()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.state.lock(), ResidencyState::Ready)
    }

    /// 阻塞直到 Ready 或 Failed
    pub fn wait(&self) -> ResidencyState {
        let _span = tracy_client::span!("GfxResidencyFuture::wait");
        let mut state = self.shared.state.lock();
        while state.is_pending() {
            self.shared.settled.wait(&mut state);
        }
        state.clone()
    }

    /// 最多等待 `timeout`，超时返回 `Pending`
    pub fn wait_timeout(&self, timeout: Duration) -> ResidencyState {
        let mut state = self.shared.state.lock();
        if state.is_pending() {
            let _ = self.shared.settled.wait_while_for(&mut state, |s| s.is_pending(), timeout);
        }
        state.clone()
    }

    /// 不再关心结果
    #[inline]
    pub fn abandon(self) {}
}

impl std::fmt::Debug for GfxResidencyFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GfxResidencyFuture").field(&self.poll()).finish()
    }
}

impl GfxResidencyPromise {
    pub fn complete(self) {
        self.shared.settle(ResidencyState::Ready);
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.shared.settle(ResidencyState::Failed(reason.into()));
    }
}

impl Drop for GfxResidencyPromise {
    fn drop(&mut self) {
        self.shared.settle(ResidencyState::Failed("upload dropped before completion".to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promise_settles_future_once() {
        let (promise, future) = residency_channel();
        assert_eq!(future.poll(), ResidencyState::Pending);
        assert_eq!(future.wait_timeout(Duration::from_millis(1)), ResidencyState::Pending);

        promise.complete();
        assert!(future.is_ready());
        assert_eq!(future.wait(), ResidencyState::Ready);
    }

    #[test]
    fn test_dropped_promise_fails_future() {
        let (promise, future) = residency_channel();
        drop(promise);
        assert!(matches!(future.poll(), ResidencyState::Failed(_)));
    }

    #[test]
    fn test_spawned_upload_reports_failure() {
        let ok = spawn_residency("ok", || Ok(()));
        let bad = spawn_residency("bad", || Err("decode error".to_string()));
        assert_eq!(ok.wait(), ResidencyState::Ready);
        assert_eq!(bad.wait(), ResidencyState::Failed("decode error".to_string()));
    }

    #[test]
    fn test_abandon_does_not_cancel_upload() {
        let (promise, future) = residency_channel();
        let observer = future.clone();
        future.abandon();
        promise.complete();
        assert!(observer.is_ready());
    }
}
