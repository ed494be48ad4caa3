use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::errors::RenderError;
use crate::render_bin::RenderBin;

/// cull 线程持有，发布已经 finish 的 bin
pub struct CullPublisher<K = i32> {
    tx: Sender<RenderBin<K>>,
}

/// draw 线程持有，按发布顺序取得 bin
pub struct DrawReceiver<K = i32> {
    rx: Receiver<RenderBin<K>>,
}

/// 创建 cull 与 draw 之间的交接通道
///
/// bin 的所有权整体移交；容量满时 `publish` 阻塞，cull 不会领先 draw 太多帧
pub fn cull_handoff<K>(capacity: usize) -> (CullPublisher<K>, DrawReceiver<K>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (CullPublisher { tx }, DrawReceiver { rx })
}

impl<K: Ord + Copy> CullPublisher<K> {
    /// 尚未 finish 的 bin 会先 finish 再发布
    pub fn publish(&self, mut bin: RenderBin<K>) -> Result<(), RenderError> {
        let _span = tracy_client::span!("CullPublisher::publish");
        if !bin.is_finished() {
            bin.finish();
        }
        self.tx.send(bin).map_err(|_| RenderError::HandoffClosed)
    }
}

impl<K> DrawReceiver<K> {
    /// 阻塞直到下一个 bin；cull 端全部 drop 之后返回 `HandoffClosed`
    pub fn recv(&self) -> Result<RenderBin<K>, RenderError> {
        self.rx.recv().map_err(|_| RenderError::HandoffClosed)
    }

    pub fn try_recv(&self) -> Result<Option<RenderBin<K>>, RenderError> {
        match self.rx.try_recv() {
            Ok(bin) => Ok(Some(bin)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RenderError::HandoffClosed),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<RenderBin<K>>, RenderError> {
        match self.rx.recv_timeout(timeout) {
            Ok(bin) => Ok(Some(bin)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(RenderError::HandoffClosed),
        }
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
