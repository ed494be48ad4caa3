/// 状态同步的错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// 没有处于 `begin_scene` / `end_scene` 之间
    #[error("no scene is active")]
    NoScene,

    #[error("scene is invalid: {0}")]
    InvalidScene(&'static str),

    /// 场景已经开始时再次 `begin_scene`，或没有场景时 `end_scene`
    #[error("unbalanced scene bracket: {0}")]
    Unbalanced(&'static str),

    /// 设备不支持的特性，不可重试
    #[error("unsupported on this device: {0}")]
    Unsupported(&'static str),
}

impl StateError {
    /// 能力缺失是致命的；场景问题只中止本次绘制
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
