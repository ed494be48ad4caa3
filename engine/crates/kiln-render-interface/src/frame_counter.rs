use std::fmt::Display;

/// 帧槽位的标签，用于日志中区分 frames in flight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameLabel {
    A,
    B,
    C,
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}
impl FrameLabel {
    #[inline]
    pub fn from_slot(slot: usize) -> Self {
        match slot % FrameCounter::MAX_PIPELINE_DEPTH {
            0 => Self::A,
            1 => Self::B,
            _ => Self::C,
        }
    }
}

/// 帧计数
///
/// `frame_id` 从 0 开始，第一次 `next_frame` 之后为 1；
/// 帧 N 使用的槽位是 `N % pipeline_depth`。
#[derive(Clone, Copy, Debug)]
pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    pipeline_depth: usize,
}
// new & init
impl FrameCounter {
    pub const MIN_PIPELINE_DEPTH: usize = 2;
    pub const MAX_PIPELINE_DEPTH: usize = 3;

    /// `pipeline_depth` 会被限制在 `[MIN_PIPELINE_DEPTH, MAX_PIPELINE_DEPTH]` 内
    pub fn new(init_frame_id: u64, pipeline_depth: usize) -> Self {
        let clamped = pipeline_depth.clamp(Self::MIN_PIPELINE_DEPTH, Self::MAX_PIPELINE_DEPTH);
        if clamped != pipeline_depth {
            log::warn!("pipeline depth {} clamped to {}", pipeline_depth, clamped);
        }
        Self {
            frame_id: init_frame_id,
            pipeline_depth: clamped,
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn pipeline_depth(&self) -> usize {
        self.pipeline_depth
    }
    #[inline]
    pub fn slot_index(&self) -> usize {
        (self.frame_id % self.pipeline_depth as u64) as usize
    }
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        FrameLabel::from_slot(self.slot_index())
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}
