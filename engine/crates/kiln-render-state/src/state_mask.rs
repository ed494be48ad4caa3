bitflags::bitflags! {
    /// 状态类别
    ///
    /// 比较两个状态时按类别记录差异，只有差异中的类别才会被重新发出
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct StateMask: u32 {
        const TRANSFORM = 1 << 0;
        const COLOR = 1 << 1;
        const COLOR_SCALE = 1 << 2;
        const LIGHTING = 1 << 3;
        const CLIP_PLANES = 1 << 4;
        const TEXTURE = 1 << 5;
        const SHADER = 1 << 6;
        const FOG = 1 << 7;
        const RENDER_MODE = 1 << 8;
        const BLENDING = 1 << 9;
        const MATERIAL = 1 << 10;
        const STENCIL = 1 << 11;
        const SCISSOR = 1 << 12;
    }
}

bitflags::bitflags! {
    /// 由最近一次 apply 推导出的状态
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ReconciledFlags: u32 {
        const LIGHTING = 1 << 0;
        const CLIP_PLANES = 1 << 1;
        const VERTEX_COLORS = 1 << 2;
        const COLOR_SCALE = 1 << 3;
        const TEXTURE_ALPHA_SCALE = 1 << 4;
    }
}

impl StateMask {
    /// 除 transform 以外、由 `RenderState` 携带的类别
    pub const RENDER_STATE: Self = Self::all().difference(Self::TRANSFORM);
}
