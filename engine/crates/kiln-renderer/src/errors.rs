use kiln_gfx::gfx_error::GfxError;
use kiln_render_state::state_error::StateError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("invalid renderer settings: {0}")]
    Settings(String),

    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    /// panic-deactivate 之后拒绝继续渲染
    #[error("context `{0}` has been deactivated")]
    Deactivated(String),

    #[error("cull to draw handoff is closed")]
    HandoffClosed,

    #[error("unbalanced frame bracket: {0}")]
    Unbalanced(&'static str),
}

impl RenderError {
    /// 致命错误会让 context 进入 deactivated 状态，不会重试
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::State(e) => e.is_fatal(),
            Self::Gfx(GfxError::Vk { .. }) => true,
            Self::Deactivated(_) => true,
            _ => false,
        }
    }
}

impl From<toml::de::Error> for RenderError {
    fn from(e: toml::de::Error) -> Self {
        Self::Settings(e.to_string())
    }
}

impl From<toml::ser::Error> for RenderError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Settings(e.to_string())
    }
}
