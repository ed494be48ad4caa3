use std::fs;
use std::path::Path;

use kiln_render_interface::frame_counter::FrameCounter;
use kiln_render_state::state_reconciler::ReconcilerSettings;
use serde::{Deserialize, Serialize};

use crate::errors::RenderError;

/// 渲染器配置，从 TOML 文件加载
///
/// 缺省的字段使用默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// 同时在 GPU 上执行的帧数，2 或 3
    pub pipeline_depth: usize,

    /// 绘制时等待尚未驻留的数据，而不是跳过
    pub force_draw: bool,

    pub color_scale_via_lighting: bool,

    pub alpha_scale_via_texture: bool,

    /// 用于日志与事件的 context 名称
    pub context_name: String,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            pipeline_depth: FrameCounter::MIN_PIPELINE_DEPTH,
            force_draw: false,
            color_scale_via_lighting: true,
            alpha_scale_via_texture: true,
            context_name: "kiln".to_string(),
        }
    }
}

impl RendererSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, RenderError> {
        let settings: RendererSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RenderError> {
        let content = fs::read_to_string(path.as_ref())?;
        let settings = Self::from_toml_str(&content)?;
        log::info!("renderer settings loaded from {:?}: {:?}", path.as_ref(), settings);
        Ok(settings)
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RenderError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if !(FrameCounter::MIN_PIPELINE_DEPTH..=FrameCounter::MAX_PIPELINE_DEPTH).contains(&self.pipeline_depth) {
            return Err(RenderError::Settings(format!(
                "pipeline_depth must be in {}..={}, got {}",
                FrameCounter::MIN_PIPELINE_DEPTH,
                FrameCounter::MAX_PIPELINE_DEPTH,
                self.pipeline_depth
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            color_scale_via_lighting: self.color_scale_via_lighting,
            alpha_scale_via_texture: self.alpha_scale_via_texture,
        }
    }
}
