//! 逐帧渲染驱动
//!
//! 遍历阶段把已经裁剪过的 drawable 提交到 [`render_bin::RenderBin`]，
//! 通过 [`cull_handoff`] 整体交给绘制线程；
//! [`frame_renderer::FrameRenderer`] 负责帧与 scene 的括号，逐个绘制 bin 中的对象，
//! 并在帧边界回收已经不再被 GPU 引用的资源。

pub mod cull_handoff;
pub mod drawable;
pub mod errors;
pub mod frame_renderer;
pub mod render_bin;
pub mod settings;
