//! 渲染状态
//!
//! 声明式的 [`render_state::RenderState`] 由场景图构建，
//! [`state_reconciler::StateReconciler`] 在每次绘制前把它与当前绑定的状态比较，
//! 只通过 [`state_backend::GfxStateBackend`] 发出发生变化的部分。

pub mod munger;
pub mod render_state;
pub mod scene;
pub mod slot_assigner;
pub mod state_backend;
pub mod state_error;
pub mod state_mask;
pub mod state_reconciler;
