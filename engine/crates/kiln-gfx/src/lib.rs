//! Vulkan GFX 层
//!
//! 只关心单个 GPU 资源的生命周期与同步：
//! - [`resources::resource_context::GfxResourceContext`]：layout 与读写 hazard 追踪，按需插入 barrier
//! - [`resources::pending_destroy::GfxPendingDestroy`]：延迟销毁的原生句柄列表
//! - [`commands::command_recorder::GfxCommandRecorder`]：命令录制的接缝，真实实现录制到 `vk::CommandBuffer`
//! - [`foundation::device_caps::GfxDeviceCaps`]：设备能力查询

pub mod commands;
pub mod foundation;
pub mod gfx_error;
pub mod resources;
