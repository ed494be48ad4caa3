//! 渲染核心与 GPU 之间的边界
//!
//! - [`frame_epoch::FrameEpochAllocator`]：按帧槽位延迟销毁原生资源
//! - [`gfx_resource_manager::GfxResourceManager`]：单个 GPU context 的资源表
//! - [`shared_resources::GfxSharedResources`]：跨 context 共享纹理的全局查找表
//! - [`residency::GfxResidencyFuture`]：资源驻留的异步结果

pub mod frame_counter;
pub mod frame_epoch;
pub mod gfx_resource_manager;
pub mod handles;
pub mod residency;
pub mod shared_resources;
