use glam::Vec4;

use crate::render_state::{
    ClipPlane, FogAttrib, Light, MaterialAttrib, RenderModeAttrib, ScissorAttrib, ShaderAttrib, StencilAttrib,
    TextureStage, TransformState, TransparencyAttrib,
};
use crate::scene::Lens;

/// GPU context 实现的硬件状态命令
///
/// [`StateReconciler`](crate::state_reconciler::StateReconciler) 只调用发生变化的部分；
/// 每个方法都有空的默认实现，context 只需要覆盖自己关心的状态。
#[allow(unused_variables)]
pub trait GfxStateBackend {
    /// 设置投影；返回 false 表示无法使用该投影
    fn prepare_lens(&mut self, lens: &Lens) -> bool {
        true
    }

    fn issue_transform(&mut self, transform: &TransformState) {}

    /// `force_color` 为 `Some` 时覆盖顶点颜色
    fn issue_color(&mut self, force_color: Option<Vec4>, vertex_colors: bool) {}

    /// 灯光颜色缩放；没有走灯光路径时为普通的颜色乘法
    fn issue_color_scale(&mut self, scale: Vec4) {}

    // lighting
    fn enable_lighting(&mut self, enable: bool) {}
    fn set_ambient_light(&mut self, color: Vec4) {}
    fn begin_bind_lights(&mut self) {}
    fn bind_light(&mut self, light: &Light, slot: usize) {}
    fn enable_light(&mut self, slot: usize, enable: bool) {}
    fn end_bind_lights(&mut self) {}

    // clip planes
    fn enable_clip_planes(&mut self, enable: bool) {}
    fn begin_bind_clip_planes(&mut self) {}
    fn bind_clip_plane(&mut self, plane: &ClipPlane, slot: usize) {}
    fn enable_clip_plane(&mut self, slot: usize, enable: bool) {}
    fn end_bind_clip_planes(&mut self) {}

    /// 已经截断到设备支持的 stage 数量
    fn issue_texture(&mut self, stages: &[TextureStage]) {}
    fn issue_shader(&mut self, shader: &ShaderAttrib) {}
    fn issue_fog(&mut self, fog: &FogAttrib) {}
    fn issue_render_mode(&mut self, render_mode: &RenderModeAttrib) {}
    fn issue_blending(&mut self, transparency: &TransparencyAttrib) {}
    /// `force_color` 为 `Some` 时，材质的 ambient/diffuse 被它替换
    fn issue_material(&mut self, material: &MaterialAttrib, force_color: Option<Vec4>) {}
    fn issue_stencil(&mut self, stencil: &StencilAttrib) {}
    fn issue_scissor(&mut self, scissor: &ScissorAttrib) {}

    fn dispatch_compute(&mut self, group_counts: [u32; 3]) {}
}
