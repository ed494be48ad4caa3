use std::sync::Arc;

use glam::Vec4;
use itertools::Itertools;
use kiln_gfx::foundation::device_caps::GfxDeviceCaps;
use kiln_render_interface::handles::GfxContextId;

use crate::munger::{GeomMunger, MungerContext, get_or_create_munger};
use crate::render_state::{
    ClipPlaneId, ColorAttrib, LightId, RenderState, RenderStateId, ShaderAttrib, TextureStage, TransformState,
};
use crate::scene::SceneSetup;
use crate::slot_assigner::SlotAssigner;
use crate::state_backend::GfxStateBackend;
use crate::state_error::StateError;
use crate::state_mask::{ReconciledFlags, StateMask};

/// 颜色相关的可选行为
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ReconcilerSettings {
    /// 通过灯光与材质实现场景颜色与颜色缩放
    pub color_scale_via_lighting: bool,
    /// 顶点颜色下的 alpha 缩放通过额外的纹理 stage 实现
    pub alpha_scale_via_texture: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub applies: u64,
    pub noop_applies: u64,
    /// 按 `StateMask` 的 bit 位置计数
    issued: [u64; 13],
}

impl ReconcilerStats {
    /// `category` 中所有类别被发出的总次数
    pub fn issued(&self, category: StateMask) -> u64 {
        category.iter().map(|bit| self.issued[bit.bits().trailing_zeros() as usize]).sum()
    }

    fn record(&mut self, mask: StateMask) {
        for bit in mask.iter() {
            self.issued[bit.bits().trailing_zeros() as usize] += 1;
        }
    }
}

#[derive(Debug)]
enum BoundState {
    Unknown,
    Bound(Arc<RenderState>),
}

/// 把目标渲染状态转换为最少的硬件状态命令
///
/// 状态机 {UNKNOWN, BOUND(state)}：
/// - 与当前绑定的状态指针相同、transform 相同，且没有失效的类别时，什么也不做
/// - 否则按类别比较，只重新发出有差异或失效的类别
///
/// 每个 GPU context 一个，只在该 context 的绘制线程上使用。
pub struct StateReconciler {
    context: Arc<MungerContext>,
    caps: GfxDeviceCaps,
    settings: ReconcilerSettings,

    bound: BoundState,
    bound_transform: Option<TransformState>,
    /// 已知与硬件一致的类别
    valid: StateMask,
    flags: ReconciledFlags,

    scene: Option<SceneSetup>,

    // 颜色
    scene_color: Option<Vec4>,
    material_force_color: Option<Vec4>,
    light_color_scale: Vec4,

    /// `None` 表示硬件状态未知
    lighting_enabled: Option<bool>,
    clip_planes_enabled: Option<bool>,
    lights: SlotAssigner<LightId>,
    clip_planes: SlotAssigner<ClipPlaneId>,

    stats: ReconcilerStats,
}

// new & init
impl StateReconciler {
    pub fn new(context_id: GfxContextId, caps: GfxDeviceCaps, settings: ReconcilerSettings) -> Self {
        log::info!("{} state reconciler created with {:?}", context_id, settings);
        Self {
            context: MungerContext::new(context_id),
            caps,
            settings,
            bound: BoundState::Unknown,
            bound_transform: None,
            valid: StateMask::empty(),
            flags: ReconciledFlags::empty(),
            scene: None,
            scene_color: None,
            material_force_color: None,
            light_color_scale: Vec4::ONE,
            lighting_enabled: None,
            clip_planes_enabled: None,
            lights: SlotAssigner::default(),
            clip_planes: SlotAssigner::default(),
            stats: ReconcilerStats::default(),
        }
    }
}
// getters
impl StateReconciler {
    #[inline]
    pub fn context_id(&self) -> GfxContextId {
        self.context.id()
    }

    #[inline]
    pub fn munger_context(&self) -> &Arc<MungerContext> {
        &self.context
    }

    #[inline]
    pub fn caps(&self) -> &GfxDeviceCaps {
        &self.caps
    }

    #[inline]
    pub fn flags(&self) -> ReconciledFlags {
        self.flags
    }

    #[inline]
    pub fn stats(&self) -> &ReconcilerStats {
        &self.stats
    }

    #[inline]
    pub fn in_scene(&self) -> bool {
        self.scene.is_some()
    }

    #[inline]
    pub fn scene(&self) -> Option<&SceneSetup> {
        self.scene.as_ref()
    }

    /// UNKNOWN 时为 `None`
    pub fn bound_state_id(&self) -> Option<RenderStateId> {
        match &self.bound {
            BoundState::Unknown => None,
            BoundState::Bound(state) => Some(state.id()),
        }
    }

    #[inline]
    pub fn light_slot(&self, light: LightId) -> Option<usize> {
        self.lights.slot_of(light)
    }

    #[inline]
    pub fn enabled_light_count(&self) -> usize {
        self.lights.enabled_count()
    }

    /// flat 颜色属性给出的场景颜色
    #[inline]
    pub fn scene_color(&self) -> Option<Vec4> {
        self.scene_color
    }

    #[inline]
    pub fn material_force_color(&self) -> Option<Vec4> {
        self.material_force_color
    }

    #[inline]
    pub fn light_color_scale(&self) -> Vec4 {
        self.light_color_scale
    }
}
// scene
impl StateReconciler {
    /// 开始一个 scene；lens 必须存在且可用
    pub fn begin_scene(&mut self, backend: &mut impl GfxStateBackend, scene: SceneSetup) -> Result<(), StateError> {
        let _span = tracy_client::span!("StateReconciler::begin_scene");
        if self.scene.is_some() {
            return Err(StateError::Unbalanced("begin_scene while a scene is active"));
        }
        let lens = scene.lens()?;
        if !backend.prepare_lens(lens) {
            return Err(StateError::InvalidScene("backend rejected the lens"));
        }
        self.scene = Some(scene);
        Ok(())
    }

    /// 结束 scene：关闭所有灯光与裁剪平面槽位，状态回到 UNKNOWN
    pub fn end_scene(&mut self, backend: &mut impl GfxStateBackend) -> Result<(), StateError> {
        let _span = tracy_client::span!("StateReconciler::end_scene");
        if self.scene.is_none() {
            return Err(StateError::Unbalanced("end_scene without begin_scene"));
        }

        for slot in self.lights.reset() {
            backend.enable_light(slot, false);
        }
        for slot in self.clip_planes.reset() {
            backend.enable_clip_plane(slot, false);
        }

        self.clear_state();
        self.scene = None;
        Ok(())
    }

    /// 忘记当前绑定的状态，下一次 apply 重新发出所有类别
    pub fn clear_state(&mut self) {
        self.bound = BoundState::Unknown;
        self.bound_transform = None;
        self.valid = StateMask::empty();
        self.lighting_enabled = None;
        self.clip_planes_enabled = None;
        self.lights.invalidate_bindings();
        self.clip_planes.invalidate_bindings();
    }

    /// 标记某些类别为未知，下一次 apply 重新发出
    pub fn invalidate(&mut self, mask: StateMask) {
        self.valid.remove(mask);
        if mask.contains(StateMask::LIGHTING) {
            self.lighting_enabled = None;
            self.lights.invalidate_bindings();
        }
        if mask.contains(StateMask::CLIP_PLANES) {
            self.clip_planes_enabled = None;
            self.clip_planes.invalidate_bindings();
        }
    }
}
// apply
impl StateReconciler {
    /// 让硬件状态与 `target` / `transform` 一致
    ///
    /// # 返回
    /// 被重新发出的类别；为空表示什么也没做
    pub fn apply(
        &mut self,
        backend: &mut impl GfxStateBackend,
        target: &Arc<RenderState>,
        transform: &TransformState,
    ) -> Result<StateMask, StateError> {
        let _span = tracy_client::span!("StateReconciler::apply");
        if self.scene.is_none() {
            return Err(StateError::NoScene);
        }
        self.stats.applies += 1;

        let mut mask = match &self.bound {
            BoundState::Bound(bound) if Arc::ptr_eq(bound, target) => StateMask::empty(),
            BoundState::Bound(bound) => bound.diff(target),
            BoundState::Unknown => StateMask::RENDER_STATE,
        };
        mask |= self.valid.complement();
        if self.bound_transform.as_ref() != Some(transform) {
            mask |= StateMask::TRANSFORM;
        }

        if mask.is_empty() {
            self.stats.noop_applies += 1;
            return Ok(mask);
        }

        if mask.contains(StateMask::TRANSFORM) {
            backend.issue_transform(transform);
        }
        if mask.contains(StateMask::SHADER) {
            self.issue_shader(backend, target);
        }
        if mask.intersects(StateMask::COLOR | StateMask::COLOR_SCALE) {
            mask |= self.issue_color(backend, target);
        }
        if mask.contains(StateMask::LIGHTING) {
            self.issue_lights(backend, target);
        }
        if mask.contains(StateMask::CLIP_PLANES) {
            self.issue_clip_planes(backend, target);
        }
        if mask.contains(StateMask::TEXTURE) {
            self.issue_texture(backend, target);
        }
        if mask.contains(StateMask::FOG) {
            backend.issue_fog(&target.fog);
        }
        if mask.contains(StateMask::RENDER_MODE) {
            backend.issue_render_mode(&target.render_mode);
        }
        if mask.contains(StateMask::BLENDING) {
            backend.issue_blending(&target.transparency);
        }
        if mask.contains(StateMask::MATERIAL) {
            let force_color = if self.settings.color_scale_via_lighting { self.material_force_color } else { None };
            backend.issue_material(&target.material, force_color);
        }
        if mask.contains(StateMask::STENCIL) {
            backend.issue_stencil(&target.stencil);
        }
        if mask.contains(StateMask::SCISSOR) {
            backend.issue_scissor(&target.scissor);
        }

        self.stats.record(mask);
        self.bound = BoundState::Bound(target.clone());
        self.bound_transform = Some(*transform);
        self.valid = StateMask::all();
        Ok(mask)
    }

    /// 推导场景颜色、颜色缩放与 alpha 缩放纹理
    ///
    /// 返回因此需要额外重新发出的类别
    fn issue_color(&mut self, backend: &mut impl GfxStateBackend, target: &RenderState) -> StateMask {
        let mut extra = StateMask::empty();

        let (scene_color, vertex_colors) = match target.color {
            ColorAttrib::Flat(color) => (Some(color), false),
            ColorAttrib::Off => (None, false),
            ColorAttrib::Vertex => (None, true),
        };
        self.scene_color = scene_color;

        let color_scale = target.color_scale;
        let had_texture_alpha_scale = self.flags.contains(ReconciledFlags::TEXTURE_ALPHA_SCALE);
        let texture_alpha_scale = self.settings.alpha_scale_via_texture
            && scene_color.is_none()
            && vertex_colors
            && color_scale.has_alpha_only_scale();
        // alpha 交给纹理 stage 时，剩余的缩放不再包含 alpha
        let scale = if texture_alpha_scale { color_scale.scale.truncate().extend(1.0) } else { color_scale.scale };
        let scale_enabled = scale != Vec4::ONE;

        if had_texture_alpha_scale || texture_alpha_scale {
            extra |= StateMask::TEXTURE;
        }

        if self.settings.color_scale_via_lighting {
            extra |= StateMask::LIGHTING | StateMask::MATERIAL;
            self.material_force_color = match scene_color {
                Some(color) => Some(color * scale),
                None if !vertex_colors => Some(scale),
                None => None,
            };
            self.light_color_scale = if self.material_force_color.is_none() { scale } else { Vec4::ONE };
            backend.issue_color(self.material_force_color, vertex_colors);
            backend.issue_color_scale(self.light_color_scale);
        } else {
            self.material_force_color = None;
            self.light_color_scale = Vec4::ONE;
            backend.issue_color(scene_color, vertex_colors);
            backend.issue_color_scale(scale);
        }

        self.flags.set(ReconciledFlags::VERTEX_COLORS, vertex_colors);
        self.flags.set(ReconciledFlags::COLOR_SCALE, scale_enabled);
        self.flags.set(ReconciledFlags::TEXTURE_ALPHA_SCALE, texture_alpha_scale);
        extra
    }

    fn set_lighting(&mut self, backend: &mut impl GfxStateBackend, enable: bool) {
        if self.lighting_enabled != Some(enable) {
            backend.enable_lighting(enable);
            self.lighting_enabled = Some(enable);
        }
        self.flags.set(ReconciledFlags::LIGHTING, enable);
    }

    /// 设备不支持 shader 的方言时，退回自动生成的 shader
    fn issue_shader(&mut self, backend: &mut impl GfxStateBackend, target: &RenderState) {
        let shader = &target.shader;
        if shader.shader.is_some() && !self.caps.supports_dialect(shader.dialect) {
            log::warn!(
                "{} shader {:?} uses unsupported dialect {:?}, using generated shader",
                self.context.id(),
                shader.shader,
                shader.dialect
            );
            backend.issue_shader(&ShaderAttrib::default());
        } else {
            backend.issue_shader(shader);
        }
    }

    fn issue_lights(&mut self, backend: &mut impl GfxStateBackend, target: &RenderState) {
        let lights = target.lights.non_ambient_lights().filter(|l| !l.is_black()).collect_vec();
        let ids = lights.iter().map(|l| l.id).collect_vec();
        let plan = self.lights.assign(&ids, self.caps.clamp_lights(ids.len()));

        // 绑定灯光之前必须先开启 lighting
        if !plan.assignments.is_empty() {
            self.set_lighting(backend, true);
        }

        let rebinds = plan.rebind_count();
        if rebinds > 0 {
            backend.begin_bind_lights();
        }
        for (light, (_, slot, rebind)) in lights.iter().zip(&plan.assignments) {
            if plan.newly_enabled.contains(slot) {
                backend.enable_light(*slot, true);
            }
            if *rebind {
                backend.bind_light(light, *slot);
            }
        }
        for slot in &plan.disabled {
            backend.enable_light(*slot, false);
        }
        if rebinds > 0 {
            backend.end_bind_lights();
        }

        if !target.lights.has_any_on_light() {
            let needs_color = self.material_force_color.is_some() || self.light_color_scale != Vec4::ONE;
            if self.settings.color_scale_via_lighting && needs_color {
                // 没有灯光，但仍需要通过 lighting 实现颜色
                self.set_lighting(backend, true);
                backend.set_ambient_light(Vec4::ONE);
            } else {
                self.set_lighting(backend, false);
            }
        } else {
            self.set_lighting(backend, true);
            backend.set_ambient_light(target.lights.ambient_contribution());
        }
    }

    fn issue_clip_planes(&mut self, backend: &mut impl GfxStateBackend, target: &RenderState) {
        let planes = target.clip_planes.on_planes().iter().filter(|p| p.visible).collect_vec();
        let ids = planes.iter().map(|p| p.id).collect_vec();
        let plan = self.clip_planes.assign(&ids, self.caps.clamp_clip_planes(ids.len()));

        let enable = !plan.assignments.is_empty();
        if self.clip_planes_enabled != Some(enable) {
            backend.enable_clip_planes(enable);
            self.clip_planes_enabled = Some(enable);
        }
        self.flags.set(ReconciledFlags::CLIP_PLANES, enable);

        let rebinds = plan.rebind_count();
        if rebinds > 0 {
            backend.begin_bind_clip_planes();
        }
        for (plane, (_, slot, rebind)) in planes.iter().zip(&plan.assignments) {
            if plan.newly_enabled.contains(slot) {
                backend.enable_clip_plane(*slot, true);
            }
            if *rebind {
                backend.bind_clip_plane(plane, *slot);
            }
        }
        for slot in &plan.disabled {
            backend.enable_clip_plane(*slot, false);
        }
        if rebinds > 0 {
            backend.end_bind_clip_planes();
        }
    }

    /// 截断到设备支持的 stage 数；alpha 缩放 stage 总是保留
    fn issue_texture(&mut self, backend: &mut impl GfxStateBackend, target: &RenderState) {
        let mut stages = target.texture.stages().to_vec();

        if self.flags.contains(ReconciledFlags::TEXTURE_ALPHA_SCALE) && self.caps.max_texture_stages > 0 {
            stages.truncate(self.caps.clamp_texture_stages(stages.len() + 1) - 1);
            stages.push(TextureStage::alpha_scale(target.color_scale.scale.w));
        } else {
            stages.truncate(self.caps.clamp_texture_stages(stages.len()));
        }
        if stages.len() < target.texture.stages().len() {
            log::debug!(
                "{} texture stages clamped from {} to {}",
                self.context.id(),
                target.texture.stages().len(),
                stages.len()
            );
        }
        backend.issue_texture(&stages);
    }
}
// tools
impl StateReconciler {
    /// 当前 context 对 `state` 的 munger
    pub fn geom_munger(&self, state: &Arc<RenderState>) -> Arc<GeomMunger> {
        let context_id = self.context.id();
        get_or_create_munger(state, &self.context, || GeomMunger::for_state(context_id, state))
    }

    /// compute 不被支持时是致命错误
    pub fn dispatch_compute(
        &mut self,
        backend: &mut impl GfxStateBackend,
        group_counts: [u32; 3],
    ) -> Result<(), StateError> {
        if !self.caps.supports_compute {
            return Err(StateError::Unsupported("compute dispatch"));
        }
        backend.dispatch_compute(group_counts);
        Ok(())
    }
}

impl Drop for StateReconciler {
    fn drop(&mut self) {
        self.context.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_state::{
        ClipPlane, ClipPlaneAttrib, FogAttrib, Light, LightAttrib, LightKind, ShaderId, TexCoordSource, TextureAttrib,
    };
    use kiln_gfx::foundation::device_caps::GfxShaderDialects;
    use crate::scene::Lens;
    use glam::Vec3;

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Transform,
        Color(Option<Vec4>, bool),
        ColorScale(Vec4),
        EnableLighting(bool),
        Ambient(Vec4),
        BindLight(u32, usize),
        EnableLight(usize, bool),
        EnableClipPlanes(bool),
        BindClipPlane(u32, usize),
        EnableClipPlane(usize, bool),
        Texture(Vec<TextureStage>),
        Shader(ShaderAttrib),
        Fog,
        Material(Option<Vec4>),
        Compute,
    }

    #[derive(Default)]
    struct RecordingBackend {
        calls: Vec<Call>,
    }

    impl RecordingBackend {
        fn take(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    impl GfxStateBackend for RecordingBackend {
        fn issue_transform(&mut self, _: &TransformState) {
            self.calls.push(Call::Transform);
        }
        fn issue_color(&mut self, force_color: Option<Vec4>, vertex_colors: bool) {
            self.calls.push(Call::Color(force_color, vertex_colors));
        }
        fn issue_color_scale(&mut self, scale: Vec4) {
            self.calls.push(Call::ColorScale(scale));
        }
        fn enable_lighting(&mut self, enable: bool) {
            self.calls.push(Call::EnableLighting(enable));
        }
        fn set_ambient_light(&mut self, color: Vec4) {
            self.calls.push(Call::Ambient(color));
        }
        fn bind_light(&mut self, light: &Light, slot: usize) {
            self.calls.push(Call::BindLight(light.id.0, slot));
        }
        fn enable_light(&mut self, slot: usize, enable: bool) {
            self.calls.push(Call::EnableLight(slot, enable));
        }
        fn enable_clip_planes(&mut self, enable: bool) {
            self.calls.push(Call::EnableClipPlanes(enable));
        }
        fn bind_clip_plane(&mut self, plane: &ClipPlane, slot: usize) {
            self.calls.push(Call::BindClipPlane(plane.id.0, slot));
        }
        fn enable_clip_plane(&mut self, slot: usize, enable: bool) {
            self.calls.push(Call::EnableClipPlane(slot, enable));
        }
        fn issue_texture(&mut self, stages: &[TextureStage]) {
            self.calls.push(Call::Texture(stages.to_vec()));
        }
        fn issue_shader(&mut self, shader: &ShaderAttrib) {
            self.calls.push(Call::Shader(*shader));
        }
        fn issue_fog(&mut self, _: &FogAttrib) {
            self.calls.push(Call::Fog);
        }
        fn issue_material(&mut self, _: &crate::render_state::MaterialAttrib, force_color: Option<Vec4>) {
            self.calls.push(Call::Material(force_color));
        }
        fn dispatch_compute(&mut self, _: [u32; 3]) {
            self.calls.push(Call::Compute);
        }
    }

    fn point_light(id: u32) -> Light {
        Light {
            id: LightId(id),
            kind: LightKind::Point {
                position: Vec3::new(id as f32, 0.0, 0.0),
                attenuation: Vec3::new(1.0, 0.0, 0.0),
            },
            color: Vec4::ONE,
        }
    }

    fn lit(ids: &[u32]) -> Arc<RenderState> {
        RenderState::builder().lights(LightAttrib::new(ids.iter().map(|id| point_light(*id)))).build()
    }

    fn reconciler(settings: ReconcilerSettings) -> (StateReconciler, RecordingBackend) {
        let mut backend = RecordingBackend::default();
        let mut reconciler = StateReconciler::new(GfxContextId::next(), GfxDeviceCaps::default(), settings);
        reconciler
            .begin_scene(&mut backend, SceneSetup::new(Lens::perspective(1.0, 1.0, 0.1, 10.0)))
            .unwrap();
        (reconciler, backend)
    }

    fn count(calls: &[Call], pred: impl Fn(&Call) -> bool) -> usize {
        calls.iter().filter(|c| pred(*c)).count()
    }

    #[test]
    fn test_apply_same_state_twice_is_noop() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        let state = lit(&[1]);

        let first = reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        assert!(first.contains(StateMask::TRANSFORM | StateMask::LIGHTING));
        assert!(!backend.take().is_empty());

        let second = reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        assert!(second.is_empty());
        assert!(backend.take().is_empty());
        assert_eq!(reconciler.stats().noop_applies, 1);
        assert_eq!(reconciler.stats().applies, 2);
    }

    #[test]
    fn test_only_changed_categories_are_issued() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        let state = lit(&[1]);
        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        backend.take();

        let foggy = state
            .to_builder()
            .fog(FogAttrib::Exponential {
                color: Vec4::ONE,
                density: 0.5,
            })
            .build();
        let moved = TransformState::from_translation(Vec3::X);
        let mask = reconciler.apply(&mut backend, &foggy, &moved).unwrap();

        assert_eq!(mask, StateMask::FOG | StateMask::TRANSFORM);
        assert_eq!(backend.take(), vec![Call::Transform, Call::Fog]);
    }

    #[test]
    fn test_dropping_a_light_disables_one_slot_without_rebinding() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        let s1 = lit(&[1, 2]);
        let s2 = lit(&[1]);

        reconciler.apply(&mut backend, &s1, &TransformState::IDENTITY).unwrap();
        assert_eq!(reconciler.light_slot(LightId(1)), Some(0));
        backend.take();

        reconciler.apply(&mut backend, &s2, &TransformState::IDENTITY).unwrap();
        let calls = backend.take();
        assert_eq!(count(&calls, |c| matches!(c, Call::EnableLight(_, false))), 1);
        assert!(calls.contains(&Call::EnableLight(1, false)));
        assert_eq!(count(&calls, |c| matches!(c, Call::BindLight(..))), 0);
        assert_eq!(reconciler.enabled_light_count(), 1);
    }

    #[test]
    fn test_light_keeps_slot_and_newcomer_takes_lowest_free() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        reconciler.apply(&mut backend, &lit(&[1, 2]), &TransformState::IDENTITY).unwrap();
        backend.take();

        reconciler.apply(&mut backend, &lit(&[2, 3]), &TransformState::IDENTITY).unwrap();
        let calls = backend.take();
        assert_eq!(reconciler.light_slot(LightId(2)), Some(1));
        assert_eq!(reconciler.light_slot(LightId(3)), Some(0));
        assert_eq!(count(&calls, |c| matches!(c, Call::BindLight(..))), 1);
        assert!(calls.contains(&Call::BindLight(3, 0)));
        assert_eq!(count(&calls, |c| matches!(c, Call::EnableLight(..))), 0);
    }

    #[test]
    fn test_lighting_enabled_before_binds_and_disabled_when_empty() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        reconciler.apply(&mut backend, &lit(&[1]), &TransformState::IDENTITY).unwrap();
        let calls = backend.take();
        let enable = calls.iter().position(|c| *c == Call::EnableLighting(true)).unwrap();
        let bind = calls.iter().position(|c| matches!(c, Call::BindLight(..))).unwrap();
        assert!(enable < bind);
        assert!(reconciler.flags().contains(ReconciledFlags::LIGHTING));

        reconciler.apply(&mut backend, &RenderState::empty(), &TransformState::IDENTITY).unwrap();
        let calls = backend.take();
        assert!(calls.contains(&Call::EnableLighting(false)));
        assert!(calls.contains(&Call::EnableLight(0, false)));
        assert!(!reconciler.flags().contains(ReconciledFlags::LIGHTING));
    }

    #[test]
    fn test_black_lights_are_skipped_and_ambient_is_summed() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        let black = Light {
            color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            ..point_light(1)
        };
        let ambient = Light {
            id: LightId(9),
            kind: LightKind::Ambient,
            color: Vec4::splat(0.25),
        };
        let state = RenderState::builder().lights(LightAttrib::new([black, ambient, point_light(2)])).build();

        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        let calls = backend.take();
        assert_eq!(count(&calls, |c| matches!(c, Call::BindLight(..))), 1);
        assert!(calls.contains(&Call::BindLight(2, 0)));
        assert!(calls.contains(&Call::Ambient(Vec4::splat(0.25))));
    }

    #[test]
    fn test_lights_clamped_to_device_max() {
        let mut backend = RecordingBackend::default();
        let caps = GfxDeviceCaps {
            max_lights: 1,
            ..Default::default()
        };
        let mut reconciler = StateReconciler::new(GfxContextId::next(), caps, ReconcilerSettings::default());
        reconciler
            .begin_scene(&mut backend, SceneSetup::new(Lens::perspective(1.0, 1.0, 0.1, 10.0)))
            .unwrap();

        reconciler.apply(&mut backend, &lit(&[1, 2, 3]), &TransformState::IDENTITY).unwrap();
        assert_eq!(reconciler.enabled_light_count(), 1);
    }

    #[test]
    fn test_invisible_clip_planes_are_not_bound() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        let plane = |id, visible| ClipPlane {
            id: ClipPlaneId(id),
            plane: Vec4::new(0.0, 1.0, 0.0, 0.0),
            visible,
        };
        let state = RenderState::builder()
            .clip_planes(ClipPlaneAttrib::new([plane(1, false), plane(2, true)]))
            .build();

        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        let calls = backend.take();
        assert!(calls.contains(&Call::EnableClipPlanes(true)));
        assert!(calls.contains(&Call::BindClipPlane(2, 0)));
        assert_eq!(count(&calls, |c| matches!(c, Call::BindClipPlane(..))), 1);
    }

    #[test]
    fn test_alpha_scale_via_texture_adds_stage_and_invalidates_texture() {
        let settings = ReconcilerSettings {
            alpha_scale_via_texture: true,
            ..Default::default()
        };
        let (mut reconciler, mut backend) = reconciler(settings);
        let base = RenderState::builder()
            .color(ColorAttrib::Vertex)
            .texture(TextureAttrib::new([TextureStage {
                sort: 0,
                texture: None,
                texcoord: TexCoordSource::Attribute(0),
            }]))
            .build();
        reconciler.apply(&mut backend, &base, &TransformState::IDENTITY).unwrap();
        backend.take();

        // 只改变颜色缩放，texture 类别也必须重新发出
        let faded = base.to_builder().color_scale(Vec4::new(1.0, 1.0, 1.0, 0.5)).build();
        let mask = reconciler.apply(&mut backend, &faded, &TransformState::IDENTITY).unwrap();
        assert!(mask.contains(StateMask::TEXTURE));
        assert!(reconciler.flags().contains(ReconciledFlags::TEXTURE_ALPHA_SCALE));
        let calls = backend.take();
        assert!(calls.contains(&Call::ColorScale(Vec4::ONE)));
        let Some(Call::Texture(stages)) = calls.iter().find(|c| matches!(c, Call::Texture(_))) else {
            panic!("texture not issued");
        };
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].texcoord, TexCoordSource::Constant(Vec3::new(0.5, 0.0, 0.0)));

        // 停止 alpha 缩放时再次发出不带额外 stage 的 texture
        reconciler.apply(&mut backend, &base, &TransformState::IDENTITY).unwrap();
        let calls = backend.take();
        assert!(calls.iter().any(|c| matches!(c, Call::Texture(stages) if stages.len() == 1)));
        assert!(!reconciler.flags().contains(ReconciledFlags::TEXTURE_ALPHA_SCALE));
    }

    #[test]
    fn test_flat_color_with_scale_via_lighting() {
        let settings = ReconcilerSettings {
            color_scale_via_lighting: true,
            ..Default::default()
        };
        let (mut reconciler, mut backend) = reconciler(settings);
        let state = RenderState::builder()
            .color(ColorAttrib::Flat(Vec4::new(1.0, 0.5, 0.0, 1.0)))
            .color_scale(Vec4::new(0.5, 1.0, 1.0, 1.0))
            .build();

        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        let force = Vec4::new(0.5, 0.5, 0.0, 1.0);
        assert_eq!(reconciler.material_force_color(), Some(force));
        assert_eq!(reconciler.light_color_scale(), Vec4::ONE);

        // 没有灯光，但需要 lighting 来实现颜色
        let calls = backend.take();
        assert!(calls.contains(&Call::EnableLighting(true)));
        assert!(calls.contains(&Call::Ambient(Vec4::ONE)));
        assert!(calls.contains(&Call::Material(Some(force))));
    }

    #[test]
    fn test_vertex_color_scale_goes_to_lights() {
        let settings = ReconcilerSettings {
            color_scale_via_lighting: true,
            ..Default::default()
        };
        let (mut reconciler, mut backend) = reconciler(settings);
        let scale = Vec4::new(0.5, 0.5, 0.5, 1.0);
        let state = RenderState::builder().color(ColorAttrib::Vertex).color_scale(scale).build();

        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        assert_eq!(reconciler.material_force_color(), None);
        assert_eq!(reconciler.light_color_scale(), scale);
        assert!(reconciler.flags().contains(ReconciledFlags::VERTEX_COLORS | ReconciledFlags::COLOR_SCALE));
    }

    #[test]
    fn test_apply_without_scene_fails_without_mutation() {
        let mut backend = RecordingBackend::default();
        let mut reconciler =
            StateReconciler::new(GfxContextId::next(), GfxDeviceCaps::default(), ReconcilerSettings::default());

        let result = reconciler.apply(&mut backend, &lit(&[1]), &TransformState::IDENTITY);
        assert_eq!(result, Err(StateError::NoScene));
        assert_eq!(reconciler.bound_state_id(), None);
        assert!(backend.calls.is_empty());

        let no_lens = SceneSetup {
            lens: None,
            ..SceneSetup::new(Lens::perspective(1.0, 1.0, 0.1, 10.0))
        };
        assert!(reconciler.begin_scene(&mut backend, no_lens).is_err());
        assert!(!reconciler.in_scene());
    }

    #[test]
    fn test_end_scene_disables_slots_and_resets() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        let state = lit(&[1, 2]);
        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        backend.take();

        reconciler.end_scene(&mut backend).unwrap();
        assert_eq!(backend.take(), vec![Call::EnableLight(0, false), Call::EnableLight(1, false)]);
        assert_eq!(reconciler.bound_state_id(), None);
        assert!(reconciler.end_scene(&mut backend).is_err());

        // 下一个 scene 中灯光回到原来的槽位，所有类别重新发出
        reconciler
            .begin_scene(&mut backend, SceneSetup::new(Lens::perspective(1.0, 1.0, 0.1, 10.0)))
            .unwrap();
        let mask = reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        assert_eq!(mask, StateMask::all());
        assert_eq!(reconciler.light_slot(LightId(2)), Some(1));
    }

    #[test]
    fn test_invalidate_forces_reissue() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        let state = lit(&[1]);
        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        backend.take();

        reconciler.invalidate(StateMask::LIGHTING);
        let mask = reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        assert_eq!(mask, StateMask::LIGHTING);
        assert!(backend.take().contains(&Call::BindLight(1, 0)));
    }

    #[test]
    fn test_unsupported_shader_dialect_falls_back_to_generated() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        let hlsl = ShaderAttrib {
            shader: Some(ShaderId(7)),
            dialect: GfxShaderDialects::HLSL,
        };
        let spirv = ShaderAttrib {
            shader: Some(ShaderId(8)),
            dialect: GfxShaderDialects::SPIR_V,
        };

        let state = RenderState::builder().shader(hlsl).build();
        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        let shaders = backend.take().into_iter().filter(|c| matches!(c, Call::Shader(_))).collect_vec();
        assert_eq!(shaders, vec![Call::Shader(ShaderAttrib::default())]);

        let state = RenderState::builder().shader(spirv).build();
        reconciler.apply(&mut backend, &state, &TransformState::IDENTITY).unwrap();
        assert!(backend.take().contains(&Call::Shader(spirv)));
    }

    #[test]
    fn test_compute_requires_support() {
        let (mut reconciler, mut backend) = reconciler(ReconcilerSettings::default());
        reconciler.dispatch_compute(&mut backend, [1, 1, 1]).unwrap();
        assert_eq!(backend.take(), vec![Call::Compute]);

        reconciler.caps.supports_compute = false;
        let err = reconciler.dispatch_compute(&mut backend, [1, 1, 1]).unwrap_err();
        assert!(err.is_fatal());
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn test_geom_munger_is_cached_until_drop() {
        let (reconciler, _) = reconciler(ReconcilerSettings::default());
        let state = RenderState::empty();
        let a = reconciler.geom_munger(&state);
        let b = reconciler.geom_munger(&state);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(state.munger_count(), 1);

        drop(reconciler);
        assert_eq!(state.munger_count(), 0);
    }
}
