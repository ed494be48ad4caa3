use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use glam::{Mat4, Vec3, Vec4};
use kiln_gfx::foundation::device_caps::GfxShaderDialects;
use kiln_render_interface::handles::{GfxContextId, GfxResourceHandle};
use parking_lot::Mutex;

use crate::munger::{GeomMunger, MungerContext};
use crate::state_mask::StateMask;

/// 场景颜色
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ColorAttrib {
    /// 使用顶点颜色
    Vertex,
    /// 覆盖顶点颜色的场景颜色
    Flat(Vec4),
    /// 不使用场景颜色，也不关心顶点颜色
    #[default]
    Off,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScaleAttrib {
    pub scale: Vec4,
}

impl Default for ColorScaleAttrib {
    fn default() -> Self {
        Self { scale: Vec4::ONE }
    }
}

impl ColorScaleAttrib {
    #[inline]
    pub fn has_scale(&self) -> bool {
        self.scale != Vec4::ONE
    }

    #[inline]
    pub fn has_alpha_scale(&self) -> bool {
        self.scale.w != 1.0
    }

    /// 只缩放 alpha
    #[inline]
    pub fn has_alpha_only_scale(&self) -> bool {
        self.has_alpha_scale() && self.scale.truncate() == Vec3::ONE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional { direction: Vec3 },
    Point { position: Vec3, attenuation: Vec3 },
    Spot { position: Vec3, direction: Vec3, cutoff_radians: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub id: LightId,
    pub kind: LightKind,
    pub color: Vec4,
}

impl Light {
    #[inline]
    pub fn is_ambient(&self) -> bool {
        matches!(self.kind, LightKind::Ambient)
    }

    /// rgb 全为 0 的灯光没有任何贡献
    #[inline]
    pub fn is_black(&self) -> bool {
        self.color.truncate() == Vec3::ZERO
    }
}

/// 开启的灯光，非 ambient 灯光总是排在 ambient 之前
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LightAttrib {
    on_lights: Vec<Light>,
}

impl LightAttrib {
    pub fn new(lights: impl IntoIterator<Item = Light>) -> Self {
        let mut on_lights: Vec<Light> = lights.into_iter().collect();
        // 稳定排序，保留同类灯光的顺序
        on_lights.sort_by_key(Light::is_ambient);
        Self { on_lights }
    }

    #[inline]
    pub fn on_lights(&self) -> &[Light] {
        &self.on_lights
    }

    #[inline]
    pub fn has_any_on_light(&self) -> bool {
        !self.on_lights.is_empty()
    }

    pub fn non_ambient_lights(&self) -> impl Iterator<Item = &Light> {
        self.on_lights.iter().take_while(|l| !l.is_ambient())
    }

    /// 所有 ambient 灯光颜色之和
    pub fn ambient_contribution(&self) -> Vec4 {
        self.on_lights.iter().filter(|l| l.is_ambient()).fold(Vec4::ZERO, |acc, l| acc + l.color)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipPlaneId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipPlane {
    pub id: ClipPlaneId,
    /// 平面方程 `ax + by + cz + d = 0`
    pub plane: Vec4,
    /// 只有 visible 的平面才会裁剪可见几何
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ClipPlaneAttrib {
    on_planes: Vec<ClipPlane>,
}

impl ClipPlaneAttrib {
    pub fn new(planes: impl IntoIterator<Item = ClipPlane>) -> Self {
        Self {
            on_planes: planes.into_iter().collect(),
        }
    }

    #[inline]
    pub fn on_planes(&self) -> &[ClipPlane] {
        &self.on_planes
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TexCoordSource {
    /// 顶点属性中的第 n 组 texcoord
    Attribute(u32),
    /// 所有顶点使用同一个 texcoord
    Constant(Vec3),
}

/// 纹理 stage
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureStage {
    pub sort: i32,
    /// `None` 表示引擎内置的查找纹理
    pub texture: Option<GfxResourceHandle>,
    pub texcoord: TexCoordSource,
}

impl TextureStage {
    /// 用 1x1 查找纹理实现 alpha 缩放的 stage
    pub fn alpha_scale(alpha: f32) -> Self {
        Self {
            sort: i32::MAX,
            texture: None,
            texcoord: TexCoordSource::Constant(Vec3::new(alpha, 0.0, 0.0)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct TextureAttrib {
    stages: Vec<TextureStage>,
}

impl TextureAttrib {
    pub fn new(stages: impl IntoIterator<Item = TextureStage>) -> Self {
        let mut stages: Vec<TextureStage> = stages.into_iter().collect();
        stages.sort_by_key(|s| s.sort);
        Self { stages }
    }

    #[inline]
    pub fn stages(&self) -> &[TextureStage] {
        &self.stages
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderAttrib {
    /// `None` 表示使用自动生成的 shader
    pub shader: Option<ShaderId>,
    pub dialect: GfxShaderDialects,
}

impl Default for ShaderAttrib {
    fn default() -> Self {
        Self {
            shader: None,
            dialect: GfxShaderDialects::SPIR_V,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum FogAttrib {
    #[default]
    Off,
    Exponential {
        color: Vec4,
        density: f32,
    },
    Linear {
        color: Vec4,
        start: f32,
        end: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Filled,
    Wireframe,
    Point,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderModeAttrib {
    pub mode: RenderMode,
    pub thickness: f32,
}

impl Default for RenderModeAttrib {
    fn default() -> Self {
        Self {
            mode: RenderMode::Filled,
            thickness: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TransparencyAttrib {
    #[default]
    Opaque,
    Alpha,
    PremultipliedAlpha,
    /// alpha test，不混合
    Binary,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialAttrib {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub emission: Vec4,
    pub shininess: f32,
}

impl Default for MaterialAttrib {
    fn default() -> Self {
        Self {
            ambient: Vec4::ONE,
            diffuse: Vec4::ONE,
            specular: Vec4::ZERO,
            emission: Vec4::ZERO,
            shininess: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StencilAttrib {
    pub enabled: bool,
    pub reference: u32,
    pub compare_mask: u32,
    pub write_mask: u32,
}

/// 裁剪矩形，`[left, right, bottom, top]`，取值 0..1
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ScissorAttrib {
    pub frame: Option<[f32; 4]>,
}

/// 物体的世界变换
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformState {
    pub matrix: Mat4,
}

impl TransformState {
    pub const IDENTITY: Self = Self {
        matrix: Mat4::IDENTITY,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            matrix: Mat4::from_translation(translation),
        }
    }
}

impl Default for TransformState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderStateId(u64);

/// 各 context 的 munger 缓存
#[derive(Default)]
pub(crate) struct MungerCache {
    /// 最近一次命中的 context
    pub(crate) last: Option<(GfxContextId, Arc<GeomMunger>)>,
    pub(crate) entries: HashMap<GfxContextId, (Weak<MungerContext>, Arc<GeomMunger>)>,
}

/// 一组完整的渲染属性
///
/// 构建之后不可变，以 `Arc` 共享；apply 时先比较指针，再按类别比较属性
pub struct RenderState {
    id: RenderStateId,

    pub color: ColorAttrib,
    pub color_scale: ColorScaleAttrib,
    pub lights: LightAttrib,
    pub clip_planes: ClipPlaneAttrib,
    pub texture: TextureAttrib,
    pub shader: ShaderAttrib,
    pub fog: FogAttrib,
    pub render_mode: RenderModeAttrib,
    pub transparency: TransparencyAttrib,
    pub material: MaterialAttrib,
    pub stencil: StencilAttrib,
    pub scissor: ScissorAttrib,

    pub(crate) mungers: Mutex<MungerCache>,
}

/// [`RenderState`] 的构建器
#[derive(Clone, Debug, Default)]
pub struct RenderStateBuilder {
    color: ColorAttrib,
    color_scale: ColorScaleAttrib,
    lights: LightAttrib,
    clip_planes: ClipPlaneAttrib,
    texture: TextureAttrib,
    shader: ShaderAttrib,
    fog: FogAttrib,
    render_mode: RenderModeAttrib,
    transparency: TransparencyAttrib,
    material: MaterialAttrib,
    stencil: StencilAttrib,
    scissor: ScissorAttrib,
}

impl RenderStateBuilder {
    pub fn color(mut self, color: ColorAttrib) -> Self {
        self.color = color;
        self
    }
    pub fn color_scale(mut self, scale: Vec4) -> Self {
        self.color_scale = ColorScaleAttrib { scale };
        self
    }
    pub fn lights(mut self, lights: LightAttrib) -> Self {
        self.lights = lights;
        self
    }
    pub fn clip_planes(mut self, clip_planes: ClipPlaneAttrib) -> Self {
        self.clip_planes = clip_planes;
        self
    }
    pub fn texture(mut self, texture: TextureAttrib) -> Self {
        self.texture = texture;
        self
    }
    pub fn shader(mut self, shader: ShaderAttrib) -> Self {
        self.shader = shader;
        self
    }
    pub fn fog(mut self, fog: FogAttrib) -> Self {
        self.fog = fog;
        self
    }
    pub fn render_mode(mut self, render_mode: RenderModeAttrib) -> Self {
        self.render_mode = render_mode;
        self
    }
    pub fn transparency(mut self, transparency: TransparencyAttrib) -> Self {
        self.transparency = transparency;
        self
    }
    pub fn material(mut self, material: MaterialAttrib) -> Self {
        self.material = material;
        self
    }
    pub fn stencil(mut self, stencil: StencilAttrib) -> Self {
        self.stencil = stencil;
        self
    }
    pub fn scissor(mut self, scissor: ScissorAttrib) -> Self {
        self.scissor = scissor;
        self
    }

    pub fn build(self) -> Arc<RenderState> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Arc::new(RenderState {
            id: RenderStateId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            color: self.color,
            color_scale: self.color_scale,
            lights: self.lights,
            clip_planes: self.clip_planes,
            texture: self.texture,
            shader: self.shader,
            fog: self.fog,
            render_mode: self.render_mode,
            transparency: self.transparency,
            material: self.material,
            stencil: self.stencil,
            scissor: self.scissor,
            mungers: Mutex::new(MungerCache::default()),
        })
    }
}

// new & init
impl RenderState {
    pub fn builder() -> RenderStateBuilder {
        RenderStateBuilder::default()
    }

    /// 所有属性都是默认值的状态
    pub fn empty() -> Arc<Self> {
        RenderStateBuilder::default().build()
    }

    /// 以当前状态为基础修改
    pub fn to_builder(&self) -> RenderStateBuilder {
        RenderStateBuilder {
            color: self.color,
            color_scale: self.color_scale,
            lights: self.lights.clone(),
            clip_planes: self.clip_planes.clone(),
            texture: self.texture.clone(),
            shader: self.shader,
            fog: self.fog,
            render_mode: self.render_mode,
            transparency: self.transparency,
            material: self.material,
            stencil: self.stencil,
            scissor: self.scissor,
        }
    }
}
// getters
impl RenderState {
    #[inline]
    pub fn id(&self) -> RenderStateId {
        self.id
    }

    /// 缓存的 munger 数量
    pub fn munger_count(&self) -> usize {
        self.mungers.lock().entries.len()
    }
}
// tools
impl RenderState {
    /// 逐类别比较，返回不同的类别
    pub fn diff(&self, other: &RenderState) -> StateMask {
        let mut mask = StateMask::empty();
        mask.set(StateMask::COLOR, self.color != other.color);
        mask.set(StateMask::COLOR_SCALE, self.color_scale != other.color_scale);
        mask.set(StateMask::LIGHTING, self.lights != other.lights);
        mask.set(StateMask::CLIP_PLANES, self.clip_planes != other.clip_planes);
        mask.set(StateMask::TEXTURE, self.texture != other.texture);
        mask.set(StateMask::SHADER, self.shader != other.shader);
        mask.set(StateMask::FOG, self.fog != other.fog);
        mask.set(StateMask::RENDER_MODE, self.render_mode != other.render_mode);
        mask.set(StateMask::BLENDING, self.transparency != other.transparency);
        mask.set(StateMask::MATERIAL, self.material != other.material);
        mask.set(StateMask::STENCIL, self.stencil != other.stencil);
        mask.set(StateMask::SCISSOR, self.scissor != other.scissor);
        mask
    }
}

impl std::fmt::Debug for RenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderState")
            .field("id", &self.id)
            .field("color", &self.color)
            .field("color_scale", &self.color_scale.scale)
            .field("lights", &self.lights.on_lights().len())
            .field("clip_planes", &self.clip_planes.on_planes().len())
            .field("texture_stages", &self.texture.stages().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(id: u32, kind: LightKind) -> Light {
        Light {
            id: LightId(id),
            kind,
            color: Vec4::ONE,
        }
    }

    #[test]
    fn test_ambient_lights_sort_last() {
        let attrib = LightAttrib::new([
            light(1, LightKind::Ambient),
            light(2, LightKind::Directional { direction: Vec3::NEG_Z }),
            light(3, LightKind::Ambient),
        ]);
        let ids: Vec<_> = attrib.on_lights().iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(attrib.non_ambient_lights().count(), 1);
        assert_eq!(attrib.ambient_contribution(), Vec4::splat(2.0));
    }

    #[test]
    fn test_diff_reports_changed_categories_only() {
        let a = RenderState::builder().color(ColorAttrib::Flat(Vec4::X)).build();
        let b = a.to_builder().fog(FogAttrib::Exponential {
            color: Vec4::ONE,
            density: 0.1,
        });
        let b = b.build();

        assert_ne!(a.id(), b.id());
        assert_eq!(a.diff(&b), StateMask::FOG);
        assert_eq!(a.diff(&a), StateMask::empty());
    }

    #[test]
    fn test_alpha_only_scale() {
        let alpha = ColorScaleAttrib {
            scale: Vec4::new(1.0, 1.0, 1.0, 0.5),
        };
        assert!(alpha.has_alpha_only_scale());
        let rgb = ColorScaleAttrib {
            scale: Vec4::new(0.5, 1.0, 1.0, 0.5),
        };
        assert!(!rgb.has_alpha_only_scale());
        assert!(!ColorScaleAttrib::default().has_scale());
    }
}
