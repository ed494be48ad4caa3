use ash::vk;
use kiln_gfx::commands::command_recorder::GfxCommandRecorder;
use kiln_render_interface::handles::GfxResourceHandle;
use kiln_render_state::munger::GeomMunger;
use kiln_render_state::state_backend::GfxStateBackend;

/// 几何体绘制
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeomDrawable {
    pub vertex_count: u32,
    pub index_count: u32,
    pub instance_count: u32,
}

/// compute dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputeDrawable {
    pub group_counts: [u32; 3],
}

/// 可以放入 render bin 的对象
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawableKind {
    Geom(GeomDrawable),
    Compute(ComputeDrawable),
}

/// 绘制时对资源的访问方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceAccess {
    /// 在 fragment shader 中采样
    Sampled,
    /// 作为顶点或索引数据读取
    VertexInput,
    /// storage 读
    StorageRead,
    /// storage 写
    StorageWrite,
}

impl ResourceAccess {
    /// `(layout, dst_stage, dst_access)`
    pub fn transition_masks(
        &self,
        kind: &DrawableKind,
    ) -> (vk::ImageLayout, vk::PipelineStageFlags2, vk::AccessFlags2) {
        let shader_stage = match kind {
            DrawableKind::Geom(_) => vk::PipelineStageFlags2::FRAGMENT_SHADER,
            DrawableKind::Compute(_) => vk::PipelineStageFlags2::COMPUTE_SHADER,
        };
        match self {
            Self::Sampled => (
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                shader_stage,
                vk::AccessFlags2::SHADER_SAMPLED_READ,
            ),
            Self::VertexInput => (
                vk::ImageLayout::UNDEFINED,
                vk::PipelineStageFlags2::VERTEX_INPUT,
                vk::AccessFlags2::VERTEX_ATTRIBUTE_READ | vk::AccessFlags2::INDEX_READ,
            ),
            Self::StorageRead => (vk::ImageLayout::GENERAL, shader_stage, vk::AccessFlags2::SHADER_STORAGE_READ),
            Self::StorageWrite => (vk::ImageLayout::GENERAL, shader_stage, vk::AccessFlags2::SHADER_STORAGE_WRITE),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceUse {
    pub handle: GfxResourceHandle,
    pub access: ResourceAccess,
}

/// 场景图中的可绘制对象，以 `Arc` 与场景图共享
#[derive(Clone, Debug)]
pub struct Drawable {
    pub name: String,
    pub kind: DrawableKind,
    /// 绘制前需要驻留并完成 transition 的资源
    pub resources: Vec<ResourceUse>,
}

impl Drawable {
    pub fn geom(name: impl Into<String>, vertex_count: u32) -> Self {
        Self {
            name: name.into(),
            kind: DrawableKind::Geom(GeomDrawable {
                vertex_count,
                index_count: 0,
                instance_count: 1,
            }),
            resources: Vec::new(),
        }
    }

    pub fn compute(name: impl Into<String>, group_counts: [u32; 3]) -> Self {
        Self {
            name: name.into(),
            kind: DrawableKind::Compute(ComputeDrawable { group_counts }),
            resources: Vec::new(),
        }
    }

    pub fn with_resource(mut self, handle: GfxResourceHandle, access: ResourceAccess) -> Self {
        self.resources.push(ResourceUse { handle, access });
        self
    }
}

/// 当前绑定的 GPU context
///
/// 同时是状态命令的接收者与 barrier 的录制者
pub trait DrawTarget: GfxStateBackend + GfxCommandRecorder {
    /// 录制一次几何体绘制；返回 false 表示该对象无法绘制（例如顶点数据无效）
    fn draw_geom(&mut self, geom: &GeomDrawable, munger: &GeomMunger) -> bool;
}
