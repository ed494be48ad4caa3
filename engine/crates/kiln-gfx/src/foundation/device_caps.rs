use ash::vk;

bitflags::bitflags! {
    /// 设备可以直接消费的 shader 方言
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct GfxShaderDialects: u32 {
        const SPIR_V = 1 << 0;
        const GLSL = 1 << 1;
        const HLSL = 1 << 2;
        const SLANG = 1 << 3;
    }
}

/// 设备能力
///
/// 状态同步与 drawable 准备阶段在使用某个特性之前都需要先查询这里。
/// 某项能力缺失时应当降级（例如截断灯光数量），而不是失败。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxDeviceCaps {
    /// 同时生效的硬件灯光槽位数
    pub max_lights: u32,
    /// 同时生效的裁剪平面数
    pub max_clip_planes: u32,
    /// 单次绘制可以绑定的纹理 stage 数
    pub max_texture_stages: u32,
    /// 最多的 color attachment 数量
    pub max_color_targets: u32,
    pub shader_dialects: GfxShaderDialects,
    /// 是否存在支持 compute 的 queue family
    pub supports_compute: bool,
}

impl GfxDeviceCaps {
    /// Vulkan 没有固定管线灯光，槽位数量由生成的 shader 决定
    pub const SHADER_LIGHT_SLOTS: u32 = 8;
    /// 纹理 stage 的上限，即使设备报告的 descriptor 数量更多
    pub const MAX_TEXTURE_STAGES: u32 = 16;
}

impl Default for GfxDeviceCaps {
    fn default() -> Self {
        Self {
            max_lights: Self::SHADER_LIGHT_SLOTS,
            max_clip_planes: 8,
            max_texture_stages: 8,
            max_color_targets: 8,
            shader_dialects: GfxShaderDialects::SPIR_V,
            supports_compute: true,
        }
    }
}

// new & init
impl GfxDeviceCaps {
    /// 从 physical device 的 limits 与 queue family 推导能力
    pub fn from_physical_device(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> Self {
        let props = unsafe { instance.get_physical_device_properties(pdevice) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
        let limits = &props.limits;

        let caps = Self {
            max_lights: Self::SHADER_LIGHT_SLOTS,
            max_clip_planes: limits.max_clip_distances,
            max_texture_stages: limits.max_per_stage_descriptor_sampled_images.min(Self::MAX_TEXTURE_STAGES),
            max_color_targets: limits.max_color_attachments,
            shader_dialects: GfxShaderDialects::SPIR_V,
            supports_compute: queue_families.iter().any(|q| q.queue_flags.contains(vk::QueueFlags::COMPUTE)),
        };
        log::info!("device caps: {:?}", caps);
        caps
    }
}

// tools
impl GfxDeviceCaps {
    /// 截断到设备支持的灯光数量
    #[inline]
    pub fn clamp_lights(&self, requested: usize) -> usize {
        requested.min(self.max_lights as usize)
    }

    #[inline]
    pub fn clamp_clip_planes(&self, requested: usize) -> usize {
        requested.min(self.max_clip_planes as usize)
    }

    #[inline]
    pub fn clamp_texture_stages(&self, requested: usize) -> usize {
        requested.min(self.max_texture_stages as usize)
    }

    #[inline]
    pub fn supports_dialect(&self, dialect: GfxShaderDialects) -> bool {
        self.shader_dialects.contains(dialect)
    }
}
