use ash::vk;

/// 会产生写 hazard 的 access flags
pub const GFX_WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::SHADER_WRITE.as_raw()
        | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
        | vk::AccessFlags2::HOST_WRITE.as_raw()
        | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
);

/// 取出 access 中的写操作部分
#[inline]
pub fn write_access_bits(access: vk::AccessFlags2) -> vk::AccessFlags2 {
    access & GFX_WRITE_ACCESS
}

/// 检查是否为写操作
#[inline]
pub fn is_write_access(access: vk::AccessFlags2) -> bool {
    access.intersects(GFX_WRITE_ACCESS)
}
