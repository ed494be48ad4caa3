pub mod access;
pub mod memory_block;
pub mod pending_destroy;
pub mod resource_context;
