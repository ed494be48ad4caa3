pub mod barrier;
pub mod command_buffer;
pub mod command_log;
pub mod command_recorder;
pub mod fence;
