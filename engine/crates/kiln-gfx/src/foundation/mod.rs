pub mod destroyer;
pub mod device;
pub mod device_caps;
