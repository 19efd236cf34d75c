pub mod debug_messenger;
pub mod device;
pub mod physical_device;
