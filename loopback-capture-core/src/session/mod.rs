pub mod capture;
pub mod device_directory;
pub mod recorder;
