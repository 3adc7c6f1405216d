//! Per-installation device identity.

pub mod file;

pub use file::DeviceIdStore;
