mod capture_config;
#[allow(clippy::module_inception)]
mod config;
mod server_config;
mod storage_config;

pub(crate) use {
    capture_config::CaptureConfig, config::Config, server_config::ServerConfig,
    storage_config::StorageConfig,
};

use std::path::PathBuf;

pub(crate) const DEFAULT_BACK_DEVICE: &str = "/dev/video0";
pub(crate) const DEFAULT_FRONT_DEVICE: &str = "/dev/video1";
pub(crate) const DEFAULT_AUDIO_DEVICE: &str = "default";
pub(crate) const DEFAULT_FRAMERATE: u32 = 30;
pub(crate) const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 8259;

pub(crate) fn default_back_device() -> PathBuf {
    PathBuf::from(DEFAULT_BACK_DEVICE)
}

pub(crate) fn default_front_device() -> PathBuf {
    PathBuf::from(DEFAULT_FRONT_DEVICE)
}

pub(crate) fn default_audio_device() -> String {
    DEFAULT_AUDIO_DEVICE.to_string()
}

pub(crate) fn default_framerate() -> u32 {
    DEFAULT_FRAMERATE
}

pub(crate) fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}
