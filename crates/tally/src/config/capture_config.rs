use crate::config::{
    default_audio_device, default_back_device, default_framerate, default_front_device,
};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Capture pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// V4L2 device node for the main camera.
    #[serde(default = "default_back_device")]
    pub back_device: PathBuf,
    /// V4L2 device node for the user-facing camera.
    #[serde(default = "default_front_device")]
    pub front_device: PathBuf,
    /// ALSA device name for the audio track.
    #[serde(default = "default_audio_device")]
    pub audio_device: String,
    /// Capture frame rate.
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Explicit ffmpeg binary path. Discovered on PATH when unset.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            back_device: default_back_device(),
            front_device: default_front_device(),
            audio_device: default_audio_device(),
            framerate: default_framerate(),
            ffmpeg_path: None,
        }
    }
}
