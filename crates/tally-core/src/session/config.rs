use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which camera a session captures from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// The primary, rear-facing camera.
    Back,
    /// The secondary, user-facing camera.
    Front,
}

impl CameraFacing {
    /// Human-readable name for notifications and status output.
    pub fn display_name(&self) -> &'static str {
        match self {
            CameraFacing::Back => "Back camera",
            CameraFacing::Front => "Front camera",
        }
    }
}

/// Target capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityProfile {
    /// 1280x720.
    #[serde(rename = "720p")]
    Hd720,
    /// 1920x1080.
    #[serde(rename = "1080p")]
    Hd1080,
    /// 3840x2160.
    #[serde(rename = "4k")]
    Uhd4k,
}

impl QualityProfile {
    /// Frame dimensions as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            QualityProfile::Hd720 => (1280, 720),
            QualityProfile::Hd1080 => (1920, 1080),
            QualityProfile::Uhd4k => (3840, 2160),
        }
    }

    /// Human-readable name for notifications and status output.
    pub fn display_name(&self) -> &'static str {
        match self {
            QualityProfile::Hd720 => "720p HD",
            QualityProfile::Hd1080 => "1080p Full HD",
            QualityProfile::Uhd4k => "4K Ultra HD",
        }
    }
}

/// Parameters for one capture session.
///
/// Snapshotted by the controller when a session starts; changing the
/// daemon's stored defaults never affects a session already in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Camera to capture from.
    #[serde(default = "default_camera")]
    pub camera: CameraFacing,

    /// Target resolution.
    #[serde(default = "default_quality")]
    pub quality: QualityProfile,

    /// Capture an audio track alongside video.
    #[serde(default = "default_audio_enabled")]
    pub audio_enabled: bool,

    /// Auto-stop ceiling in minutes. Zero means unlimited.
    #[serde(default)]
    pub max_duration_minutes: u32,

    /// Auto-stop when the battery drops to the threshold while discharging.
    #[serde(default = "default_stop_at_low_battery")]
    pub stop_at_low_battery: bool,

    /// Battery percentage at which the auto-stop fires.
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: u8,
}

impl RecordingConfig {
    /// The configured duration ceiling, if any.
    pub fn max_duration(&self) -> Option<Duration> {
        if self.max_duration_minutes == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.max_duration_minutes) * 60))
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            camera: default_camera(),
            quality: default_quality(),
            audio_enabled: default_audio_enabled(),
            max_duration_minutes: 0,
            stop_at_low_battery: default_stop_at_low_battery(),
            low_battery_threshold: default_low_battery_threshold(),
        }
    }
}

fn default_camera() -> CameraFacing {
    CameraFacing::Back
}

fn default_quality() -> QualityProfile {
    QualityProfile::Hd1080
}

fn default_audio_enabled() -> bool {
    true
}

fn default_stop_at_low_battery() -> bool {
    true
}

fn default_low_battery_threshold() -> u8 {
    10
}
