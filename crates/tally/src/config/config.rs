//! Configuration management for tally.
//!
//! Handles loading and saving TOML configuration files with cross-platform
//! paths and atomic write operations.

use crate::{
    AppError, AppResult,
    config::{CaptureConfig, ServerConfig, StorageConfig},
};

use std::{
    fs,
    io::Write,
    panic::Location,
    path::{Path, PathBuf},
};

use directories::{ProjectDirs, UserDirs};
use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};
use tally_core::{RecordingConfig, clip_directory};
use tracing::{debug, info, instrument};

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Capture pipeline configuration.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Default parameters for new recording sessions.
    #[serde(default)]
    pub recording: RecordingConfig,
    /// HTTP control surface configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Clip storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from disk, creating default if not found.
    #[track_caller]
    #[instrument]
    pub fn load() -> AppResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let config = Self::load_from(&config_path)?;

            info!(config_path = ?config_path, "Configuration loaded");

            Ok(config)
        } else {
            info!("No config found, creating default");
            Self::create_default()
        }
    }

    /// Load configuration from an explicit path.
    #[track_caller]
    pub fn load_from(config_path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(config_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to read config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(config)
    }

    /// Save configuration to disk using atomic write pattern.
    ///
    /// Writes to a temporary file first, then renames to prevent corruption
    /// if the process crashes during the write.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn save(&self) -> AppResult<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;

        info!(config_path = ?config_path, "Configuration saved (atomic write)");

        Ok(())
    }

    /// Save configuration to an explicit path using atomic write pattern.
    #[track_caller]
    pub fn save_to(&self, config_path: &Path) -> AppResult<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        // Atomic write: write to temp file then rename
        let temp_path = config_path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to create temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::ConfigError {
                reason: format!("Failed to write temp config file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        temp_file.sync_all().map_err(|e| AppError::ConfigError {
            reason: format!("Failed to sync temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::rename(&temp_path, config_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to rename temp config to final: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(())
    }

    /// Resolve the directory completed clips are written to.
    ///
    /// An explicit `storage.clips_dir` is used as-is; otherwise the clip
    /// directory is placed under the user's public video directory.
    #[track_caller]
    pub fn clips_dir(&self) -> AppResult<PathBuf> {
        if let Some(dir) = &self.storage.clips_dir {
            return Ok(dir.clone());
        }

        let user_dirs = UserDirs::new().ok_or_else(|| AppError::ConfigError {
            reason: "Failed to get user directories".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let videos = match user_dirs.video_dir() {
            Some(dir) => dir.to_path_buf(),
            None => user_dirs.home_dir().join("Videos"),
        };

        Ok(clip_directory(&videos))
    }

    /// Directory for per-device claim files.
    ///
    /// Prefers the runtime directory so stale claims disappear on reboot.
    #[track_caller]
    pub fn claim_dir() -> AppResult<PathBuf> {
        let proj_dirs = Self::project_dirs()?;

        let claim_dir = match proj_dirs.runtime_dir() {
            Some(dir) => dir.join("claims"),
            None => proj_dirs.data_dir().join("claims"),
        };

        Ok(claim_dir)
    }

    /// Directory daily log files are written to.
    #[track_caller]
    pub fn log_dir() -> AppResult<PathBuf> {
        let proj_dirs = Self::project_dirs()?;

        let log_dir = proj_dirs.data_dir().join("logs");

        if !log_dir.exists() {
            fs::create_dir_all(&log_dir)?;
        }

        Ok(log_dir)
    }

    /// The socket address the control surface binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    #[track_caller]
    fn config_path() -> AppResult<PathBuf> {
        let proj_dirs = Self::project_dirs()?;

        let config_dir = proj_dirs.config_dir();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            debug!(config_dir = ?config_dir, "Created config directory");
        }

        Ok(config_dir.join("config.toml"))
    }

    #[track_caller]
    fn project_dirs() -> AppResult<ProjectDirs> {
        ProjectDirs::from("io", "tally", "Tally").ok_or_else(|| AppError::ConfigError {
            reason: "Failed to get project directories".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    #[track_caller]
    fn create_default() -> AppResult<Self> {
        let config = Config {
            capture: CaptureConfig::default(),
            recording: RecordingConfig::default(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
        };

        config.save()?;

        info!("Default config created");

        Ok(config)
    }
}
