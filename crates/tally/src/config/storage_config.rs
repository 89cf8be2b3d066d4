use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Clip storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory completed clips are written to.
    /// The public video directory is used when unset.
    #[serde(default)]
    pub clips_dir: Option<PathBuf>,
}
