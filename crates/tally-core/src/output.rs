use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Prefix of every clip file name.
pub const CLIP_FILE_PREFIX: &str = "VID_";

/// Extension of every clip file, without the dot.
pub const CLIP_FILE_EXTENSION: &str = "mp4";

/// Name of the dedicated clip directory under the public video location.
pub const CLIP_DIRECTORY: &str = "Tally";

const CLIP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// File name for a clip started at the given wall-clock time, e.g.
/// `VID_20250823_141530.mp4`.
pub fn clip_file_name(started_at: DateTime<Local>) -> String {
    format!(
        "{CLIP_FILE_PREFIX}{}.{CLIP_FILE_EXTENSION}",
        started_at.format(CLIP_TIMESTAMP_FORMAT)
    )
}

/// The dedicated clip directory under a public video root.
pub fn clip_directory(videos_root: &Path) -> PathBuf {
    videos_root.join(CLIP_DIRECTORY)
}

/// Whether a file name follows the clip naming convention.
pub fn is_clip_file_name(name: &str) -> bool {
    name.starts_with(CLIP_FILE_PREFIX) && name.ends_with(&format!(".{CLIP_FILE_EXTENSION}"))
}
