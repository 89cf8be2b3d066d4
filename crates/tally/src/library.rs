//! Read and delete access to completed clips.

use crate::{AppError, AppResult};

use std::{io, panic::Location, path::PathBuf, time::SystemTime};

use chrono::{DateTime, Local};
use error_location::ErrorLocation;
use serde::Serialize;
use tally_core::is_clip_file_name;
use tracing::{info, instrument};

/// A completed clip on disk.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ClipFile {
    /// Bare file name, also the key for deletion.
    pub(crate) name: String,
    /// Size in bytes.
    pub(crate) size_bytes: u64,
    /// Last modification time.
    pub(crate) modified: DateTime<Local>,
}

/// The directory completed clips land in.
///
/// The session layer only ever appends here; listing and deletion are
/// daemon conveniences for the control surface. Anything that does not
/// follow the clip naming convention is invisible to the library.
pub(crate) struct ClipLibrary {
    clips_dir: PathBuf,
}

impl ClipLibrary {
    pub(crate) fn new(clips_dir: PathBuf) -> Self {
        Self { clips_dir }
    }

    /// All completed clips, newest first.
    #[instrument(skip(self))]
    pub(crate) async fn list(&self) -> AppResult<Vec<ClipFile>> {
        let mut clips = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.clips_dir).await {
            Ok(entries) => entries,
            // A directory that does not exist yet has no clips.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(clips),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_clip_file_name(&name) {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

            clips.push(ClipFile {
                name,
                size_bytes: metadata.len(),
                modified: DateTime::<Local>::from(modified),
            });
        }

        // Clip names embed their start timestamp, so the name is a stable
        // tiebreak when modification times collide.
        clips.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.name.cmp(&a.name))
        });

        Ok(clips)
    }

    /// Delete a clip by bare file name.
    #[instrument(skip(self))]
    pub(crate) async fn delete(&self, name: &str) -> AppResult<()> {
        if !is_safe_clip_name(name) {
            return Err(AppError::LibraryError {
                reason: format!("refusing to delete {name:?}: not a clip name"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let path = self.clips_dir.join(name);

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| AppError::LibraryError {
                reason: format!("cannot delete {name}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!(clip = name, "Clip deleted");

        Ok(())
    }
}

/// A deletable name is a bare clip file name, never a path.
fn is_safe_clip_name(name: &str) -> bool {
    is_clip_file_name(name) && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}
