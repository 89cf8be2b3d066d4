use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use tracing::debug;

/// Exclusive claim on a capture device node.
///
/// Backed by an advisory lock on a per-device file, so the claim holds
/// against other processes as well as other sessions in this one. Dropping
/// the claim releases the lock.
#[derive(Debug)]
pub(crate) struct DeviceClaim {
    file: File,
    path: PathBuf,
}

impl DeviceClaim {
    /// Claim `device` exclusively. Fails when another claim is live.
    pub(crate) fn acquire(claim_dir: &Path, device: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(claim_dir)?;

        let path = claim_dir.join(claim_file_name(device));

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive()?;

        debug!(claim = %path.display(), device = %device.display(), "Device claim taken");

        Ok(Self { file, path })
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        // The lock would also go when the file closes; unlocking here makes
        // the release immediate and loggable.
        let _ = FileExt::unlock(&self.file);
        debug!(claim = %self.path.display(), "Device claim released");
    }
}

/// Claim file name for a device node, e.g. `/dev/video0` -> `video0.lock`.
pub(crate) fn claim_file_name(device: &Path) -> String {
    let name = device
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "device".to_string());

    format!("{name}.lock")
}
