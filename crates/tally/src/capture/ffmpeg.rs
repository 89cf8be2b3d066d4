//! Capture backend that records through an ffmpeg child process.

use crate::{
    AppError, AppResult,
    capture::{
        claim::DeviceClaim,
        progress::{ProgressParser, ProgressUpdate},
    },
    config::CaptureConfig,
};

use std::{
    collections::HashMap,
    panic::Location,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use chrono::Local;
use error_location::ErrorLocation;
use tally_core::{
    CAPTURE_EVENT_BUFFER, CameraFacing, CaptureBackend, CaptureEvent, CoreResult, DeviceHandle,
    FinalizeResult, QualityProfile, RecordingHandle, SessionError, clip_file_name,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, Command},
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A bound camera: the exclusive claim plus the parameters frozen at bind.
struct BoundDevice {
    node: PathBuf,
    quality: QualityProfile,
    // Held for its lock; released when the entry is removed.
    _claim: DeviceClaim,
}

/// A live encode keyed by its recording handle.
struct ActiveRecording {
    device_id: Uuid,
    /// Taken on the first stop request so `q` is written at most once.
    stdin: Option<ChildStdin>,
    driver: JoinHandle<()>,
}

/// [`CaptureBackend`] implementation on top of an `ffmpeg` child process.
///
/// `bind` checks the device node exists and takes a cross-process claim on
/// it. `start_recording` spawns ffmpeg with `-progress pipe:1` and a driver
/// task that translates the progress stream into capture events. A graceful
/// stop writes `q` to the encoder's stdin; `unbind` aborts whatever is
/// still running, which kills the child.
pub(crate) struct FfmpegBackend {
    ffmpeg: PathBuf,
    capture: CaptureConfig,
    clips_dir: PathBuf,
    claim_dir: PathBuf,
    devices: Mutex<HashMap<Uuid, BoundDevice>>,
    recordings: Mutex<HashMap<Uuid, ActiveRecording>>,
}

impl FfmpegBackend {
    /// Build a backend. Fails when no ffmpeg binary can be found.
    #[track_caller]
    pub(crate) fn new(
        capture: CaptureConfig,
        clips_dir: PathBuf,
        claim_dir: PathBuf,
    ) -> AppResult<Self> {
        let ffmpeg = match &capture.ffmpeg_path {
            Some(path) => path.clone(),
            None => which::which("ffmpeg").map_err(|e| AppError::ConfigError {
                reason: format!("ffmpeg not found on PATH: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?,
        };

        info!(ffmpeg = %ffmpeg.display(), clips_dir = %clips_dir.display(), "Capture backend ready");

        Ok(Self {
            ffmpeg,
            capture,
            clips_dir,
            claim_dir,
            devices: Mutex::new(HashMap::new()),
            recordings: Mutex::new(HashMap::new()),
        })
    }

    fn device_node(&self, camera: CameraFacing) -> &Path {
        match camera {
            CameraFacing::Back => &self.capture.back_device,
            CameraFacing::Front => &self.capture.front_device,
        }
    }

    fn recording_args(
        &self,
        node: &Path,
        quality: QualityProfile,
        audio_enabled: bool,
        output: &Path,
    ) -> Vec<String> {
        let (width, height) = quality.dimensions();

        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "warning".into(),
            "-nostats".into(),
            "-y".into(),
            "-f".into(),
            "v4l2".into(),
            "-framerate".into(),
            self.capture.framerate.to_string(),
            "-video_size".into(),
            format!("{width}x{height}"),
            "-i".into(),
            node.to_string_lossy().into_owned(),
        ];

        if audio_enabled {
            args.extend([
                "-f".into(),
                "alsa".into(),
                "-i".into(),
                self.capture.audio_device.clone(),
            ]);
        }

        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "veryfast".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]);

        if audio_enabled {
            args.extend(["-c:a".into(), "aac".into(), "-b:a".into(), "128k".into()]);
        } else {
            args.push("-an".into());
        }

        args.extend([
            "-movflags".into(),
            "+faststart".into(),
            "-progress".into(),
            "pipe:1".into(),
            output.to_string_lossy().into_owned(),
        ]);

        args
    }
}

#[async_trait]
impl CaptureBackend for FfmpegBackend {
    #[instrument(skip(self))]
    async fn bind(
        &self,
        camera: CameraFacing,
        quality: QualityProfile,
    ) -> CoreResult<DeviceHandle> {
        let node = self.device_node(camera).to_path_buf();

        if let Err(e) = tokio::fs::metadata(&node).await {
            return Err(SessionError::DeviceUnavailable {
                reason: format!("{} is not present: {e}", node.display()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let claim = DeviceClaim::acquire(&self.claim_dir, &node).map_err(|e| {
            SessionError::DeviceUnavailable {
                reason: format!("{} is claimed by another recorder: {e}", node.display()),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;

        let handle = DeviceHandle::new();

        self.devices.lock().await.insert(
            handle.id(),
            BoundDevice {
                node,
                quality,
                _claim: claim,
            },
        );

        debug!(device_id = %handle.id(), "Device bound");

        Ok(handle)
    }

    #[instrument(skip(self, device))]
    async fn start_recording(
        &self,
        device: &DeviceHandle,
        audio_enabled: bool,
    ) -> CoreResult<(RecordingHandle, mpsc::Receiver<CaptureEvent>)> {
        let (node, quality) = {
            let devices = self.devices.lock().await;
            let bound = devices
                .get(&device.id())
                .ok_or_else(|| SessionError::StartFailed {
                    reason: "device is not bound".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })?;
            (bound.node.clone(), bound.quality)
        };

        tokio::fs::create_dir_all(&self.clips_dir)
            .await
            .map_err(|e| SessionError::StartFailed {
                reason: format!(
                    "cannot create clip directory {}: {e}",
                    self.clips_dir.display()
                ),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let output = self.clips_dir.join(clip_file_name(Local::now()));
        let args = self.recording_args(&node, quality, audio_enabled, &output);

        debug!(ffmpeg = %self.ffmpeg.display(), ?args, "Spawning encoder");

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::StartFailed {
                reason: format!("failed to spawn ffmpeg: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let stdin = child.stdin.take();
        let (events_tx, events_rx) = mpsc::channel(CAPTURE_EVENT_BUFFER);
        let driver = tokio::spawn(drive_encoder(child, output, events_tx));

        let handle = RecordingHandle::new();

        self.recordings.lock().await.insert(
            handle.id(),
            ActiveRecording {
                device_id: device.id(),
                stdin,
                driver,
            },
        );

        info!(recording_id = %handle.id(), "Encoder started");

        Ok((handle, events_rx))
    }

    #[instrument(skip(self, recording))]
    async fn request_stop(&self, recording: &RecordingHandle) {
        let stdin = {
            let mut recordings = self.recordings.lock().await;
            recordings
                .get_mut(&recording.id())
                .and_then(|active| active.stdin.take())
        };

        match stdin {
            Some(mut stdin) => {
                // ffmpeg treats `q` on stdin as a graceful quit; closing the
                // pipe afterwards covers builds that only watch for EOF.
                if let Err(e) = stdin.write_all(b"q").await {
                    warn!(recording_id = %recording.id(), error = %e, "Encoder stdin write failed");
                }
                let _ = stdin.shutdown().await;

                debug!(recording_id = %recording.id(), "Graceful stop requested");
            }
            None => {
                debug!(recording_id = %recording.id(), "Stop already requested or recording gone");
            }
        }
    }

    #[instrument(skip(self, device))]
    async fn unbind(&self, device: DeviceHandle) {
        // Tear down any encode still attached before the claim is released.
        let stale: Vec<ActiveRecording> = {
            let mut recordings = self.recordings.lock().await;
            let ids: Vec<Uuid> = recordings
                .iter()
                .filter(|(_, active)| active.device_id == device.id())
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| recordings.remove(&id))
                .collect()
        };

        for active in stale {
            if !active.driver.is_finished() {
                warn!(device_id = %device.id(), "Aborting live encoder during unbind");
            }
            // Dropping the child via abort kills the encoder outright.
            active.driver.abort();
        }

        if self.devices.lock().await.remove(&device.id()).is_some() {
            debug!(device_id = %device.id(), "Device unbound");
        } else {
            debug!(device_id = %device.id(), "Unbind for unknown device");
        }
    }
}

/// Pump one encoder's progress stream into capture events.
///
/// Owns the child process; aborting this task drops it, and kill-on-drop
/// reaps the encoder.
async fn drive_encoder(mut child: Child, output: PathBuf, events: mpsc::Sender<CaptureEvent>) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Keep the last stderr line around as the failure reason.
    let stderr_task = stderr.map(|stderr| {
        tokio::spawn(async move {
            let mut tail = None;
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if !line.is_empty() {
                    debug!(line = %line, "ffmpeg");
                    tail = Some(line);
                }
            }
            tail
        })
    });

    let mut parser = ProgressParser::default();
    let mut started = false;

    if let Some(stdout) = stdout {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parser.feed_line(&line) {
                Some(ProgressUpdate::Block { bytes_recorded }) => {
                    if started {
                        let _ = events.send(CaptureEvent::Status { bytes_recorded }).await;
                    } else {
                        started = true;
                        let _ = events
                            .send(CaptureEvent::Started {
                                output: output.clone(),
                            })
                            .await;
                    }
                }
                Some(ProgressUpdate::End) => break,
                None => {}
            }
        }
    }

    let status = child.wait().await;

    let stderr_tail = match stderr_task {
        Some(task) => task.await.ok().flatten(),
        None => None,
    };

    let event = match status {
        Ok(status) if status.success() => {
            if output_written(&output).await {
                CaptureEvent::Finalized(FinalizeResult::Saved { output })
            } else {
                let reason = stderr_tail
                    .unwrap_or_else(|| format!("{} was never written", output.display()));
                finalize_failure(started, reason)
            }
        }
        Ok(status) => {
            let reason = stderr_tail.unwrap_or_else(|| format!("ffmpeg exited with {status}"));
            finalize_failure(started, reason)
        }
        Err(e) => finalize_failure(started, format!("failed to wait for ffmpeg: {e}")),
    };

    let _ = events.send(event).await;
}

/// A clip counts as written when it exists and is non-empty.
async fn output_written(output: &Path) -> bool {
    match tokio::fs::metadata(output).await {
        Ok(metadata) => metadata.len() > 0,
        Err(_) => false,
    }
}

fn finalize_failure(started: bool, reason: String) -> CaptureEvent {
    if started {
        CaptureEvent::Finalized(FinalizeResult::Failed { reason })
    } else {
        CaptureEvent::Fault { reason }
    }
}
