//! Tally Core Library
//!
//! The capture-session state machine behind the tally daemon: a
//! single-writer controller that acquires exclusive session resources,
//! drives a capture backend through its event protocol, tracks elapsed
//! duration with auto-stop ceilings, and guarantees release of everything
//! it acquired on every termination path.
//!
//! The controller only talks to the outside world through three traits:
//! [`CaptureBackend`] for device I/O and encoding, [`WakeSource`] for
//! keeping the host awake, and [`NotificationPresenter`] for user-facing
//! notices. Wire up implementations, call [`SessionController::new`], spawn
//! [`SessionController::run`], and drive everything through the returned
//! [`SessionHandle`].

mod capture;
mod error;
mod notify;
mod output;
mod session;
mod wake;

pub use {
    capture::{
        CAPTURE_EVENT_BUFFER, CaptureBackend, CaptureEvent, DeviceHandle, FinalizeResult,
        RecordingHandle,
    },
    error::{Result as CoreResult, SessionError},
    notify::{NOTICE_TITLE, Notice, NoticeAction, NotificationPresenter, format_elapsed},
    output::{
        CLIP_DIRECTORY, CLIP_FILE_EXTENSION, CLIP_FILE_PREFIX, clip_directory, clip_file_name,
        is_clip_file_name,
    },
    session::{
        CameraFacing, FINALIZE_TIMEOUT, QualityProfile, RecordingConfig, RecordingState,
        SessionCommand, SessionController, SessionHandle,
    },
    wake::{MAX_WAKE_LIFETIME, WakeSource, WakeToken},
};
