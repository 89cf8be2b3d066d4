mod command;
mod config;
mod controller;
pub(crate) mod event;
pub(crate) mod guard;
pub(crate) mod monitor;
mod state;

pub use {
    command::SessionCommand,
    config::{CameraFacing, QualityProfile, RecordingConfig},
    controller::{FINALIZE_TIMEOUT, SessionController, SessionHandle},
    state::RecordingState,
};
