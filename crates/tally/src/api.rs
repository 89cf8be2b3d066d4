//! HTTP control surface for the daemon.
//!
//! Provides loopback endpoints for:
//! - Session control (start, stop, status)
//! - Clip library access (list, delete)

use crate::{
    AppError, AppResult,
    library::ClipLibrary,
};

use std::{panic::Location, sync::Arc};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
};
use error_location::ErrorLocation;
use serde::Deserialize;
use serde_json::{Value, json};
use tally_core::{
    CameraFacing, QualityProfile, RecordingConfig, RecordingState, SessionHandle, format_elapsed,
};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

/// Shared state behind every endpoint.
#[derive(Clone)]
pub(crate) struct ApiState {
    /// Commands into, and state out of, the session controller.
    pub(crate) handle: SessionHandle,
    /// Stored defaults new sessions start from.
    pub(crate) defaults: RecordingConfig,
    /// Completed clips on disk.
    pub(crate) library: Arc<ClipLibrary>,
}

/// Request body for the start endpoint.
/// All fields are optional - anything unset falls back to the stored defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StartRequest {
    /// Camera to capture from.
    #[serde(default)]
    pub(crate) camera: Option<CameraFacing>,
    /// Target resolution.
    #[serde(default)]
    pub(crate) quality: Option<QualityProfile>,
    /// Capture an audio track alongside video.
    #[serde(default)]
    pub(crate) audio_enabled: Option<bool>,
    /// Auto-stop ceiling in minutes. Zero means unlimited.
    #[serde(default)]
    pub(crate) max_duration_minutes: Option<u32>,
}

impl StartRequest {
    /// The stored defaults with this request's overrides applied.
    pub(crate) fn apply_to(self, mut config: RecordingConfig) -> RecordingConfig {
        if let Some(camera) = self.camera {
            config.camera = camera;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(audio_enabled) = self.audio_enabled {
            config.audio_enabled = audio_enabled;
        }
        if let Some(minutes) = self.max_duration_minutes {
            config.max_duration_minutes = minutes;
        }
        config
    }
}

/// Creates the control router with all endpoints.
pub(crate) fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/status", get(session_status))
        .route("/record/start", post(start_recording))
        .route("/record/stop", post(stop_recording))
        .route("/clips", get(list_clips))
        .route("/clips/{name}", delete(delete_clip))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Bind and serve the control surface until shutdown is signalled.
pub(crate) async fn serve(
    listen_addr: String,
    state: ApiState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> AppResult<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr.as_str())
        .await
        .map_err(|e| AppError::ServerError {
            reason: format!("cannot bind {listen_addr}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    info!("Control surface listening on http://{listen_addr}");
    info!("Endpoints:");
    info!("  GET    /              - Service info");
    info!("  GET    /status        - Session status");
    info!("  POST   /record/start  - Start a recording session");
    info!("  POST   /record/stop   - Stop the recording session");
    info!("  GET    /clips         - List completed clips");
    info!("  DELETE /clips/{{name}}  - Delete a clip");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
        .map_err(|e| AppError::ServerError {
            reason: format!("server failed: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(())
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "tally",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Gets the current session status.
///
/// # Response
/// Returns JSON with the session phase and the stored defaults; while
/// recording it also carries the elapsed time and the in-progress output.
async fn session_status(State(state): State<ApiState>) -> Json<Value> {
    let session = state.handle.state();

    let mut body = json!({
        "phase": session.phase(),
        "defaults": state.defaults,
    });

    match &session {
        RecordingState::Recording { started_at, output } => {
            body["elapsed"] = json!(format_elapsed(started_at.elapsed()));
            body["output"] = json!(output);
        }
        RecordingState::Error { reason } => {
            body["reason"] = json!(reason);
        }
        _ => {}
    }

    Json(body)
}

/// Starts a recording session.
///
/// # Request Body
/// Optional JSON overriding any of `camera`, `quality`, `audio_enabled`,
/// `max_duration_minutes` for this session only.
///
/// # Response
/// Returns JSON with the phase the controller settled into.
#[instrument(skip(state, body))]
async fn start_recording(
    State(state): State<ApiState>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<Value>, StatusCode> {
    let overrides = body.map(|Json(req)| req).unwrap_or_default();
    let config = overrides.apply_to(state.defaults.clone());

    info!(
        camera = config.camera.display_name(),
        quality = config.quality.display_name(),
        "Start command received via API"
    );

    match state.handle.start(config).await {
        Ok(()) => {
            // Small delay to allow the state to move
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

            Ok(Json(json!({
                "success": true,
                "phase": state.handle.state().phase(),
            })))
        }
        Err(e) => {
            warn!(error = %e, "Failed to send start command");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Stops the current recording session, if one is active.
///
/// # Response
/// Returns JSON with the phase the controller settled into.
#[instrument(skip(state))]
async fn stop_recording(State(state): State<ApiState>) -> Result<Json<Value>, StatusCode> {
    info!("Stop command received via API");

    match state.handle.stop().await {
        Ok(()) => {
            // Small delay to allow the state to move
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

            Ok(Json(json!({
                "success": true,
                "phase": state.handle.state().phase(),
            })))
        }
        Err(e) => {
            warn!(error = %e, "Failed to send stop command");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Lists completed clips, newest first.
async fn list_clips(State(state): State<ApiState>) -> Result<Json<Value>, StatusCode> {
    match state.library.list().await {
        Ok(clips) => Ok(Json(json!({ "clips": clips }))),
        Err(e) => {
            warn!(error = %e, "Failed to list clips");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Deletes a clip by bare file name.
#[instrument(skip(state))]
async fn delete_clip(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.library.delete(&name).await {
        Ok(()) => Ok(Json(json!({ "success": true, "deleted": name }))),
        Err(e) => {
            warn!(clip = %name, error = %e, "Failed to delete clip");
            Err(StatusCode::NOT_FOUND)
        }
    }
}
