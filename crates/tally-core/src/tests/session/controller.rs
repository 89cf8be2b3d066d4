use crate::{
    CaptureEvent, FINALIZE_TIMEOUT, MAX_WAKE_LIFETIME, RecordingConfig, RecordingState,
    tests::support::{Harness, StubBackend, StubPresenter, StubWake},
};

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::time::{Instant, sleep};

/// Settle time for commands whose expected outcome is "nothing happens".
const SETTLE: Duration = Duration::from_millis(100);

/// WHAT: A start request takes the controller from Idle through Starting to Recording
/// WHY: The backend's started event, not the start command, authorizes the Recording state
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_idle_controller_when_start_requested_then_recording_reached_via_starting() {
    // Given: An idle controller wired to healthy stubs
    let harness = Harness::spawn();

    // When: A session is requested
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    let state = harness.wait_for_phase("recording").await;

    // Then: The session is recording the backend's output
    assert!(matches!(state, RecordingState::Recording { .. }));
    assert_eq!(harness.wake.acquire_count(), 1);
    assert_eq!(harness.backend.bind_count(), 1);
    assert_eq!(harness.backend.start_count(), 1);

    // Then: The wake hold was bounded by the lifetime ceiling
    assert_eq!(harness.wake.last_lifetime(), Some(MAX_WAKE_LIFETIME));

    // Then: The presenter saw Starting before Recording
    let bodies = harness.presenter.bodies();
    let starting = bodies
        .iter()
        .position(|body| body == "Preparing to record\u{2026}")
        .unwrap();
    let recording = bodies
        .iter()
        .position(|body| body == "Recording\u{2026} 00:00")
        .unwrap();
    assert!(starting < recording);
}

/// WHAT: Stopping a recording session releases every resource exactly once
/// WHY: Wake and device leaks are the failure mode this whole design exists to prevent
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_recording_session_when_stop_requested_then_resources_released_exactly_once() {
    // Given: A recording session
    let harness = Harness::spawn();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: Stop is requested and the backend finalizes
    harness.handle.stop().await.unwrap();
    harness.wait_for_phase("idle").await;

    // Then: Release counts pair with acquisition counts
    assert_eq!(harness.backend.stop_request_count(), 1);
    assert_eq!(harness.backend.unbind_count(), harness.backend.bind_count());
    assert_eq!(harness.wake.release_count(), harness.wake.acquire_count());
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: A second start request during an active session acquires nothing
/// WHY: Double-starts must not double-claim the device or stack wake holds
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_active_session_when_second_start_requested_then_no_additional_acquisitions() {
    // Given: A recording session
    let harness = Harness::spawn();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: Start is requested again without stopping
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    sleep(SETTLE).await;

    // Then: No additional acquire or bind happened and the session is untouched
    assert_eq!(harness.wake.acquire_count(), 1);
    assert_eq!(harness.backend.bind_count(), 1);
    assert_eq!(harness.backend.start_count(), 1);
    assert_eq!(harness.handle.state().phase(), "recording");
}

/// WHAT: A bind failure lands in Error with the wake hold released and zero start calls
/// WHY: Partial acquisition must unwind; a claimed device without a session is a leak
#[tokio::test]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_bind_failure_when_starting_then_error_state_with_wake_released_and_no_start_call() {
    // Given: A backend whose device is unavailable
    let harness = Harness::spawn();
    harness.backend.fail_next_bind();

    // When: A session is requested
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    let state = harness.wait_for_phase("error").await;

    // Then: The failure reason survives into the state
    match state {
        RecordingState::Error { reason } => assert!(reason.contains("stub device offline")),
        other => panic!("expected error state, got {other:?}"),
    }

    // Then: The wake hold was unwound and the recording primitive never started
    assert_eq!(harness.wake.acquire_count(), 1);
    assert_eq!(harness.wake.release_count(), 1);
    assert_eq!(harness.backend.start_count(), 0);
    assert_eq!(harness.backend.unbind_count(), 0);
}

/// WHAT: A start_recording failure unbinds the device and releases the wake hold
/// WHY: The third acquisition step failing must unwind the first two
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_start_failure_when_starting_then_device_unbound_and_wake_released() {
    // Given: A backend that binds but cannot start its primitive
    let harness = Harness::spawn();
    harness.backend.fail_next_start();

    // When: A session is requested
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("error").await;

    // Then: Both earlier acquisitions were unwound
    assert_eq!(harness.backend.bind_count(), 1);
    assert_eq!(harness.backend.unbind_count(), 1);
    assert_eq!(harness.wake.acquire_count(), 1);
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: Stop without an active recording is ignored
/// WHY: The stop surface is callable from signals and HTTP at any time
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_idle_controller_when_stop_requested_then_state_unchanged() {
    // Given: An idle controller
    let harness = Harness::spawn();

    // When: Stop arrives with nothing running
    harness.handle.stop().await.unwrap();
    sleep(SETTLE).await;

    // Then: Nothing happened
    assert_eq!(harness.handle.state(), RecordingState::Idle);
    assert_eq!(harness.backend.stop_request_count(), 0);
    assert_eq!(harness.wake.release_count(), 0);
}

/// WHAT: A second stop while already Stopping does not reach the backend
/// WHY: Teardown must be idempotent under impatient callers
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_stopping_session_when_stop_requested_again_then_single_stop_request() {
    // Given: A recording session whose backend never answers stop requests
    let harness = Harness::spawn();
    harness.backend.swallow_stop_requests();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: Stop is requested twice
    harness.handle.stop().await.unwrap();
    harness.wait_for_phase("stopping").await;
    harness.handle.stop().await.unwrap();
    sleep(SETTLE).await;

    // Then: The backend saw one stop request
    assert_eq!(harness.backend.stop_request_count(), 1);

    // When: The backend finally finalizes
    harness
        .backend
        .emit(CaptureEvent::Finalized(crate::FinalizeResult::Saved {
            output: PathBuf::from("/clips/VID_stub.mp4"),
        }))
        .await;
    harness.wait_for_phase("idle").await;

    // Then: Resources were released once
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: A failed finalize still completes the session into Idle
/// WHY: A botched trailer is a lost clip, not a stuck session
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_finalize_failure_when_stopping_then_session_still_reaches_idle() {
    // Given: A recording session whose backend will fail its finalize
    let harness = Harness::spawn();
    harness.backend.fail_finalize();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: Stop is requested
    harness.handle.stop().await.unwrap();
    let state = harness.wait_for_phase("idle").await;

    // Then: The session ends in Idle, not Error, with resources released
    assert_eq!(state, RecordingState::Idle);
    assert_eq!(harness.wake.release_count(), 1);
    assert_eq!(harness.backend.unbind_count(), 1);
}

/// WHAT: A backend that never finalizes is force-released at the deadline
/// WHY: Resource safety wins over a clean finalize
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_unresponsive_backend_when_stopping_then_forced_release_after_timeout() {
    // Given: A recording session whose backend ignores stop requests
    let harness = Harness::spawn();
    harness.backend.swallow_stop_requests();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: Stop is requested and nothing comes back
    let stop_requested = Instant::now();
    harness.handle.stop().await.unwrap();
    harness.wait_for_phase("idle").await;

    // Then: The finalize deadline expired and resources were force-released
    assert!(stop_requested.elapsed() >= FINALIZE_TIMEOUT);
    assert_eq!(harness.wake.release_count(), 1);
    assert_eq!(harness.backend.unbind_count(), 1);
}

/// WHAT: A battery reading at the threshold stops a recording session
/// WHY: The low-battery path must behave exactly like a requested stop
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_low_battery_report_while_recording_then_session_auto_stops() {
    // Given: A recording session with the default 10 percent threshold
    let harness = Harness::spawn();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: The battery reaches the threshold
    harness.handle.report_battery(10).await.unwrap();
    harness.wait_for_phase("idle").await;

    // Then: The session stopped and released cleanly
    assert_eq!(harness.backend.stop_request_count(), 1);
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: A healthy battery reading leaves the session running
/// WHY: Only threshold crossings may stop a recording
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_healthy_battery_report_while_recording_then_session_continues() {
    // Given: A recording session
    let harness = Harness::spawn();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: A reading above the threshold arrives
    harness.handle.report_battery(55).await.unwrap();
    sleep(SETTLE).await;

    // Then: Still recording
    assert_eq!(harness.handle.state().phase(), "recording");
    assert_eq!(harness.backend.stop_request_count(), 0);
}

/// WHAT: With the battery policy disabled, even a critical reading is ignored
/// WHY: The policy lives in the session's config snapshot
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_battery_policy_disabled_when_low_report_arrives_then_session_continues() {
    // Given: A recording session that opted out of battery stops
    let harness = Harness::spawn();
    let config = RecordingConfig {
        stop_at_low_battery: false,
        ..RecordingConfig::default()
    };
    harness.handle.start(config).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: A critical reading arrives
    harness.handle.report_battery(1).await.unwrap();
    sleep(SETTLE).await;

    // Then: Still recording
    assert_eq!(harness.handle.state().phase(), "recording");
}

/// WHAT: A one-minute ceiling stops the session at the sixty-second tick
/// WHY: Unattended sessions must end on time, not a tick early or late
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_one_minute_ceiling_when_unattended_then_auto_stop_at_sixty_seconds() {
    // Given: A session capped at one minute
    let harness = Harness::spawn();
    let config = RecordingConfig {
        max_duration_minutes: 1,
        ..RecordingConfig::default()
    };
    harness.handle.start(config).await.unwrap();
    harness.wait_for_phase("recording").await;
    let recording_confirmed = Instant::now();

    // When: Nobody stops it
    harness.wait_for_phase("idle").await;

    // Then: The auto-stop fired at the crossing, not before sixty seconds
    // and not after sixty-one
    let elapsed = recording_confirmed.elapsed();
    assert!(elapsed >= Duration::from_secs(60), "stopped early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(61), "stopped late: {elapsed:?}");
    assert_eq!(harness.backend.stop_request_count(), 1);
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: A backend fault during startup fails the session and releases resources
/// WHY: Faults before Recording must unwind exactly like bind failures
#[tokio::test]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_backend_fault_during_startup_then_error_state_and_release() {
    // Given: A backend that the test drives by hand
    let harness = Harness::spawn();
    harness.backend.manual_events();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("starting").await;

    // When: The backend faults before its started event
    harness
        .backend
        .emit(CaptureEvent::Fault {
            reason: "sensor fell off".to_string(),
        })
        .await;
    let state = harness.wait_for_phase("error").await;

    // Then: The fault reason is diagnosable and everything was released
    match state {
        RecordingState::Error { reason } => assert!(reason.contains("sensor fell off")),
        other => panic!("expected error state, got {other:?}"),
    }
    assert_eq!(harness.backend.unbind_count(), 1);
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: A silently dying backend mid-recording fails the session with cleanup
/// WHY: A dead event stream must never leave the controller in Recording
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_stream_closed_mid_recording_then_error_state_and_release() {
    // Given: A recording session driven by hand
    let harness = Harness::spawn();
    harness.backend.manual_events();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("starting").await;
    harness
        .backend
        .emit(CaptureEvent::Started {
            output: PathBuf::from("/clips/VID_stub.mp4"),
        })
        .await;
    harness.wait_for_phase("recording").await;

    // When: The backend drops its stream without finalizing
    harness.backend.close_stream();
    let state = harness.wait_for_phase("error").await;

    // Then: The session failed with resources released
    assert!(matches!(state, RecordingState::Error { .. }));
    assert_eq!(harness.backend.unbind_count(), 1);
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: Shutdown during a recording drives a clean stop before the loop exits
/// WHY: Process exit is a termination path like any other; nothing may leak
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_shutdown_while_recording_then_clean_stop_and_loop_exit() {
    // Given: A recording session
    let harness = Harness::spawn();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: Shutdown is requested
    harness.handle.shutdown().await.unwrap();
    harness.controller.await.unwrap();

    // Then: The session was stopped and released before the loop ended
    assert_eq!(harness.handle.state(), RecordingState::Idle);
    assert_eq!(harness.backend.stop_request_count(), 1);
    assert_eq!(harness.backend.unbind_count(), 1);
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: Shutdown while idle exits immediately
/// WHY: A clean exit must not wait on a session that does not exist
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_shutdown_while_idle_then_loop_exits() {
    // Given: An idle controller
    let harness = Harness::spawn();

    // When: Shutdown is requested
    harness.handle.shutdown().await.unwrap();
    harness.controller.await.unwrap();

    // Then: Nothing was ever acquired
    assert_eq!(harness.wake.acquire_count(), 0);
    assert_eq!(harness.backend.bind_count(), 0);
}

/// WHAT: A fresh start out of the Error state begins a new session
/// WHY: Error is terminal for the session, not for the controller
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_error_state_when_start_requested_then_new_session_begins() {
    // Given: A controller parked in Error after a bind failure
    let harness = Harness::spawn();
    harness.backend.fail_next_bind();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("error").await;

    // When: The device comes back and a new session is requested
    harness.backend.clear_bind_failure();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // When: The new session is stopped
    harness.handle.stop().await.unwrap();
    harness.wait_for_phase("idle").await;

    // Then: Counts pair across both attempts
    assert_eq!(harness.backend.bind_count(), 2);
    assert_eq!(harness.backend.unbind_count(), 1);
    assert_eq!(harness.wake.acquire_count(), 2);
    assert_eq!(harness.wake.release_count(), 2);
}

/// WHAT: A failing presenter has no effect on session transitions
/// WHY: Notification delivery is best-effort by contract
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_failing_presenter_when_session_runs_then_transitions_unaffected() {
    // Given: A presenter that rejects everything
    let harness = Harness::spawn();
    harness.presenter.fail_all();

    // When: A full session runs
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;
    harness.handle.stop().await.unwrap();
    harness.wait_for_phase("idle").await;

    // Then: The session was unaffected
    assert_eq!(harness.wake.release_count(), 1);
}

/// WHAT: A duplicate started event while already Recording changes nothing
/// WHY: Unlisted (state, event) pairs are no-ops by the transition table
#[tokio::test]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_duplicate_started_event_then_state_not_mutated() {
    // Given: A recording session driven by hand
    let harness = Harness::spawn();
    harness.backend.manual_events();
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("starting").await;
    harness
        .backend
        .emit(CaptureEvent::Started {
            output: PathBuf::from("/clips/VID_first.mp4"),
        })
        .await;
    harness.wait_for_phase("recording").await;

    // When: A second started event arrives out of protocol
    harness
        .backend
        .emit(CaptureEvent::Started {
            output: PathBuf::from("/clips/VID_second.mp4"),
        })
        .await;
    sleep(SETTLE).await;

    // Then: The state still carries the first output
    match harness.handle.state() {
        RecordingState::Recording { output, .. } => {
            assert_eq!(output, PathBuf::from("/clips/VID_first.mp4"));
        }
        other => panic!("expected recording state, got {other:?}"),
    }
}

/// WHAT: Stub wiring sanity for custom harnesses
/// WHY: Keeps spawn_with usable for tests that share collaborators
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_custom_stubs_when_spawned_then_harness_wires_them() {
    // Given: Explicit stub instances
    let backend = Arc::new(StubBackend::new());
    let wake = Arc::new(StubWake::new());
    let presenter = Arc::new(StubPresenter::new());

    // When: A harness is assembled from them and a session runs
    let harness = Harness::spawn_with(backend, wake, presenter);
    harness.handle.start(RecordingConfig::default()).await.unwrap();
    harness.wait_for_phase("recording").await;

    // Then: The shared instances saw the calls
    assert_eq!(harness.backend.bind_count(), 1);
    assert_eq!(harness.wake.acquire_count(), 1);
}
