use crate::{
    session::{event::SessionEvent, monitor::DurationMonitor},
    tests::support::WAIT_TIMEOUT,
};

use std::time::Duration;

use tokio::{
    sync::mpsc,
    time::{Instant, sleep, timeout},
};
use uuid::Uuid;

/// WHAT: With a one-minute ceiling the monitor delivers sixty ticks and then
/// a single threshold event before ending on its own.
/// WHY: The auto-stop trigger must fire exactly once, and only after the
/// full minute has elapsed.
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_one_minute_ceiling_then_sixty_ticks_and_one_threshold_event() {
    // Given: A monitor with a one-minute ceiling
    let session_id = Uuid::new_v4();
    let (events_tx, mut events) = mpsc::channel(128);
    let _monitor = DurationMonitor::start(
        session_id,
        Instant::now(),
        Some(Duration::from_secs(60)),
        events_tx,
    );

    // When: The stream is drained up to the threshold event
    let mut ticks = Vec::new();
    loop {
        match timeout(WAIT_TIMEOUT, events.recv()).await.unwrap() {
            Some(SessionEvent::Tick { elapsed, .. }) => ticks.push(elapsed),
            Some(SessionEvent::DurationReached { session_id: id }) => {
                assert_eq!(id, session_id);
                break;
            }
            other => panic!("expected tick or threshold event, got {other:?}"),
        }
    }

    // Then: Sixty ticks came first, the last one at the ceiling itself
    assert_eq!(ticks.len(), 60);
    assert_eq!(ticks.first().copied().unwrap(), Duration::from_secs(1));
    assert_eq!(ticks.last().copied().unwrap(), Duration::from_secs(60));

    // Then: Nothing follows the threshold event; the task has ended
    assert!(timeout(WAIT_TIMEOUT, events.recv()).await.unwrap().is_none());
}

/// WHAT: Without a ceiling the monitor ticks until canceled, and
/// cancellation closes the stream without a stray threshold event.
/// WHY: An unlimited session's monitor must end through cancel alone.
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_no_ceiling_when_canceled_then_ticks_stop_without_threshold_event() {
    let session_id = Uuid::new_v4();
    let (events_tx, mut events) = mpsc::channel(128);
    let monitor = DurationMonitor::start(session_id, Instant::now(), None, events_tx);

    // Given: A few ticks have been observed
    for _ in 0..3 {
        let event = timeout(WAIT_TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert!(matches!(event, SessionEvent::Tick { .. }));
    }

    // When: The monitor is canceled
    monitor.cancel().await;

    // Then: Only ticks remain buffered, and the stream closes behind them
    while let Some(event) = events.recv().await {
        assert!(matches!(event, SessionEvent::Tick { .. }));
    }
}

/// WHAT: Canceling a monitor whose task already ended on its own still
/// returns cleanly.
/// WHY: Teardown always cancels; a self-terminated monitor must not wedge
/// it.
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_monitor_finished_on_its_own_when_canceled_then_cancel_returns() {
    let session_id = Uuid::new_v4();
    let (events_tx, mut events) = mpsc::channel(8);
    let monitor = DurationMonitor::start(
        session_id,
        Instant::now(),
        Some(Duration::from_secs(1)),
        events_tx,
    );

    // Given: The ceiling has fired and the task has ended
    let mut saw_threshold = false;
    while let Some(event) = events.recv().await {
        if matches!(event, SessionEvent::DurationReached { .. }) {
            saw_threshold = true;
        }
    }
    assert!(saw_threshold);

    // When / Then: Cancel still completes
    monitor.cancel().await;
}

/// WHAT: When the event queue is full, ticks are dropped but the threshold
/// event still arrives once space frees up.
/// WHY: Elapsed-time updates are cosmetic; the auto-stop trigger is not.
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_full_queue_then_ticks_dropped_but_threshold_event_delivered() {
    let session_id = Uuid::new_v4();

    // Given: Room for a single event and a two-second ceiling
    let (events_tx, mut events) = mpsc::channel(1);
    let _monitor = DurationMonitor::start(
        session_id,
        Instant::now(),
        Some(Duration::from_secs(2)),
        events_tx,
    );

    // When: Nobody reads until after the ceiling has passed
    sleep(Duration::from_secs(3)).await;

    // Then: The first tick filled the queue, the second was dropped, and the
    // threshold event lands as soon as the queue drains
    match events.recv().await {
        Some(SessionEvent::Tick { elapsed, .. }) => assert_eq!(elapsed, Duration::from_secs(1)),
        other => panic!("expected the first tick, got {other:?}"),
    }
    match timeout(WAIT_TIMEOUT, events.recv()).await.unwrap() {
        Some(SessionEvent::DurationReached { session_id: id }) => assert_eq!(id, session_id),
        other => panic!("expected the threshold event, got {other:?}"),
    }
    assert!(timeout(WAIT_TIMEOUT, events.recv()).await.unwrap().is_none());
}
