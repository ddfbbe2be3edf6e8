use std::time::{Duration, Instant};

use cdc::concurrency::shutdown::create_shutdown_channel;
use cdc::error::ErrorKind;
use cdc::signal::{
    EXECUTE_SNAPSHOT, STOP_SNAPSHOT, Signal, SignalHandler, SignalOutcome,
    spawn_signal_dispatcher,
};
use cdc::snapshot::SnapshotCoordinator;
use config::shared::{ConnectorConfig, SnapshotConfig};
use rand::random;
use telemetry::tracing::init_test_tracing;
use tokio::time::sleep;

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

macro_rules! wait_until {
    ($condition:expr, $what:expr) => {{
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while !$condition {
            assert!(Instant::now() < deadline, "timed out waiting for {}", $what);
            sleep(Duration::from_millis(10)).await;
        }
    }};
}

#[tokio::test]
async fn dispatcher_drives_a_snapshot_through_signals() {
    init_test_tracing();

    let config = ConnectorConfig {
        id: random(),
        snapshot: SnapshotConfig::default(),
    };
    config.validate().unwrap();

    let coordinator = SnapshotCoordinator::new(config.snapshot.clone());
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let (signal_tx, dispatcher) = spawn_signal_dispatcher(
        coordinator.clone(),
        shutdown_rx,
        config.snapshot.signal_buffer_size,
    );

    // Request a snapshot of two collections mid-run.
    let execute = Signal::parse(
        "snap-1",
        EXECUTE_SNAPSHOT,
        Some(r#"{"data-collections": ["public.t1", "public.t2"]}"#),
    )
    .unwrap();
    signal_tx.send(execute).await.unwrap();
    wait_until!(
        coordinator.collections_remaining().await == 2,
        "collections to be queued"
    );
    assert!(coordinator.snapshot_running().await);

    // Open the window for the in-flight chunk through the signal path.
    let chunk_id = coordinator.start_new_chunk().await;
    signal_tx.send(Signal::open_window(&chunk_id)).await.unwrap();
    wait_until!(
        coordinator.deduplication_needed().await,
        "the window to open"
    );

    // A close signal for a stale chunk must stay inert. The pause signal behind it
    // doubles as a sequencing marker: once the pause is observed, the stale close
    // has been processed.
    signal_tx
        .send(Signal::close_window("stale-chunk"))
        .await
        .unwrap();
    signal_tx
        .send(Signal::parse("p-1", "pause-snapshot", None).unwrap())
        .await
        .unwrap();
    wait_until!(coordinator.snapshot_paused().await, "the pause to apply");
    assert!(coordinator.deduplication_needed().await);

    signal_tx
        .send(Signal::parse("r-1", "resume-snapshot", None).unwrap())
        .await
        .unwrap();
    wait_until!(
        !coordinator.snapshot_paused().await,
        "the resume to apply"
    );

    // Close the window with the correctly correlated id.
    signal_tx.send(Signal::close_window(&chunk_id)).await.unwrap();
    wait_until!(
        !coordinator.deduplication_needed().await,
        "the window to close"
    );

    // Stop the snapshot entirely.
    signal_tx
        .send(Signal::parse("s-1", STOP_SNAPSHOT, None).unwrap())
        .await
        .unwrap();
    wait_until!(
        !coordinator.snapshot_running().await,
        "the snapshot to stop"
    );

    shutdown_tx.send(()).unwrap();
    dispatcher.await.unwrap();
}

#[tokio::test]
async fn dispatcher_stops_when_all_senders_are_dropped() {
    init_test_tracing();

    let coordinator = SnapshotCoordinator::new(SnapshotConfig::default());
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let (signal_tx, dispatcher) = spawn_signal_dispatcher(coordinator, shutdown_rx, 8);

    drop(signal_tx);
    dispatcher.await.unwrap();
}

#[tokio::test]
async fn handler_reports_window_outcomes() {
    init_test_tracing();

    let coordinator = SnapshotCoordinator::new(SnapshotConfig::default());
    coordinator
        .add_collection_names(&["public.t1".to_string()])
        .await
        .unwrap();
    let handler = SignalHandler::new(coordinator.clone());

    // No chunk in flight yet: the window signal is ignored, not an error.
    let outcome = handler.handle(Signal::open_window("no-chunk")).await.unwrap();
    assert_eq!(outcome, SignalOutcome::Ignored);

    let chunk_id = coordinator.start_new_chunk().await;
    let outcome = handler.handle(Signal::open_window(&chunk_id)).await.unwrap();
    assert_eq!(outcome, SignalOutcome::Applied);
    assert!(coordinator.deduplication_needed().await);
}

#[tokio::test]
async fn handler_rejects_unparsable_collection_names() {
    init_test_tracing();

    let coordinator = SnapshotCoordinator::new(SnapshotConfig::default());
    let handler = SignalHandler::new(coordinator.clone());

    let execute = Signal::parse(
        "snap-1",
        EXECUTE_SNAPSHOT,
        Some(r#"{"data-collections": ["public.t1", "not..valid"]}"#),
    )
    .unwrap();

    let err = handler.handle(execute).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCollectionId);
    // The malformed request left the queue untouched.
    assert_eq!(coordinator.collections_remaining().await, 0);
}
