use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::CdcResult;
use crate::signal::types::{Signal, SignalOutcome, SignalPayload};
use crate::snapshot::SnapshotCoordinator;

/// Applies typed signals to the snapshot state.
///
/// Window-correlation mismatches are expected redelivery noise and are reported as
/// [`SignalOutcome::Ignored`] rather than errors; only structurally invalid requests
/// (e.g. unparsable collection names) fail.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    coordinator: SnapshotCoordinator,
}

impl SignalHandler {
    /// Creates a handler applying signals through `coordinator`.
    pub fn new(coordinator: SnapshotCoordinator) -> Self {
        Self { coordinator }
    }

    /// Applies a single signal and reports what happened.
    pub async fn handle(&self, signal: Signal) -> CdcResult<SignalOutcome> {
        match signal.payload() {
            SignalPayload::OpenWindow => {
                Ok(outcome(self.coordinator.open_window(signal.id()).await))
            }
            SignalPayload::CloseWindow => {
                Ok(outcome(self.coordinator.close_window(signal.id()).await))
            }
            SignalPayload::AddCollections { names } => {
                let added = self.coordinator.add_collection_names(names).await?;
                info!(
                    count = added.len(),
                    "added collections to the incremental snapshot"
                );
                Ok(SignalOutcome::Applied)
            }
            SignalPayload::StopSnapshot => {
                self.coordinator.stop_snapshot().await;
                Ok(SignalOutcome::Applied)
            }
            SignalPayload::PauseSnapshot => {
                self.coordinator.pause_snapshot().await;
                Ok(SignalOutcome::Applied)
            }
            SignalPayload::ResumeSnapshot => {
                self.coordinator.resume_snapshot().await;
                Ok(SignalOutcome::Applied)
            }
        }
    }
}

fn outcome(applied: bool) -> SignalOutcome {
    if applied {
        SignalOutcome::Applied
    } else {
        SignalOutcome::Ignored
    }
}

/// Spawns the background task draining a signal channel into a [`SignalHandler`].
///
/// Funneling every signal through one task keeps signal-driven mutation on the same
/// serialized mutation point as the snapshot scan loop. The task stops when the
/// shutdown channel fires or every sender is dropped.
pub fn spawn_signal_dispatcher(
    coordinator: SnapshotCoordinator,
    mut shutdown_rx: ShutdownRx,
    buffer: usize,
) -> (mpsc::Sender<Signal>, JoinHandle<()>) {
    let (signal_tx, mut signal_rx) = mpsc::channel(buffer);
    let handler = SignalHandler::new(coordinator);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("signal dispatcher shutting down");
                    break;
                }
                maybe_signal = signal_rx.recv() => {
                    let Some(signal) = maybe_signal else {
                        debug!("signal channel closed, dispatcher stopping");
                        break;
                    };

                    match handler.handle(signal).await {
                        // Ignored window signals are already logged where the
                        // correlation check happens.
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "failed to apply signal"),
                    }
                }
            }
        }
    });

    (signal_tx, handle)
}
