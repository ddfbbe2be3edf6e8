use serde::Deserialize;

use crate::bail;
use crate::cdc_error;
use crate::error::{CdcResult, ErrorKind};

/// Signal type opening a chunk's deduplication window.
pub const SNAPSHOT_WINDOW_OPEN: &str = "snapshot-window-open";

/// Signal type closing a chunk's deduplication window.
pub const SNAPSHOT_WINDOW_CLOSE: &str = "snapshot-window-close";

/// Signal type requesting an incremental snapshot of additional collections.
pub const EXECUTE_SNAPSHOT: &str = "execute-snapshot";

/// Signal type stopping the in-progress incremental snapshot.
pub const STOP_SNAPSHOT: &str = "stop-snapshot";

/// Signal type pausing the in-progress incremental snapshot.
pub const PAUSE_SNAPSHOT: &str = "pause-snapshot";

/// Signal type resuming a paused incremental snapshot.
pub const RESUME_SNAPSHOT: &str = "resume-snapshot";

/// Data payload of snapshot control signals, as produced by signal tables and
/// topics. Field names follow the producer convention.
#[derive(Debug, Clone, Default, Deserialize)]
struct SignalData {
    #[serde(default, rename = "data-collections")]
    data_collections: Vec<String>,
}

/// A control message delivered by the signal transport.
///
/// The transport framing is not interpreted here: the id doubles as the window
/// correlation token (producers emit window signals with ids prefixed by the chunk
/// id), and the payload captures what the signal asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    id: String,
    payload: SignalPayload,
}

/// What a control signal asks the snapshot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPayload {
    /// Open the deduplication window; the signal id carries the chunk correlation
    /// prefix.
    OpenWindow,
    /// Close the deduplication window; same correlation rule as [`SignalPayload::OpenWindow`].
    CloseWindow,
    /// Append the named collections to the snapshot queue.
    AddCollections { names: Vec<String> },
    /// Stop the snapshot, dropping all pending collections.
    StopSnapshot,
    /// Pause chunking without stopping change-stream processing.
    PauseSnapshot,
    /// Resume chunking after a pause.
    ResumeSnapshot,
}

/// Result of applying a signal to the snapshot state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal was applied.
    Applied,
    /// The signal referenced a chunk other than the in-flight one and was ignored.
    /// Expected redelivery noise, not an error.
    Ignored,
}

impl Signal {
    /// Maps a transport-level `(id, type, data)` triple onto a typed signal.
    ///
    /// Unknown types and malformed data payloads fail with
    /// [`ErrorKind::InvalidSignal`]; correlation with the in-flight chunk is checked
    /// later, when the signal is applied.
    pub fn parse(id: impl Into<String>, signal_type: &str, data: Option<&str>) -> CdcResult<Self> {
        let payload = match signal_type {
            SNAPSHOT_WINDOW_OPEN => SignalPayload::OpenWindow,
            SNAPSHOT_WINDOW_CLOSE => SignalPayload::CloseWindow,
            EXECUTE_SNAPSHOT => {
                let data = parse_data(signal_type, data)?;
                if data.data_collections.is_empty() {
                    bail!(
                        ErrorKind::InvalidSignal,
                        "Execute-snapshot signal names no collections",
                        "the data payload must list at least one entry in 'data-collections'"
                    );
                }
                SignalPayload::AddCollections {
                    names: data.data_collections,
                }
            }
            STOP_SNAPSHOT => SignalPayload::StopSnapshot,
            PAUSE_SNAPSHOT => SignalPayload::PauseSnapshot,
            RESUME_SNAPSHOT => SignalPayload::ResumeSnapshot,
            other => {
                bail!(
                    ErrorKind::InvalidSignal,
                    "Unknown signal type",
                    format!("signal type '{other}' is not supported")
                )
            }
        };

        Ok(Self {
            id: id.into(),
            payload,
        })
    }

    /// Builds the open-window signal a producer emits for `chunk_id`.
    pub fn open_window(chunk_id: &str) -> Self {
        Self {
            id: format!("{chunk_id}-open"),
            payload: SignalPayload::OpenWindow,
        }
    }

    /// Builds the close-window signal a producer emits for `chunk_id`.
    pub fn close_window(chunk_id: &str) -> Self {
        Self {
            id: format!("{chunk_id}-close"),
            payload: SignalPayload::CloseWindow,
        }
    }

    /// Returns the signal id, which window signals correlate to the chunk.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the typed payload.
    pub fn payload(&self) -> &SignalPayload {
        &self.payload
    }
}

fn parse_data(signal_type: &str, data: Option<&str>) -> CdcResult<SignalData> {
    let Some(raw) = data else {
        return Ok(SignalData::default());
    };

    serde_json::from_str(raw).map_err(|err| {
        cdc_error!(
            ErrorKind::InvalidSignal,
            "Malformed signal data payload",
            format!("signal type '{signal_type}' with data '{raw}'"),
            source: err
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_signals() {
        let open = Signal::parse("chunk-1-open", SNAPSHOT_WINDOW_OPEN, None).unwrap();
        assert_eq!(open.id(), "chunk-1-open");
        assert_eq!(open.payload(), &SignalPayload::OpenWindow);

        let close = Signal::parse("chunk-1-close", SNAPSHOT_WINDOW_CLOSE, None).unwrap();
        assert_eq!(close.payload(), &SignalPayload::CloseWindow);
    }

    #[test]
    fn parses_execute_snapshot_with_collections() {
        let signal = Signal::parse(
            "snap-1",
            EXECUTE_SNAPSHOT,
            Some(r#"{"data-collections": ["public.t1", "public.t2"], "type": "incremental"}"#),
        )
        .unwrap();

        assert_eq!(
            signal.payload(),
            &SignalPayload::AddCollections {
                names: vec!["public.t1".to_string(), "public.t2".to_string()]
            }
        );
    }

    #[test]
    fn execute_snapshot_requires_collections() {
        let empty_list = Signal::parse("snap-1", EXECUTE_SNAPSHOT, Some(r#"{"data-collections": []}"#));
        assert_eq!(empty_list.unwrap_err().kind(), ErrorKind::InvalidSignal);

        let no_data = Signal::parse("snap-1", EXECUTE_SNAPSHOT, None);
        assert_eq!(no_data.unwrap_err().kind(), ErrorKind::InvalidSignal);
    }

    #[test]
    fn rejects_unknown_types_and_malformed_data() {
        let unknown = Signal::parse("s", "drop-everything", None);
        assert_eq!(unknown.unwrap_err().kind(), ErrorKind::InvalidSignal);

        let malformed = Signal::parse("s", EXECUTE_SNAPSHOT, Some("{not json"));
        assert_eq!(malformed.unwrap_err().kind(), ErrorKind::InvalidSignal);
    }

    #[test]
    fn producer_window_signal_ids_carry_the_chunk_prefix() {
        let open = Signal::open_window("chunk-7");
        assert_eq!(open.id(), "chunk-7-open");
        assert!(open.id().starts_with("chunk-7"));

        let close = Signal::close_window("chunk-7");
        assert_eq!(close.id(), "chunk-7-close");
    }
}
