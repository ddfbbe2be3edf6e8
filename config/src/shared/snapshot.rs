use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_chunk_size() -> u64 {
    1024
}

const fn default_signal_buffer_size() -> usize {
    64
}

/// Configuration for incremental snapshots.
///
/// Controls how the snapshot scan loop sizes its chunk queries and how much signal
/// backlog the dispatcher tolerates before applying backpressure to the transport.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Maximum number of rows fetched by one chunk query.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Capacity of the control-signal channel feeding the dispatcher.
    #[serde(default = "default_signal_buffer_size")]
    pub signal_buffer_size: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            signal_buffer_size: default_signal_buffer_size(),
        }
    }
}

impl SnapshotConfig {
    /// Validates snapshot configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chunk_size == 0 {
            return Err(ValidationError::ChunkSizeZero);
        }

        if self.signal_buffer_size == 0 {
            return Err(ValidationError::SignalBufferSizeZero);
        }

        Ok(())
    }
}
