use serde::{Deserialize, Serialize};

use crate::shared::{SnapshotConfig, ValidationError};

/// Configuration for a connector task.
///
/// A connector id determines isolation between connectors in terms of offset
/// records, so two tasks with the same id must never run against the same store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// The unique identifier for this connector task.
    pub id: u64,
    /// Incremental snapshot settings.
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl ConnectorConfig {
    /// Validates connector configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.snapshot.validate()
    }
}
