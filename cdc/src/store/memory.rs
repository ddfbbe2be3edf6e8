use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::CdcResult;
use crate::snapshot::OffsetMap;
use crate::store::base::OffsetStore;

/// Inner state of [`MemoryOffsetStore`].
#[derive(Debug, Default)]
struct Inner {
    offsets: OffsetMap,
}

/// In-memory offset storage.
///
/// [`MemoryOffsetStore`] keeps the committed offset record in memory, which is ideal
/// for tests, development and embedded use. Offsets are lost on process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryOffsetStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryOffsetStore {
    /// Creates a new store with an empty offset record.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OffsetStore for MemoryOffsetStore {
    async fn load_offsets(&self) -> CdcResult<OffsetMap> {
        let inner = self.inner.lock().await;

        Ok(inner.offsets.clone())
    }

    async fn save_offsets(&self, offsets: OffsetMap) -> CdcResult<()> {
        let mut inner = self.inner.lock().await;
        inner.offsets = offsets;

        Ok(())
    }
}
