use std::cmp::Ordering;
use std::sync::Arc;

use config::shared::SnapshotConfig;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::CdcResult;
use crate::snapshot::context::IncrementalSnapshotContext;
use crate::snapshot::offsets::{
    COLLECTIONS_TO_SNAPSHOT_KEY, EVENT_PRIMARY_KEY, TABLE_MAXIMUM_KEY,
};
use crate::store::OffsetStore;
use crate::types::{CollectionId, CompositeKey};

/// Serialized command interface over the snapshot context.
///
/// The context itself is a single-owner aggregate; the coordinator guards it with a
/// mutex so the snapshot scan loop, the signal handler and the change-stream hot path
/// observe and mutate it one at a time. In particular, the dedup decision in
/// [`SnapshotCoordinator::should_suppress`] runs under the same lock as any mutation
/// of the chunk bounds or the window flag.
///
/// Cloning is cheap and shares the underlying context.
#[derive(Debug, Clone)]
pub struct SnapshotCoordinator {
    context: Arc<Mutex<IncrementalSnapshotContext>>,
    config: Arc<SnapshotConfig>,
}

impl SnapshotCoordinator {
    /// Creates a coordinator with an empty context.
    pub fn new(config: SnapshotConfig) -> Self {
        Self::with_context(config, IncrementalSnapshotContext::new())
    }

    /// Creates a coordinator around an existing context.
    pub fn with_context(config: SnapshotConfig, context: IncrementalSnapshotContext) -> Self {
        Self {
            context: Arc::new(Mutex::new(context)),
            config: Arc::new(config),
        }
    }

    /// Restores a coordinator from the offsets held by `store`.
    ///
    /// Malformed offset fields abort the restore; starting a snapshot from an
    /// unknown position is never acceptable.
    pub async fn resume<S: OffsetStore>(config: SnapshotConfig, store: &S) -> CdcResult<Self> {
        let offsets = store.load_offsets().await?;
        let context = IncrementalSnapshotContext::restore(&offsets)?;

        Ok(Self::with_context(config, context))
    }

    /// Merges the snapshot state into the offsets held by `store` and saves them.
    ///
    /// Snapshot fields written by earlier checkpoints are dropped from the loaded
    /// record first, so a finished snapshot leaves no trace while fields owned by
    /// other components survive untouched.
    pub async fn checkpoint<S: OffsetStore>(&self, store: &S) -> CdcResult<()> {
        let mut offsets = store.load_offsets().await?;
        offsets.remove(COLLECTIONS_TO_SNAPSHOT_KEY);
        offsets.remove(EVENT_PRIMARY_KEY);
        offsets.remove(TABLE_MAXIMUM_KEY);

        let offsets = {
            let context = self.context.lock().await;
            context.store(offsets)?
        };

        store.save_offsets(offsets).await
    }

    /// Chunk-size hint for the scan executor issuing bounded range queries.
    pub fn chunk_size(&self) -> u64 {
        self.config.chunk_size
    }

    /// Returns `true` while collections remain to be snapshotted.
    pub async fn snapshot_running(&self) -> bool {
        self.context.lock().await.snapshot_running()
    }

    /// Returns `true` while the snapshot is paused.
    pub async fn snapshot_paused(&self) -> bool {
        self.context.lock().await.snapshot_paused()
    }

    /// Pauses chunking without stopping change-stream processing.
    pub async fn pause_snapshot(&self) {
        self.context.lock().await.pause_snapshot();
    }

    /// Resumes chunking after a pause.
    pub async fn resume_snapshot(&self) {
        self.context.lock().await.resume_snapshot();
    }

    /// Generates and returns a fresh correlation id for the chunk about to be
    /// scanned.
    pub async fn start_new_chunk(&self) -> String {
        self.context.lock().await.start_new_chunk().to_string()
    }

    /// Returns the correlation id of the in-flight chunk.
    pub async fn current_chunk_id(&self) -> Option<String> {
        self.context
            .lock()
            .await
            .current_chunk_id()
            .map(ToString::to_string)
    }

    /// Opens the deduplication window for the chunk identified by `id`; stale ids
    /// are ignored and reported as `false`.
    pub async fn open_window(&self, id: &str) -> bool {
        self.context.lock().await.open_window(id)
    }

    /// Closes the deduplication window for the chunk identified by `id`; stale ids
    /// are ignored and reported as `false`.
    pub async fn close_window(&self, id: &str) -> bool {
        self.context.lock().await.close_window(id)
    }

    /// Returns `true` while the current chunk's deduplication window is open.
    pub async fn deduplication_needed(&self) -> bool {
        self.context.lock().await.deduplication_needed()
    }

    /// Records the key of a row emitted to the downstream log.
    pub async fn send_event(&self, key: CompositeKey) {
        self.context.lock().await.send_event(key);
    }

    /// Sets the upper bound for the next chunk scan query.
    pub async fn next_chunk_position(&self, end: CompositeKey) {
        self.context.lock().await.next_chunk_position(end);
    }

    /// Returns the upper bound of the chunk currently being fetched.
    pub async fn chunk_end_position(&self) -> Option<CompositeKey> {
        self.context.lock().await.chunk_end_position().cloned()
    }

    /// Returns `true` iff the next query resumes from a prior chunk bound.
    pub async fn is_non_initial_chunk(&self) -> bool {
        self.context.lock().await.is_non_initial_chunk()
    }

    /// Abandons the in-flight chunk, rolling the bound back to the last sent key.
    pub async fn revert_chunk(&self) {
        self.context.lock().await.revert_chunk();
    }

    /// Advances to the next collection and returns the previous head of the queue.
    pub async fn next_collection(&self) -> Option<CollectionId> {
        self.context.lock().await.next_collection()
    }

    /// Returns the collection currently (or about to be) scanned.
    pub async fn current_collection(&self) -> Option<CollectionId> {
        self.context.lock().await.current_collection().cloned()
    }

    /// Returns the number of collections still awaiting a snapshot pass.
    pub async fn collections_remaining(&self) -> usize {
        self.context.lock().await.collections_remaining()
    }

    /// Records the collection's maximum key at snapshot start.
    pub async fn set_maximum_key(&self, key: CompositeKey) {
        self.context.lock().await.set_maximum_key(key);
    }

    /// Returns the maximum key recorded at snapshot start.
    pub async fn maximum_key(&self) -> Option<CompositeKey> {
        self.context.lock().await.maximum_key().cloned()
    }

    /// Parses and appends collections requested via a signal mid-run.
    pub async fn add_collection_names(&self, names: &[String]) -> CdcResult<Vec<CollectionId>> {
        self.context.lock().await.add_collection_names(names)
    }

    /// Stops the snapshot, dropping all pending collections.
    pub async fn stop_snapshot(&self) {
        self.context.lock().await.stop_snapshot();
    }

    /// Decides, atomically with respect to chunk mutations, whether an incoming
    /// change event duplicates a row the in-flight chunk will (re-)emit.
    ///
    /// Returns `true` iff the window is open, the event belongs to the collection
    /// being scanned, and `key` falls within the closed interval from the last key
    /// sent to the chunk end position. The snapshot's copy of such rows takes
    /// precedence: it was read transactionally consistent with the window
    /// boundaries. Keys that cannot be compared with the chunk bounds are treated
    /// as outside the window.
    pub async fn should_suppress(&self, collection: &CollectionId, key: &CompositeKey) -> bool {
        let context = self.context.lock().await;

        if !context.deduplication_needed() {
            return false;
        }
        if context.current_collection() != Some(collection) {
            return false;
        }
        let Some(end) = context.chunk_end_position() else {
            return false;
        };

        match key.compare(end) {
            Some(Ordering::Greater) => return false,
            Some(_) => {}
            None => {
                warn!(
                    ?key,
                    chunk_end = ?end,
                    "change event key is not comparable with the chunk bounds, not deduplicating"
                );
                return false;
            }
        }

        match context.last_event_key_sent() {
            None => true,
            Some(lower) => match key.compare(lower) {
                Some(ordering) => ordering != Ordering::Less,
                None => {
                    warn!(
                        ?key,
                        last_sent = ?lower,
                        "change event key is not comparable with the last sent key, not deduplicating"
                    );
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyValue;

    fn key(value: i64) -> CompositeKey {
        CompositeKey::new(vec![KeyValue::I64(value)])
    }

    fn orders() -> CollectionId {
        "public.orders".parse().unwrap()
    }

    async fn coordinator_with_open_window() -> SnapshotCoordinator {
        let coordinator = SnapshotCoordinator::new(SnapshotConfig::default());
        coordinator
            .add_collection_names(&["public.orders".to_string()])
            .await
            .unwrap();
        let chunk_id = coordinator.start_new_chunk().await;
        assert!(coordinator.open_window(&chunk_id).await);
        coordinator
    }

    #[tokio::test]
    async fn suppression_requires_an_open_window() {
        let coordinator = SnapshotCoordinator::new(SnapshotConfig::default());
        coordinator
            .add_collection_names(&["public.orders".to_string()])
            .await
            .unwrap();
        coordinator.next_chunk_position(key(100)).await;

        assert!(!coordinator.should_suppress(&orders(), &key(50)).await);
    }

    #[tokio::test]
    async fn suppression_is_bounded_by_the_chunk_window() {
        let coordinator = coordinator_with_open_window().await;
        coordinator.send_event(key(10)).await;
        coordinator.next_chunk_position(key(100)).await;

        // Inside [last sent, chunk end], inclusive on both ends.
        assert!(coordinator.should_suppress(&orders(), &key(10)).await);
        assert!(coordinator.should_suppress(&orders(), &key(55)).await);
        assert!(coordinator.should_suppress(&orders(), &key(100)).await);

        // Outside the window on either side.
        assert!(!coordinator.should_suppress(&orders(), &key(9)).await);
        assert!(!coordinator.should_suppress(&orders(), &key(101)).await);
    }

    #[tokio::test]
    async fn suppression_without_a_sent_key_has_no_lower_bound() {
        let coordinator = coordinator_with_open_window().await;
        coordinator.next_chunk_position(key(100)).await;

        assert!(coordinator.should_suppress(&orders(), &key(1)).await);
        assert!(!coordinator.should_suppress(&orders(), &key(101)).await);
    }

    #[tokio::test]
    async fn suppression_requires_the_scanned_collection() {
        let coordinator = coordinator_with_open_window().await;
        coordinator.next_chunk_position(key(100)).await;

        let other: CollectionId = "public.users".parse().unwrap();
        assert!(!coordinator.should_suppress(&other, &key(50)).await);
    }

    #[tokio::test]
    async fn incomparable_keys_are_never_suppressed() {
        let coordinator = coordinator_with_open_window().await;
        coordinator.next_chunk_position(key(100)).await;

        let text_key = CompositeKey::new(vec![KeyValue::String("50".to_string())]);
        assert!(!coordinator.should_suppress(&orders(), &text_key).await);
    }
}
