use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CdcResult;
use crate::snapshot::queue::CollectionQueue;
use crate::types::{CollectionId, CompositeKey};

/// Current state of an incremental snapshot.
///
/// Tracks the collection queue, the in-flight chunk's key boundaries, the
/// deduplication window flag and the correlation id used to match window signals to
/// the chunk that requested them.
///
/// The aggregate is not safe for unsynchronized concurrent mutation. It must be owned
/// by a single task and driven through [`SnapshotCoordinator`], which serializes the
/// snapshot scan loop, the signal handler and the change-stream hot path onto one
/// mutation point.
///
/// [`SnapshotCoordinator`]: crate::snapshot::SnapshotCoordinator
#[derive(Debug, Default)]
pub struct IncrementalSnapshotContext {
    /// True while the current chunk's deduplication window is active.
    window_opened: bool,
    /// True while the snapshot is paused; chunking stops but streaming continues.
    snapshot_paused: bool,
    /// Upper bound of the chunk currently being fetched; none when no chunk is in
    /// flight.
    chunk_end_position: Option<CompositeKey>,
    /// Collections still awaiting a snapshot pass, in scan order.
    collections_to_snapshot: CollectionQueue,
    /// Key of the most recent row emitted downstream. The first chunk after a restart
    /// resumes from it.
    last_event_key_sent: Option<CompositeKey>,
    /// Correlation id of the in-flight chunk; window signals must carry it as a
    /// prefix.
    current_chunk_id: Option<String>,
    /// The collection's maximum key at snapshot start; scanning stops once a chunk
    /// reaches it.
    maximum_key: Option<CompositeKey>,
}

impl IncrementalSnapshotContext {
    /// Creates an empty context with no snapshot in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a context from restored offset fields.
    ///
    /// The restored chunk end position is the last key known to have reached the
    /// downstream log; no in-flight chunk id or open window survives a restart.
    pub(crate) fn restored(
        collections_to_snapshot: CollectionQueue,
        chunk_end_position: Option<CompositeKey>,
        maximum_key: Option<CompositeKey>,
    ) -> Self {
        Self {
            window_opened: false,
            snapshot_paused: false,
            chunk_end_position,
            collections_to_snapshot,
            last_event_key_sent: None,
            current_chunk_id: None,
            maximum_key,
        }
    }

    pub(crate) fn queue(&self) -> &CollectionQueue {
        &self.collections_to_snapshot
    }

    /// Opens the deduplication window for the chunk identified by `id`.
    ///
    /// Signal delivery is at-least-once and may straddle a restart, so signals
    /// replayed for a superseded chunk carry a stale id; they are ignored and the
    /// call returns `false`.
    pub fn open_window(&mut self, id: &str) -> bool {
        if self.not_expected_chunk(id) {
            info!(
                id,
                expected = ?self.current_chunk_id,
                "received request to open window for a different chunk, request ignored"
            );
            return false;
        }

        debug!("opening window for incremental snapshot chunk");
        self.window_opened = true;
        true
    }

    /// Closes the deduplication window for the chunk identified by `id`.
    ///
    /// Same correlation rule as [`IncrementalSnapshotContext::open_window`].
    pub fn close_window(&mut self, id: &str) -> bool {
        if self.not_expected_chunk(id) {
            info!(
                id,
                expected = ?self.current_chunk_id,
                "received request to close window for a different chunk, request ignored"
            );
            return false;
        }

        debug!("closing window for incremental snapshot chunk");
        self.window_opened = false;
        true
    }

    /// A window signal is applied only when its id starts with the current chunk id:
    /// producers append suffixes to the chunk id, and replayed or out-of-order
    /// signals must stay inert.
    fn not_expected_chunk(&self, id: &str) -> bool {
        match &self.current_chunk_id {
            Some(chunk_id) => !id.starts_with(chunk_id.as_str()),
            None => true,
        }
    }

    /// Returns `true` while change events overlapping the current chunk must be
    /// deduplicated against the in-flight snapshot read.
    pub fn deduplication_needed(&self) -> bool {
        self.window_opened
    }

    /// Records the key of a row that was emitted to the downstream log.
    pub fn send_event(&mut self, key: CompositeKey) {
        self.last_event_key_sent = Some(key);
    }

    /// Returns the key of the most recent row emitted downstream.
    pub fn last_event_key_sent(&self) -> Option<&CompositeKey> {
        self.last_event_key_sent.as_ref()
    }

    /// Sets the upper bound for the next chunk scan query.
    pub fn next_chunk_position(&mut self, end: CompositeKey) {
        self.chunk_end_position = Some(end);
    }

    /// Returns the upper bound of the chunk currently being fetched.
    pub fn chunk_end_position(&self) -> Option<&CompositeKey> {
        self.chunk_end_position.as_ref()
    }

    /// Returns `true` iff a chunk is outstanding for the collection at the head of
    /// the queue, i.e. the next query resumes from a prior bound instead of starting
    /// fresh.
    pub fn is_non_initial_chunk(&self) -> bool {
        self.chunk_end_position.is_some()
    }

    /// Abandons the in-flight chunk.
    ///
    /// The next chunk boundary is re-derived from the last successfully sent key
    /// instead of a partially computed bound, and the window is forced closed.
    pub fn revert_chunk(&mut self) {
        self.chunk_end_position = self.last_event_key_sent.clone();
        self.window_opened = false;
    }

    fn reset_chunk(&mut self) {
        self.last_event_key_sent = None;
        self.chunk_end_position = None;
        self.maximum_key = None;
    }

    /// Advances to the next collection, clearing all chunk fields, and returns the
    /// previous head of the queue.
    pub fn next_collection(&mut self) -> Option<CollectionId> {
        self.reset_chunk();
        self.collections_to_snapshot.dequeue_head()
    }

    /// Generates a fresh correlation id for the chunk about to be scanned and
    /// returns it. Window signals for the chunk must carry this id as a prefix.
    pub fn start_new_chunk(&mut self) -> &str {
        let chunk_id = Uuid::new_v4().to_string();
        debug!(chunk_id, "starting new chunk");

        self.current_chunk_id.insert(chunk_id).as_str()
    }

    /// Returns the correlation id of the in-flight chunk.
    pub fn current_chunk_id(&self) -> Option<&str> {
        self.current_chunk_id.as_deref()
    }

    /// Records the collection's maximum key at snapshot start.
    pub fn set_maximum_key(&mut self, key: CompositeKey) {
        self.maximum_key = Some(key);
    }

    /// Returns the maximum key recorded at snapshot start, the stopping condition
    /// for the per-collection chunk loop.
    pub fn maximum_key(&self) -> Option<&CompositeKey> {
        self.maximum_key.as_ref()
    }

    /// Returns `true` while collections remain to be snapshotted.
    pub fn snapshot_running(&self) -> bool {
        !self.collections_to_snapshot.is_empty()
    }

    /// Returns `true` while the snapshot is paused.
    pub fn snapshot_paused(&self) -> bool {
        self.snapshot_paused
    }

    /// Pauses chunking; streaming and the open-window state are unaffected.
    pub fn pause_snapshot(&mut self) {
        info!("pausing incremental snapshot");
        self.snapshot_paused = true;
    }

    /// Resumes chunking after a pause.
    pub fn resume_snapshot(&mut self) {
        info!("resuming incremental snapshot");
        self.snapshot_paused = false;
    }

    /// Returns the collection currently (or about to be) scanned.
    pub fn current_collection(&self) -> Option<&CollectionId> {
        self.collections_to_snapshot.peek_head()
    }

    /// Returns the number of collections still awaiting a snapshot pass.
    pub fn collections_remaining(&self) -> usize {
        self.collections_to_snapshot.len()
    }

    /// Appends already-parsed identifiers to the snapshot queue.
    pub fn add_collections(&mut self, ids: Vec<CollectionId>) {
        self.collections_to_snapshot.enqueue_all(ids);
    }

    /// Parses and appends collections requested via a signal mid-run, returning the
    /// parsed identifiers. A parse failure leaves the queue untouched.
    pub fn add_collection_names(&mut self, names: &[String]) -> CdcResult<Vec<CollectionId>> {
        let mut added = Vec::with_capacity(names.len());
        for name in names {
            added.push(name.parse::<CollectionId>()?);
        }

        self.collections_to_snapshot.enqueue_all(added.iter().cloned());
        Ok(added)
    }

    /// Stops the snapshot: drops all pending collections and clears chunk state.
    pub fn stop_snapshot(&mut self) {
        info!(
            remaining = self.collections_to_snapshot.len(),
            "stopping incremental snapshot"
        );

        self.collections_to_snapshot.clear();
        self.reset_chunk();
        self.window_opened = false;
        self.snapshot_paused = false;
    }
}
