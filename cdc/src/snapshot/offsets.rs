//! Persistence of the snapshot context into the connector's durable offset record.
//!
//! The context contributes three string fields to the offset record. Restores fail
//! fast on malformed fields: silently resuming from a wrong position would corrupt
//! the exactly-once guarantees of the snapshot.

use std::collections::BTreeMap;

use crate::conversions::{decode_key, encode_key};
use crate::error::CdcResult;
use crate::snapshot::context::IncrementalSnapshotContext;
use crate::snapshot::queue::CollectionQueue;

/// String-keyed offset record merged into the connector's durable offsets.
pub type OffsetMap = BTreeMap<String, String>;

/// Offset field holding the comma-joined list of collections still to snapshot.
pub const COLLECTIONS_TO_SNAPSHOT_KEY: &str = "incremental_snapshot_collections";

/// Offset field holding the encoded key of the last event sent downstream.
pub const EVENT_PRIMARY_KEY: &str = "incremental_snapshot_primary_key";

/// Offset field holding the encoded maximum key of the collection being scanned.
pub const TABLE_MAXIMUM_KEY: &str = "incremental_snapshot_maximum_key";

impl IncrementalSnapshotContext {
    /// Merges the snapshot state into `offset`.
    ///
    /// Once no collections remain the context leaves no trace in persisted offsets
    /// and the record is returned unchanged. Key fields are written only when
    /// present: a chunk in flight that has not sent an event yet persists the queue
    /// alone.
    pub fn store(&self, mut offset: OffsetMap) -> CdcResult<OffsetMap> {
        if !self.snapshot_running() {
            return Ok(offset);
        }

        if let Some(key) = self.last_event_key_sent() {
            offset.insert(EVENT_PRIMARY_KEY.to_string(), encode_key(key)?);
        }
        if let Some(key) = self.maximum_key() {
            offset.insert(TABLE_MAXIMUM_KEY.to_string(), encode_key(key)?);
        }
        offset.insert(
            COLLECTIONS_TO_SNAPSHOT_KEY.to_string(),
            self.queue().to_persistable_string(),
        );

        Ok(offset)
    }

    /// Rebuilds a context from persisted offsets.
    ///
    /// Any or all fields may be absent: no collections field means no snapshot was
    /// in progress, absent key fields mean no chunk had sent an event yet. The first
    /// post-restart chunk resumes from the last key that reached the downstream log,
    /// so the restored chunk end position is taken from that field; no in-flight
    /// chunk id survives the restart. Malformed fields abort the restore.
    pub fn restore(offsets: &OffsetMap) -> CdcResult<Self> {
        let chunk_end_position = offsets
            .get(EVENT_PRIMARY_KEY)
            .map(|text| decode_key(EVENT_PRIMARY_KEY, text))
            .transpose()?;
        let maximum_key = offsets
            .get(TABLE_MAXIMUM_KEY)
            .map(|text| decode_key(TABLE_MAXIMUM_KEY, text))
            .transpose()?;
        let collections_to_snapshot = match offsets.get(COLLECTIONS_TO_SNAPSHOT_KEY) {
            Some(text) => CollectionQueue::from_persistable_string(text)?,
            None => CollectionQueue::new(),
        };

        Ok(Self::restored(
            collections_to_snapshot,
            chunk_end_position,
            maximum_key,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{CollectionId, CompositeKey, KeyValue};

    fn key(value: i64) -> CompositeKey {
        CompositeKey::new(vec![KeyValue::I64(value)])
    }

    fn running_context() -> IncrementalSnapshotContext {
        let mut context = IncrementalSnapshotContext::new();
        context.add_collections(vec![
            "public.t1".parse().unwrap(),
            "public.t2".parse().unwrap(),
        ]);
        context
    }

    #[test]
    fn store_is_a_noop_when_no_snapshot_is_running() {
        let context = IncrementalSnapshotContext::new();
        let mut offset = OffsetMap::new();
        offset.insert("source_lsn".to_string(), "0/16B3748".to_string());

        let stored = context.store(offset.clone()).unwrap();

        assert_eq!(stored, offset);
    }

    #[test]
    fn store_merges_snapshot_fields_into_existing_offsets() {
        let mut context = running_context();
        context.set_maximum_key(key(1000));
        context.send_event(key(42));

        let mut offset = OffsetMap::new();
        offset.insert("source_lsn".to_string(), "0/16B3748".to_string());

        let stored = context.store(offset).unwrap();

        assert_eq!(stored.get("source_lsn").map(String::as_str), Some("0/16B3748"));
        assert_eq!(
            stored.get(COLLECTIONS_TO_SNAPSHOT_KEY).map(String::as_str),
            Some("public.t1,public.t2")
        );
        assert!(stored.contains_key(EVENT_PRIMARY_KEY));
        assert!(stored.contains_key(TABLE_MAXIMUM_KEY));
    }

    #[test]
    fn store_omits_absent_key_fields() {
        let context = running_context();

        let stored = context.store(OffsetMap::new()).unwrap();

        assert!(stored.contains_key(COLLECTIONS_TO_SNAPSHOT_KEY));
        assert!(!stored.contains_key(EVENT_PRIMARY_KEY));
        assert!(!stored.contains_key(TABLE_MAXIMUM_KEY));
    }

    #[test]
    fn restore_resumes_the_chunk_from_the_last_sent_key() {
        let mut context = running_context();
        context.set_maximum_key(key(1000));
        context.send_event(key(42));
        let stored = context.store(OffsetMap::new()).unwrap();

        let restored = IncrementalSnapshotContext::restore(&stored).unwrap();

        assert!(restored.snapshot_running());
        assert_eq!(restored.collections_remaining(), 2);
        // The next chunk resumes from the last key that reached the downstream log.
        assert_eq!(restored.chunk_end_position(), Some(&key(42)));
        assert!(restored.is_non_initial_chunk());
        assert_eq!(restored.maximum_key(), Some(&key(1000)));
        assert!(restored.last_event_key_sent().is_none());
        assert!(restored.current_chunk_id().is_none());
        assert!(!restored.deduplication_needed());
    }

    #[test]
    fn restore_with_only_collections_field() {
        let mut offsets = OffsetMap::new();
        offsets.insert(
            COLLECTIONS_TO_SNAPSHOT_KEY.to_string(),
            "public.t1,public.t2".to_string(),
        );

        let restored = IncrementalSnapshotContext::restore(&offsets).unwrap();

        assert!(restored.snapshot_running());
        assert_eq!(
            restored.current_collection(),
            Some(&"public.t1".parse::<CollectionId>().unwrap())
        );
        assert!(restored.chunk_end_position().is_none());
        assert!(restored.maximum_key().is_none());
    }

    #[test]
    fn restore_from_empty_offsets_yields_an_idle_context() {
        let restored = IncrementalSnapshotContext::restore(&OffsetMap::new()).unwrap();

        assert!(!restored.snapshot_running());
        assert!(restored.chunk_end_position().is_none());
    }

    #[test]
    fn restore_fails_fast_on_a_malformed_key_field() {
        let mut offsets = OffsetMap::new();
        offsets.insert(
            COLLECTIONS_TO_SNAPSHOT_KEY.to_string(),
            "public.t1".to_string(),
        );
        offsets.insert(EVENT_PRIMARY_KEY.to_string(), "zz-not-hex".to_string());

        let err = IncrementalSnapshotContext::restore(&offsets).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
        assert!(err.to_string().contains(EVENT_PRIMARY_KEY));
        assert!(err.to_string().contains("zz-not-hex"));
    }

    #[test]
    fn restore_fails_fast_on_a_malformed_collection_list() {
        let mut offsets = OffsetMap::new();
        offsets.insert(
            COLLECTIONS_TO_SNAPSHOT_KEY.to_string(),
            "public.t1,.broken".to_string(),
        );

        let err = IncrementalSnapshotContext::restore(&offsets).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCollectionId);
    }
}
