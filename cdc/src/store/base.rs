use std::future::Future;

use crate::error::CdcResult;
use crate::snapshot::OffsetMap;

/// Trait for loading and saving the connector's durable offset record.
///
/// [`OffsetStore`] implementations define where the committed offsets live. The
/// snapshot coordinator performs read-modify-write cycles through this trait when
/// checkpointing, so implementations should ensure thread-safety and handle
/// concurrent access to the record.
pub trait OffsetStore {
    /// Returns the most recently committed offset record, empty when none was ever
    /// saved.
    fn load_offsets(&self) -> impl Future<Output = CdcResult<OffsetMap>> + Send;

    /// Replaces the committed offset record.
    ///
    /// The record must be written atomically: a reader never observes a partially
    /// updated record.
    fn save_offsets(&self, offsets: OffsetMap) -> impl Future<Output = CdcResult<()>> + Send;
}
