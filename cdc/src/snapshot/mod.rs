//! Incremental snapshot coordination.
//!
//! A large collection is read in ordered key-range chunks while live change-stream
//! processing continues. Every chunk opens a deduplication window bracketed by
//! watermark signals; change events whose keys fall inside the in-flight chunk are
//! suppressed in favor of the snapshot's transactionally consistent read. Progress is
//! persisted into the connector offsets so a restart resumes from the last key that
//! reached the downstream log instead of redoing completed chunks.

mod context;
mod coordinator;
mod offsets;
mod queue;

pub use context::*;
pub use coordinator::*;
pub use offsets::*;
pub use queue::*;
