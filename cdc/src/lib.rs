pub mod concurrency;
pub mod conversions;
pub mod error;
pub mod macros;
pub mod signal;
pub mod snapshot;
pub mod store;
pub mod types;
