mod base;
mod connector;
mod snapshot;

pub use base::*;
pub use connector::*;
pub use snapshot::*;
