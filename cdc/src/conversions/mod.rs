//! Conversions between in-memory key values and their durable offset encodings.

mod hex;
mod key_codec;

pub use hex::*;
pub use key_codec::*;
