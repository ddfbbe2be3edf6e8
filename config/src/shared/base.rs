use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Chunk size cannot be zero.
    #[error("`chunk_size` cannot be zero")]
    ChunkSizeZero,
    /// Signal buffer size cannot be zero.
    #[error("`signal_buffer_size` cannot be zero")]
    SignalBufferSizeZero,
}
