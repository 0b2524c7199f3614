//! Structural errors raised while parsing or validating the on-disk/on-wire
//! blob layout, independent of the filesystem errors the object store raises.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("metadata iv must not be all-zero")]
    ZeroMetadataIv,

    #[error("metadata length {0} outside the valid range [17, 1048576]")]
    BadMetadataLen(u32),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("chunk of length {0} exceeds the configured chunk size plus AEAD tag")]
    OversizedChunk(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
