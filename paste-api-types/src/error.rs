//! Typed error kinds shared across the workspace.
//!
//! The bulk of the code still propagates failures with `anyhow`, matching
//! the teacher; these enums exist only where callers need to match on a
//! specific *kind* of failure rather than just log and bail.

use thiserror::Error;

/// Errors raised while validating caller-supplied input, before any state
/// change has happened. Never wraps an I/O or cryptographic failure.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum InputError {
    #[error("unsupported key width: {0} bytes (expected 16, 24 or 32)")]
    UnsupportedKeyWidth(usize),

    #[error("unsupported file-id width: {0} bits (expected 64, 128, 192 or 256)")]
    UnsupportedIdWidth(u32),

    #[error("malformed passphrase")]
    MalformedPassphrase,

    #[error("declared upload size {declared} exceeds configured maximum {max}")]
    OversizedBlob { declared: u64, max: u64 },

    #[error("token contains characters outside the base64url alphabet")]
    UnsafeTokenChars,

    #[error("malformed file identifier '{0}'")]
    MalformedId(String),

    #[error("invalid passphrase word count {0} (expected 3 to 8)")]
    InvalidWordCount(usize),
}

/// HTTP-facing authorization/availability errors. A bad token and a
/// nonexistent object must be indistinguishable to the caller, so there is
/// deliberately no separate `NotFound` variant here.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum AccessError {
    #[error("forbidden")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<InputError> for AccessError {
    fn from(err: InputError) -> Self {
        AccessError::BadRequest(err.to_string())
    }
}
