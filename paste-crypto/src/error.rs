//! Error kinds for the cryptographic core.
//!
//! The AEAD core and container format never recover internally — every
//! fallible operation here returns one of these and lets the caller (the
//! upload session, or the retrieval endpoint) decide how to translate it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported key width")]
    BadKey,

    #[error("chunk counter exceeded the 2^20 safety limit")]
    ChunkLimitExceeded,

    #[error("AEAD authentication failed")]
    AuthFailure,

    #[error("metadata envelope is malformed: {0}")]
    BadMetadataFormat(&'static str),

    #[error("hkdf expansion exceeds 255 * 32 bytes")]
    HkdfOutputTooLong,

    #[error(transparent)]
    Input(#[from] paste_api_types::InputError),

    #[error("openssl error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}
