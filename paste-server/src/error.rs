//! Error translation for the upload session and HTTP retrieval surface.

use thiserror::Error;

use paste_api_types::{AccessError, InputError};
use paste_datastore::ContainerError;

/// Everything that can end an upload session early. The session driver
/// turns every variant into an `error` control frame and an unconditional
/// temp-file cleanup.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("passphrase-derived id is already in use, resample and retry")]
    Collision,

    #[error("chunk count exceeds the per-blob limit of {0}")]
    ChunkLimitExceeded(u32),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// HTTP-facing error carrying the status code the retrieval endpoints
/// translate failures into, mirroring the teacher's `HttpError` struct
/// threaded through `proxmox-rest-server`.
#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    pub status: http::StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: http::StatusCode, message: impl Into<String>) -> Self {
        HttpError {
            status,
            message: message.into(),
        }
    }
}

impl From<AccessError> for HttpError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Forbidden => HttpError::new(http::StatusCode::FORBIDDEN, "forbidden"),
            AccessError::BadRequest(msg) => HttpError::new(http::StatusCode::BAD_REQUEST, msg),
        }
    }
}

impl From<InputError> for HttpError {
    fn from(err: InputError) -> Self {
        HttpError::new(http::StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        HttpError::new(http::StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}
