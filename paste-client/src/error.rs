//! Error kinds surfaced to front-ends driving a send or receive operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Crypto(#[from] paste_crypto::CryptoError),

    #[error(transparent)]
    Container(#[from] paste_datastore::ContainerError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("malformed metadata json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("server rejected the request: {0}")]
    ServerError(String),

    #[error("object not found or token mismatch")]
    Forbidden,

    #[error("request rejected: {0}")]
    BadRequest(String),

    #[error("unexpected end of stream")]
    UnexpectedEof,
}
