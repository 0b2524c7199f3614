//! Drives the client side of the upload wire protocol (§4.4, §6) over a
//! websocket connection, generalizing the teacher's `BackupWriter::start`
//! connect-then-drive shape to this crate's strictly linear
//! init/id/token/header/iv/chunk/complete exchange.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use paste_api_types::{ControlFrame, IdWidthBits, KeyWidth};
use paste_crypto::{
    derive_auth_token, derive_from_passphrase, generate_secret, ChunkEncryptor, MetadataCipher, Secret,
};

use crate::error::ClientError;
use crate::metadata::BlobMetadata;

/// How the sender's file identifier and secret come into being.
pub enum KeyMode {
    /// A fresh secret is drawn locally; the server assigns the id.
    Random {
        key_width: KeyWidth,
        id_width: IdWidthBits,
    },
    /// Both the id and the secret are derived from a shared passphrase; the
    /// sender presents the id to the server instead of waiting for one.
    Passphrase {
        passphrase: String,
        key_width: KeyWidth,
        id_width: IdWidthBits,
    },
}

/// Everything the sender needs to know up front; `size` must be the exact
/// total plaintext length, since `init{size}` is sent before any data.
pub struct UploadRequest {
    pub ws_url: String,
    pub key_mode: KeyMode,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub chunk_size: usize,
}

pub struct UploadOutcome {
    pub id: String,
    pub secret: Secret,
    pub size: u64,
}

/// Upload `plaintext` to the server named by `req.ws_url`, encrypting it in
/// `req.chunk_size`-byte chunks as it is read. Returns the final id, the
/// secret used (so the caller can render a passphrase/URL), and the number
/// of bytes the server acknowledged.
pub async fn upload(
    req: UploadRequest,
    plaintext: impl AsyncRead + Unpin,
) -> Result<UploadOutcome, ClientError> {
    let (mut ws, _response) = connect_async(&req.ws_url).await?;
    drive(&mut ws, req, plaintext).await
}

/// The protocol driver itself, generic over any already-established
/// websocket stream so it can be exercised in tests without dialing out.
async fn drive<S>(
    ws: &mut WebSocketStream<S>,
    req: UploadRequest,
    mut plaintext: impl AsyncRead + Unpin,
) -> Result<UploadOutcome, ClientError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (key_width, secret, pre_derived_id) = match req.key_mode {
        KeyMode::Random { key_width, .. } => (key_width, generate_secret(key_width)?, None),
        KeyMode::Passphrase {
            passphrase,
            key_width,
            id_width,
        } => {
            let (id, secret) = derive_from_passphrase(&passphrase, key_width, id_width)?;
            (key_width, secret, Some(id))
        }
    };

    send_control(ws, &ControlFrame::Init { size: req.size }).await?;

    let id = match pre_derived_id {
        Some(id) => {
            send_control(ws, &ControlFrame::Id { id: id.clone() }).await?;
            id
        }
        None => match recv_control(ws).await? {
            ControlFrame::Id { id } => id,
            other => return Err(unexpected("id", other)),
        },
    };

    let token = derive_auth_token(&secret, &id)?;
    send_control(ws, &ControlFrame::Token { token }).await?;
    match recv_control(ws).await? {
        ControlFrame::TokenAccepted {
            token_accepted: true,
        } => {}
        other => return Err(unexpected("token_accepted", other)),
    }

    let metadata = BlobMetadata {
        filename: req.filename,
        content_type: req.content_type,
        size: req.size as i64,
    };
    let metadata_json = serde_json::to_vec(&metadata)?;
    let envelope = MetadataCipher::encrypt(key_width, secret.as_bytes(), &metadata_json)?;
    ws.send(Message::Binary(envelope)).await?;
    match recv_control(ws).await? {
        ControlFrame::Ready { ready: true } => {}
        other => return Err(unexpected("ready", other)),
    }

    let mut encryptor = ChunkEncryptor::new(key_width, secret.as_bytes())?;
    ws.send(Message::Binary(encryptor.data_iv().to_vec())).await?;

    let mut buf = vec![0u8; req.chunk_size];
    let mut acked_total = 0u64;
    loop {
        let n = plaintext.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let ciphertext = encryptor.encrypt_chunk(&buf[..n])?;
        ws.send(Message::Binary(ciphertext)).await?;
        match recv_control(ws).await? {
            ControlFrame::Ack { ack } => acked_total += ack as u64,
            other => return Err(unexpected("ack", other)),
        }
    }
    ws.send(Message::Binary(vec![0u8])).await?;

    match recv_control(ws).await? {
        ControlFrame::Complete {
            id,
            size,
            complete: true,
        } => {
            debug_assert_eq!(size, acked_total);
            Ok(UploadOutcome { id, secret, size })
        }
        other => Err(unexpected("complete", other)),
    }
}

fn unexpected(expected: &str, got: ControlFrame) -> ClientError {
    if let ControlFrame::Error { error } = got {
        ClientError::ServerError(error)
    } else {
        ClientError::Protocol(format!("expected {expected}, got {got:?}"))
    }
}

async fn send_control<S>(ws: &mut WebSocketStream<S>, frame: &ControlFrame) -> Result<(), ClientError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let text = frame.to_json()?;
    ws.send(Message::Text(text)).await?;
    Ok(())
}

async fn recv_control<S>(ws: &mut WebSocketStream<S>) -> Result<ControlFrame, ClientError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return ControlFrame::from_json(&text)
                    .map_err(|err| ClientError::Protocol(format!("bad control frame: {err}")))
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(other)) => {
                return Err(ClientError::Protocol(format!(
                    "expected text control frame, got {other:?}"
                )))
            }
            Some(Err(err)) => return Err(err.into()),
            None => {
                return Err(ClientError::Protocol(
                    "connection closed before session completed".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_tungstenite::tungstenite::protocol::Role;

    use paste_datastore::ObjectStore;
    use paste_server::session::{IdMode, SessionLimits};

    fn limits() -> SessionLimits {
        SessionLimits {
            max_blob_size: 1024 * 1024,
            chunk_size: 16,
            id_width: IdWidthBits::BITS_128,
        }
    }

    fn sample_request(size: u64) -> UploadRequest {
        UploadRequest {
            ws_url: String::new(),
            key_mode: KeyMode::Random {
                key_width: KeyWidth::BITS_256,
                id_width: IdWidthBits::BITS_128,
            },
            filename: "greeting.txt".into(),
            content_type: "text/plain".into(),
            size,
            chunk_size: 16,
        }
    }

    #[tokio::test]
    async fn random_mode_round_trips_over_an_in_memory_socket() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ObjectStore::new(dir.path()).unwrap());

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let mut client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;

        let server_store = store.clone();
        let server_task = tokio::spawn(async move {
            paste_server::channel::drive_upload(
                server_store,
                limits(),
                IdMode::ServerGenerated,
                server_ws,
            )
            .await;
        });

        let plaintext = b"hello paste world, this is more than one chunk long".to_vec();
        let request = sample_request(plaintext.len() as u64);

        let outcome = drive(&mut client_ws, request, std::io::Cursor::new(plaintext.clone()))
            .await
            .unwrap();
        server_task.await.unwrap();

        assert_eq!(outcome.size, plaintext.len() as u64);
        let token = derive_auth_token(&outcome.secret, &outcome.id).unwrap();
        assert!(store.exists(&outcome.id, &token).unwrap());
    }

    #[tokio::test]
    async fn passphrase_mode_sends_a_client_derived_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ObjectStore::new(dir.path()).unwrap());

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let mut client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;

        let server_store = store.clone();
        let server_task = tokio::spawn(async move {
            paste_server::channel::drive_upload(
                server_store,
                limits(),
                IdMode::ClientSupplied,
                server_ws,
            )
            .await;
        });

        let plaintext = b"short".to_vec();
        let mut request = sample_request(plaintext.len() as u64);
        request.key_mode = KeyMode::Passphrase {
            passphrase: "able-acid-aged-x7k3".into(),
            key_width: KeyWidth::BITS_256,
            id_width: IdWidthBits::BITS_128,
        };

        let outcome = drive(&mut client_ws, request, std::io::Cursor::new(plaintext))
            .await
            .unwrap();
        server_task.await.unwrap();

        let (expected_id, _) = derive_from_passphrase(
            "able-acid-aged-x7k3",
            KeyWidth::BITS_256,
            IdWidthBits::BITS_128,
        )
        .unwrap();
        assert_eq!(outcome.id, expected_id);
    }

    #[tokio::test]
    async fn empty_plaintext_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ObjectStore::new(dir.path()).unwrap());

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let mut client_ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;

        let server_store = store.clone();
        let server_task = tokio::spawn(async move {
            paste_server::channel::drive_upload(
                server_store,
                limits(),
                IdMode::ServerGenerated,
                server_ws,
            )
            .await;
        });

        let request = sample_request(0);
        let outcome = drive(&mut client_ws, request, std::io::Cursor::new(Vec::new()))
            .await
            .unwrap();
        server_task.await.unwrap();
        assert_eq!(outcome.size, 0);
    }
}
