//! Drives one [`UploadSession`] to completion over a websocket connection.
//!
//! Generalizes the teacher's H2 stateful-connection services to this
//! crate's framing: a JSON control frame per text message, everything else
//! (metadata header, data IV, chunks, end marker) as binary messages.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use paste_api_types::ControlFrame;

use crate::error::SessionError;
use crate::session::{IdMode, SessionLimits, UploadSession};
use paste_datastore::ObjectStore;
use std::sync::Arc;

/// A frame larger than this (outside of chunk bodies) is a protocol
/// violation rather than something worth trying to parse.
const MAX_CONTROL_FRAME_LEN: usize = 8 * 1024;

/// How long the driver waits for the next frame before aborting the
/// session; exceeding this is treated the same as a client disconnect.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// The one-byte end-of-stream marker (distinguishable from any real chunk,
/// since a valid ciphertext is at least `TAG_LEN` bytes).
const END_MARKER: &[u8] = &[0u8];

/// Drive `session` over `ws` until completion, protocol violation, timeout,
/// or disconnect. Always leaves the session in a clean state: success sends
/// a terminal `complete` frame, anything else sends an `error` frame (best
/// effort) and discards the temp file via [`UploadSession::abort`].
pub async fn drive_upload<S>(
    store: Arc<ObjectStore>,
    limits: SessionLimits,
    id_mode: IdMode,
    mut ws: WebSocketStream<S>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let session = UploadSession::new(store, limits, id_mode);

    let result = run(&session, &mut ws).await;

    match result {
        Ok(outcome) => {
            info!("upload {} complete, {} bytes", outcome.id, outcome.size);
            let frame = ControlFrame::Complete {
                id: outcome.id,
                size: outcome.size,
                complete: true,
            };
            send_control(&mut ws, &frame).await.ok();
        }
        Err(err) => {
            warn!("upload session {} aborted: {}", session.state_label(), err);
            session.abort();
            let frame = ControlFrame::Error {
                error: err.to_string(),
            };
            send_control(&mut ws, &frame).await.ok();
        }
    }

    ws.close(None).await.ok();
}

async fn run<S>(
    session: &UploadSession,
    ws: &mut WebSocketStream<S>,
) -> Result<crate::session::FinalizeOutcome, SessionError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    // init
    let init = recv_control(ws).await?;
    let declared_size = match init {
        ControlFrame::Init { size } => size,
        other => {
            return Err(SessionError::ProtocolViolation(format!(
                "expected init, got {other:?}"
            )))
        }
    };
    let maybe_id = session.handle_init(declared_size)?;

    let id = match maybe_id {
        Some(id) => {
            send_control(ws, &ControlFrame::Id { id: id.clone() })
                .await
                .map_err(|err| SessionError::Other(err.into()))?;
            id
        }
        None => {
            let frame = recv_control(ws).await?;
            match frame {
                ControlFrame::Id { id } => {
                    session.handle_client_id(id.clone())?;
                    id
                }
                other => {
                    return Err(SessionError::ProtocolViolation(format!(
                        "expected id, got {other:?}"
                    )))
                }
            }
        }
    };
    debug!("session assigned id {id}");

    // token
    let token_frame = recv_control(ws).await?;
    let token = match token_frame {
        ControlFrame::Token { token } => token,
        other => {
            return Err(SessionError::ProtocolViolation(format!(
                "expected token, got {other:?}"
            )))
        }
    };
    session.handle_token(token)?;
    send_control(
        ws,
        &ControlFrame::TokenAccepted {
            token_accepted: true,
        },
    )
    .await
    .map_err(|err| SessionError::Other(err.into()))?;

    // metadata header
    let header = recv_binary(ws).await?;
    session.handle_header(&header)?;
    send_control(ws, &ControlFrame::Ready { ready: true })
        .await
        .map_err(|err| SessionError::Other(err.into()))?;

    // data iv
    let iv = recv_binary(ws).await?;
    session.handle_iv(&iv)?;

    // chunk stream, terminated by the 0x00 marker
    loop {
        let frame = recv_binary(ws).await?;
        if frame == END_MARKER {
            break;
        }
        let outcome = session.handle_chunk(&frame)?;
        send_control(ws, &ControlFrame::Ack { ack: outcome.ack_len })
            .await
            .map_err(|err| SessionError::Other(err.into()))?;
    }

    session.handle_complete()
}

async fn recv_control<S>(ws: &mut WebSocketStream<S>) -> Result<ControlFrame, SessionError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let message = next_message(ws).await?;
    match message {
        Message::Text(text) => {
            if text.len() > MAX_CONTROL_FRAME_LEN {
                return Err(SessionError::ProtocolViolation(
                    "control frame too large".into(),
                ));
            }
            ControlFrame::from_json(&text)
                .map_err(|err| SessionError::ProtocolViolation(format!("bad control frame: {err}")))
        }
        other => Err(SessionError::ProtocolViolation(format!(
            "expected text control frame, got {other:?}"
        ))),
    }
}

async fn recv_binary<S>(ws: &mut WebSocketStream<S>) -> Result<Vec<u8>, SessionError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let message = next_message(ws).await?;
    match message {
        Message::Binary(bytes) => Ok(bytes),
        other => Err(SessionError::ProtocolViolation(format!(
            "expected binary frame, got {other:?}"
        ))),
    }
}

async fn next_message<S>(ws: &mut WebSocketStream<S>) -> Result<Message, SessionError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let next = timeout(IDLE_TIMEOUT, ws.next())
            .await
            .map_err(|_| SessionError::ProtocolViolation("idle timeout".into()))?;
        match next {
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(message)) => return Ok(message),
            Some(Err(err)) => return Err(SessionError::Other(err.into())),
            None => {
                return Err(SessionError::ProtocolViolation(
                    "connection closed before session completed".into(),
                ))
            }
        }
    }
}

async fn send_control<S>(
    ws: &mut WebSocketStream<S>,
    frame: &ControlFrame,
) -> Result<(), anyhow::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let text = frame.to_json()?;
    ws.send(Message::Text(text)).await?;
    Ok(())
}
