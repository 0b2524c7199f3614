//! Hand-rolled retrieval router for the three plain-HTTP endpoints:
//! `GET /metadata/{id}`, `GET /download/{id}`, `DELETE /delete/{id}`.
//!
//! Small enough (three routes, one path parameter) that the teacher's
//! `proxmox-router`/`proxmox-schema` machinery would be pure overhead; this
//! mirrors instead the narrower shape of `H2Service`'s request dispatch and
//! its `HttpError`-downcast-to-status-code error path, plus the
//! spawn-blocking-into-a-channel streaming idiom from the restore daemon's
//! vsock acceptor.

use std::io::Read;
use std::sync::Arc;

use hyper::{Body, Method, Request, Response, StatusCode};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use paste_api_types::{AccessError, InputError};
use paste_crypto::constant_time_eq;
use paste_datastore::{container, ObjectStore, ReadMode};

use crate::error::HttpError;

const TOKEN_HEADER: &str = "X-HMAC-Token";
const SIZE_HEADER: &str = "X-Blob-Size";
const STREAM_CHUNK_LEN: usize = 64 * 1024;

/// Dispatch one request to the matching retrieval handler. The websocket
/// upgrade route is handled by the caller before this is reached; anything
/// else unmatched falls through to a `404`.
pub async fn handle(store: Arc<ObjectStore>, req: Request<Body>) -> Response<Body> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    let result = match (&method, segments.as_slice()) {
        (&Method::GET, ["metadata", id]) => metadata(&store, id, &req).await,
        (&Method::GET, ["download", id]) => download(store.clone(), id, &req).await,
        (&Method::DELETE, ["delete", id]) => delete(&store, id, &req).await,
        _ => Err(HttpError::new(StatusCode::NOT_FOUND, "no such route")),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            warn!("{} {}: {}", method, path, err.message);
            let mut response = Response::new(Body::from(err.message.clone()));
            *response.status_mut() = err.status;
            response
        }
    }
}

fn extract_token<'a>(req: &'a Request<Body>) -> Result<&'a str, HttpError> {
    req.headers()
        .get(TOKEN_HEADER)
        .ok_or(AccessError::Forbidden)?
        .to_str()
        .map_err(|_| AccessError::Forbidden.into())
}

fn internal(err: impl std::fmt::Display) -> HttpError {
    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// Look up the object and check the presented token via a constant-time
/// comparison against the stored filename suffix. A bad token and a
/// nonexistent id both collapse to `Forbidden` so neither is an oracle for
/// the other.
fn authorize(store: &ObjectStore, id: &str, presented: &str) -> Result<(), HttpError> {
    if presented.is_empty()
        || !presented
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(AccessError::Forbidden.into());
    }
    if !id.bytes().all(|b| b.is_ascii_hexdigit()) || ![16, 32, 48, 64].contains(&id.len()) {
        let access: AccessError = InputError::MalformedId(id.to_owned()).into();
        return Err(access.into());
    }

    let stored = store.stored_token(id).map_err(internal)?;
    let matches = stored
        .as_deref()
        .map(|token| constant_time_eq(token, presented))
        .unwrap_or(false);

    if matches {
        Ok(())
    } else {
        Err(AccessError::Forbidden.into())
    }
}

async fn metadata(
    store: &ObjectStore,
    id: &str,
    req: &Request<Body>,
) -> Result<Response<Body>, HttpError> {
    let token = extract_token(req)?;
    authorize(store, id, token)?;

    let (mut file, total_size) = store
        .open_blob(id, token, ReadMode::MetadataOnly)
        .map_err(|_| HttpError::from(AccessError::Forbidden))?;

    let (iv, ciphertext) = container::read_metadata(&mut file).map_err(internal)?;

    let mut body = Vec::with_capacity(container::METADATA_IV_LEN + 4 + ciphertext.len());
    body.extend_from_slice(&iv);
    body.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
    body.extend_from_slice(&ciphertext);

    Response::builder()
        .status(StatusCode::OK)
        .header(SIZE_HEADER, total_size)
        .body(Body::from(body))
        .map_err(internal)
}

async fn download(
    store: Arc<ObjectStore>,
    id: &str,
    req: &Request<Body>,
) -> Result<Response<Body>, HttpError> {
    let token = extract_token(req)?;
    authorize(&store, id, token)?;

    let (file, size) = store
        .open_blob(id, token, ReadMode::Full)
        .map_err(|_| HttpError::from(AccessError::Forbidden))?;

    let id = id.to_owned();
    let token = token.to_owned();
    let (tx, rx) = mpsc::channel::<std::io::Result<bytes::Bytes>>(4);

    tokio::task::spawn_blocking(move || {
        let mut file = file;
        let mut buf = vec![0u8; STREAM_CHUNK_LEN];
        let mut clean = true;
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx
                        .blocking_send(Ok(bytes::Bytes::copy_from_slice(&buf[..n])))
                        .is_err()
                    {
                        clean = false;
                        break;
                    }
                }
                Err(err) => {
                    clean = false;
                    let _ = tx.blocking_send(Err(err));
                    break;
                }
            }
        }
        if clean {
            if let Err(err) = store.delete_blob(&id, &token) {
                warn!("post-download cleanup failed for {id}: {err}");
            } else {
                info!("deleted {id} after one-shot download");
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Response::builder()
        .status(StatusCode::OK)
        .header(SIZE_HEADER, size)
        .body(Body::wrap_stream(stream))
        .map_err(internal)
}

async fn delete(
    store: &ObjectStore,
    id: &str,
    req: &Request<Body>,
) -> Result<Response<Body>, HttpError> {
    let token = extract_token(req)?;
    authorize(store, id, token)?;
    store.delete_blob(id, token).map_err(internal)?;
    Ok(Response::new(Body::empty()))
}
