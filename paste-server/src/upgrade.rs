//! Hand-rolled RFC 6455 websocket upgrade handshake for the single
//! `GET /upload` route, kept inside this crate rather than pulled in via a
//! dedicated hyper-upgrade helper crate: there is exactly one upgrade
//! route, and the accept-key computation is three lines on top of the
//! OpenSSL dependency this crate already carries for every other
//! cryptographic primitive.

use hyper::header::{HeaderValue, CONNECTION, UPGRADE};
use hyper::{Body, Request, Response, StatusCode};
use log::warn;
use openssl::hash::{hash, MessageDigest};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Is this request a well-formed websocket upgrade request?
pub fn is_upgrade_request(req: &Request<Body>) -> bool {
    header_contains(req, CONNECTION.as_str(), "upgrade")
        && header_contains(req, UPGRADE.as_str(), "websocket")
        && req.headers().contains_key("sec-websocket-key")
}

fn header_contains(req: &Request<Body>, name: &str, needle: &str) -> bool {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Build the `101 Switching Protocols` response and hand back the original
/// request so the caller can complete the upgrade via `hyper::upgrade::on`.
pub fn accept_response(req: &Request<Body>) -> Result<Response<Body>, anyhow::Error> {
    let key = req
        .headers()
        .get("sec-websocket-key")
        .ok_or_else(|| anyhow::anyhow!("missing Sec-WebSocket-Key"))?
        .to_str()?;
    let accept = accept_key(key);

    let response = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(CONNECTION, HeaderValue::from_static("Upgrade"))
        .header(UPGRADE, HeaderValue::from_static("websocket"))
        .header("Sec-WebSocket-Accept", accept)
        .body(Body::empty())?;
    Ok(response)
}

fn accept_key(client_key: &str) -> String {
    let mut data = client_key.as_bytes().to_vec();
    data.extend_from_slice(WEBSOCKET_GUID.as_bytes());
    let digest = hash(MessageDigest::sha1(), &data).expect("sha1 is always available");
    base64::encode(&digest[..])
}

/// After the hyper connection has been upgraded, wrap the raw byte stream as
/// a server-role websocket with no further handshake (the HTTP layer above
/// already completed it).
pub async fn into_websocket(upgraded: hyper::upgrade::Upgraded) -> WebSocketStream<hyper::upgrade::Upgraded> {
    WebSocketStream::from_raw_socket(upgraded, Role::Server, None).await
}

/// Spawn the upload session driver on an upgraded connection, logging (but
/// never panicking on) failures to complete the upgrade itself.
pub fn spawn_session(
    req: Request<Body>,
    store: std::sync::Arc<paste_datastore::ObjectStore>,
    limits: crate::session::SessionLimits,
    id_mode: crate::session::IdMode,
) {
    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => {
                let ws = into_websocket(upgraded).await;
                crate::channel::drive_upload(store, limits, id_mode, ws).await;
            }
            Err(err) => warn!("websocket upgrade failed: {err}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc6455_example() {
        // The canonical example from RFC 6455 section 1.3.
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn is_upgrade_request_requires_all_three_headers() {
        let req = Request::builder()
            .header(CONNECTION, "Upgrade")
            .header(UPGRADE, "websocket")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap();
        assert!(is_upgrade_request(&req));

        let missing_key = Request::builder()
            .header(CONNECTION, "Upgrade")
            .header(UPGRADE, "websocket")
            .body(Body::empty())
            .unwrap();
        assert!(!is_upgrade_request(&missing_key));
    }
}
