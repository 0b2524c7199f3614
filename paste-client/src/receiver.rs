//! Drives the two retrieval HTTP endpoints (§4.5, §6): a metadata-only
//! fetch and a full download-then-decrypt, generalizing the teacher's
//! `BackupReader` plain-GET-plus-decrypt shape to this crate's single-blob
//! retrieval surface.

use bytes::{Bytes, BytesMut};
use http::{Request, StatusCode};
use hyper::{body::HttpBody, Body, Client};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use paste_crypto::{derive_auth_token, ChunkDecryptor, MetadataCipher, Secret};
use paste_datastore::container;

use crate::error::ClientError;
use crate::metadata::BlobMetadata;

const TOKEN_HEADER: &str = "X-HMAC-Token";
const SIZE_HEADER: &str = "X-Blob-Size";

/// Metadata plus the total on-disk blob size, as returned by a metadata-only fetch.
pub struct RetrievedMetadata {
    pub metadata: BlobMetadata,
    pub total_size: u64,
}

/// `GET /metadata/{id}`: fetch and decrypt just the metadata envelope. Does
/// not touch the data chunks and does not trigger the one-shot delete.
pub async fn fetch_metadata(
    base_url: &str,
    id: &str,
    secret: &Secret,
) -> Result<RetrievedMetadata, ClientError> {
    let token = derive_auth_token(secret, id)?;
    let response = get(base_url, "metadata", id, &token).await?;
    let total_size = blob_size_header(&response)?;

    let body = hyper::body::to_bytes(response.into_body()).await?;
    let plaintext = MetadataCipher::decrypt(secret.width(), secret.as_bytes(), &body)?;
    let metadata: BlobMetadata = serde_json::from_slice(&plaintext)?;

    Ok(RetrievedMetadata {
        metadata,
        total_size,
    })
}

/// `GET /download/{id}`: stream the full blob, decrypt metadata and every
/// chunk, and write the recovered plaintext to `sink`. Never buffers the
/// whole blob in memory; chunks are decrypted as they arrive. A successful
/// return means the server has applied its one-shot delete.
pub async fn download(
    base_url: &str,
    id: &str,
    secret: &Secret,
    chunk_size: usize,
    mut sink: impl AsyncWrite + Unpin,
) -> Result<BlobMetadata, ClientError> {
    let token = derive_auth_token(secret, id)?;
    let response = get(base_url, "download", id, &token).await?;

    let mut body = BodyCursor::new(response.into_body());

    let metadata_iv = body.read_exact(container::METADATA_IV_LEN).await?;
    let len_bytes = body.read_exact(4).await?;
    let metadata_len = u32::from_le_bytes(len_bytes.as_ref().try_into().expect("4 bytes"));
    let mut iv_array = [0u8; container::METADATA_IV_LEN];
    iv_array.copy_from_slice(&metadata_iv);
    container::validate_header(&iv_array, metadata_len)?;
    let metadata_ciphertext = body.read_exact(metadata_len as usize).await?;

    let mut envelope = Vec::with_capacity(container::METADATA_IV_LEN + 4 + metadata_ciphertext.len());
    envelope.extend_from_slice(&metadata_iv);
    envelope.extend_from_slice(&len_bytes);
    envelope.extend_from_slice(&metadata_ciphertext);
    let metadata_plaintext = MetadataCipher::decrypt(secret.width(), secret.as_bytes(), &envelope)?;
    let metadata: BlobMetadata = serde_json::from_slice(&metadata_plaintext)?;

    let data_iv_bytes = body.read_exact(container::DATA_IV_LEN).await?;
    let mut data_iv = [0u8; container::DATA_IV_LEN];
    data_iv.copy_from_slice(&data_iv_bytes);
    let mut decryptor = ChunkDecryptor::new(secret.width(), secret.as_bytes(), data_iv)?;

    let max_ciphertext_len = chunk_size + paste_crypto::aead::TAG_LEN;
    loop {
        match body.read_up_to(max_ciphertext_len).await? {
            None => break,
            Some(ciphertext) => {
                let plaintext = decryptor.decrypt_chunk(&ciphertext)?;
                sink.write_all(&plaintext).await?;
            }
        }
    }
    sink.flush().await?;

    Ok(metadata)
}

/// `DELETE /delete/{id}`: idempotent removal, gated by the same token.
pub async fn delete(base_url: &str, id: &str, secret: &Secret) -> Result<(), ClientError> {
    let token = derive_auth_token(secret, id)?;
    let uri: http::Uri = format!("{base_url}/delete/{id}").parse().map_err(|_| {
        ClientError::BadRequest("malformed base url".into())
    })?;
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(TOKEN_HEADER, token)
        .body(Body::empty())
        .map_err(|err| ClientError::BadRequest(err.to_string()))?;

    let client = Client::new();
    let response = client.request(request).await?;
    check_status(response.status())
}

async fn get(base_url: &str, route: &str, id: &str, token: &str) -> Result<hyper::Response<Body>, ClientError> {
    let uri: http::Uri = format!("{base_url}/{route}/{id}").parse().map_err(|_| {
        ClientError::BadRequest("malformed base url".into())
    })?;
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header(TOKEN_HEADER, token)
        .body(Body::empty())
        .map_err(|err| ClientError::BadRequest(err.to_string()))?;

    let client = Client::new();
    let response = client.request(request).await?;
    check_status(response.status())?;
    Ok(response)
}

fn check_status(status: StatusCode) -> Result<(), ClientError> {
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::FORBIDDEN => Err(ClientError::Forbidden),
        StatusCode::BAD_REQUEST => Err(ClientError::BadRequest("malformed id".into())),
        other => Err(ClientError::BadRequest(format!("unexpected status {other}"))),
    }
}

fn blob_size_header(response: &hyper::Response<Body>) -> Result<u64, ClientError> {
    response
        .headers()
        .get(SIZE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ClientError::Protocol(format!("missing {SIZE_HEADER} header")))
}

/// Pulls bytes out of a [`hyper::Body`] stream on demand, the async
/// equivalent of `paste_datastore::container::read_chunk`'s fixed-or-short
/// read logic, used here for both the fixed-width header fields and the
/// variable-length chunk stream.
struct BodyCursor {
    body: Body,
    buf: BytesMut,
    eof: bool,
}

impl BodyCursor {
    fn new(body: Body) -> Self {
        BodyCursor {
            body,
            buf: BytesMut::new(),
            eof: false,
        }
    }

    async fn fill(&mut self, want: usize) -> Result<(), ClientError> {
        while self.buf.len() < want && !self.eof {
            match self.body.data().await {
                Some(Ok(bytes)) => self.buf.extend_from_slice(&bytes),
                Some(Err(err)) => return Err(err.into()),
                None => self.eof = true,
            }
        }
        Ok(())
    }

    /// Read exactly `n` bytes or fail; used for the fixed-width header fields.
    async fn read_exact(&mut self, n: usize) -> Result<Bytes, ClientError> {
        self.fill(n).await?;
        if self.buf.len() < n {
            return Err(ClientError::UnexpectedEof);
        }
        Ok(self.buf.split_to(n).freeze())
    }

    /// Read up to `max_len` bytes. `None` on clean end-of-stream;
    /// `Some(buf)` with `buf.len() < max_len` marks the terminal chunk.
    async fn read_up_to(&mut self, max_len: usize) -> Result<Option<Bytes>, ClientError> {
        self.fill(max_len).await?;
        if self.buf.is_empty() {
            return Ok(None);
        }
        let n = max_len.min(self.buf.len());
        Ok(Some(self.buf.split_to(n).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn body_cursor_splits_fixed_then_variable_reads() {
        let (mut tx, body) = Body::channel();
        tokio::spawn(async move {
            tx.send_data(Bytes::from_static(b"0123456789abcdef")).await.ok();
            tx.send_data(Bytes::from_static(b"ghij")).await.ok();
        });

        let mut cursor = BodyCursor::new(body);
        let first = cursor.read_exact(10).await.unwrap();
        assert_eq!(&first[..], b"0123456789");

        let chunk = cursor.read_up_to(16).await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"abcdefghij");

        assert!(cursor.read_up_to(16).await.unwrap().is_none());
    }
}
