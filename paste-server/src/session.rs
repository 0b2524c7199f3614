//! Server-side state machine driving one client through
//! `init -> token -> header -> iv -> chunks -> finalize`, generalized from
//! the teacher's writer-registration pattern in `BackupEnvironment`
//! (`ensure_unfinished`-style guards before every mutating call, one shared
//! state behind a mutex) to this crate's strictly linear per-connection flow.

use std::sync::{Arc, Mutex};

use openssl::rand::rand_bytes;

use paste_api_types::{IdWidthBits, InputError};
use paste_crypto::aead::MAX_CHUNK_COUNT;
use paste_datastore::{container, ObjectStore, TempHandle};

use crate::error::SessionError;

/// Which side computes the file identifier. Random mode: the server picks
/// one and tells the client. Passphrase mode: the client already derived it
/// and tells the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMode {
    ServerGenerated,
    ClientSupplied,
}

/// Parameters fixed for the lifetime of one session, taken from the
/// process-wide configuration.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_blob_size: u64,
    pub chunk_size: u64,
    pub id_width: IdWidthBits,
}

enum State {
    AwaitingInit,
    AwaitingClientId {
        declared_size: u64,
    },
    AwaitingToken {
        id: String,
        declared_size: u64,
    },
    AwaitingHeader {
        id: String,
        token: String,
        declared_size: u64,
        handle: TempHandle,
    },
    AwaitingIv {
        id: String,
        token: String,
        declared_size: u64,
        handle: TempHandle,
    },
    Streaming {
        id: String,
        token: String,
        declared_size: u64,
        handle: TempHandle,
        bytes_written: u64,
        chunk_count: u32,
    },
    Finalizing,
    Aborted,
}

impl State {
    fn label(&self) -> &'static str {
        match self {
            State::AwaitingInit => "awaiting-init",
            State::AwaitingClientId { .. } => "awaiting-client-id",
            State::AwaitingToken { .. } => "awaiting-token",
            State::AwaitingHeader { .. } => "awaiting-header",
            State::AwaitingIv { .. } => "awaiting-iv",
            State::Streaming { .. } => "streaming",
            State::Finalizing => "finalizing",
            State::Aborted => "aborted",
        }
    }
}

/// Outcome of a successfully accepted chunk frame.
pub struct ChunkOutcome {
    /// Plaintext length of the chunk just accepted (ciphertext length minus
    /// the 16-byte AEAD tag), matching what the client encrypted.
    pub ack_len: u32,
}

/// Outcome of the end-of-stream marker.
pub struct FinalizeOutcome {
    pub id: String,
    /// Total plaintext bytes streamed, accumulated from each chunk's
    /// plaintext length rather than its on-wire ciphertext length.
    pub size: u64,
}

pub struct UploadSession {
    store: Arc<ObjectStore>,
    limits: SessionLimits,
    id_mode: IdMode,
    state: Mutex<State>,
}

impl UploadSession {
    pub fn new(store: Arc<ObjectStore>, limits: SessionLimits, id_mode: IdMode) -> Self {
        UploadSession {
            store,
            limits,
            id_mode,
            state: Mutex::new(State::AwaitingInit),
        }
    }

    /// Current state label, for lifecycle logging.
    pub fn state_label(&self) -> &'static str {
        self.state.lock().unwrap().label()
    }

    fn generate_unique_id(&self) -> Result<String, SessionError> {
        const MAX_ATTEMPTS: u32 = 16;
        let byte_width = self.limits.id_width.as_bytes();
        for _ in 0..MAX_ATTEMPTS {
            let mut raw = vec![0u8; byte_width];
            rand_bytes(&mut raw).map_err(anyhow::Error::from)?;
            let id = hex::encode(raw);
            if !self.store.id_in_use(&id)? {
                return Ok(id);
            }
        }
        Err(SessionError::Collision)
    }

    /// `init{size}`: validate the declared size and, in random-id mode,
    /// assign and return the new id. In client-supplied-id mode, returns
    /// `None` — the caller must wait for the client's `id` frame next.
    pub fn handle_init(&self, declared_size: u64) -> Result<Option<String>, SessionError> {
        let mut guard = self.state.lock().unwrap();
        if !matches!(*guard, State::AwaitingInit) {
            return Err(SessionError::ProtocolViolation(
                "init received outside AwaitingInit".into(),
            ));
        }
        if declared_size > self.limits.max_blob_size {
            return Err(InputError::OversizedBlob {
                declared: declared_size,
                max: self.limits.max_blob_size,
            }
            .into());
        }

        match self.id_mode {
            IdMode::ServerGenerated => {
                drop(guard);
                let id = self.generate_unique_id()?;
                let mut guard = self.state.lock().unwrap();
                *guard = State::AwaitingToken {
                    id: id.clone(),
                    declared_size,
                };
                Ok(Some(id))
            }
            IdMode::ClientSupplied => {
                *guard = State::AwaitingClientId { declared_size };
                Ok(None)
            }
        }
    }

    /// `id{id}` presented by the client in passphrase mode.
    pub fn handle_client_id(&self, id: String) -> Result<(), SessionError> {
        let mut guard = self.state.lock().unwrap();
        let declared_size = match &*guard {
            State::AwaitingClientId { declared_size } => *declared_size,
            _ => {
                return Err(SessionError::ProtocolViolation(
                    "id received outside AwaitingClientId".into(),
                ))
            }
        };
        if id.len() != self.limits.id_width.hex_len() || !id.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(InputError::MalformedId(id).into());
        }
        drop(guard);
        if self.store.id_in_use(&id)? {
            let mut guard = self.state.lock().unwrap();
            *guard = State::Aborted;
            return Err(SessionError::Collision);
        }
        let mut guard = self.state.lock().unwrap();
        *guard = State::AwaitingToken { id, declared_size };
        Ok(())
    }

    /// `token{token}`: validate charset, then open the temp file, rejecting
    /// on a filename collision at `{id}.{token}`.
    pub fn handle_token(&self, token: String) -> Result<(), SessionError> {
        if !token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(InputError::UnsafeTokenChars.into());
        }

        let mut guard = self.state.lock().unwrap();
        let (id, declared_size) = match &*guard {
            State::AwaitingToken { id, declared_size } => (id.clone(), *declared_size),
            _ => {
                return Err(SessionError::ProtocolViolation(
                    "token received outside AwaitingToken".into(),
                ))
            }
        };

        let handle = self
            .store
            .put_blob_stream(&id, &token)
            .map_err(|_| SessionError::Collision)?;

        *guard = State::AwaitingHeader {
            id,
            token,
            declared_size,
            handle,
        };
        Ok(())
    }

    /// The binary metadata envelope (`metadata-iv || metadata-len ||
    /// metadata-ciphertext`). Validated against the container-format
    /// invariants before a `ready` may be emitted.
    pub fn handle_header(&self, envelope: &[u8]) -> Result<(), SessionError> {
        if envelope.len() < container::METADATA_IV_LEN + 4 {
            return Err(SessionError::ProtocolViolation(
                "metadata header shorter than fixed region".into(),
            ));
        }
        let mut iv = [0u8; container::METADATA_IV_LEN];
        iv.copy_from_slice(&envelope[..container::METADATA_IV_LEN]);
        let len_bytes = &envelope[container::METADATA_IV_LEN..container::METADATA_IV_LEN + 4];
        let declared_len = u32::from_le_bytes(len_bytes.try_into().expect("4 bytes"));
        container::validate_header(&iv, declared_len)?;
        if envelope.len() != container::METADATA_IV_LEN + 4 + declared_len as usize {
            return Err(SessionError::ProtocolViolation(
                "metadata ciphertext length does not match declared length".into(),
            ));
        }

        let mut guard = self.state.lock().unwrap();
        let taken = std::mem::replace(&mut *guard, State::Aborted);
        match taken {
            State::AwaitingHeader {
                id,
                token,
                declared_size,
                mut handle,
            } => {
                handle.write_all(envelope)?;
                *guard = State::AwaitingIv {
                    id,
                    token,
                    declared_size,
                    handle,
                };
                Ok(())
            }
            other => {
                *guard = other;
                Err(SessionError::ProtocolViolation(
                    "header received outside AwaitingHeader".into(),
                ))
            }
        }
    }

    /// The binary data IV; must be exactly 12 bytes.
    pub fn handle_iv(&self, iv: &[u8]) -> Result<(), SessionError> {
        if iv.len() != container::DATA_IV_LEN {
            return Err(SessionError::ProtocolViolation(format!(
                "data iv must be {} bytes, got {}",
                container::DATA_IV_LEN,
                iv.len()
            )));
        }

        let mut guard = self.state.lock().unwrap();
        let taken = std::mem::replace(&mut *guard, State::Aborted);
        match taken {
            State::AwaitingIv {
                id,
                token,
                declared_size,
                mut handle,
            } => {
                handle.write_all(iv)?;
                *guard = State::Streaming {
                    id,
                    token,
                    declared_size,
                    handle,
                    bytes_written: 0,
                    chunk_count: 0,
                };
                Ok(())
            }
            other => {
                *guard = other;
                Err(SessionError::ProtocolViolation(
                    "iv received outside AwaitingIv".into(),
                ))
            }
        }
    }

    /// One chunk ciphertext frame (encrypted; the server never decrypts).
    pub fn handle_chunk(&self, chunk: &[u8]) -> Result<ChunkOutcome, SessionError> {
        container::validate_chunk_len(chunk.len(), self.limits.chunk_size as usize)?;

        let mut guard = self.state.lock().unwrap();
        let taken = std::mem::replace(&mut *guard, State::Aborted);
        match taken {
            State::Streaming {
                id,
                token,
                declared_size,
                mut handle,
                bytes_written,
                chunk_count,
            } => {
                if chunk_count >= MAX_CHUNK_COUNT {
                    return Err(SessionError::ChunkLimitExceeded(MAX_CHUNK_COUNT));
                }
                let plaintext_len = chunk.len() - container::AEAD_TAG_LEN;
                let new_total = bytes_written + plaintext_len as u64;
                if new_total > self.limits.max_blob_size {
                    return Err(InputError::OversizedBlob {
                        declared: new_total,
                        max: self.limits.max_blob_size,
                    }
                    .into());
                }
                handle.write_all(chunk)?;
                let ack_len = plaintext_len as u32;
                *guard = State::Streaming {
                    id,
                    token,
                    declared_size,
                    handle,
                    bytes_written: new_total,
                    chunk_count: chunk_count + 1,
                };
                Ok(ChunkOutcome { ack_len })
            }
            other => {
                *guard = other;
                Err(SessionError::ProtocolViolation(
                    "chunk received outside Streaming".into(),
                ))
            }
        }
    }

    /// The one-byte `0x00` end-of-stream marker: commit the temp file.
    pub fn handle_complete(&self) -> Result<FinalizeOutcome, SessionError> {
        let mut guard = self.state.lock().unwrap();
        let taken = std::mem::replace(&mut *guard, State::Aborted);
        match taken {
            State::Streaming {
                id,
                token,
                handle,
                bytes_written,
                ..
            } => {
                self.store.commit(handle).map_err(SessionError::Other)?;
                *guard = State::Finalizing;
                Ok(FinalizeOutcome {
                    id,
                    size: bytes_written,
                })
            }
            other => {
                *guard = other;
                Err(SessionError::ProtocolViolation(
                    "complete received outside Streaming".into(),
                ))
            }
        }
    }

    /// Unconditionally clean up the temp file for every non-success exit
    /// path: client disconnect, bad frame, size overflow, I/O error, rename
    /// failure. Safe to call more than once and from any state.
    pub fn abort(&self) {
        let mut guard = self.state.lock().unwrap();
        let taken = std::mem::replace(&mut *guard, State::Aborted);
        match taken {
            State::AwaitingHeader { handle, .. }
            | State::AwaitingIv { handle, .. }
            | State::Streaming { handle, .. } => {
                self.store.discard(handle);
            }
            // A session already past the rename has nothing left to clean
            // up; leave the label as Finalizing rather than overwriting it.
            State::Finalizing => *guard = State::Finalizing,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paste_datastore::ReadMode;

    fn limits() -> SessionLimits {
        SessionLimits {
            max_blob_size: 1024 * 1024,
            chunk_size: 64,
            id_width: IdWidthBits::BITS_128,
        }
    }

    fn session(mode: IdMode) -> (UploadSession, Arc<ObjectStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ObjectStore::new(dir.path()).unwrap());
        let session = UploadSession::new(store.clone(), limits(), mode);
        (session, store, dir)
    }

    #[test]
    fn happy_path_random_mode_commits_blob() {
        let (session, store, _dir) = session(IdMode::ServerGenerated);

        let id = session.handle_init(10).unwrap().expect("server assigns id");
        session.handle_token("tok_en-1".into()).unwrap();

        let mut envelope = vec![1u8; 12];
        envelope.extend_from_slice(&17u32.to_le_bytes());
        envelope.extend_from_slice(&[9u8; 17]);
        session.handle_header(&envelope).unwrap();

        session.handle_iv(&[2u8; 12]).unwrap();
        let outcome = session.handle_chunk(&[3u8; 26]).unwrap();
        assert_eq!(outcome.ack_len, 10);

        let finalize = session.handle_complete().unwrap();
        assert_eq!(finalize.id, id);
        assert_eq!(finalize.size, 10);

        let (_, size) = store.open_blob(&id, "tok_en-1", ReadMode::Full).unwrap();
        assert_eq!(size, envelope.len() as u64 + 12 + 26);
    }

    #[test]
    fn oversized_init_rejected() {
        let (session, _store, _dir) = session(IdMode::ServerGenerated);
        assert!(session.handle_init(2 * 1024 * 1024).is_err());
    }

    #[test]
    fn out_of_order_token_rejected() {
        let (session, _store, _dir) = session(IdMode::ServerGenerated);
        assert!(session.handle_token("tok".into()).is_err());
    }

    #[test]
    fn client_supplied_id_collision_detected() {
        let (session_a, store, _dir) = session(IdMode::ClientSupplied);
        session_a.handle_init(5).unwrap();
        session_a.handle_client_id("ab".repeat(16)).unwrap();
        session_a.handle_token("tok_en-1".into()).unwrap();
        // the id is now in use via a temp file, but `id_in_use` only counts
        // committed names, so collision here is demonstrated against an
        // already-committed object instead:
        session_a.abort();

        let mut handle = store.put_blob_stream(&"ab".repeat(16), "tok_en-2").unwrap();
        handle.write_all(b"x").unwrap();
        store.commit(handle).unwrap();

        let session_b = UploadSession::new(store, limits(), IdMode::ClientSupplied);
        session_b.handle_init(5).unwrap();
        assert!(session_b.handle_client_id("ab".repeat(16)).is_err());
    }

    #[test]
    fn abort_during_streaming_removes_temp_file() {
        let (session, store, dir) = session(IdMode::ServerGenerated);
        let id = session.handle_init(10).unwrap().unwrap();
        session.handle_token("tok_en-1".into()).unwrap();

        let mut envelope = vec![1u8; 12];
        envelope.extend_from_slice(&17u32.to_le_bytes());
        envelope.extend_from_slice(&[9u8; 17]);
        session.handle_header(&envelope).unwrap();
        session.handle_iv(&[2u8; 12]).unwrap();
        session.handle_chunk(&[3u8; 26]).unwrap();

        session.abort();
        assert!(!store.exists(&id, "tok_en-1").unwrap());

        let dir_entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(dir_entries.is_empty());
    }

    #[test]
    fn zero_size_blob_round_trips() {
        let (session, store, _dir) = session(IdMode::ServerGenerated);
        let id = session.handle_init(0).unwrap().unwrap();
        session.handle_token("tok_en-1".into()).unwrap();

        let mut envelope = vec![1u8; 12];
        envelope.extend_from_slice(&17u32.to_le_bytes());
        envelope.extend_from_slice(&[9u8; 17]);
        session.handle_header(&envelope).unwrap();
        session.handle_iv(&[2u8; 12]).unwrap();

        let finalize = session.handle_complete().unwrap();
        assert_eq!(finalize.size, 0);
        assert!(store.exists(&id, "tok_en-1").unwrap());
    }
}
