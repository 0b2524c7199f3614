//! Filesystem-backed object store keyed by `{id}.{token}`, generalizing the
//! teacher's `ChunkStore` exclusive-create-then-rename discipline to this
//! crate's single-owning-process directory (no `ProcessLocker`/uid-gid
//! machinery needed here — see the grounding ledger for why).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Error};

const ID_HEX_LENS: [usize; 4] = [16, 32, 48, 64];

fn is_valid_id(id: &str) -> bool {
    ID_HEX_LENS.contains(&id.len()) && id.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validate `id`/`token` at the API boundary: `^[0-9a-f]{16|32|48|64}$` for
/// the id, `^[A-Za-z0-9_-]+$` for the token, no path separators in either.
pub fn validate_names(id: &str, token: &str) -> Result<(), Error> {
    if !is_valid_id(id) {
        bail!("malformed file identifier '{id}'");
    }
    if !is_valid_token(token) {
        bail!("token contains characters outside the base64url alphabet");
    }
    Ok(())
}

/// Which part of a stored blob a reader wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Only the metadata header + ciphertext; the data chunks are never read.
    MetadataOnly,
    /// The entire blob body.
    Full,
}

/// An in-progress upload's temp file. Append-only; dropped handles whose
/// `commit` was never called leave a dangling `.tmp` file for the next
/// `sweep` (or the session driver's own cleanup path) to remove.
pub struct TempHandle {
    final_path: PathBuf,
    temp_path: PathBuf,
    file: File,
}

impl TempHandle {
    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }
}

/// A thin filesystem-backed store over one configured directory. One
/// `ObjectStore` instance owns its directory exclusively within a process,
/// so a plain mutex around the collision check is enough to make
/// create-or-fail atomic; no cross-process lock file is needed.
pub struct ObjectStore {
    dir: PathBuf,
    mutex: Mutex<()>,
}

impl ObjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("unable to create upload directory {dir:?}"))?;
        Ok(ObjectStore {
            dir,
            mutex: Mutex::new(()),
        })
    }

    fn final_path(&self, id: &str, token: &str) -> PathBuf {
        self.dir.join(format!("{id}.{token}"))
    }

    fn temp_path(&self, id: &str, token: &str) -> PathBuf {
        self.dir.join(format!("{id}.{token}.tmp"))
    }

    /// Does `{id}.{token}` already exist? Used by the upload session to
    /// decide whether to retry id generation (random mode) or signal a
    /// collision back to the client (passphrase mode).
    pub fn exists(&self, id: &str, token: &str) -> Result<bool, Error> {
        validate_names(id, token)?;
        Ok(self.final_path(id, token).is_file())
    }

    /// Is `id` already the name of any stored object, regardless of token?
    /// Used to detect a passphrase-derived-id collision as early as the id
    /// is known, before a token has even been exchanged.
    pub fn id_in_use(&self, id: &str) -> Result<bool, Error> {
        if !is_valid_id(id) {
            bail!("malformed file identifier '{id}'");
        }
        let _guard = self.mutex.lock().unwrap();
        let prefix = format!("{id}.");
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && !name.ends_with(".tmp") {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Return the token suffix of the committed object named `id`, if any.
    /// Used by the retrieval endpoints so the token comparison itself can
    /// run through a constant-time equality check rather than relying on a
    /// direct filesystem existence probe on the caller-supplied token.
    pub fn stored_token(&self, id: &str) -> Result<Option<String>, Error> {
        if !is_valid_id(id) {
            bail!("malformed file identifier '{id}'");
        }
        let prefix = format!("{id}.");
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy().into_owned();
            if let Some(token) = name.strip_prefix(&prefix) {
                if !token.ends_with(".tmp") {
                    return Ok(Some(token.to_string()));
                }
            }
        }
        Ok(None)
    }

    /// Create `{dir}/{id}.{token}.tmp` for exclusive append-only writing.
    /// Fails if the final name is already taken or the temp file already
    /// exists (a stale temp file from a crashed session must be swept
    /// first).
    pub fn put_blob_stream(&self, id: &str, token: &str) -> Result<TempHandle, Error> {
        validate_names(id, token)?;
        let _guard = self.mutex.lock().unwrap();

        let final_path = self.final_path(id, token);
        if final_path.is_file() {
            bail!("object '{id}.{token}' already exists");
        }

        let temp_path = self.temp_path(id, token);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("unable to create temp file {temp_path:?}"))?;

        Ok(TempHandle {
            final_path,
            temp_path,
            file,
        })
    }

    /// Atomically rename the temp file into place. Fails, leaving the temp
    /// file untouched, if the final name was created by a concurrent
    /// session in the meantime.
    pub fn commit(&self, handle: TempHandle) -> Result<(), Error> {
        let _guard = self.mutex.lock().unwrap();
        handle.file.sync_all().ok();
        if handle.final_path.is_file() {
            bail!(
                "object '{}' already exists",
                handle.final_path.display()
            );
        }
        fs::rename(&handle.temp_path, &handle.final_path).with_context(|| {
            format!(
                "unable to rename {:?} to {:?}",
                handle.temp_path, handle.final_path
            )
        })?;
        Ok(())
    }

    /// Remove a temp file after a failed or aborted upload. Idempotent:
    /// missing files are not an error.
    pub fn discard(&self, handle: TempHandle) {
        let _ = fs::remove_file(&handle.temp_path);
    }

    /// Open a stored blob for reading. `mode` only documents caller intent
    /// here — the container format's own streaming readers are what
    /// actually stop short of the chunk section for `MetadataOnly`.
    pub fn open_blob(&self, id: &str, token: &str, _mode: ReadMode) -> Result<(File, u64), Error> {
        validate_names(id, token)?;
        let path = self.final_path(id, token);
        let file = File::open(&path).with_context(|| format!("object not found: {path:?}"))?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }

    /// Idempotent delete: a missing object is not an error.
    pub fn delete_blob(&self, id: &str, token: &str) -> Result<(), Error> {
        validate_names(id, token)?;
        let _guard = self.mutex.lock().unwrap();
        match fs::remove_file(self.final_path(id, token)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete every committed object (not `.tmp` files) whose mtime
    /// predates `older_than`. Called by an external retention daemon; the
    /// daemon itself is out of scope here.
    pub fn sweep(&self, older_than: SystemTime) -> Result<Vec<PathBuf>, Error> {
        let _guard = self.mutex.lock().unwrap();
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified()?;
            if modified < older_than {
                fs::remove_file(&path)?;
                removed.push(path);
            }
        }
        Ok(removed)
    }

    /// Remove `.tmp` files older than `max_age`, leaving in-progress
    /// uploads younger than that untouched — mirrors the upload-timeout
    /// safety margin the sweep must respect per the concurrency model.
    pub fn sweep_stale_temp_files(&self, max_age: Duration) -> Result<Vec<PathBuf>, Error> {
        let _guard = self.mutex.lock().unwrap();
        let cutoff = SystemTime::now() - max_age;
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("tmp") {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.modified()? < cutoff {
                fs::remove_file(&path)?;
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread::sleep;

    fn store() -> (ObjectStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path()).unwrap();
        (store, dir)
    }

    const ID: &str = "ab12ab12ab12ab12ab12ab12ab12ab1";
    const TOKEN: &str = "tok_en-123";

    #[test]
    fn put_commit_then_open_round_trips() {
        let (store, _dir) = store();
        let mut handle = store.put_blob_stream(ID, TOKEN).unwrap();
        handle.write_all(b"hello world").unwrap();
        store.commit(handle).unwrap();

        let (mut file, size) = store.open_blob(ID, TOKEN, ReadMode::Full).unwrap();
        assert_eq!(size, 11);
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello world");
    }

    #[test]
    fn discard_leaves_no_final_file() {
        let (store, _dir) = store();
        let mut handle = store.put_blob_stream(ID, TOKEN).unwrap();
        handle.write_all(b"partial").unwrap();
        let temp_path = handle.temp_path().to_path_buf();
        store.discard(handle);

        assert!(!temp_path.exists());
        assert!(!store.exists(ID, TOKEN).unwrap());
    }

    #[test]
    fn commit_rejects_existing_final_name() {
        let (store, _dir) = store();
        let mut first = store.put_blob_stream(ID, TOKEN).unwrap();
        first.write_all(b"one").unwrap();
        store.commit(first).unwrap();

        // A second session for the same id/token must fail at put time.
        assert!(store.put_blob_stream(ID, TOKEN).is_err());
    }

    #[test]
    fn id_in_use_detects_any_token_for_that_id() {
        let (store, _dir) = store();
        assert!(!store.id_in_use(ID).unwrap());
        let mut handle = store.put_blob_stream(ID, TOKEN).unwrap();
        handle.write_all(b"x").unwrap();
        store.commit(handle).unwrap();
        assert!(store.id_in_use(ID).unwrap());
        assert!(!store.id_in_use("cd34cd34cd34cd34cd34cd34cd34cd34").unwrap());
    }

    #[test]
    fn stored_token_finds_committed_suffix_only() {
        let (store, _dir) = store();
        assert_eq!(store.stored_token(ID).unwrap(), None);

        let mut handle = store.put_blob_stream(ID, TOKEN).unwrap();
        handle.write_all(b"x").unwrap();
        // a stale temp file under the same id must never be mistaken for a
        // committed token.
        assert_eq!(store.stored_token(ID).unwrap(), None);
        store.commit(handle).unwrap();

        assert_eq!(store.stored_token(ID).unwrap().as_deref(), Some(TOKEN));
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, _dir) = store();
        let mut handle = store.put_blob_stream(ID, TOKEN).unwrap();
        handle.write_all(b"x").unwrap();
        store.commit(handle).unwrap();

        store.delete_blob(ID, TOKEN).unwrap();
        store.delete_blob(ID, TOKEN).unwrap();
        assert!(!store.exists(ID, TOKEN).unwrap());
    }

    #[test]
    fn validate_names_rejects_path_separators() {
        assert!(validate_names("../etc/passwd", TOKEN).is_err());
        assert!(validate_names(ID, "tok/en").is_err());
        assert!(validate_names(ID, "tok=en").is_err());
    }

    #[test]
    fn sweep_removes_old_committed_objects_only() {
        let (store, _dir) = store();
        let mut handle = store.put_blob_stream(ID, TOKEN).unwrap();
        handle.write_all(b"old").unwrap();
        store.commit(handle).unwrap();

        sleep(Duration::from_millis(20));
        let cutoff = SystemTime::now();

        let other_id = "cd34cd34cd34cd34cd34cd34cd34cd34";
        let mut fresh = store.put_blob_stream(other_id, TOKEN).unwrap();
        fresh.write_all(b"new").unwrap();
        store.commit(fresh).unwrap();

        let removed = store.sweep(cutoff).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!store.exists(ID, TOKEN).unwrap());
        assert!(store.exists(other_id, TOKEN).unwrap());
    }

    #[test]
    fn sweep_never_touches_tmp_files() {
        let (store, _dir) = store();
        let mut handle = store.put_blob_stream(ID, TOKEN).unwrap();
        handle.write_all(b"in progress").unwrap();
        let temp_path = handle.temp_path().to_path_buf();
        std::mem::forget(handle); // simulate a crashed session: temp file left behind

        let removed = store.sweep(SystemTime::now()).unwrap();
        assert!(removed.is_empty());
        assert!(temp_path.exists());
    }
}
