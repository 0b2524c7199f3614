//! Pure reader/writer functions for the stored-blob layout:
//!
//! ```text
//! metadata-iv(12) | metadata-len(u32 LE) | metadata-ciphertext(metadata-len)
//! | data-iv(12) | chunk0-ciphertext | chunk1-ciphertext | ... | chunkN-1-ciphertext
//! ```
//!
//! These functions never buffer the chunk stream; they operate directly over
//! any `Read`/`Write` implementation, mirroring the teacher's
//! `CryptWriter<W>`/`CryptReader<R>` generic-over-the-inner-stream style
//! rather than loading a whole blob into memory.

use std::io::{self, Read, Write};

use crate::error::ContainerError;

pub const METADATA_IV_LEN: usize = 12;
pub const DATA_IV_LEN: usize = 12;
pub const AEAD_TAG_LEN: usize = 16;
pub const MIN_METADATA_LEN: u32 = AEAD_TAG_LEN as u32 + 1;
pub const MAX_METADATA_LEN: u32 = 1024 * 1024;

/// Validate a `metadata-iv || metadata-len || metadata-ciphertext` envelope's
/// framing, without attempting to decrypt it.
pub fn validate_header(metadata_iv: &[u8; METADATA_IV_LEN], metadata_len: u32) -> Result<(), ContainerError> {
    if metadata_iv.iter().all(|b| *b == 0) {
        return Err(ContainerError::ZeroMetadataIv);
    }
    if !(MIN_METADATA_LEN..=MAX_METADATA_LEN).contains(&metadata_len) {
        return Err(ContainerError::BadMetadataLen(metadata_len));
    }
    Ok(())
}

/// Check that a chunk ciphertext's length is within bounds for the
/// configured plaintext `chunk_size`: `len == P + 16` with `P in [0,
/// chunk_size]`.
pub fn validate_chunk_len(ciphertext_len: usize, chunk_size: usize) -> Result<(), ContainerError> {
    if ciphertext_len < AEAD_TAG_LEN || ciphertext_len > chunk_size + AEAD_TAG_LEN {
        return Err(ContainerError::OversizedChunk(ciphertext_len));
    }
    Ok(())
}

/// Write a full blob: the metadata envelope (already AEAD-framed by the
/// caller), the data IV, and the chunk ciphertexts in order.
pub fn write_blob<W: Write>(
    writer: &mut W,
    metadata_envelope: &[u8],
    data_iv: &[u8; DATA_IV_LEN],
    chunks: impl IntoIterator<Item = io::Result<Vec<u8>>>,
) -> Result<(), ContainerError> {
    if metadata_envelope.len() < METADATA_IV_LEN + 4 {
        return Err(ContainerError::ShortRead {
            expected: METADATA_IV_LEN + 4,
            actual: metadata_envelope.len(),
        });
    }
    let mut iv = [0u8; METADATA_IV_LEN];
    iv.copy_from_slice(&metadata_envelope[..METADATA_IV_LEN]);
    let len_bytes = &metadata_envelope[METADATA_IV_LEN..METADATA_IV_LEN + 4];
    let declared_len = u32::from_le_bytes(len_bytes.try_into().expect("exactly 4 bytes"));
    validate_header(&iv, declared_len)?;

    writer.write_all(metadata_envelope)?;
    writer.write_all(data_iv)?;
    for chunk in chunks {
        writer.write_all(&chunk?)?;
    }
    Ok(())
}

/// Read exactly `metadata-iv || metadata-len || metadata-ciphertext`,
/// positioning the reader at the start of `data-iv`. Never touches the
/// chunk stream.
pub fn read_metadata<R: Read>(reader: &mut R) -> Result<([u8; METADATA_IV_LEN], Vec<u8>), ContainerError> {
    let mut iv = [0u8; METADATA_IV_LEN];
    reader.read_exact(&mut iv)?;

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let metadata_len = u32::from_le_bytes(len_buf);
    validate_header(&iv, metadata_len)?;

    let mut ciphertext = vec![0u8; metadata_len as usize];
    reader.read_exact(&mut ciphertext)?;

    Ok((iv, ciphertext))
}

/// Consume the metadata header and ciphertext without returning them,
/// positioning the reader at the start of the chunk stream. Used by callers
/// that already have a decrypted metadata copy from a prior `read_metadata`.
pub fn skip_metadata_section<R: Read>(reader: &mut R) -> Result<[u8; DATA_IV_LEN], ContainerError> {
    read_metadata(reader)?;
    let mut data_iv = [0u8; DATA_IV_LEN];
    reader.read_exact(&mut data_iv)?;
    Ok(data_iv)
}

/// Read one chunk ciphertext of at most `max_ciphertext_len` bytes
/// (`chunk_size + 16`). Returns `None` on clean end-of-stream (zero bytes
/// read), `Some(buf)` otherwise — `buf.len() < max_ciphertext_len` marks the
/// terminal chunk. A read that returns a nonzero amount smaller than the
/// AEAD tag with more data still pending is a protocol violation the caller
/// must reject once it attempts to decrypt it.
pub fn read_chunk<R: Read>(
    reader: &mut R,
    max_ciphertext_len: usize,
) -> Result<Option<Vec<u8>>, ContainerError> {
    let mut buf = vec![0u8; max_ciphertext_len];
    let mut filled = 0;
    loop {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => {
                filled += n;
                if filled == max_ciphertext_len {
                    break;
                }
            }
        }
    }
    if filled == 0 {
        return Ok(None);
    }
    buf.truncate(filled);
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_envelope(ciphertext_len: usize) -> Vec<u8> {
        let mut env = Vec::new();
        env.extend_from_slice(&[7u8; METADATA_IV_LEN]);
        env.extend_from_slice(&(ciphertext_len as u32).to_le_bytes());
        env.extend(std::iter::repeat(9u8).take(ciphertext_len));
        env
    }

    #[test]
    fn write_then_read_metadata_round_trips() {
        let envelope = sample_envelope(17);
        let data_iv = [1u8; DATA_IV_LEN];
        let mut buf = Vec::new();
        write_blob(&mut buf, &envelope, &data_iv, vec![Ok(vec![0u8; 20])]).unwrap();

        let mut reader = Cursor::new(&buf);
        let (iv, ciphertext) = read_metadata(&mut reader).unwrap();
        assert_eq!(iv, [7u8; METADATA_IV_LEN]);
        assert_eq!(ciphertext.len(), 17);
    }

    #[test]
    fn skip_metadata_section_lands_on_data_iv() {
        let envelope = sample_envelope(17);
        let data_iv = [3u8; DATA_IV_LEN];
        let mut buf = Vec::new();
        write_blob(&mut buf, &envelope, &data_iv, vec![Ok(vec![5u8; 50])]).unwrap();

        let mut reader = Cursor::new(&buf);
        let iv = skip_metadata_section(&mut reader).unwrap();
        assert_eq!(iv, data_iv);

        let chunk = read_chunk(&mut reader, 50).unwrap().unwrap();
        assert_eq!(chunk, vec![5u8; 50]);
        assert!(read_chunk(&mut reader, 50).unwrap().is_none());
    }

    #[test]
    fn zero_metadata_iv_rejected() {
        assert!(validate_header(&[0u8; METADATA_IV_LEN], 17).is_err());
    }

    #[test]
    fn metadata_len_bounds_enforced() {
        assert!(validate_header(&[1u8; METADATA_IV_LEN], 16).is_err());
        assert!(validate_header(&[1u8; METADATA_IV_LEN], 17).is_ok());
        assert!(validate_header(&[1u8; METADATA_IV_LEN], MAX_METADATA_LEN).is_ok());
        assert!(validate_header(&[1u8; METADATA_IV_LEN], MAX_METADATA_LEN + 1).is_err());
    }

    #[test]
    fn terminal_chunk_shorter_than_max_is_reported() {
        let mut reader = Cursor::new(vec![1u8, 2, 3]);
        let chunk = read_chunk(&mut reader, 100).unwrap().unwrap();
        assert_eq!(chunk, vec![1, 2, 3]);
        assert!(read_chunk(&mut reader, 100).unwrap().is_none());
    }

    #[test]
    fn empty_chunk_stream_round_trips() {
        let envelope = sample_envelope(17);
        let data_iv = [9u8; DATA_IV_LEN];
        let mut buf = Vec::new();
        write_blob::<Vec<u8>>(&mut buf, &envelope, &data_iv, vec![]).unwrap();

        let mut reader = Cursor::new(&buf);
        let iv = skip_metadata_section(&mut reader).unwrap();
        assert_eq!(iv, data_iv);
        assert!(read_chunk(&mut reader, 100).unwrap().is_none());
    }

    #[test]
    fn chunk_len_validation() {
        assert!(validate_chunk_len(16, 1024).is_ok());
        assert!(validate_chunk_len(1024 + 16, 1024).is_ok());
        assert!(validate_chunk_len(1024 + 17, 1024).is_err());
        assert!(validate_chunk_len(15, 1024).is_err());
    }
}
