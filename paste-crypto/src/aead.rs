//! Streaming AES-256-GCM chunk cipher with a derived per-chunk nonce, and a
//! single-shot metadata envelope cipher. Generalizes the teacher's
//! fixed-16-byte-IV `CryptConfig::data_crypter` to a 12-byte nonce built
//! from a random per-blob IV and a monotonically increasing chunk counter.

use openssl::rand::rand_bytes;
use openssl::symm::{Cipher, Crypter, Mode};
use zeroize::Zeroize;

use paste_api_types::KeyWidth;

use crate::error::CryptoError;

/// Nonces are 8 random bytes (the low 4 bytes of `data_iv` are unused as
/// randomness and instead carry the counter) followed by a 4-byte
/// little-endian counter.
const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const DATA_IV_LEN: usize = 12;

/// One million chunks per blob: a defence-in-depth cap well below the
/// counter's full 2^32 range.
pub const MAX_CHUNK_COUNT: u32 = 1 << 20;

fn cipher_for(width: KeyWidth) -> Result<Cipher, CryptoError> {
    match width.as_bytes() {
        16 => Ok(Cipher::aes_128_gcm()),
        24 => Ok(Cipher::aes_192_gcm()),
        32 => Ok(Cipher::aes_256_gcm()),
        _ => Err(CryptoError::BadKey),
    }
}

fn chunk_nonce(data_iv: &[u8; DATA_IV_LEN], counter: u32) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..8].copy_from_slice(&data_iv[..8]);
    nonce[8..].copy_from_slice(&counter.to_le_bytes());
    nonce
}

/// Encrypts successive plaintext chunks of a single blob under one random
/// `data_iv`, deriving a fresh nonce for each chunk from the IV and an
/// internal counter. The IV is zeroed when the encryptor is dropped.
pub struct ChunkEncryptor {
    key: Vec<u8>,
    cipher: Cipher,
    data_iv: [u8; DATA_IV_LEN],
    counter: u32,
}

impl ChunkEncryptor {
    /// Generates a fresh random `data_iv` for this blob.
    pub fn new(key_width: KeyWidth, key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != key_width.as_bytes() {
            return Err(CryptoError::BadKey);
        }
        let mut data_iv = [0u8; DATA_IV_LEN];
        rand_bytes(&mut data_iv)?;
        Ok(ChunkEncryptor {
            key: key.to_vec(),
            cipher: cipher_for(key_width)?,
            data_iv,
            counter: 0,
        })
    }

    /// The random IV for this blob; emitted once on the wire/on disk before
    /// the first chunk ciphertext.
    pub fn data_iv(&self) -> &[u8; DATA_IV_LEN] {
        &self.data_iv
    }

    /// Encrypts `plaintext`, returning `ciphertext || tag`. Advances the
    /// internal counter; fails once the counter would exceed the blob limit.
    pub fn encrypt_chunk(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.counter >= MAX_CHUNK_COUNT {
            return Err(CryptoError::ChunkLimitExceeded);
        }
        let nonce = chunk_nonce(&self.data_iv, self.counter);
        self.counter += 1;

        let mut crypter = Crypter::new(self.cipher, Mode::Encrypt, &self.key, Some(&nonce))?;
        crypter.aad_update(b"")?;

        let mut out = vec![0u8; plaintext.len() + self.cipher.block_size()];
        let mut written = crypter.update(plaintext, &mut out)?;
        written += crypter.finalize(&mut out[written..])?;
        out.truncate(written);

        let mut tag = [0u8; TAG_LEN];
        crypter.get_tag(&mut tag)?;
        out.extend_from_slice(&tag);
        Ok(out)
    }
}

impl Drop for ChunkEncryptor {
    fn drop(&mut self) {
        self.data_iv.zeroize();
        self.key.zeroize();
    }
}

/// Decrypts successive chunk ciphertexts produced by [`ChunkEncryptor`],
/// re-deriving the same nonce sequence from a caller-supplied `data_iv`.
pub struct ChunkDecryptor {
    key: Vec<u8>,
    cipher: Cipher,
    data_iv: [u8; DATA_IV_LEN],
    counter: u32,
}

impl ChunkDecryptor {
    pub fn new(
        key_width: KeyWidth,
        key: &[u8],
        data_iv: [u8; DATA_IV_LEN],
    ) -> Result<Self, CryptoError> {
        if key.len() != key_width.as_bytes() {
            return Err(CryptoError::BadKey);
        }
        Ok(ChunkDecryptor {
            key: key.to_vec(),
            cipher: cipher_for(key_width)?,
            data_iv,
            counter: 0,
        })
    }

    /// Decrypts one `ciphertext || tag` chunk. Any authentication failure
    /// must be treated by the caller as poisoning the whole stream: do not
    /// call this again after an error.
    pub fn decrypt_chunk(&mut self, chunk: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.counter >= MAX_CHUNK_COUNT {
            return Err(CryptoError::ChunkLimitExceeded);
        }
        if chunk.len() < TAG_LEN {
            return Err(CryptoError::BadMetadataFormat("chunk shorter than AEAD tag"));
        }
        let (body, tag) = chunk.split_at(chunk.len() - TAG_LEN);

        let nonce = chunk_nonce(&self.data_iv, self.counter);
        self.counter += 1;

        let mut crypter = Crypter::new(self.cipher, Mode::Decrypt, &self.key, Some(&nonce))?;
        crypter.aad_update(b"")?;
        crypter.set_tag(tag)?;

        let mut out = vec![0u8; body.len() + self.cipher.block_size()];
        let mut written = crypter.update(body, &mut out)?;
        written += crypter.finalize(&mut out[written..]).map_err(|_| CryptoError::AuthFailure)?;
        out.truncate(written);
        Ok(out)
    }
}

impl Drop for ChunkDecryptor {
    fn drop(&mut self) {
        self.data_iv.zeroize();
        self.key.zeroize();
    }
}

/// Single-shot AEAD envelope used for the plaintext metadata record, with a
/// nonce independent from the chunk counter scheme and an explicit
/// `nonce || len_u32_le || ciphertext` wire framing.
pub struct MetadataCipher;

impl MetadataCipher {
    /// Encrypt `plaintext` under a fresh random nonce, returning the framed
    /// `nonce(12) || len_u32_le(ciphertext_len) || ciphertext` bytes.
    pub fn encrypt(
        key_width: KeyWidth,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if key.len() != key_width.as_bytes() {
            return Err(CryptoError::BadKey);
        }
        let mut nonce = [0u8; NONCE_LEN];
        rand_bytes(&mut nonce)?;

        let cipher = cipher_for(key_width)?;
        let mut crypter = Crypter::new(cipher, Mode::Encrypt, key, Some(&nonce))?;
        crypter.aad_update(b"")?;

        let mut out = vec![0u8; plaintext.len() + cipher.block_size()];
        let mut written = crypter.update(plaintext, &mut out)?;
        written += crypter.finalize(&mut out[written..])?;
        out.truncate(written);

        let mut tag = [0u8; TAG_LEN];
        crypter.get_tag(&mut tag)?;
        out.extend_from_slice(&tag);

        let mut framed = Vec::with_capacity(NONCE_LEN + 4 + out.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&(out.len() as u32).to_le_bytes());
        framed.extend_from_slice(&out);
        Ok(framed)
    }

    /// Decrypt a `nonce || len_u32_le || ciphertext` framed envelope.
    pub fn decrypt(key_width: KeyWidth, key: &[u8], framed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if key.len() != key_width.as_bytes() {
            return Err(CryptoError::BadKey);
        }
        if framed.len() < NONCE_LEN + 4 {
            return Err(CryptoError::BadMetadataFormat("envelope shorter than header"));
        }
        let (nonce, rest) = framed.split_at(NONCE_LEN);
        let (len_bytes, ciphertext) = rest.split_at(4);
        let len = u32::from_le_bytes(len_bytes.try_into().expect("exactly 4 bytes")) as usize;
        if len != ciphertext.len() {
            return Err(CryptoError::BadMetadataFormat(
                "declared length does not match remaining bytes",
            ));
        }
        if len < TAG_LEN {
            return Err(CryptoError::BadMetadataFormat("ciphertext shorter than AEAD tag"));
        }

        let (body, tag) = ciphertext.split_at(ciphertext.len() - TAG_LEN);
        let cipher = cipher_for(key_width)?;
        let mut crypter = Crypter::new(cipher, Mode::Decrypt, key, Some(nonce))?;
        crypter.aad_update(b"")?;
        crypter.set_tag(tag)?;

        let mut out = vec![0u8; body.len() + cipher.block_size()];
        let mut written = crypter.update(body, &mut out)?;
        written += crypter.finalize(&mut out[written..]).map_err(|_| CryptoError::AuthFailure)?;
        out.truncate(written);
        Ok(out)
    }
}
