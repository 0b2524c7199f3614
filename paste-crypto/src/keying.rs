//! Turning a passphrase or a random draw into the (file-id, secret,
//! access-token) triple every upload and download revolves around.

use std::fmt;

use openssl::rand::rand_bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use paste_api_types::{IdWidthBits, InputError, KeyWidth};

use crate::error::CryptoError;
use crate::hkdf::hkdf_sha256;
use crate::token::constant_time_eq;
use crate::wordlist::WORDS;

const FILE_ID_CONTEXT: &[u8] = b"paste-v1-file-id";
const ENCRYPTION_KEY_CONTEXT: &[u8] = b"paste-v1-encryption-key";
const TOKEN_CONTEXT: &[u8] = b"paste:hmac-token";

/// The only material capable of decrypting a blob. Never serialized, never
/// sent to the server. Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn from_bytes(width: KeyWidth, bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != width.as_bytes() {
            return Err(CryptoError::BadKey);
        }
        Ok(Secret(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn width(&self) -> KeyWidth {
        KeyWidth::new(self.0.len()).expect("Secret always holds a validated width")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({} bytes, redacted)", self.0.len())
    }
}

/// Draw a fresh `Secret` from the OS CSPRNG.
pub fn generate_secret(width: KeyWidth) -> Result<Secret, CryptoError> {
    let mut bytes = vec![0u8; width.as_bytes()];
    rand_bytes(&mut bytes)?;
    Secret::from_bytes(width, bytes)
}

/// Deterministically derive the file identifier and secret from a passphrase.
/// Both sides of a passphrase-mode exchange call this independently and must
/// land on byte-identical output: the HKDF is salt-free by design.
pub fn derive_from_passphrase(
    passphrase: &str,
    key_width: KeyWidth,
    id_width: IdWidthBits,
) -> Result<(String, Secret), CryptoError> {
    crate::passphrase::validate(passphrase)?;
    let ikm = passphrase.as_bytes();

    let id_bytes = hkdf_sha256(b"", ikm, FILE_ID_CONTEXT, id_width.as_bytes())?;
    let file_id = hex::encode(id_bytes);

    let key_bytes = hkdf_sha256(b"", ikm, ENCRYPTION_KEY_CONTEXT, key_width.as_bytes())?;
    let secret = Secret::from_bytes(key_width, key_bytes)?;

    Ok((file_id, secret))
}

/// Derive the access token a client presents to prove possession of `secret`
/// for the blob named `file_id`, without revealing the secret itself.
pub fn derive_auth_token(secret: &Secret, file_id: &str) -> Result<String, CryptoError> {
    let width = secret.width();
    let hmac_key = hkdf_sha256(
        file_id.as_bytes(),
        secret.as_bytes(),
        TOKEN_CONTEXT,
        width.as_bytes(),
    )?;

    let pkey = openssl::pkey::PKey::hmac(&hmac_key)?;
    let mut signer = openssl::sign::Signer::new(openssl::hash::MessageDigest::sha256(), &pkey)?;
    signer.update(file_id.as_bytes())?;
    let mut full_tag = [0u8; 32];
    signer.sign(&mut full_tag)?;

    Ok(base64::encode_config(
        &full_tag[..width.as_bytes()],
        base64::URL_SAFE_NO_PAD,
    ))
}

/// Sample a fresh, human-shareable passphrase of `word_count` dictionary
/// words (3-8 inclusive) plus a random 4-character `[a-z0-9]` suffix
/// containing at least one digit.
pub fn generate_passphrase(word_count: usize) -> Result<String, CryptoError> {
    if !(3..=8).contains(&word_count) {
        return Err(InputError::InvalidWordCount(word_count).into());
    }

    let mut words = Vec::with_capacity(word_count);
    for _ in 0..word_count {
        words.push(pick_word()?);
    }

    let suffix = loop {
        let candidate = random_suffix()?;
        if candidate.bytes().any(|b| b.is_ascii_digit()) {
            break candidate;
        }
    };

    words.push(suffix);
    Ok(words.join("-"))
}

fn pick_word() -> Result<&'static str, CryptoError> {
    // WORDS.len() == 512 == 2^9, so a single masked random byte plus a
    // second for the high bit gives unbiased rejection-free sampling.
    let mut buf = [0u8; 2];
    rand_bytes(&mut buf)?;
    let index = (u16::from_le_bytes(buf) as usize) % WORDS.len();
    Ok(WORDS[index])
}

fn random_suffix() -> Result<String, CryptoError> {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut raw = [0u8; 4];
    rand_bytes(&mut raw)?;
    Ok(raw
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect())
}
