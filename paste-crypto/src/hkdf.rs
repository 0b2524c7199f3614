//! RFC 5869 HKDF-SHA-256, hand-rolled on top of `openssl::sign::Signer`
//! rather than a dedicated `hkdf` crate, so the whole crate's cryptographic
//! surface stays inside OpenSSL (the same discipline as `CryptConfig`'s use
//! of `data_signer`/`compute_auth_tag` for every keyed hash it needs).

use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;

use crate::error::CryptoError;

const HASH_LEN: usize = 32;

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; HASH_LEN], CryptoError> {
    let pkey = PKey::hmac(key)?;
    let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
    signer.update(data)?;
    let mut out = [0u8; HASH_LEN];
    let written = signer.sign(&mut out)?;
    debug_assert_eq!(written, HASH_LEN);
    Ok(out)
}

/// HKDF-Extract: `PRK = HMAC-Hash(salt, IKM)`. An empty `salt` is valid
/// (used by passphrase-mode derivation, which is deliberately saltless).
pub fn extract(salt: &[u8], ikm: &[u8]) -> Result<[u8; HASH_LEN], CryptoError> {
    hmac_sha256(salt, ikm)
}

/// HKDF-Expand: derive `out_len` bytes of output keying material from `prk`.
pub fn expand(prk: &[u8], info: &[u8], out_len: usize) -> Result<Vec<u8>, CryptoError> {
    let blocks = out_len.div_ceil(HASH_LEN);
    if blocks > 255 {
        return Err(CryptoError::HkdfOutputTooLong);
    }

    let mut previous: Vec<u8> = Vec::new();
    let mut okm = Vec::with_capacity(blocks * HASH_LEN);
    for counter in 1..=blocks as u8 {
        let mut block_input = Vec::with_capacity(previous.len() + info.len() + 1);
        block_input.extend_from_slice(&previous);
        block_input.extend_from_slice(info);
        block_input.push(counter);

        let block = hmac_sha256(prk, &block_input)?;
        okm.extend_from_slice(&block);
        previous = block.to_vec();
    }
    okm.truncate(out_len);
    Ok(okm)
}

/// Full extract-then-expand, the entry point every caller in this crate uses.
pub fn hkdf_sha256(
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
    out_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let prk = extract(salt, ikm)?;
    expand(&prk, info, out_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 5869 Appendix A Test Case 1 (HKDF-SHA256 flavor swapped for SHA-1
    // in the RFC's own test vectors is SHA-1; we instead check against the
    // widely reproduced HKDF-SHA256 vector with a 42-byte L.)
    #[test]
    fn matches_known_hkdf_sha256_vector() {
        let ikm = hex::decode("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b").unwrap();
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();
        let okm = hkdf_sha256(&salt, &ikm, &info, 42).unwrap();
        assert_eq!(
            hex::encode(&okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn saltless_extract_is_deterministic() {
        let a = hkdf_sha256(b"", b"same passphrase bytes", b"ctx", 32).unwrap();
        let b = hkdf_sha256(b"", b"same passphrase bytes", b"ctx", 32).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_info_yields_distinct_output() {
        let a = hkdf_sha256(b"", b"ikm", b"paste-v1-file-id", 32).unwrap();
        let b = hkdf_sha256(b"", b"ikm", b"paste-v1-encryption-key", 32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_oversized_output() {
        assert!(hkdf_sha256(b"", b"ikm", b"ctx", 256 * 32 + 1).is_err());
    }
}
