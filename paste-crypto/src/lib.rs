//! Keying and AEAD primitives: the cryptographic core that turns a secret
//! into ciphertext and back, and a passphrase into a secret.

pub mod aead;
pub mod error;
mod hkdf;
pub mod keying;
pub mod passphrase;
pub mod token;
mod wordlist;

pub use aead::{ChunkDecryptor, ChunkEncryptor, MetadataCipher};
pub use error::CryptoError;
pub use keying::{
    derive_auth_token, derive_from_passphrase, generate_passphrase, generate_secret, Secret,
};
pub use token::constant_time_eq;
