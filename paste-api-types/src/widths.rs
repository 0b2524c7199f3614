//! Validated widths for secrets and file identifiers.
//!
//! Kept as small, copyable newtypes rather than bare `usize`/`u32` so that
//! every call site that accepts a width goes through [`KeyWidth::new`] or
//! [`IdWidthBits::new`] and can never observe an unsupported value.

use std::fmt;

use crate::error::InputError;

/// Width (in bytes) of a [`Secret`](https://docs.rs/paste-crypto) or access token.
///
/// Valid widths are 16, 24 and 32 bytes (AES-128/192/256-equivalent).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct KeyWidth(usize);

impl KeyWidth {
    pub const BITS_128: KeyWidth = KeyWidth(16);
    pub const BITS_192: KeyWidth = KeyWidth(24);
    pub const BITS_256: KeyWidth = KeyWidth(32);

    /// Validate a raw byte width, returning `UnsupportedKeyWidth` otherwise.
    pub fn new(width_bytes: usize) -> Result<Self, InputError> {
        match width_bytes {
            16 | 24 | 32 => Ok(KeyWidth(width_bytes)),
            other => Err(InputError::UnsupportedKeyWidth(other)),
        }
    }

    /// Validate a width given in bits (128/192/256), as used by the config surface.
    pub fn from_bits(width_bits: u32) -> Result<Self, InputError> {
        if width_bits % 8 != 0 {
            return Err(InputError::UnsupportedKeyWidth((width_bits / 8) as usize));
        }
        Self::new((width_bits / 8) as usize)
    }

    pub fn as_bytes(self) -> usize {
        self.0
    }

    pub fn as_bits(self) -> u32 {
        (self.0 * 8) as u32
    }

    /// Length, in base64url characters (no padding), of an access token of this width.
    pub fn token_b64_len(self) -> usize {
        (self.0 * 4).div_ceil(3)
    }
}

impl fmt::Display for KeyWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.as_bits())
    }
}

/// Width (in bits) of a file identifier, rendered as hex.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct IdWidthBits(u32);

impl IdWidthBits {
    pub const BITS_64: IdWidthBits = IdWidthBits(64);
    pub const BITS_128: IdWidthBits = IdWidthBits(128);
    pub const BITS_192: IdWidthBits = IdWidthBits(192);
    pub const BITS_256: IdWidthBits = IdWidthBits(256);

    pub fn new(width_bits: u32) -> Result<Self, InputError> {
        match width_bits {
            64 | 128 | 192 | 256 => Ok(IdWidthBits(width_bits)),
            other => Err(InputError::UnsupportedIdWidth(other)),
        }
    }

    pub fn as_bits(self) -> u32 {
        self.0
    }

    pub fn as_bytes(self) -> usize {
        (self.0 / 8) as usize
    }

    /// Length of the hex-encoded identifier (two hex chars per byte).
    pub fn hex_len(self) -> usize {
        self.as_bytes() * 2
    }
}

impl fmt::Display for IdWidthBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_width_rejects_unsupported() {
        assert!(KeyWidth::new(20).is_err());
        assert_eq!(KeyWidth::new(16).unwrap().as_bytes(), 16);
    }

    #[test]
    fn token_b64_len_matches_known_widths() {
        assert_eq!(KeyWidth::new(16).unwrap().token_b64_len(), 22);
        assert_eq!(KeyWidth::new(24).unwrap().token_b64_len(), 32);
        assert_eq!(KeyWidth::new(32).unwrap().token_b64_len(), 43);
    }

    #[test]
    fn id_width_hex_len() {
        assert_eq!(IdWidthBits::new(256).unwrap().hex_len(), 64);
        assert_eq!(IdWidthBits::new(64).unwrap().hex_len(), 16);
        assert!(IdWidthBits::new(100).is_err());
    }
}
