//! Process-wide, read-at-startup configuration.
//!
//! Mirrors the teacher's use of `proxmox_human_byte::HumanByte` for
//! human-readable size fields, but parsed from a small standalone TOML file
//! via `serde` rather than the teacher's section-config machinery: this
//! crate has six flat options, not a whole admin-configurable object model.

use std::path::{Path, PathBuf};

use anyhow::{format_err, Context, Error};
use proxmox_human_byte::HumanByte;
use serde::Deserialize;

use crate::widths::{IdWidthBits, KeyWidth};

/// Raw, on-disk representation. Byte-size and width fields are strings so
/// they can carry unit suffixes (`"2 GiB"`) the way an administrator would
/// actually write them; [`Config::load`] parses and validates into the
/// strongly-typed [`Config`].
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "max-blob-size")]
    max_blob_size: String,
    #[serde(rename = "chunk-size")]
    chunk_size_mib: u64,
    #[serde(rename = "key-width-bits")]
    key_width_bits: u32,
    #[serde(rename = "id-width-bits")]
    id_width_bits: u32,
    #[serde(rename = "upload-dir")]
    upload_dir: PathBuf,
    #[serde(rename = "retention-days")]
    retention_days: u32,
}

/// Validated, immutable server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Rejects `init` of any upload whose declared size exceeds this.
    pub max_blob_size: u64,
    /// Expected plaintext chunk size in bytes; advisory to clients.
    pub chunk_size: u64,
    /// Default secret width generated in random mode.
    pub key_width: KeyWidth,
    /// File-identifier width.
    pub id_width: IdWidthBits,
    /// Directory blobs are stored under.
    pub upload_dir: PathBuf,
    /// Maximum object age before the retention sweep removes it.
    pub retention_days: u32,
}

impl Config {
    /// Load and validate configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {path:?}"))?;
        Self::parse(&text)
    }

    /// Parse configuration from a TOML document (split out from [`Config::load`]
    /// so tests can exercise parsing without touching the filesystem).
    pub fn parse(text: &str) -> Result<Self, Error> {
        let raw: RawConfig = toml::from_str(text).context("invalid config file")?;

        let max_blob_size: HumanByte = raw
            .max_blob_size
            .parse()
            .map_err(|err| format_err!("invalid max-blob-size '{}': {err}", raw.max_blob_size))?;

        let chunk_size = raw
            .chunk_size_mib
            .checked_mul(1024 * 1024)
            .ok_or_else(|| format_err!("chunk-size overflows"))?;

        let key_width = KeyWidth::from_bits(raw.key_width_bits)
            .map_err(|err| format_err!("invalid key-width-bits: {err}"))?;
        let id_width = IdWidthBits::new(raw.id_width_bits)
            .map_err(|err| format_err!("invalid id-width-bits: {err}"))?;

        if raw.retention_days == 0 {
            return Err(format_err!("retention-days must be positive"));
        }

        Ok(Config {
            max_blob_size: max_blob_size.as_u64(),
            chunk_size,
            key_width,
            id_width,
            upload_dir: raw.upload_dir,
            retention_days: raw.retention_days,
        })
    }

    /// A configuration good enough for tests: 1 GiB max blob, 1 MiB chunks,
    /// 256-bit keys, 256-bit ids, 30-day retention.
    #[cfg(any(test, feature = "test-support"))]
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Config {
            max_blob_size: 1024 * 1024 * 1024,
            chunk_size: 1024 * 1024,
            key_width: KeyWidth::BITS_256,
            id_width: IdWidthBits::BITS_256,
            upload_dir,
            retention_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        max-blob-size = "2 GiB"
        chunk-size = 1
        key-width-bits = 256
        id-width-bits = 256
        upload-dir = "/var/lib/paste/blobs"
        retention-days = 7
    "#;

    #[test]
    fn parses_sample_config() {
        let cfg = Config::parse(SAMPLE).unwrap();
        assert_eq!(cfg.max_blob_size, 2 * 1024 * 1024 * 1024);
        assert_eq!(cfg.chunk_size, 1024 * 1024);
        assert_eq!(cfg.key_width, KeyWidth::BITS_256);
        assert_eq!(cfg.id_width, IdWidthBits::BITS_256);
        assert_eq!(cfg.retention_days, 7);
    }

    #[test]
    fn rejects_bad_width() {
        let bad = SAMPLE.replace("256", "100");
        assert!(Config::parse(&bad).is_err());
    }

    #[test]
    fn rejects_zero_retention() {
        let bad = SAMPLE.replace("retention-days = 7", "retention-days = 0");
        assert!(Config::parse(&bad).is_err());
    }
}
