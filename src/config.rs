//! Two layers of configuration: an ambient `~/.config/backsync.toml` for
//! host-wide defaults (logging verbosity, preferred codecs), and the
//! per-invocation [`BackupConfig`] that actually drives a backup or
//! restore.

use std::{fs, io};

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use serde_derive::Deserialize;

/// Host-wide defaults, loaded once at startup from
/// `~/.config/backsync.toml`. Any field absent from the file falls back
/// to `Default`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Default compression backend when a CLI invocation doesn't say.
    pub compression: CompressionType,
    /// Default encryption backend when a CLI invocation doesn't say.
    pub encryption: EncryptionType,
    /// Mirror the destination by default (delete files removed from source).
    pub delete_removed: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            encryption: EncryptionType::None,
            delete_removed: false,
        }
    }
}

/// Read `~/.config/backsync.toml`, or fall back to defaults if it's
/// missing. Any other I/O or parse error is surfaced to the caller.
pub fn load() -> Result<Configuration> {
    let mut confpath: Utf8PathBuf = home::home_dir()
        .ok_or_else(|| anyhow!("Can't find home directory"))?
        .try_into()
        .context("Home directory isn't UTF-8")?;
    confpath.extend([".config", "backsync.toml"]);

    let s = match fs::read_to_string(&confpath) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Configuration::default()),
        found => found,
    }
    .with_context(|| format!("Couldn't open {confpath}"))?;

    let conf = toml::from_str(&s).with_context(|| format!("Couldn't parse {confpath}"))?;
    Ok(conf)
}

/// Which compression backend a codec pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    None,
    Huffman,
    Lz77,
}

/// Which encryption backend a codec pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionType {
    #[default]
    None,
    Aes,
}

/// The inputs that fully determine one backup run: §6 of the design doc.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub source_root: Utf8PathBuf,
    pub backup_root: Utf8PathBuf,
    /// Mirror mode: remove destination entries absent from source.
    pub delete_removed: bool,
    /// Compute the plan but make no filesystem changes.
    pub dry_run: bool,
    pub enable_compression: bool,
    pub compression_type: CompressionType,
    pub enable_encryption: bool,
    pub encryption_type: EncryptionType,
    /// Required (and validated via `BackupError::MissingKey`) when
    /// `enable_encryption` is set.
    pub encryption_key: Option<String>,
}

impl BackupConfig {
    pub fn new(source_root: Utf8PathBuf, backup_root: Utf8PathBuf) -> Self {
        Self {
            source_root,
            backup_root,
            delete_removed: false,
            dry_run: false,
            enable_compression: false,
            compression_type: CompressionType::None,
            enable_encryption: false,
            encryption_type: EncryptionType::None,
            encryption_key: None,
        }
    }
}

/// The inputs for a restore run.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub backup_root: Utf8PathBuf,
    pub restore_root: Utf8PathBuf,
    /// Required when the backup's sidecar records `encryption=aes`.
    pub encryption_key: Option<String>,
}
