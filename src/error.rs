//! Structured errors for the bits of the engine callers need to match on.
//!
//! Everything else (CLI-facing context, "couldn't open this particular
//! file" chains) goes through `anyhow` instead, the same split the rest of
//! this codebase uses between a precise library error and a context-rich
//! top-level one.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("{0} is not a directory we can back up from")]
    InvalidSourceRoot(Utf8PathBuf),

    #[error("{0} is not usable as a backup root")]
    InvalidBackupRoot(Utf8PathBuf),

    #[error("No readable .backupmeta in {0}")]
    MissingMetadata(Utf8PathBuf),

    #[error("Encryption was enabled without a password")]
    MissingKey,

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("I/O error at {path}: {cause}")]
    IoError {
        path: Utf8PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;

pub(crate) trait IoContext<T> {
    fn io_at(self, path: &camino::Utf8Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_at(self, path: &camino::Utf8Path) -> Result<T> {
        self.map_err(|cause| BackupError::IoError {
            path: path.to_owned(),
            cause,
        })
    }
}
