//! Compress-then-encrypt write pipeline, decrypt-then-decompress read
//! pipeline. Either stage can be disabled, in which case the pipeline is
//! the identity on that stage.
//!
//! Every stage goes through a temp file beside the target, renamed into
//! place only on success, so a partial write never clobbers anything.

pub mod cipher;
pub mod huffman;
pub mod lz77;

use std::fs;

use camino::Utf8Path;
use tracing::*;

use crate::config::{CompressionType, EncryptionType};
use crate::error::{IoContext, Result};
use crate::file_util::{safe_copy, sibling_tmp};

/// Compress (optionally) then encrypt (optionally) `src` onto `target`.
pub fn encode(
    src: &Utf8Path,
    target: &Utf8Path,
    compression: CompressionType,
    encryption: EncryptionType,
    key: Option<&str>,
) -> Result<()> {
    if compression == CompressionType::None && encryption == EncryptionType::None {
        return safe_copy(src, target);
    }

    let input = fs::read(src).io_at(src)?;

    let compressed = match compression {
        CompressionType::None => input,
        CompressionType::Huffman => huffman::compress(&input)?,
        CompressionType::Lz77 => lz77::compress(&input)?,
    };

    let output = match encryption {
        EncryptionType::None => compressed,
        EncryptionType::Aes => {
            let key = key.ok_or(crate::error::BackupError::MissingKey)?;
            cipher::encrypt(&compressed, key)?
        }
    };

    let tmp = sibling_tmp(target, "enc");
    fs::write(&tmp, &output).io_at(&tmp)?;
    fs::rename(&tmp, target).io_at(target)?;
    debug!("Encoded {src} -> {target} ({} -> {} bytes)", src_len(src), output.len());
    Ok(())
}

/// Decrypt (optionally) then decompress (optionally) `src` onto `target`.
pub fn decode(
    src: &Utf8Path,
    target: &Utf8Path,
    compression: CompressionType,
    encryption: EncryptionType,
    key: Option<&str>,
) -> Result<()> {
    if compression == CompressionType::None && encryption == EncryptionType::None {
        return safe_copy(src, target);
    }

    let input = fs::read(src).io_at(src)?;

    let decrypted = match encryption {
        EncryptionType::None => input,
        EncryptionType::Aes => {
            let key = key.ok_or(crate::error::BackupError::MissingKey)?;
            cipher::decrypt(&input, key)?
        }
    };

    let decompressed = match compression {
        CompressionType::None => decrypted,
        CompressionType::Huffman => huffman::decompress(&decrypted)?,
        CompressionType::Lz77 => lz77::decompress(&decrypted)?,
    };

    let tmp = sibling_tmp(target, "dec");
    fs::write(&tmp, &decompressed).io_at(&tmp)?;
    fs::rename(&tmp, target).io_at(target)?;
    Ok(())
}

fn src_len(path: &Utf8Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
