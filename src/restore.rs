//! Reconstructs a source tree from a backup: read the sidecar, recreate
//! directories, then decode files through the inverse codec pipeline.

use std::fs;

use tracing::*;

use crate::config::RestoreConfig;
use crate::error::{IoContext, Result};
use crate::file_util;
use crate::metadata::{self, MetadataInfo};

/// Restore a backup described by its `.backupmeta` sidecar into
/// `config.restore_root`. Directories are created before files so no
/// copy ever races a missing parent.
pub fn restore(config: &RestoreConfig) -> Result<bool> {
    let info = metadata::read(&config.backup_root)?;

    for entry in info.entries.iter().filter(|e| e.is_directory) {
        let target = config.restore_root.join(&entry.relative_path);
        if let Err(e) = fs::create_dir_all(&target).io_at(&target) {
            warn!("Couldn't create {target}: {e}");
        }
    }

    let mut all_succeeded = true;
    for entry in info.entries.iter().filter(|e| !e.is_directory) {
        if let Err(e) = restore_file(entry, &info, config) {
            warn!("Couldn't restore {}: {e}", entry.relative_path);
            all_succeeded = false;
        }
    }

    Ok(all_succeeded)
}

fn restore_file(
    entry: &crate::metadata::FileEntry,
    info: &MetadataInfo,
    config: &RestoreConfig,
) -> Result<()> {
    let src = config.backup_root.join(&entry.relative_path);
    let target = config.restore_root.join(&entry.relative_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).io_at(parent)?;
    }

    crate::codec::decode(
        &src,
        &target,
        info.compression,
        info.encryption,
        config.encryption_key.as_deref(),
    )?;

    file_util::copy_metadata(&src, &target);
    Ok(())
}
