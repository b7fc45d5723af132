//! Runs an [`Action`] plan against the filesystem.
//!
//! Dry runs short-circuit before any action touches disk. Otherwise
//! each action is attempted in order; a failing action is logged and
//! doesn't stop the rest of the plan, but it does flip the overall
//! result to failure, which suppresses the sidecar write.

use std::fs;

use camino::Utf8Path;
use tracing::*;

use crate::config::BackupConfig;
use crate::error::{IoContext, Result};
use crate::file_util;
use crate::metadata;
use crate::plan::Action;
use crate::tree::Tree;

/// Execute `actions` against `config`. On overall success (and unless
/// `config.dry_run`), writes `.backupmeta` from `source_tree`.
pub fn execute(actions: &[Action], config: &BackupConfig, source_tree: &Tree) -> Result<bool> {
    if config.dry_run {
        info!("Dry run: {} action(s) planned, no filesystem changes", actions.len());
        return Ok(true);
    }

    let mut all_succeeded = true;
    for action in actions {
        if let Err(e) = execute_one(action, config) {
            warn!("Action failed: {e}");
            all_succeeded = false;
        }
    }

    if all_succeeded {
        let info = metadata::build(
            source_tree,
            &config.source_root,
            config.compression_type,
            config.encryption_type,
        );
        metadata::write(&config.backup_root, &info)?;
    }

    Ok(all_succeeded)
}

fn execute_one(action: &Action, config: &BackupConfig) -> Result<()> {
    match action {
        Action::CreateDirectory { target } => {
            fs::create_dir_all(target).io_at(target)?;
        }
        Action::CopyFile { src, target } | Action::UpdateFile { src, target } => {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).io_at(parent)?;
            }
            encode_one(src, target, config)?;
            file_util::copy_metadata(src, target);
        }
        Action::RemovePath { target } => {
            remove_if_present(target)?;
        }
    }
    Ok(())
}

fn encode_one(src: &Utf8Path, target: &Utf8Path, config: &BackupConfig) -> Result<()> {
    let compression = if config.enable_compression {
        config.compression_type
    } else {
        crate::config::CompressionType::None
    };
    let encryption = if config.enable_encryption {
        config.encryption_type
    } else {
        crate::config::EncryptionType::None
    };
    crate::codec::encode(
        src,
        target,
        compression,
        encryption,
        config.encryption_key.as_deref(),
    )
}

fn remove_if_present(target: &Utf8Path) -> Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target).io_at(target),
        Ok(_) => fs::remove_file(target).io_at(target),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).io_at(target),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diff::diff;
    use crate::plan::make_plan;
    use std::fs::File;
    use std::io::Write;

    fn init() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn run_backup(source: &Utf8Path, backup_root: &Utf8Path, config: &mut BackupConfig) -> bool {
        config.source_root = source.to_owned();
        config.backup_root = backup_root.to_owned();
        let empty = Tree::build(backup_root).unwrap();
        let source_tree = Tree::build(source).unwrap();
        let changes = diff(&empty, &source_tree);
        let actions = make_plan(&changes, config);
        execute(&actions, config, &source_tree).unwrap()
    }

    #[test]
    fn first_backup_copies_everything_and_writes_sidecar() -> anyhow::Result<()> {
        init();
        let src_dir = tempfile::tempdir()?;
        let src = Utf8Path::from_path(src_dir.path()).unwrap();
        File::create(src.join("file1.txt"))?.write_all(b"a")?;
        std::fs::create_dir(src.join("sub"))?;
        File::create(src.join("sub").join("inner.txt"))?.write_all(b"b")?;

        let dst_dir = tempfile::tempdir()?;
        let dst = Utf8Path::from_path(dst_dir.path()).unwrap();

        let mut config = BackupConfig::new(src.to_owned(), dst.to_owned());
        config.delete_removed = true;
        let ok = run_backup(src, dst, &mut config);
        assert!(ok);

        assert_eq!(std::fs::read(dst.join("file1.txt"))?, b"a");
        assert_eq!(std::fs::read(dst.join("sub").join("inner.txt"))?, b"b");
        assert!(dst.join(metadata::SIDECAR_NAME).exists());
        Ok(())
    }

    #[test]
    fn dry_run_makes_no_changes() -> anyhow::Result<()> {
        init();
        let src_dir = tempfile::tempdir()?;
        let src = Utf8Path::from_path(src_dir.path()).unwrap();
        File::create(src.join("file1.txt"))?.write_all(b"a")?;

        let dst_dir = tempfile::tempdir()?;
        let dst = Utf8Path::from_path(dst_dir.path()).unwrap();

        let mut config = BackupConfig::new(src.to_owned(), dst.to_owned());
        config.dry_run = true;
        let ok = run_backup(src, dst, &mut config);
        assert!(ok);

        assert!(!dst.join("file1.txt").exists());
        assert!(!dst.join(metadata::SIDECAR_NAME).exists());
        Ok(())
    }

    #[test]
    fn mirror_mode_removes_deleted_entries() -> anyhow::Result<()> {
        init();
        let src_dir = tempfile::tempdir()?;
        let src = Utf8Path::from_path(src_dir.path()).unwrap();
        File::create(src.join("keep.txt"))?.write_all(b"k")?;

        let dst_dir = tempfile::tempdir()?;
        let dst = Utf8Path::from_path(dst_dir.path()).unwrap();
        File::create(dst.join("stale.txt"))?.write_all(b"old")?;

        let old_tree = Tree::build(dst)?;
        let new_tree = Tree::build(src)?;
        let changes = diff(&old_tree, &new_tree);

        let mut config = BackupConfig::new(src.to_owned(), dst.to_owned());
        config.delete_removed = true;
        let actions = make_plan(&changes, &config);
        let source_tree = Tree::build(src)?;
        let ok = execute(&actions, &config, &source_tree)?;
        assert!(ok);

        assert!(!dst.join("stale.txt").exists());
        assert!(dst.join("keep.txt").exists());
        Ok(())
    }
}
