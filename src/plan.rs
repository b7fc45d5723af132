//! Turns a [`Change`] list into an ordered list of filesystem [`Action`]s.

use camino::Utf8PathBuf;

use crate::config::BackupConfig;
use crate::diff::{Change, ChangeKind};
use crate::tree::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateDirectory {
        target: Utf8PathBuf,
    },
    CopyFile {
        src: Utf8PathBuf,
        target: Utf8PathBuf,
    },
    UpdateFile {
        src: Utf8PathBuf,
        target: Utf8PathBuf,
    },
    RemovePath {
        target: Utf8PathBuf,
    },
}

/// Translate `changes` into actions against `config`, one pass, no
/// separate sort: the diff is already ordered by `relative_path` with
/// parents before children, and that's the order actions come out in.
pub fn make_plan(changes: &[Change], config: &BackupConfig) -> Vec<Action> {
    let mut actions = Vec::with_capacity(changes.len());

    for change in changes {
        let rel = &change.relative_path;
        match change.kind {
            ChangeKind::Added => {
                let new = change.new.expect("Added change always has a new node");
                let target = config.backup_root.join(rel);
                match new.kind {
                    NodeKind::Directory { .. } => {
                        actions.push(Action::CreateDirectory { target });
                    }
                    NodeKind::File { .. } => {
                        let src = config.source_root.join(rel);
                        actions.push(Action::CopyFile { src, target });
                    }
                }
            }
            ChangeKind::Modified => {
                let src = config.source_root.join(rel);
                let target = config.backup_root.join(rel);
                actions.push(Action::UpdateFile { src, target });
            }
            ChangeKind::Removed => {
                if config.delete_removed {
                    let target = config.backup_root.join(rel);
                    actions.push(Action::RemovePath { target });
                }
            }
        }
    }

    actions
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diff::diff;
    use crate::tree::Tree;
    use camino::Utf8Path;
    use std::fs;
    use std::fs::File;
    use std::io::Write;

    fn init() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    #[test]
    fn plan_preserves_parent_before_child_order() -> anyhow::Result<()> {
        init();
        let old_dir = tempfile::tempdir()?;
        let old_root = Utf8Path::from_path(old_dir.path()).unwrap();
        let new_dir = tempfile::tempdir()?;
        let new_root = Utf8Path::from_path(new_dir.path()).unwrap();

        fs::create_dir(new_root.join("sub"))?;
        File::create(new_root.join("sub").join("inner.txt"))?.write_all(b"hi")?;

        let old_tree = Tree::build(old_root)?;
        let new_tree = Tree::build(new_root)?;
        let changes = diff(&old_tree, &new_tree);

        let mut config = BackupConfig::new(new_root.to_owned(), Utf8PathBuf::from("/dest"));
        config.delete_removed = true;
        let actions = make_plan(&changes, &config);

        assert_eq!(
            actions,
            vec![
                Action::CreateDirectory {
                    target: Utf8PathBuf::from("/dest/sub")
                },
                Action::CopyFile {
                    src: new_root.join("sub/inner.txt"),
                    target: Utf8PathBuf::from("/dest/sub/inner.txt"),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn removed_suppressed_without_mirror_mode() -> anyhow::Result<()> {
        init();
        let old_dir = tempfile::tempdir()?;
        let old_root = Utf8Path::from_path(old_dir.path()).unwrap();
        File::create(old_root.join("gone.txt"))?.write_all(b"bye")?;
        let new_dir = tempfile::tempdir()?;
        let new_root = Utf8Path::from_path(new_dir.path()).unwrap();

        let old_tree = Tree::build(old_root)?;
        let new_tree = Tree::build(new_root)?;
        let changes = diff(&old_tree, &new_tree);

        let config = BackupConfig::new(new_root.to_owned(), Utf8PathBuf::from("/dest"));
        assert!(make_plan(&changes, &config).is_empty());
        Ok(())
    }
}
