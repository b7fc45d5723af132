//! Snapshot a filesystem subtree into an in-memory [`Tree`].
//!
//! A [`Tree`] is built once via [`Tree::build`] and is immutable for the
//! rest of its life; the differ and planner only ever read it.

use std::fs;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::*;

use crate::error::{BackupError, Result};

/// The kind-specific payload of a [`Node`].
///
/// Splitting this out (rather than an `Option<size>`/`Option<children>`
/// pair on `Node` itself) makes "a file has no children" and "a directory
/// has no size" unrepresentable instead of merely undocumented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File { size: u64, mtime: SystemTime },
    Directory { children: Vec<Node> },
}

/// A single snapshot entry: a file or a directory, plus its relative
/// position in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub relative_path: Utf8PathBuf,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File { size, .. } => *size,
            NodeKind::Directory { .. } => 0,
        }
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        match &self.kind {
            NodeKind::File { mtime, .. } => Some(*mtime),
            NodeKind::Directory { .. } => None,
        }
    }
}

/// A snapshot of a filesystem subtree, rooted at `root_path`.
///
/// Built once via [`Tree::build`]; nothing mutates it afterwards.
#[derive(Debug)]
pub struct Tree {
    pub root: Node,
    pub root_path: Utf8PathBuf,
}

impl Tree {
    /// Snapshot the directory at `root_path`.
    ///
    /// `root_path` must exist and be a directory. Unreadable
    /// subdirectories are skipped and logged as warnings rather than
    /// aborting the whole snapshot.
    pub fn build(root_path: &Utf8Path) -> Result<Tree> {
        let meta = fs::symlink_metadata(root_path)
            .map_err(|_| BackupError::InvalidSourceRoot(root_path.to_owned()))?;
        if !meta.is_dir() {
            return Err(BackupError::InvalidSourceRoot(root_path.to_owned()));
        }

        let name = root_path
            .file_name()
            .unwrap_or(root_path.as_str())
            .to_string();

        let children = build_children(root_path, root_path);

        let root = Node {
            name,
            relative_path: Utf8PathBuf::from("."),
            kind: NodeKind::Directory { children },
        };

        Ok(Tree {
            root,
            root_path: root_path.to_owned(),
        })
    }
}

/// Recurse into `abs_path` (whose entries are relative to `snapshot_root`),
/// returning its directory entries as `Node`s in whatever order the
/// filesystem hands them back. Sortedness is the differ's contract, not
/// this builder's.
fn build_children(abs_path: &Utf8Path, snapshot_root: &Utf8Path) -> Vec<Node> {
    let entries = match fs::read_dir(abs_path) {
        Ok(rd) => rd,
        Err(e) => {
            warn!("Couldn't read directory {abs_path}: {e}");
            return Vec::new();
        }
    };

    let mut children = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Couldn't read a directory entry under {abs_path}: {e}");
                continue;
            }
        };

        let path = match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(p) => p,
            Err(p) => {
                warn!("Skipping non-UTF-8 path {}", p.display());
                continue;
            }
        };

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                warn!("Couldn't stat {path}: {e}");
                continue;
            }
        };

        let name = path.file_name().unwrap_or_default().to_string();
        let relative_path = pathdiff(&path, snapshot_root);

        if file_type.is_dir() {
            let grandchildren = build_children(&path, snapshot_root);
            children.push(Node {
                name,
                relative_path,
                kind: NodeKind::Directory {
                    children: grandchildren,
                },
            });
        } else if file_type.is_file() {
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Couldn't stat {path}: {e}");
                    continue;
                }
            };
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            children.push(Node {
                name,
                relative_path,
                kind: NodeKind::File {
                    size: meta.len(),
                    mtime,
                },
            });
        }
        // Symlinks, sockets, FIFOs, and device files are silently skipped.
    }

    children
}

/// `path`, made relative to `root` and joined POSIX-style.
fn pathdiff(path: &Utf8Path, root: &Utf8Path) -> Utf8PathBuf {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .fold(Utf8PathBuf::new(), |mut acc, c| {
            acc.push(c.as_str());
            acc
        })
}
