//! Computes a minimal, stably-ordered change set between two [`Tree`]s.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};

use crate::metadata::SIDECAR_NAME;
use crate::tree::{Node, Tree};

/// The kind of difference found at a given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

/// A single difference between an "old" and a "new" tree.
///
/// `old`/`new` borrow from whichever [`Tree`]s were diffed, so a `Change`
/// is only valid for as long as both trees are alive.
#[derive(Debug, Clone)]
pub struct Change<'a> {
    pub kind: ChangeKind,
    pub relative_path: Utf8PathBuf,
    pub old: Option<&'a Node>,
    pub new: Option<&'a Node>,
}

/// Flatten a tree into `relative_path -> Node`, skipping the root entry
/// (`"."`) and the metadata sidecar (`.backupmeta`) — neither the diff
/// nor the plan it feeds ever talks about them (§4.2).
fn flatten(tree: &Tree) -> BTreeMap<&Utf8Path, &Node> {
    let mut map = BTreeMap::new();
    flatten_into(&tree.root, &mut map);
    map.remove(Utf8Path::new("."));
    map.remove(Utf8Path::new(SIDECAR_NAME));
    map
}

fn flatten_into<'a>(node: &'a Node, map: &mut BTreeMap<&'a Utf8Path, &'a Node>) {
    map.insert(&node.relative_path, node);
    for child in node.children() {
        flatten_into(child, map);
    }
}

/// Diff `old` against `new`.
///
/// The returned changes are sorted ascending by `relative_path`
/// (lexicographic over bytes) — this ordering is the diff's stable
/// contract: two diffs over equal inputs are byte-identical, and parents
/// always sort before their children.
pub fn diff<'a>(old: &'a Tree, new: &'a Tree) -> Vec<Change<'a>> {
    let old_nodes = flatten(old);
    let new_nodes = flatten(new);

    // BTreeMap<&Utf8Path, _> iterates in lexicographic path order already,
    // so merging the two sorted key sets keeps the result sorted without a
    // separate pass.
    let mut changes = Vec::new();
    let mut old_iter = old_nodes.iter().peekable();
    let mut new_iter = new_nodes.iter().peekable();

    loop {
        match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(&(op, on)), None) => {
                changes.push(Change {
                    kind: ChangeKind::Removed,
                    relative_path: op.to_path_buf(),
                    old: Some(on),
                    new: None,
                });
                old_iter.next();
            }
            (None, Some(&(np, nn))) => {
                changes.push(Change {
                    kind: ChangeKind::Added,
                    relative_path: np.to_path_buf(),
                    old: None,
                    new: Some(nn),
                });
                new_iter.next();
            }
            (Some(&(op, on)), Some(&(np, nn))) => {
                if op < np {
                    changes.push(Change {
                        kind: ChangeKind::Removed,
                        relative_path: op.to_path_buf(),
                        old: Some(on),
                        new: None,
                    });
                    old_iter.next();
                } else if np < op {
                    changes.push(Change {
                        kind: ChangeKind::Added,
                        relative_path: np.to_path_buf(),
                        old: None,
                        new: Some(nn),
                    });
                    new_iter.next();
                } else {
                    if on.is_file() && nn.is_file() && (on.size() != nn.size() || on.mtime() != nn.mtime()) {
                        changes.push(Change {
                            kind: ChangeKind::Modified,
                            relative_path: op.to_path_buf(),
                            old: Some(on),
                            new: Some(nn),
                        });
                    } else if on.is_dir() != nn.is_dir() {
                        // A directory-vs-file flip: surface as remove-then-add.
                        changes.push(Change {
                            kind: ChangeKind::Removed,
                            relative_path: op.to_path_buf(),
                            old: Some(on),
                            new: None,
                        });
                        changes.push(Change {
                            kind: ChangeKind::Added,
                            relative_path: np.to_path_buf(),
                            old: None,
                            new: Some(nn),
                        });
                    }
                    // Directories that match structurally (same kind) aren't
                    // emitted themselves; their contents are covered by
                    // their own keys.
                    old_iter.next();
                    new_iter.next();
                }
            }
        }
    }

    changes
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use std::fs::File;
    use std::io::Write;
    use std::time::{Duration, SystemTime};

    fn init() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn touch(path: &Utf8Path, contents: &[u8], mtime: SystemTime) {
        File::create(path).unwrap().write_all(contents).unwrap();
        crate::file_util::set_mtime(path, mtime).unwrap();
    }

    #[test]
    fn identical_trees_diff_empty() -> anyhow::Result<()> {
        init();
        let dir = tempfile::tempdir()?;
        let root = Utf8Path::from_path(dir.path()).unwrap();
        File::create(root.join("a.txt"))?.write_all(b"hi")?;

        let t1 = Tree::build(root)?;
        let t2 = Tree::build(root)?;
        assert!(diff(&t1, &t2).is_empty());
        Ok(())
    }

    #[test]
    fn detects_add_remove_modify() -> anyhow::Result<()> {
        init();
        let old_dir = tempfile::tempdir()?;
        let old_root = Utf8Path::from_path(old_dir.path()).unwrap();
        let epoch = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        touch(&old_root.join("stays.txt"), b"same", epoch);
        touch(&old_root.join("removed.txt"), b"gone", epoch);
        touch(&old_root.join("changed.txt"), b"v1", epoch);

        let new_dir = tempfile::tempdir()?;
        let new_root = Utf8Path::from_path(new_dir.path()).unwrap();
        touch(&new_root.join("stays.txt"), b"same", epoch);
        touch(&new_root.join("changed.txt"), b"v2-longer", epoch);
        touch(&new_root.join("added.txt"), b"new", epoch);
        fs::create_dir(new_root.join("sub"))?;

        let old_tree = Tree::build(old_root)?;
        let new_tree = Tree::build(new_root)?;
        let changes = diff(&old_tree, &new_tree);

        let mut kinds: Vec<(ChangeKind, String)> = changes
            .iter()
            .map(|c| (c.kind, c.relative_path.to_string()))
            .collect();
        kinds.sort_by(|a, b| a.1.cmp(&b.1));

        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Added, "added.txt".to_string()),
                (ChangeKind::Modified, "changed.txt".to_string()),
                (ChangeKind::Removed, "removed.txt".to_string()),
                (ChangeKind::Added, "sub".to_string()),
            ]
        );

        // relative_path ordering is ascending lexicographic.
        let paths: Vec<String> = changes.iter().map(|c| c.relative_path.to_string()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);

        Ok(())
    }

    #[test]
    fn sidecar_at_destination_root_is_excluded_from_the_diff() -> anyhow::Result<()> {
        init();
        let old_dir = tempfile::tempdir()?;
        let old_root = Utf8Path::from_path(old_dir.path()).unwrap();
        File::create(old_root.join("a.txt"))?.write_all(b"hi")?;
        File::create(old_root.join(SIDECAR_NAME))?.write_all(b"tool=backsync\n")?;

        let new_dir = tempfile::tempdir()?;
        let new_root = Utf8Path::from_path(new_dir.path()).unwrap();
        File::create(new_root.join("a.txt"))?.write_all(b"hi")?;

        let old_tree = Tree::build(old_root)?;
        let new_tree = Tree::build(new_root)?;
        assert!(diff(&old_tree, &new_tree).is_empty());
        Ok(())
    }
}
