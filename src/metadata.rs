//! The `.backupmeta` sidecar: a line-oriented record of what a backup
//! contains and how it was encoded, written after a successful backup
//! and read back to drive restore.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{SecondsFormat, Utc};

use crate::config::{CompressionType, EncryptionType};
use crate::error::{BackupError, IoContext, Result};
use crate::tree::{NodeKind, Tree};

pub const SIDECAR_NAME: &str = ".backupmeta";
const TOOL_TAG: &str = "backsync";

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub is_directory: bool,
    pub relative_path: Utf8PathBuf,
    pub size: u64,
    pub mtime_ns: i64,
}

#[derive(Debug, Clone)]
pub struct MetadataInfo {
    pub tool: String,
    pub created_utc: String,
    pub source_root: Utf8PathBuf,
    pub compression: CompressionType,
    pub encryption: EncryptionType,
    pub entries: Vec<FileEntry>,
}

/// Flatten `tree` into sidecar entries, DFS order, skipping the root.
fn entries_from_tree(tree: &Tree) -> Vec<FileEntry> {
    let mut entries = Vec::new();
    collect(&tree.root, &mut entries);
    entries
}

fn collect(node: &crate::tree::Node, entries: &mut Vec<FileEntry>) {
    if node.relative_path != Utf8PathBuf::from(".") {
        let (is_directory, size, mtime_ns) = match &node.kind {
            NodeKind::Directory { .. } => (true, 0, 0),
            NodeKind::File { size, mtime } => (
                false,
                *size,
                mtime
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos() as i64)
                    .unwrap_or(0),
            ),
        };
        entries.push(FileEntry {
            is_directory,
            relative_path: node.relative_path.clone(),
            size,
            mtime_ns,
        });
    }
    for child in node.children() {
        collect(child, entries);
    }
}

/// Build a [`MetadataInfo`] describing a just-completed backup of `tree`.
pub fn build(
    tree: &Tree,
    source_root: &Utf8Path,
    compression: CompressionType,
    encryption: EncryptionType,
) -> MetadataInfo {
    MetadataInfo {
        tool: TOOL_TAG.to_string(),
        created_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        source_root: source_root.to_owned(),
        compression,
        encryption,
        entries: entries_from_tree(tree),
    }
}

fn compression_tag(c: CompressionType) -> &'static str {
    match c {
        CompressionType::None => "none",
        CompressionType::Huffman => "huffman",
        CompressionType::Lz77 => "lz77",
    }
}

fn encryption_tag(e: EncryptionType) -> &'static str {
    match e {
        EncryptionType::None => "none",
        EncryptionType::Aes => "aes",
    }
}

pub fn write(backup_root: &Utf8Path, info: &MetadataInfo) -> Result<()> {
    let path = backup_root.join(SIDECAR_NAME);
    let mut out = String::new();
    out.push_str(&format!("tool={}\n", info.tool));
    out.push_str(&format!("created={}\n", info.created_utc));
    out.push_str(&format!("source_root={}\n", info.source_root));
    out.push_str(&format!("compression={}\n", compression_tag(info.compression)));
    out.push_str(&format!("encryption={}\n", encryption_tag(info.encryption)));
    out.push_str("[filelist]\n");
    for entry in &info.entries {
        let kind = if entry.is_directory { "D" } else { "F" };
        out.push_str(&format!(
            "{kind}|{}|{}|{}\n",
            entry.relative_path, entry.size, entry.mtime_ns
        ));
    }

    let tmp = crate::file_util::sibling_tmp(&path, "meta");
    fs::write(&tmp, &out).io_at(&tmp)?;
    fs::rename(&tmp, &path).io_at(&path)?;
    Ok(())
}

pub fn read(backup_root: &Utf8Path) -> Result<MetadataInfo> {
    let path = backup_root.join(SIDECAR_NAME);
    let text = fs::read_to_string(&path)
        .map_err(|_| BackupError::MissingMetadata(backup_root.to_owned()))?;

    let mut tool = String::new();
    let mut created_utc = String::new();
    let mut source_root = Utf8PathBuf::new();
    let mut compression = CompressionType::None;
    let mut encryption = EncryptionType::None;
    let mut entries = Vec::new();
    let mut in_filelist = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "[filelist]" {
            in_filelist = true;
            continue;
        }
        if in_filelist {
            if let Some(entry) = parse_entry(line) {
                entries.push(entry);
            }
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            match key {
                "tool" => tool = value.to_string(),
                "created" => created_utc = value.to_string(),
                "source_root" => source_root = Utf8PathBuf::from(value),
                "compression" => {
                    compression = match value {
                        "huffman" => CompressionType::Huffman,
                        "lz77" => CompressionType::Lz77,
                        _ => CompressionType::None,
                    }
                }
                "encryption" => {
                    encryption = match value {
                        "aes" => EncryptionType::Aes,
                        _ => EncryptionType::None,
                    }
                }
                _ => {} // unknown header keys are ignored
            }
        }
    }

    Ok(MetadataInfo {
        tool,
        created_utc,
        source_root,
        compression,
        encryption,
        entries,
    })
}

fn parse_entry(line: &str) -> Option<FileEntry> {
    let mut fields = line.splitn(4, '|');
    let kind = fields.next()?;
    let relative_path = Utf8PathBuf::from(fields.next()?);
    let size: u64 = fields.next()?.parse().ok()?;
    let mtime_ns: i64 = fields.next()?.parse().ok()?;
    Some(FileEntry {
        is_directory: kind == "D",
        relative_path,
        size,
        mtime_ns,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn roundtrips_through_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = Utf8Path::from_path(dir.path()).unwrap();
        File::create(root.join("a.txt"))?.write_all(b"hi")?;
        std::fs::create_dir(root.join("sub"))?;

        let tree = Tree::build(root)?;
        let info = build(&tree, root, CompressionType::Huffman, EncryptionType::Aes);
        write(root, &info)?;

        let read_back = read(root)?;
        assert_eq!(read_back.compression, CompressionType::Huffman);
        assert_eq!(read_back.encryption, EncryptionType::Aes);
        assert_eq!(read_back.source_root, root);
        assert_eq!(read_back.entries.len(), info.entries.len());

        let dir_entry = read_back
            .entries
            .iter()
            .find(|e| e.relative_path == "sub")
            .unwrap();
        assert!(dir_entry.is_directory);
        assert_eq!(dir_entry.size, 0);
        assert_eq!(dir_entry.mtime_ns, 0);
        Ok(())
    }

    #[test]
    fn missing_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        assert!(matches!(read(root), Err(BackupError::MissingMetadata(_))));
    }

    #[test]
    fn tolerates_blank_lines_and_unknown_headers() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let text = "tool=backsync\n\nunknown_key=whatever\ncreated=2026-01-03T08:21:34Z\nsource_root=/src\ncompression=none\nencryption=none\n[filelist]\n\nF|a.txt|2|0\n";
        std::fs::write(root.join(SIDECAR_NAME), text)?;

        let info = read(root)?;
        assert_eq!(info.entries.len(), 1);
        assert_eq!(info.entries[0].relative_path, "a.txt");
        Ok(())
    }
}
