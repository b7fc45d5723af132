//! Static byte-alphabet Huffman coder.
//!
//! On-disk frame (see `encode`): `u64le originalSize`, then a `u32le
//! treeSize`, the tree itself in preorder (`0x01 byte` for a leaf,
//! `0x00` for an internal node followed by its two children), the
//! packed code bits, and a trailing `remainderBits` byte recording how
//! many bits of the last payload byte are valid (0 meaning all 8).

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::error::{BackupError, Result};

#[derive(Debug, Clone)]
enum Tree {
    Leaf(u8),
    Node(Box<Tree>, Option<Box<Tree>>),
}

/// A heap entry ordered by `(frequency, insertion_order)` ascending, so
/// the binary heap behaves as a min-heap with ties broken by the order
/// nodes were queued — matching the reference coder's traversal of its
/// frequency table in byte order.
struct HeapEntry {
    freq: u64,
    seq: u64,
    tree: Tree,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.freq, self.seq) == (other.freq, other.seq)
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.freq, self.seq).cmp(&(other.freq, other.seq))
    }
}

fn build_tree(input: &[u8]) -> Tree {
    let mut freqs: BTreeMap<u8, u64> = BTreeMap::new();
    for &b in input {
        *freqs.entry(b).or_insert(0) += 1;
    }

    if freqs.is_empty() {
        return Tree::Leaf(0);
    }

    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();
    let mut seq = 0u64;
    for (byte, freq) in freqs {
        heap.push(Reverse(HeapEntry {
            freq,
            seq,
            tree: Tree::Leaf(byte),
        }));
        seq += 1;
    }

    if heap.len() == 1 {
        let Reverse(only) = heap.pop().unwrap();
        return Tree::Node(Box::new(only.tree), None);
    }

    while heap.len() > 1 {
        let Reverse(left) = heap.pop().unwrap();
        let Reverse(right) = heap.pop().unwrap();
        let parent = HeapEntry {
            freq: left.freq + right.freq,
            seq,
            tree: Tree::Node(Box::new(left.tree), Some(Box::new(right.tree))),
        };
        seq += 1;
        heap.push(Reverse(parent));
    }

    heap.pop().unwrap().0.tree
}

fn assign_codes(tree: &Tree, prefix: &mut Vec<bool>, codes: &mut BTreeMap<u8, Vec<bool>>) {
    match tree {
        Tree::Leaf(byte) => {
            let code = if prefix.is_empty() {
                vec![false]
            } else {
                prefix.clone()
            };
            codes.insert(*byte, code);
        }
        Tree::Node(left, right) => {
            prefix.push(false);
            assign_codes(left, prefix, codes);
            prefix.pop();
            if let Some(right) = right {
                prefix.push(true);
                assign_codes(right, prefix, codes);
                prefix.pop();
            }
        }
    }
}

fn write_tree(tree: &Tree, out: &mut Vec<u8>) {
    match tree {
        Tree::Leaf(byte) => {
            out.push(1);
            out.push(*byte);
        }
        Tree::Node(left, right) => {
            out.push(0);
            write_tree(left, out);
            if let Some(right) = right {
                write_tree(right, out);
            }
        }
    }
}

fn read_tree(buf: &[u8], pos: &mut usize) -> Option<Tree> {
    if *pos >= buf.len() {
        return None;
    }
    let flag = buf[*pos];
    *pos += 1;
    if flag == 1 {
        let byte = *buf.get(*pos)?;
        *pos += 1;
        Some(Tree::Leaf(byte))
    } else {
        let left = read_tree(buf, pos)?;
        let right = read_tree(buf, pos);
        Some(Tree::Node(Box::new(left), right.map(Box::new)))
    }
}

/// Compress `input`, prefixed with its own size as `u64le`.
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    let tree = build_tree(input);
    let mut codes = BTreeMap::new();
    assign_codes(&tree, &mut Vec::new(), &mut codes);

    let mut bits: Vec<bool> = Vec::new();
    for &b in input {
        bits.extend_from_slice(&codes[&b]);
    }

    let mut payload = Vec::with_capacity(bits.len() / 8 + 1);
    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            if bit {
                byte |= 1 << (7 - i);
            }
        }
        payload.push(byte);
    }
    let remainder_bits = (bits.len() % 8) as u8;

    let mut tree_buf = Vec::new();
    write_tree(&tree, &mut tree_buf);

    let mut out = Vec::new();
    out.extend_from_slice(&(input.len() as u64).to_le_bytes());
    out.extend_from_slice(&(tree_buf.len() as u32).to_le_bytes());
    out.extend_from_slice(&tree_buf);
    out.extend_from_slice(&payload);
    out.push(remainder_bits);

    Ok(out)
}

/// Decompress a frame produced by [`compress`].
pub fn decompress(frame: &[u8]) -> Result<Vec<u8>> {
    if frame.len() < 8 {
        return Err(BackupError::DecompressionFailed(
            "huffman frame shorter than its size prefix".into(),
        ));
    }
    let original_size = u64::from_le_bytes(frame[0..8].try_into().unwrap()) as usize;
    let rest = &frame[8..];

    if rest.len() < 4 {
        return Err(BackupError::DecompressionFailed(
            "huffman frame missing tree size".into(),
        ));
    }
    let tree_size = u32::from_le_bytes(rest[0..4].try_into().unwrap()) as usize;
    if rest.len() < 4 + tree_size + 1 {
        return Err(BackupError::DecompressionFailed(
            "huffman frame truncated before payload".into(),
        ));
    }

    let tree_buf = &rest[4..4 + tree_size];
    let mut pos = 0;
    let tree = read_tree(tree_buf, &mut pos)
        .ok_or_else(|| BackupError::DecompressionFailed("malformed huffman tree".into()))?;

    let body = &rest[4 + tree_size..];
    let (payload, remainder_bits) = body.split_at(body.len() - 1);
    let remainder_bits = remainder_bits[0];

    if original_size == 0 {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(original_size);
    let mut node = &tree;
    let total_bytes = payload.len();
    'outer: for (i, &byte) in payload.iter().enumerate() {
        let valid_bits = if i == total_bytes - 1 && remainder_bits != 0 {
            remainder_bits
        } else {
            8
        };
        for j in 0..valid_bits {
            let bit = (byte >> (7 - j)) & 1 == 1;
            node = match node {
                Tree::Node(left, Some(right)) => {
                    if bit {
                        right.as_ref()
                    } else {
                        left.as_ref()
                    }
                }
                Tree::Node(left, None) => left.as_ref(),
                Tree::Leaf(_) => node,
            };
            if let Tree::Leaf(b) = node {
                out.push(*b);
                node = &tree;
                if out.len() == original_size {
                    break 'outer;
                }
            }
        }
    }

    Ok(out)
}
