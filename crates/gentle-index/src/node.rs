//! Radix tree nodes and their binary encoding.
//!
//! Binary format (all integers big-endian):
//!
//! ```text
//! leaf:      [0x00] [count: u8] count x entry
//!            entry = [id: 32] [kind: u8 = 0 content | 1 pointer] [target: 32, pointers only]
//! internal:  [0x01] [size: u64] 16 x [child id: 32]
//! ```

use gentle_store::{StoreError, StoreResult};
use gentle_types::{ContentId, Identifier, PointerId};

/// Maximum number of entries a leaf holds; one more forces a split.
pub const LEAF_CAPACITY: usize = 15;

/// Fan-out of an internal node, one child per hex digit.
pub const FANOUT: usize = 16;

const TAG_LEAF: u8 = 0x00;
const TAG_INTERNAL: u8 = 0x01;
const KIND_CONTENT: u8 = 0;
const KIND_POINTER: u8 = 1;

/// An indexed identifier and what it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entry {
    /// A blob present in the content space.
    Content(ContentId),
    /// A pointer and its current target.
    Pointer(PointerId, ContentId),
}

impl Entry {
    pub fn identifier(&self) -> Identifier {
        match self {
            Self::Content(id) => Identifier::Content(*id),
            Self::Pointer(id, _) => Identifier::Pointer(*id),
        }
    }

    fn key_bytes(&self) -> &[u8; 32] {
        match self {
            Self::Content(id) => id.as_bytes(),
            Self::Pointer(id, _) => id.as_bytes(),
        }
    }

    /// Leaf ordering: by identifier bytes, content before pointer.
    pub(crate) fn sort_key(&self) -> ([u8; 32], u8) {
        let kind = match self {
            Self::Content(_) => KIND_CONTENT,
            Self::Pointer(..) => KIND_POINTER,
        };
        (*self.key_bytes(), kind)
    }

    pub(crate) fn nibble(&self, depth: usize) -> usize {
        key_nibble(&self.identifier(), depth)
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        match self {
            Self::Content(id) => id.starts_with(prefix),
            Self::Pointer(id, _) => id.starts_with(prefix),
        }
    }
}

pub(crate) fn key_nibble(key: &Identifier, depth: usize) -> usize {
    match key {
        Identifier::Content(id) => id.nibble(depth),
        Identifier::Pointer(id) => id.nibble(depth),
    }
}

/// A radix tree node. Stored as an immutable content blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Up to [`LEAF_CAPACITY`] entries, sorted by [`Entry::sort_key`].
    Leaf(Vec<Entry>),
    /// One child per hex digit at this depth, plus the number of entries
    /// in the whole subtree.
    Internal {
        size: u64,
        children: [ContentId; FANOUT],
    },
}

impl Node {
    pub fn empty() -> Self {
        Self::Leaf(Vec::new())
    }

    /// Number of entries in the subtree rooted here.
    pub fn size(&self) -> u64 {
        match self {
            Self::Leaf(entries) => entries.len() as u64,
            Self::Internal { size, .. } => *size,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Leaf(entries) => {
                let mut buf = Vec::with_capacity(2 + entries.len() * 65);
                buf.push(TAG_LEAF);
                buf.push(entries.len() as u8);
                for entry in entries {
                    buf.extend_from_slice(entry.key_bytes());
                    match entry {
                        Entry::Content(_) => buf.push(KIND_CONTENT),
                        Entry::Pointer(_, target) => {
                            buf.push(KIND_POINTER);
                            buf.extend_from_slice(target.as_bytes());
                        }
                    }
                }
                buf
            }
            Self::Internal { size, children } => {
                let mut buf = Vec::with_capacity(1 + 8 + FANOUT * 32);
                buf.push(TAG_INTERNAL);
                buf.extend_from_slice(&size.to_be_bytes());
                for child in children {
                    buf.extend_from_slice(child.as_bytes());
                }
                buf
            }
        }
    }

    /// Decode a node read from the blob `id`.
    pub fn decode(id: &ContentId, bytes: &[u8]) -> StoreResult<Self> {
        let corrupt = |reason: String| StoreError::CorruptObject {
            id: id.to_hex(),
            reason,
        };
        let mut reader = Reader { bytes, pos: 0 };
        let node = match reader.u8().ok_or_else(|| corrupt("empty node".into()))? {
            TAG_LEAF => {
                let count = reader
                    .u8()
                    .ok_or_else(|| corrupt("truncated leaf header".into()))?;
                let mut entries = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let truncated = || corrupt(format!("truncated leaf entry {i}"));
                    let key = reader.hash().ok_or_else(truncated)?;
                    let entry = match reader.u8().ok_or_else(truncated)? {
                        KIND_CONTENT => Entry::Content(ContentId::from_hash(key)),
                        KIND_POINTER => {
                            let target = reader.hash().ok_or_else(truncated)?;
                            Entry::Pointer(PointerId::from_hash(key), ContentId::from_hash(target))
                        }
                        kind => return Err(corrupt(format!("unknown entry kind {kind}"))),
                    };
                    entries.push(entry);
                }
                if entries.windows(2).any(|w| w[0].sort_key() >= w[1].sort_key()) {
                    return Err(corrupt("leaf entries out of order".into()));
                }
                Self::Leaf(entries)
            }
            TAG_INTERNAL => {
                let size = reader
                    .u64()
                    .ok_or_else(|| corrupt("truncated internal header".into()))?;
                let mut children = [ContentId::from_hash([0; 32]); FANOUT];
                for (i, child) in children.iter_mut().enumerate() {
                    let hash = reader
                        .hash()
                        .ok_or_else(|| corrupt(format!("truncated child {i}")))?;
                    *child = ContentId::from_hash(hash);
                }
                Self::Internal { size, children }
            }
            tag => return Err(corrupt(format!("unknown node tag {tag:#04x}"))),
        };
        if reader.pos != bytes.len() {
            return Err(corrupt(format!(
                "{} trailing bytes",
                bytes.len() - reader.pos
            )));
        }
        Ok(node)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.bytes.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u64(&mut self) -> Option<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Some(u64::from_be_bytes(buf))
    }

    fn hash(&mut self) -> Option<[u8; 32]> {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(self.take(32)?);
        Some(buf)
    }
}
