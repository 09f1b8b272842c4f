//! Persistent radix tree operations.
//!
//! Nodes are immutable blobs in a [`ContentStore`]. Every mutation writes new
//! nodes along the path from the changed leaf up to a new root and leaves
//! the old nodes untouched, so any older root stays readable.

use gentle_store::{ContentStore, StoreError, StoreResult};
use gentle_types::{ContentId, Identifier, IDENTIFIER_DIGITS, IDENTIFIER_LENGTH};

use crate::node::{key_nibble, Entry, Node, FANOUT, LEAF_CAPACITY};

/// A rewritten subtree: its new node id and its entry count before and
/// after the change.
struct Rewrite {
    id: ContentId,
    old_size: u64,
    new_size: u64,
}

pub(crate) struct Tree<'a> {
    store: &'a dyn ContentStore,
}

impl<'a> Tree<'a> {
    pub fn new(store: &'a dyn ContentStore) -> Self {
        Self { store }
    }

    pub fn load(&self, id: &ContentId) -> StoreResult<Node> {
        let bytes = self.store.get(id)?;
        Node::decode(id, &bytes)
    }

    pub fn save(&self, node: &Node) -> StoreResult<ContentId> {
        self.store.put(&node.encode())
    }

    pub fn empty_root(&self) -> StoreResult<ContentId> {
        self.save(&Node::empty())
    }

    /// Number of entries under `root`.
    pub fn len(&self, root: &ContentId) -> StoreResult<u64> {
        Ok(self.load(root)?.size())
    }

    /// Find the entry for `key`, walking one hex digit per level.
    pub fn lookup(&self, root: &ContentId, key: &Identifier) -> StoreResult<Option<Entry>> {
        let mut id = *root;
        for depth in 0..=IDENTIFIER_LENGTH {
            match self.load(&id)? {
                Node::Leaf(entries) => {
                    return Ok(entries.into_iter().find(|e| e.identifier() == *key));
                }
                Node::Internal { children, .. } => {
                    if depth == IDENTIFIER_LENGTH {
                        break;
                    }
                    id = children[key_nibble(key, depth)];
                }
            }
        }
        Err(too_deep(&id))
    }

    /// All entries whose identifier starts with `prefix`, sorted.
    ///
    /// `prefix` must already be a valid partial identifier.
    pub fn find(&self, root: &ContentId, prefix: &str) -> StoreResult<Vec<Entry>> {
        let digits: Vec<usize> = prefix
            .chars()
            .filter_map(|c| IDENTIFIER_DIGITS.find(c))
            .collect();
        let mut id = *root;
        let mut depth = 0;
        loop {
            let node = self.load(&id)?;
            match node {
                Node::Leaf(entries) => {
                    return Ok(entries.into_iter().filter(|e| e.starts_with(prefix)).collect());
                }
                Node::Internal { children, .. } if depth < digits.len() => {
                    id = children[digits[depth]];
                    depth += 1;
                }
                // Prefix exhausted: everything below shares it.
                node => return self.collect_node(&id, node),
            }
        }
    }

    /// Every entry under `root`, verifying the size of each internal node.
    pub fn entries(&self, root: &ContentId) -> StoreResult<Vec<Entry>> {
        let node = self.load(root)?;
        self.collect_node(root, node)
    }

    fn collect_node(&self, id: &ContentId, node: Node) -> StoreResult<Vec<Entry>> {
        match node {
            Node::Leaf(entries) => Ok(entries),
            Node::Internal { size, children } => {
                let mut out = Vec::new();
                for child in &children {
                    out.extend(self.entries(child)?);
                }
                if out.len() as u64 != size {
                    return Err(StoreError::CorruptObject {
                        id: id.to_hex(),
                        reason: format!("node claims {size} entries, children hold {}", out.len()),
                    });
                }
                Ok(out)
            }
        }
    }

    /// Insert `entry`, or replace the entry with the same identifier.
    /// Returns the new root.
    pub fn insert(&self, root: &ContentId, entry: Entry) -> StoreResult<ContentId> {
        Ok(self.insert_at(root, 0, entry)?.id)
    }

    fn insert_at(&self, id: &ContentId, depth: usize, entry: Entry) -> StoreResult<Rewrite> {
        match self.load(id)? {
            Node::Leaf(mut entries) => {
                let old_size = entries.len() as u64;
                match entries.binary_search_by_key(&entry.sort_key(), Entry::sort_key) {
                    Ok(i) => entries[i] = entry,
                    Err(i) => entries.insert(i, entry),
                }
                let new_size = entries.len() as u64;
                Ok(Rewrite {
                    id: self.build(entries, depth)?,
                    old_size,
                    new_size,
                })
            }
            Node::Internal { size, mut children } => {
                if depth >= IDENTIFIER_LENGTH {
                    return Err(too_deep(id));
                }
                let slot = entry.nibble(depth);
                let child = self.insert_at(&children[slot], depth + 1, entry)?;
                children[slot] = child.id;
                let new_size = resize(id, size, &child)?;
                Ok(Rewrite {
                    id: self.save(&Node::Internal {
                        size: new_size,
                        children,
                    })?,
                    old_size: size,
                    new_size,
                })
            }
        }
    }

    /// Remove the entry for `key`. Returns the new root, or `None` if the
    /// key was not present.
    pub fn remove(&self, root: &ContentId, key: &Identifier) -> StoreResult<Option<ContentId>> {
        Ok(self.remove_at(root, 0, key)?.map(|r| r.id))
    }

    fn remove_at(
        &self,
        id: &ContentId,
        depth: usize,
        key: &Identifier,
    ) -> StoreResult<Option<Rewrite>> {
        match self.load(id)? {
            Node::Leaf(mut entries) => {
                let Some(pos) = entries.iter().position(|e| e.identifier() == *key) else {
                    return Ok(None);
                };
                let old_size = entries.len() as u64;
                entries.remove(pos);
                Ok(Some(Rewrite {
                    new_size: entries.len() as u64,
                    id: self.save(&Node::Leaf(entries))?,
                    old_size,
                }))
            }
            Node::Internal { size, mut children } => {
                if depth >= IDENTIFIER_LENGTH {
                    return Err(too_deep(id));
                }
                let slot = key_nibble(key, depth);
                let Some(child) = self.remove_at(&children[slot], depth + 1, key)? else {
                    return Ok(None);
                };
                children[slot] = child.id;
                let new_size = resize(id, size, &child)?;
                let node = if new_size as usize <= LEAF_CAPACITY {
                    // Collapse back into a single leaf.
                    let mut entries = Vec::with_capacity(new_size as usize);
                    for c in &children {
                        entries.extend(self.entries(c)?);
                    }
                    entries.sort_by_key(Entry::sort_key);
                    Node::Leaf(entries)
                } else {
                    Node::Internal {
                        size: new_size,
                        children,
                    }
                };
                Ok(Some(Rewrite {
                    id: self.save(&node)?,
                    old_size: size,
                    new_size,
                }))
            }
        }
    }

    /// Store `entries` (sorted) as a subtree at `depth`, splitting by the
    /// next hex digit while there are more than [`LEAF_CAPACITY`].
    fn build(&self, entries: Vec<Entry>, depth: usize) -> StoreResult<ContentId> {
        if entries.len() <= LEAF_CAPACITY || depth >= IDENTIFIER_LENGTH {
            return self.save(&Node::Leaf(entries));
        }
        let size = entries.len() as u64;
        let mut buckets: [Vec<Entry>; FANOUT] = std::array::from_fn(|_| Vec::new());
        for entry in entries {
            buckets[entry.nibble(depth)].push(entry);
        }
        let mut children = [ContentId::from_hash([0; 32]); FANOUT];
        for (slot, bucket) in buckets.into_iter().enumerate() {
            children[slot] = self.build(bucket, depth + 1)?;
        }
        self.save(&Node::Internal { size, children })
    }
}

/// `size - old_child_size + new_child_size`, failing if the child claims
/// more entries than its parent or the count leaves `u64`.
fn resize(id: &ContentId, size: u64, child: &Rewrite) -> StoreResult<u64> {
    size.checked_add(child.new_size)
        .and_then(|total| total.checked_sub(child.old_size))
        .ok_or_else(|| StoreError::CorruptObject {
            id: id.to_hex(),
            reason: format!(
                "node holds {size} entries, child goes from {} to {}",
                child.old_size, child.new_size
            ),
        })
}

fn too_deep(id: &ContentId) -> StoreError {
    StoreError::CorruptObject {
        id: id.to_hex(),
        reason: "tree deeper than an identifier".into(),
    }
}
