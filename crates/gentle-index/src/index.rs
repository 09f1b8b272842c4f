use std::sync::{Arc, Mutex};

use gentle_store::error::describe_target;
use gentle_store::{ContentStore, DataStore, PointerStore, StoreError, StoreResult};
use gentle_types::{validate_partial, ContentId, Identifier, PointerId, Timestamp};
use tracing::{debug, info};

use crate::node::Entry;
use crate::record::SnapshotRecord;
use crate::tree::Tree;
use crate::view::SnapshotView;

/// The well-known pointer, in the backing pointer store, that always names
/// the latest snapshot record.
pub const SNAPSHOT_POINTER: PointerId = PointerId::from_hash([
    0x30, 0xda, 0xa8, 0xeb, 0x03, 0x52, 0xee, 0xe0, 0x6d, 0xba, 0xe0, 0xaf, 0xfe, 0x45, 0x94, 0x20,
    0x85, 0x90, 0x35, 0x6f, 0xcd, 0x05, 0x06, 0x29, 0x95, 0x32, 0x3b, 0xc4, 0x3f, 0xf9, 0x8f, 0x92,
]);

/// What a write does to the entry it looked up.
enum Change {
    Put(Entry),
    Remove,
    Keep,
}

pub(crate) struct IndexCore<S> {
    backing: S,
    // Serializes writers in this process; the snapshot pointer CAS catches
    // writers in other processes.
    writer: Mutex<()>,
}

impl<S: DataStore> IndexCore<S> {
    pub(crate) fn tree(&self) -> Tree<'_> {
        Tree::new(self.backing.content())
    }

    pub(crate) fn backing_content(&self) -> &dyn ContentStore {
        self.backing.content()
    }

    pub(crate) fn load_record(&self, id: &ContentId) -> StoreResult<SnapshotRecord> {
        let bytes = self.backing.content().get(id)?;
        SnapshotRecord::decode(id, &bytes)
    }

    fn current(&self) -> StoreResult<(ContentId, SnapshotRecord)> {
        let id = self.backing.pointers().get(&SNAPSHOT_POINTER)?;
        Ok((id, self.load_record(&id)?))
    }

    fn current_root(&self) -> StoreResult<ContentId> {
        Ok(self.current()?.1.root)
    }

    /// Store a snapshot record for `root` and swing the snapshot pointer to
    /// it, provided the pointer still names `previous`.
    fn publish(&self, previous: Option<ContentId>, root: ContentId) -> StoreResult<ContentId> {
        let record = SnapshotRecord {
            timestamp: Timestamp::now().epoch_seconds(),
            previous,
            root,
        };
        let id = self.backing.content().put(&record.encode())?;
        self.backing
            .pointers()
            .compare_and_set(&SNAPSHOT_POINTER, previous.as_ref(), &id)?;
        debug!(
            snapshot = %id.short_hex(),
            root = %root.short_hex(),
            previous = ?previous.map(|p| p.short_hex()),
            "published snapshot"
        );
        Ok(id)
    }

    /// Look up `key` in the latest snapshot, let `decide` choose a change,
    /// and publish a new snapshot if anything changed.
    fn write(
        &self,
        key: Identifier,
        decide: impl FnOnce(Option<Entry>) -> StoreResult<Change>,
    ) -> StoreResult<()> {
        let _guard = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let (snapshot, record) = self.current()?;
        let tree = self.tree();
        let current = tree.lookup(&record.root, &key)?;
        let root = match decide(current)? {
            Change::Keep => return Ok(()),
            Change::Put(entry) => tree.insert(&record.root, entry)?,
            Change::Remove => tree
                .remove(&record.root, &key)?
                .ok_or_else(|| not_found(&key))?,
        };
        self.publish(Some(snapshot), root)?;
        Ok(())
    }
}

fn not_found(key: &Identifier) -> StoreError {
    match key {
        Identifier::Content(id) => StoreError::content_not_found(id),
        Identifier::Pointer(id) => StoreError::pointer_not_found(id),
    }
}

/// A journaled view of a backing [`DataStore`].
///
/// Every content and pointer entry is indexed by a copy-on-write radix tree
/// whose nodes live as blobs in the backing content store. Each change
/// publishes a new [`SnapshotRecord`] chained to the previous one, and the
/// only mutable cell is [`SNAPSHOT_POINTER`] in the backing pointer store.
///
/// Readers need no locks: they read the snapshot pointer once and walk
/// immutable nodes. Writers in one process are serialized; a writer whose
/// base snapshot was replaced by another process fails with
/// [`StoreError::Conflict`] and publishes nothing.
///
/// Deleting content removes its index entry only. The blob stays in the
/// backing store so older snapshots remain readable.
pub struct SnapshotIndex<S> {
    core: Arc<IndexCore<S>>,
    content: IndexedContent<S>,
    pointers: IndexedPointers<S>,
}

impl<S: DataStore> SnapshotIndex<S> {
    /// Open an index over `backing`, publishing an empty first snapshot if
    /// the backing store has none.
    pub fn open(backing: S) -> StoreResult<Self> {
        let core = Arc::new(IndexCore {
            backing,
            writer: Mutex::new(()),
        });
        if !core.backing.pointers().contains(&SNAPSHOT_POINTER)? {
            let root = core.tree().empty_root()?;
            match core.publish(None, root) {
                Ok(id) => info!(snapshot = %id.short_hex(), "initialized snapshot index"),
                // Someone else initialized it between our check and publish.
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Self {
            content: IndexedContent(Arc::clone(&core)),
            pointers: IndexedPointers(Arc::clone(&core)),
            core,
        })
    }

    /// The wrapped store.
    pub fn backing(&self) -> &S {
        &self.core.backing
    }

    /// Id of the latest snapshot record.
    pub fn snapshot_id(&self) -> StoreResult<ContentId> {
        self.core.backing.pointers().get(&SNAPSHOT_POINTER)
    }

    /// Read-only view of the latest snapshot.
    pub fn snapshot(&self) -> StoreResult<SnapshotView<S>> {
        let (id, record) = self.core.current()?;
        Ok(SnapshotView::new(Arc::clone(&self.core), id, record))
    }

    /// Read-only view of any snapshot in the chain.
    pub fn at(&self, id: &ContentId) -> StoreResult<SnapshotView<S>> {
        let record = self.core.load_record(id)?;
        Ok(SnapshotView::new(Arc::clone(&self.core), *id, record))
    }

    /// All snapshots, newest first, back to the first one.
    pub fn history(&self) -> StoreResult<Vec<(ContentId, SnapshotRecord)>> {
        let mut out = Vec::new();
        let mut next = Some(self.snapshot_id()?);
        while let Some(id) = next {
            let record = self.core.load_record(&id)?;
            next = record.previous;
            out.push((id, record));
        }
        Ok(out)
    }

    /// Number of entries (content plus pointers) in the latest snapshot.
    pub fn len(&self) -> StoreResult<u64> {
        self.core.tree().len(&self.core.current_root()?)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl<S: DataStore> DataStore for SnapshotIndex<S> {
    fn content(&self) -> &dyn ContentStore {
        &self.content
    }

    fn pointers(&self) -> &dyn PointerStore {
        &self.pointers
    }

    /// Both spaces are read from one snapshot.
    fn find(&self, prefix: &str) -> StoreResult<Vec<Identifier>> {
        self.snapshot()?.find(prefix)
    }
}

impl<S> std::fmt::Debug for SnapshotIndex<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotIndex").finish_non_exhaustive()
    }
}

struct IndexedContent<S>(Arc<IndexCore<S>>);

struct IndexedPointers<S>(Arc<IndexCore<S>>);

impl<S: DataStore> ContentStore for IndexedContent<S> {
    fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
        let id = self.0.backing.content().put(data)?;
        self.0.write(Identifier::Content(id), |current| {
            Ok(match current {
                Some(_) => Change::Keep,
                None => Change::Put(Entry::Content(id)),
            })
        })?;
        Ok(id)
    }

    fn get(&self, id: &ContentId) -> StoreResult<Vec<u8>> {
        if !self.contains(id)? {
            return Err(StoreError::content_not_found(id));
        }
        self.0.backing.content().get(id)
    }

    fn contains(&self, id: &ContentId) -> StoreResult<bool> {
        let key = Identifier::Content(*id);
        Ok(self.0.tree().lookup(&self.0.current_root()?, &key)?.is_some())
    }

    fn delete(&self, id: &ContentId) -> StoreResult<()> {
        self.0.write(Identifier::Content(*id), |current| match current {
            Some(_) => Ok(Change::Remove),
            None => Err(StoreError::content_not_found(id)),
        })
    }

    fn find(&self, prefix: &str) -> StoreResult<Vec<ContentId>> {
        validate_partial(prefix)?;
        let entries = self.0.tree().find(&self.0.current_root()?, prefix)?;
        Ok(entries
            .into_iter()
            .filter_map(|e| match e {
                Entry::Content(id) => Some(id),
                Entry::Pointer(..) => None,
            })
            .collect())
    }
}

impl<S: DataStore> PointerStore for IndexedPointers<S> {
    fn set(&self, id: &PointerId, target: &ContentId) -> StoreResult<()> {
        let entry = Entry::Pointer(*id, *target);
        self.0.write(Identifier::Pointer(*id), |current| {
            Ok(if current == Some(entry) {
                Change::Keep
            } else {
                Change::Put(entry)
            })
        })
    }

    fn get(&self, id: &PointerId) -> StoreResult<ContentId> {
        let key = Identifier::Pointer(*id);
        match self.0.tree().lookup(&self.0.current_root()?, &key)? {
            Some(Entry::Pointer(_, target)) => Ok(target),
            _ => Err(StoreError::pointer_not_found(id)),
        }
    }

    fn contains(&self, id: &PointerId) -> StoreResult<bool> {
        let key = Identifier::Pointer(*id);
        Ok(self.0.tree().lookup(&self.0.current_root()?, &key)?.is_some())
    }

    fn delete(&self, id: &PointerId) -> StoreResult<()> {
        self.0.write(Identifier::Pointer(*id), |current| match current {
            Some(_) => Ok(Change::Remove),
            None => Err(StoreError::pointer_not_found(id)),
        })
    }

    fn find(&self, prefix: &str) -> StoreResult<Vec<PointerId>> {
        validate_partial(prefix)?;
        let entries = self.0.tree().find(&self.0.current_root()?, prefix)?;
        Ok(entries
            .into_iter()
            .filter_map(|e| match e {
                Entry::Pointer(id, _) => Some(id),
                Entry::Content(_) => None,
            })
            .collect())
    }

    fn compare_and_set(
        &self,
        id: &PointerId,
        expected: Option<&ContentId>,
        new: &ContentId,
    ) -> StoreResult<()> {
        let entry = Entry::Pointer(*id, *new);
        self.0.write(Identifier::Pointer(*id), |current| {
            let found = match current {
                Some(Entry::Pointer(_, target)) => Some(target),
                _ => None,
            };
            if found.as_ref() != expected {
                return Err(StoreError::Conflict {
                    id: id.to_hex(),
                    expected: describe_target(expected),
                    found: describe_target(found.as_ref()),
                });
            }
            Ok(if current == Some(entry) {
                Change::Keep
            } else {
                Change::Put(entry)
            })
        })
    }
}
