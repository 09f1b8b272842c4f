use std::sync::Arc;

use gentle_store::{DataStore, StoreError, StoreResult};
use gentle_types::{validate_partial, ContentId, Identifier, PointerId};

use crate::index::IndexCore;
use crate::node::Entry;
use crate::record::SnapshotRecord;

/// A read-only view of one snapshot.
///
/// The view keeps answering from its own root no matter how many writes
/// land after it was taken.
pub struct SnapshotView<S> {
    core: Arc<IndexCore<S>>,
    id: ContentId,
    record: SnapshotRecord,
}

impl<S: DataStore> SnapshotView<S> {
    pub(crate) fn new(core: Arc<IndexCore<S>>, id: ContentId, record: SnapshotRecord) -> Self {
        Self { core, id, record }
    }

    /// Id of the snapshot record.
    pub fn id(&self) -> ContentId {
        self.id
    }

    pub fn record(&self) -> &SnapshotRecord {
        &self.record
    }

    /// Root node of this snapshot's tree.
    pub fn root(&self) -> ContentId {
        self.record.root
    }

    /// Seconds since the epoch at which the snapshot was published.
    pub fn timestamp(&self) -> i64 {
        self.record.timestamp
    }

    /// The snapshot this one was built on, or `None` for the first one.
    ///
    /// A predecessor that is named but cannot be loaded is an error.
    pub fn previous(&self) -> StoreResult<Option<SnapshotView<S>>> {
        let Some(id) = self.record.previous else {
            return Ok(None);
        };
        let record = self.core.load_record(&id)?;
        Ok(Some(Self::new(Arc::clone(&self.core), id, record)))
    }

    fn lookup(&self, key: Identifier) -> StoreResult<Option<Entry>> {
        self.core.tree().lookup(&self.record.root, &key)
    }

    pub fn contains(&self, key: Identifier) -> StoreResult<bool> {
        Ok(self.lookup(key)?.is_some())
    }

    /// Blob bytes, if the content was indexed in this snapshot.
    pub fn get_content(&self, id: &ContentId) -> StoreResult<Vec<u8>> {
        if self.lookup(Identifier::Content(*id))?.is_none() {
            return Err(StoreError::content_not_found(id));
        }
        self.core.backing_content().get(id)
    }

    /// Pointer target as of this snapshot.
    pub fn get_pointer(&self, id: &PointerId) -> StoreResult<ContentId> {
        match self.lookup(Identifier::Pointer(*id))? {
            Some(Entry::Pointer(_, target)) => Ok(target),
            _ => Err(StoreError::pointer_not_found(id)),
        }
    }

    /// Identifiers in either space starting with `prefix`, sorted.
    pub fn find(&self, prefix: &str) -> StoreResult<Vec<Identifier>> {
        validate_partial(prefix)?;
        Ok(self
            .core
            .tree()
            .find(&self.record.root, prefix)?
            .iter()
            .map(Entry::identifier)
            .collect())
    }

    /// Every entry in this snapshot, sorted by identifier.
    pub fn entries(&self) -> StoreResult<Vec<Entry>> {
        self.core.tree().entries(&self.record.root)
    }

    /// Number of entries in this snapshot.
    pub fn len(&self) -> StoreResult<u64> {
        self.core.tree().len(&self.record.root)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl<S> std::fmt::Debug for SnapshotView<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotView")
            .field("id", &self.id)
            .field("record", &self.record)
            .finish()
    }
}
