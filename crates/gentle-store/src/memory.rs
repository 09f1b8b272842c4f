use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use gentle_types::{validate_partial, ContentId, PointerId};

use crate::error::{describe_target, StoreError, StoreResult};
use crate::traits::{ContentStore, DataStore, PointerStore};

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StoreError::LockPoisoned)
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StoreError::LockPoisoned)
}

fn matching<K: Copy, V>(
    map: &BTreeMap<K, V>,
    prefix: &str,
    hex: impl Fn(&K) -> bool,
) -> StoreResult<Vec<K>> {
    validate_partial(prefix)?;
    // BTreeMap iteration is already ascending by raw bytes, i.e. by hex.
    Ok(map.keys().filter(|k| hex(*k)).copied().collect())
}

/// In-memory, `BTreeMap`-based content store.
///
/// Intended for tests and embedding. Blobs are cloned on read and write.
pub struct InMemoryContentStore {
    blobs: RwLock<BTreeMap<ContentId, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(read(&self.blobs)?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(read(&self.blobs)?.is_empty())
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        Ok(read(&self.blobs)?.values().map(|b| b.len() as u64).sum())
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for InMemoryContentStore {
    fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
        let id = ContentId::digest(data);
        // First writer wins; the same id always maps to the same bytes.
        write(&self.blobs)?
            .entry(id)
            .or_insert_with(|| data.to_vec());
        Ok(id)
    }

    fn get(&self, id: &ContentId) -> StoreResult<Vec<u8>> {
        read(&self.blobs)?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::content_not_found(id))
    }

    fn contains(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(read(&self.blobs)?.contains_key(id))
    }

    fn delete(&self, id: &ContentId) -> StoreResult<()> {
        write(&self.blobs)?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::content_not_found(id))
    }

    fn find(&self, prefix: &str) -> StoreResult<Vec<ContentId>> {
        matching(&*read(&self.blobs)?, prefix, |id| id.starts_with(prefix))
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().unwrap_or_default();
        f.debug_struct("InMemoryContentStore")
            .field("blob_count", &count)
            .finish()
    }
}

/// In-memory pointer store.
pub struct InMemoryPointerStore {
    pointers: RwLock<BTreeMap<PointerId, ContentId>>,
}

impl InMemoryPointerStore {
    pub fn new() -> Self {
        Self {
            pointers: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(read(&self.pointers)?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(read(&self.pointers)?.is_empty())
    }
}

impl Default for InMemoryPointerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerStore for InMemoryPointerStore {
    fn set(&self, id: &PointerId, target: &ContentId) -> StoreResult<()> {
        write(&self.pointers)?.insert(*id, *target);
        Ok(())
    }

    fn get(&self, id: &PointerId) -> StoreResult<ContentId> {
        read(&self.pointers)?
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::pointer_not_found(id))
    }

    fn contains(&self, id: &PointerId) -> StoreResult<bool> {
        Ok(read(&self.pointers)?.contains_key(id))
    }

    fn delete(&self, id: &PointerId) -> StoreResult<()> {
        write(&self.pointers)?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::pointer_not_found(id))
    }

    fn find(&self, prefix: &str) -> StoreResult<Vec<PointerId>> {
        matching(&*read(&self.pointers)?, prefix, |id| id.starts_with(prefix))
    }

    fn compare_and_set(
        &self,
        id: &PointerId,
        expected: Option<&ContentId>,
        new: &ContentId,
    ) -> StoreResult<()> {
        let mut map = write(&self.pointers)?;
        let current = map.get(id);
        if current != expected {
            return Err(StoreError::Conflict {
                id: id.to_hex(),
                expected: describe_target(expected),
                found: describe_target(current),
            });
        }
        map.insert(*id, *new);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryPointerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().unwrap_or_default();
        f.debug_struct("InMemoryPointerStore")
            .field("pointer_count", &count)
            .finish()
    }
}

/// An in-memory content store and pointer store pair.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    content: InMemoryContentStore,
    pointers: InMemoryPointerStore,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataStore for InMemoryDataStore {
    fn content(&self) -> &dyn ContentStore {
        &self.content
    }

    fn pointers(&self) -> &dyn PointerStore {
        &self.pointers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gentle_types::{Identifier, IdentifierSpace};
    use proptest::prelude::*;

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    /// Put blobs until two of them share a first hex digit.
    fn two_sharing_first_digit(store: &dyn ContentStore) -> (ContentId, ContentId, String) {
        let mut seen: BTreeMap<char, ContentId> = BTreeMap::new();
        for i in 0u32.. {
            let id = store.put(format!("blob-{i}").as_bytes()).unwrap();
            let first = id.to_hex().chars().next().unwrap();
            if let Some(other) = seen.get(&first) {
                return (*other, id, first.to_string());
            }
            seen.insert(first, id);
        }
        unreachable!()
    }

    // -----------------------------------------------------------------------
    // Content store
    // -----------------------------------------------------------------------

    #[test]
    fn put_returns_sha256() {
        let store = InMemoryContentStore::new();
        let id = store.put(b"hello").unwrap();
        assert_eq!(id.to_hex(), HELLO);
        assert_eq!(store.get(&id).unwrap(), b"hello");
    }

    #[test]
    fn put_is_idempotent() {
        let store = InMemoryContentStore::new();
        let a = store.put(b"same").unwrap();
        let b = store.put(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = InMemoryContentStore::new();
        let err = store.get(&ContentId::digest(b"nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_then_delete_again() {
        let store = InMemoryContentStore::new();
        let id = store.put(b"gone").unwrap();
        store.delete(&id).unwrap();
        assert!(!store.contains(&id).unwrap());
        assert!(store.delete(&id).unwrap_err().is_not_found());
    }

    #[test]
    fn find_shared_prefix_returns_both_sorted() {
        let store = InMemoryContentStore::new();
        let (a, b, prefix) = two_sharing_first_digit(&store);
        let found = store.find(&prefix).unwrap();
        assert!(found.contains(&a) && found.contains(&b));
        assert!(found.windows(2).all(|w| w[0] < w[1]));
        assert!(found.iter().all(|id| id.starts_with(&prefix)));
    }

    #[test]
    fn find_rejects_bad_prefix() {
        let store = InMemoryContentStore::new();
        assert!(matches!(
            store.find("XYZ").unwrap_err(),
            StoreError::InvalidIdentifierFormat(_)
        ));
    }

    #[test]
    fn total_bytes_counts_each_blob_once() {
        let store = InMemoryContentStore::new();
        store.put(b"12345").unwrap();
        store.put(b"12345").unwrap();
        store.put(b"123456789").unwrap();
        assert_eq!(store.total_bytes().unwrap(), 14);
    }

    // -----------------------------------------------------------------------
    // Pointer store
    // -----------------------------------------------------------------------

    #[test]
    fn pointer_set_get_overwrite() {
        let store = InMemoryPointerStore::new();
        let p = PointerId::random();
        let a = ContentId::digest(b"a");
        let b = ContentId::digest(b"b");
        store.set(&p, &a).unwrap();
        assert_eq!(store.get(&p).unwrap(), a);
        store.set(&p, &b).unwrap();
        assert_eq!(store.get(&p).unwrap(), b);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn pointer_delete_missing_is_not_found() {
        let store = InMemoryPointerStore::new();
        assert!(store.delete(&PointerId::random()).unwrap_err().is_not_found());
    }

    #[test]
    fn compare_and_set_checks_current_value() {
        let store = InMemoryPointerStore::new();
        let p = PointerId::random();
        let a = ContentId::digest(b"a");
        let b = ContentId::digest(b"b");

        store.compare_and_set(&p, None, &a).unwrap();
        let err = store.compare_and_set(&p, None, &b).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.get(&p).unwrap(), a);

        store.compare_and_set(&p, Some(&a), &b).unwrap();
        assert_eq!(store.get(&p).unwrap(), b);
        assert!(store.compare_and_set(&p, Some(&a), &a).is_err());
    }

    // -----------------------------------------------------------------------
    // DataStore
    // -----------------------------------------------------------------------

    #[test]
    fn set_pointer_requires_existing_content() {
        let store = InMemoryDataStore::new();
        let p = PointerId::random();
        let err = store
            .set_pointer(&p, &ContentId::digest(b"missing"))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidContentReference { .. }));
        assert!(!store.pointers().contains(&p).unwrap());

        let c = store.content().put(b"present").unwrap();
        store.set_pointer(&p, &c).unwrap();
        assert_eq!(store.get_pointer(&p).unwrap(), c);
    }

    #[test]
    fn pointer_may_not_reuse_a_content_id() {
        let store = InMemoryDataStore::new();
        let c = store.content().put(b"blob").unwrap();
        let clash = PointerId::from_hash(*c.as_bytes());

        for err in [
            store.set_pointer(&clash, &c).unwrap_err(),
            store.set_pointer_checked(&clash, None, &c).unwrap_err(),
        ] {
            assert!(matches!(
                err,
                StoreError::WrongSpace {
                    expected: IdentifierSpace::Pointer,
                    found: IdentifierSpace::Content,
                    ..
                }
            ));
        }
        assert!(!store.pointers().contains(&clash).unwrap());
        assert_eq!(store.resolve(&c.to_hex()).unwrap(), Identifier::Content(c));
        assert_eq!(store.content().get(&c).unwrap(), b"blob");
    }

    #[test]
    fn new_pointer_is_random_and_set() {
        let store = InMemoryDataStore::new();
        let c = store.content().put(b"target").unwrap();
        let p1 = store.new_pointer(&c).unwrap();
        let p2 = store.new_pointer(&c).unwrap();
        assert_ne!(p1, p2);
        assert_eq!(store.get_pointer(&p1).unwrap(), c);
    }

    #[test]
    fn resolve_unique_prefix_in_each_space() {
        let store = InMemoryDataStore::new();
        let c = store.content().put(b"hello").unwrap();
        let p = store.new_pointer(&c).unwrap();

        assert_eq!(store.resolve(HELLO).unwrap(), Identifier::Content(c));
        assert_eq!(store.resolve_pointer(&p.to_hex()).unwrap(), p);

        let found = store.find("").unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].to_hex() < found[1].to_hex());
    }

    #[test]
    fn resolve_reports_ambiguity_and_absence() {
        let store = InMemoryDataStore::new();
        let (_, _, prefix) = two_sharing_first_digit(store.content());
        assert!(matches!(
            store.resolve(&prefix).unwrap_err(),
            StoreError::Ambiguous { .. }
        ));
        assert!(store.resolve("").is_err());

        let empty = InMemoryDataStore::new();
        assert!(empty.resolve("abc").unwrap_err().is_not_found());
        assert!(matches!(
            empty.resolve("not-hex").unwrap_err(),
            StoreError::InvalidIdentifierFormat(_)
        ));
    }

    #[test]
    fn resolve_content_rejects_pointer() {
        let store = InMemoryDataStore::new();
        let c = store.content().put(b"x").unwrap();
        let p = store.new_pointer(&c).unwrap();
        assert!(matches!(
            store.resolve_content(&p.to_hex()).unwrap_err(),
            StoreError::WrongSpace { .. }
        ));
    }

    #[test]
    fn boxed_store_forwards() {
        let store: Box<dyn DataStore> = Box::new(InMemoryDataStore::new());
        let c = store.content().put(b"boxed").unwrap();
        let p = store.new_pointer(&c).unwrap();
        assert_eq!(store.get_pointer(&p).unwrap(), c);
    }

    #[test]
    fn concurrent_puts_dedup() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryContentStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.put(b"shared").unwrap())
            })
            .collect();
        let ids: Vec<ContentId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len().unwrap(), 1);
    }

    proptest! {
        #[test]
        fn get_after_put_returns_bytes(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let store = InMemoryContentStore::new();
            let id = store.put(&data).unwrap();
            prop_assert!(id.verify(&data));
            prop_assert_eq!(store.get(&id).unwrap(), data);
        }
    }
}
