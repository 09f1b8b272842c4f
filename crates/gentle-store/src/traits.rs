use std::sync::Arc;

use gentle_types::{validate_partial, ContentId, Identifier, IdentifierSpace, PointerId};

use crate::error::{StoreError, StoreResult};

/// Immutable, content-addressed blob storage.
///
/// All implementations must satisfy these invariants:
/// - For every stored id, `ContentId::digest(bytes) == id`.
/// - Write-once: a second `put` of identical bytes is a no-op, and an
///   existing file or entry is never overwritten.
/// - `find` returns identifiers in ascending order.
pub trait ContentStore: Send + Sync {
    /// Store `data` and return its identifier. Idempotent.
    fn put(&self, data: &[u8]) -> StoreResult<ContentId>;

    /// Read a blob. Fails with `NotFound` if absent.
    fn get(&self, id: &ContentId) -> StoreResult<Vec<u8>>;

    /// Check whether a blob exists.
    fn contains(&self, id: &ContentId) -> StoreResult<bool>;

    /// Remove a blob. Fails with `NotFound` if absent.
    ///
    /// Pointers that reference the blob are left dangling.
    fn delete(&self, id: &ContentId) -> StoreResult<()>;

    /// All identifiers starting with the hex `prefix`, sorted.
    fn find(&self, prefix: &str) -> StoreResult<Vec<ContentId>>;
}

/// Mutable named references to content identifiers.
///
/// A pointer store is content-agnostic: it does not check that targets
/// exist. [`DataStore::set_pointer`] does.
pub trait PointerStore: Send + Sync {
    /// Create or overwrite a pointer.
    fn set(&self, id: &PointerId, target: &ContentId) -> StoreResult<()>;

    /// Read a pointer's target. Fails with `NotFound` if absent.
    fn get(&self, id: &PointerId) -> StoreResult<ContentId>;

    /// Check whether a pointer exists.
    fn contains(&self, id: &PointerId) -> StoreResult<bool>;

    /// Remove a pointer. Fails with `NotFound` if absent.
    fn delete(&self, id: &PointerId) -> StoreResult<()>;

    /// All identifiers starting with the hex `prefix`, sorted.
    fn find(&self, prefix: &str) -> StoreResult<Vec<PointerId>>;

    /// Set `id` to `new` only if its current target is `expected`
    /// (`None` meaning the pointer must not exist yet).
    ///
    /// Fails with `Conflict` otherwise. Atomic with respect to other
    /// callers in the same process.
    fn compare_and_set(
        &self,
        id: &PointerId,
        expected: Option<&ContentId>,
        new: &ContentId,
    ) -> StoreResult<()>;
}

/// The target must exist, and `id` must not already name content: the two
/// spaces share one hex alphabet, so a colliding pointer would shadow the blob.
fn check_pointer_write<S: DataStore + ?Sized>(
    store: &S,
    id: &PointerId,
    target: &ContentId,
) -> StoreResult<()> {
    if !store.content().contains(target)? {
        return Err(StoreError::InvalidContentReference {
            pointer: *id,
            target: *target,
        });
    }
    if store.content().contains(&ContentId::from_hash(*id.as_bytes()))? {
        return Err(StoreError::WrongSpace {
            id: id.to_hex(),
            expected: IdentifierSpace::Pointer,
            found: IdentifierSpace::Content,
        });
    }
    Ok(())
}

/// A content store paired with a pointer store.
///
/// This is the surface the version chain and the reachability engine are
/// written against; they never see which backend sits underneath.
pub trait DataStore: Send + Sync {
    fn content(&self) -> &dyn ContentStore;

    fn pointers(&self) -> &dyn PointerStore;

    /// Point `id` at `target`, which must exist in the content store.
    fn set_pointer(&self, id: &PointerId, target: &ContentId) -> StoreResult<()> {
        check_pointer_write(self, id, target)?;
        self.pointers().set(id, target)
    }

    /// Like [`set_pointer`](Self::set_pointer), guarded by
    /// [`PointerStore::compare_and_set`].
    fn set_pointer_checked(
        &self,
        id: &PointerId,
        expected: Option<&ContentId>,
        target: &ContentId,
    ) -> StoreResult<()> {
        check_pointer_write(self, id, target)?;
        self.pointers().compare_and_set(id, expected, target)
    }

    fn get_pointer(&self, id: &PointerId) -> StoreResult<ContentId> {
        self.pointers().get(id)
    }

    /// Create a pointer with a fresh random identifier.
    fn new_pointer(&self, target: &ContentId) -> StoreResult<PointerId> {
        let id = PointerId::random();
        self.set_pointer_checked(&id, None, target)?;
        Ok(id)
    }

    /// Identifiers in either space starting with `prefix`, sorted by hex.
    fn find(&self, prefix: &str) -> StoreResult<Vec<Identifier>> {
        validate_partial(prefix)?;
        let mut found: Vec<Identifier> = self
            .content()
            .find(prefix)?
            .into_iter()
            .map(Identifier::from)
            .collect();
        found.extend(self.pointers().find(prefix)?.into_iter().map(Identifier::from));
        found.sort_by_key(Identifier::to_hex);
        Ok(found)
    }

    /// Resolve a possibly partial identifier to the unique entry it names.
    fn resolve(&self, prefix: &str) -> StoreResult<Identifier> {
        let mut found = self.find(prefix)?;
        match found.len() {
            0 => Err(StoreError::unresolved(prefix)),
            1 => Ok(found.remove(0)),
            n => Err(StoreError::Ambiguous {
                prefix: prefix.to_string(),
                matches: n,
            }),
        }
    }

    /// Resolve `prefix`, requiring it to land in the content space.
    fn resolve_content(&self, prefix: &str) -> StoreResult<ContentId> {
        match self.resolve(prefix)? {
            Identifier::Content(id) => Ok(id),
            Identifier::Pointer(id) => Err(StoreError::WrongSpace {
                id: id.to_hex(),
                expected: IdentifierSpace::Content,
                found: IdentifierSpace::Pointer,
            }),
        }
    }

    /// Resolve `prefix`, requiring it to land in the pointer space.
    fn resolve_pointer(&self, prefix: &str) -> StoreResult<PointerId> {
        match self.resolve(prefix)? {
            Identifier::Pointer(id) => Ok(id),
            Identifier::Content(id) => Err(StoreError::WrongSpace {
                id: id.to_hex(),
                expected: IdentifierSpace::Pointer,
                found: IdentifierSpace::Content,
            }),
        }
    }
}

/// Forwards every method, so wrappers keep any overrides of the inner store.
macro_rules! forward_data_store {
    ($($wrapper:ident),*) => {$(
        impl<T: DataStore + ?Sized> DataStore for $wrapper<T> {
            fn content(&self) -> &dyn ContentStore {
                (**self).content()
            }

            fn pointers(&self) -> &dyn PointerStore {
                (**self).pointers()
            }

            fn set_pointer(&self, id: &PointerId, target: &ContentId) -> StoreResult<()> {
                (**self).set_pointer(id, target)
            }

            fn set_pointer_checked(
                &self,
                id: &PointerId,
                expected: Option<&ContentId>,
                target: &ContentId,
            ) -> StoreResult<()> {
                (**self).set_pointer_checked(id, expected, target)
            }

            fn get_pointer(&self, id: &PointerId) -> StoreResult<ContentId> {
                (**self).get_pointer(id)
            }

            fn new_pointer(&self, target: &ContentId) -> StoreResult<PointerId> {
                (**self).new_pointer(target)
            }

            fn find(&self, prefix: &str) -> StoreResult<Vec<Identifier>> {
                (**self).find(prefix)
            }

            fn resolve(&self, prefix: &str) -> StoreResult<Identifier> {
                (**self).resolve(prefix)
            }

            fn resolve_content(&self, prefix: &str) -> StoreResult<ContentId> {
                (**self).resolve_content(prefix)
            }

            fn resolve_pointer(&self, prefix: &str) -> StoreResult<PointerId> {
                (**self).resolve_pointer(prefix)
            }
        }
    )*};
}

forward_data_store!(Box, Arc);
