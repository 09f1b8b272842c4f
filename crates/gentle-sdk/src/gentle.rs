use gentle_reach::{Reachability, TransferReport};
use gentle_store::{get_json, put_json, DataStore, InMemoryDataStore, StoreError};
use gentle_types::{
    ContentId, Identifier, IdentifierSpace, PointerId, Timestamp, IDENTIFIER_LENGTH,
};
use gentle_version::{History, VersionPayload};
use serde_json::Value;
use tracing::debug;

use crate::config::GentleConfig;
use crate::error::SdkResult;
use crate::registry::BackendRegistry;

/// High-level Gentle API.
///
/// Arguments that name existing entries accept partial identifiers, which
/// must resolve uniquely. Pointer arguments that may create a pointer
/// accept a full identifier for a pointer that does not exist yet.
pub struct Gentle {
    store: Box<dyn DataStore>,
    config: GentleConfig,
}

impl Gentle {
    /// Open a store with the default backends.
    pub fn open(config: GentleConfig) -> SdkResult<Self> {
        Self::open_with(&BackendRegistry::default(), config)
    }

    pub fn open_with(registry: &BackendRegistry, config: GentleConfig) -> SdkResult<Self> {
        let store = registry.open(&config)?;
        Ok(Self { store, config })
    }

    /// A fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::from_store(Box::new(InMemoryDataStore::new()))
    }

    /// Wrap an already opened store.
    pub fn from_store(store: Box<dyn DataStore>) -> Self {
        Self {
            store,
            config: GentleConfig::default(),
        }
    }

    pub fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &GentleConfig {
        &self.config
    }

    /// A pointer named by a full id (which need not exist yet, but must not
    /// name content) or by a prefix of an existing one.
    fn pointer_arg(&self, id: &str) -> SdkResult<PointerId> {
        if id.len() != IDENTIFIER_LENGTH {
            return Ok(self.store.resolve_pointer(id)?);
        }
        let pointer = PointerId::from_hex(id)?;
        if self.store.content().contains(&ContentId::from_hash(*pointer.as_bytes()))? {
            return Err(StoreError::WrongSpace {
                id: pointer.to_hex(),
                expected: IdentifierSpace::Pointer,
                found: IdentifierSpace::Content,
            }
            .into());
        }
        Ok(pointer)
    }

    // ---- Content operations ----

    pub fn put(&self, data: &[u8]) -> SdkResult<ContentId> {
        Ok(self.store.content().put(data)?)
    }

    pub fn get(&self, id: &str) -> SdkResult<Vec<u8>> {
        let id = self.store.resolve_content(id)?;
        Ok(self.store.content().get(&id)?)
    }

    /// Delete the content or pointer `id` resolves to, and return it.
    pub fn delete(&self, id: &str) -> SdkResult<Identifier> {
        let resolved = self.store.resolve(id)?;
        match &resolved {
            Identifier::Content(c) => self.store.content().delete(c)?,
            Identifier::Pointer(p) => self.store.pointers().delete(p)?,
        }
        debug!(id = %resolved.to_hex(), "deleted");
        Ok(resolved)
    }

    pub fn find(&self, prefix: &str) -> SdkResult<Vec<Identifier>> {
        Ok(self.store.find(prefix)?)
    }

    pub fn resolve(&self, prefix: &str) -> SdkResult<Identifier> {
        Ok(self.store.resolve(prefix)?)
    }

    // ---- Pointer operations ----

    pub fn set_pointer(&self, pointer: &str, target: &str) -> SdkResult<PointerId> {
        let pointer = self.pointer_arg(pointer)?;
        let target = self.store.resolve_content(target)?;
        self.store.set_pointer(&pointer, &target)?;
        Ok(pointer)
    }

    pub fn get_pointer(&self, pointer: &str) -> SdkResult<ContentId> {
        let pointer = self.store.resolve_pointer(pointer)?;
        Ok(self.store.get_pointer(&pointer)?)
    }

    /// Create a pointer with a random id.
    pub fn new_pointer(&self, target: &str) -> SdkResult<PointerId> {
        let target = self.store.resolve_content(target)?;
        Ok(self.store.new_pointer(&target)?)
    }

    // ---- JSON documents ----

    pub fn put_json(&self, value: &Value) -> SdkResult<ContentId> {
        Ok(put_json(self.store.content(), value)?)
    }

    pub fn get_json(&self, id: &str) -> SdkResult<Value> {
        let id = self.store.resolve_content(id)?;
        Ok(get_json(self.store.content(), &id)?)
    }

    // ---- Reachability and transfer ----

    pub fn findall(&self, roots: &[&str]) -> SdkResult<Reachability> {
        Ok(gentle_reach::findall(self.store(), roots)?)
    }

    /// Store the `findall` result as a JSON document and return its id.
    pub fn findall_stored(&self, roots: &[&str]) -> SdkResult<ContentId> {
        Ok(gentle_reach::findall_stored(self.store(), roots)?)
    }

    /// Copy the closure of `root` into `other`.
    pub fn export(&self, root: &str, other: &Gentle) -> SdkResult<TransferReport> {
        Ok(gentle_reach::export(root, self.store(), other.store())?)
    }

    /// Copy the closure of `root` from `other` into this store.
    pub fn import(&self, root: &str, other: &Gentle) -> SdkResult<TransferReport> {
        Ok(gentle_reach::import(root, self.store(), other.store())?)
    }

    // ---- Versions ----

    /// Store a version of `payload` on top of `predecessor` (the empty
    /// version if `None`) and return its id.
    pub fn make_version(
        &self,
        predecessor: Option<&str>,
        payload: &str,
        timestamp: Option<Timestamp>,
    ) -> SdkResult<ContentId> {
        let predecessor = predecessor
            .map(|p| self.store.resolve_content(p))
            .transpose()?;
        let payload = self.store.resolve_content(payload)?;
        let record = gentle_version::make_version(self.store(), predecessor, payload, timestamp)?;
        Ok(gentle_version::store_version(self.store(), &record)?)
    }

    /// Append a version to the chain behind `pointer`; last writer wins.
    pub fn put_version(
        &self,
        pointer: &str,
        payload: impl Into<VersionPayload>,
    ) -> SdkResult<ContentId> {
        let pointer = self.pointer_arg(pointer)?;
        Ok(gentle_version::put_version(self.store(), &pointer, payload)?)
    }

    /// Like [`Gentle::put_version`], but fails on a concurrent update.
    pub fn put_version_checked(
        &self,
        pointer: &str,
        payload: impl Into<VersionPayload>,
    ) -> SdkResult<ContentId> {
        let pointer = self.pointer_arg(pointer)?;
        Ok(gentle_version::put_version_checked(self.store(), &pointer, payload)?)
    }

    /// The version a tip argument names: a version id, or a pointer to one.
    fn version_arg(&self, tip: &str) -> SdkResult<ContentId> {
        match self.store.resolve(tip)? {
            Identifier::Content(c) => Ok(c),
            Identifier::Pointer(p) => Ok(self.store.get_pointer(&p)?),
        }
    }

    pub fn history(&self, tip: &str) -> SdkResult<History> {
        let tip = self.version_arg(tip)?;
        Ok(gentle_version::history(self.store(), &tip)?)
    }

    /// `None` if `expected` is on the chain behind `tip`.
    pub fn check_ancestry(
        &self,
        tip: &str,
        expected: &str,
    ) -> SdkResult<Option<gentle_version::AncestryMismatch>> {
        let tip = self.version_arg(tip)?;
        let expected = self.store.resolve_content(expected)?;
        Ok(gentle_version::check_ancestry(self.store(), &tip, &expected)?)
    }
}

impl std::fmt::Debug for Gentle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gentle").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gentle_store::StoreError;
    use serde_json::json;

    use crate::error::SdkError;

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    // ---- content ----

    #[test]
    fn put_get_with_partial_ids() {
        let g = Gentle::in_memory();
        let id = g.put(b"hello").unwrap();
        assert_eq!(id.to_hex(), HELLO);
        assert_eq!(g.get(&HELLO[..8]).unwrap(), b"hello");
        assert_eq!(g.resolve("2cf").unwrap(), Identifier::Content(id));
        assert_eq!(g.find("2c").unwrap(), vec![Identifier::Content(id)]);
    }

    #[test]
    fn delete_either_space() {
        let g = Gentle::in_memory();
        let id = g.put(b"doomed").unwrap();
        let p = g.new_pointer(&id.to_hex()).unwrap();
        assert_eq!(g.delete(&p.to_hex()).unwrap(), Identifier::Pointer(p));
        assert_eq!(g.delete(&id.to_hex()).unwrap(), Identifier::Content(id));
        assert!(g.find("").unwrap().is_empty());
        assert!(matches!(
            g.delete(&id.to_hex()).unwrap_err(),
            SdkError::Store(e) if e.is_not_found()
        ));
    }

    #[test]
    fn get_rejects_pointer_ids() {
        let g = Gentle::in_memory();
        let id = g.put(b"x").unwrap();
        let p = g.new_pointer(&id.to_hex()).unwrap();
        assert!(matches!(
            g.get(&p.to_hex()).unwrap_err(),
            SdkError::Store(StoreError::WrongSpace { .. })
        ));
    }

    // ---- pointers ----

    #[test]
    fn set_pointer_creates_and_moves() {
        let g = Gentle::in_memory();
        let a = g.put(b"a").unwrap();
        let b = g.put(b"b").unwrap();
        let fresh = PointerId::random();
        let p = g.set_pointer(&fresh.to_hex(), &a.to_hex()).unwrap();
        assert_eq!(p, fresh);
        g.set_pointer(&p.to_hex()[..10], &b.to_hex()).unwrap();
        assert_eq!(g.get_pointer(&p.to_hex()).unwrap(), b);
    }

    #[test]
    fn set_pointer_needs_existing_target() {
        let g = Gentle::in_memory();
        let missing = ContentId::digest(b"missing").to_hex();
        assert!(g.set_pointer(&PointerId::random().to_hex(), &missing).is_err());
    }

    #[test]
    fn content_id_cannot_become_a_pointer() {
        let g = Gentle::in_memory();
        let c = g.put(b"shared digits").unwrap();
        let err = g.set_pointer(&c.to_hex(), &c.to_hex()).unwrap_err();
        assert!(matches!(
            err,
            SdkError::Store(StoreError::WrongSpace {
                expected: IdentifierSpace::Pointer,
                found: IdentifierSpace::Content,
                ..
            })
        ));
        assert!(g.put_version(&c.to_hex(), json!({"v": 1})).is_err());

        assert_eq!(g.resolve(&c.to_hex()).unwrap(), Identifier::Content(c));
        assert_eq!(g.get(&c.to_hex()).unwrap(), b"shared digits");
        assert_eq!(g.find(&c.to_hex()[..8]).unwrap(), vec![Identifier::Content(c)]);
    }

    // ---- json ----

    #[test]
    fn json_documents() {
        let g = Gentle::in_memory();
        let id = g.put_json(&json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(g.get(&id.to_hex()).unwrap(), br#"{"a":1,"b":2}"#);
        assert_eq!(g.get_json(&id.to_hex()[..6]).unwrap(), json!({"a": 1, "b": 2}));
    }

    // ---- versions ----

    #[test]
    fn hello_scenario() {
        let g = Gentle::in_memory();
        let hello = g.put(b"hello").unwrap();
        let p1 = g.new_pointer(HELLO).unwrap();
        assert_eq!(g.get_pointer(&p1.to_hex()).unwrap(), hello);

        let v1 = g.make_version(None, HELLO, None).unwrap();
        g.set_pointer(&p1.to_hex(), &v1.to_hex()).unwrap();

        let reach = g.findall(&[p1.to_hex().as_str()]).unwrap();
        assert!(reach.pointers.contains(&p1));
        assert_eq!(reach.pointers.len(), 1);
        assert!(reach.json_content.contains(&v1));
        assert!(reach.content.contains(&hello));
    }

    #[test]
    fn version_history_through_pointer() {
        let g = Gentle::in_memory();
        let p = PointerId::random().to_hex();
        let v1 = g.put_version(&p, json!({"draft": 1})).unwrap();
        let v2 = g.put_version(&p, json!({"draft": 2})).unwrap();

        let walked = g.history(&p).unwrap();
        assert!(walked.is_complete());
        assert_eq!(walked.versions[0].0, v2);
        assert_eq!(walked.versions[1].0, v1);
        assert_eq!(g.check_ancestry(&p, &v1.to_hex()).unwrap(), None);
        assert!(g.check_ancestry(&v1.to_hex(), &v2.to_hex()).unwrap().is_some());
    }

    #[test]
    fn checked_versions_chain() {
        let g = Gentle::in_memory();
        let p = PointerId::random().to_hex();
        let blob = g.put(b"payload").unwrap();
        let v1 = g.put_version_checked(&p, blob).unwrap();
        let v2 = g.put_version_checked(&p, blob).unwrap();
        assert_ne!(v1, v2);
        assert_eq!(g.history(&v2.to_hex()).unwrap().versions.len(), 3);
    }

    #[test]
    fn explicit_timestamp_is_reproducible() {
        let g = Gentle::in_memory();
        g.put(b"hello").unwrap();
        let ts = Timestamp::parse("2011-03-01 13:00:00 +0100").unwrap();
        let a = g.make_version(None, HELLO, Some(ts)).unwrap();
        let b = g.make_version(None, &HELLO[..5], Some(ts)).unwrap();
        assert_eq!(a, b);
        let doc = g.get_json(&a.to_hex()).unwrap();
        assert_eq!(doc["timestamp"], "2011-03-01 13:00:00 +0100");
    }

    // ---- transfer ----

    #[test]
    fn export_and_import_between_stores() {
        let here = Gentle::in_memory();
        let there = Gentle::open(GentleConfig::memory().journaled(true)).unwrap();
        let child = here.put(b"child").unwrap();
        let root = here
            .put_json(&json!({"child:content": child.to_hex()}))
            .unwrap();

        let report = here.export(&root.to_hex(), &there).unwrap();
        assert_eq!(report.content, 2);
        assert_eq!(there.get(&child.to_hex()).unwrap(), b"child");

        let back = Gentle::in_memory();
        back.import(&root.to_hex(), &there).unwrap();
        assert_eq!(back.get_json(&root.to_hex()).unwrap(), json!({"child:content": child.to_hex()}));
    }

    #[test]
    fn findall_stored_document() {
        let g = Gentle::in_memory();
        let id = g.put(b"solo").unwrap();
        let stored = g.findall_stored(&[id.to_hex().as_str()]).unwrap();
        let doc = g.get_json(&stored.to_hex()).unwrap();
        assert_eq!(doc["content"], json!([id.to_hex()]));
    }

    #[test]
    fn open_fs_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = GentleConfig::fs(dir.path()).journaled(true);
        let id = {
            let g = Gentle::open(config.clone()).unwrap();
            g.put(b"durable").unwrap()
        };
        let g = Gentle::open(config).unwrap();
        assert_eq!(g.get(&id.to_hex()).unwrap(), b"durable");
        assert!(g.config().journaled);
        assert!(format!("{g:?}").contains("journaled: true"));
    }
}
