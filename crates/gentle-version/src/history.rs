use std::collections::HashSet;
use std::fmt;

use gentle_store::{get_json, DataStore};
use gentle_types::ContentId;
use tracing::warn;

use crate::error::{VersionError, VersionResult};
use crate::record::VersionRecord;

/// A chain that does not lead back where it should.
///
/// Divergent and damaged histories are reported, not rejected: the walk
/// stops at the first problem and returns what it found so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AncestryMismatch {
    /// `version` names a predecessor that is not in the store.
    MissingPredecessor {
        version: ContentId,
        predecessor: ContentId,
    },
    /// `version` names a predecessor that is not a version record.
    NotAVersion {
        version: ContentId,
        predecessor: ContentId,
    },
    /// Following predecessors from `version` came back to an earlier link.
    Cycle { version: ContentId },
    /// `expected` is not on the chain from `tip`.
    Diverged { tip: ContentId, expected: ContentId },
}

impl fmt::Display for AncestryMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPredecessor {
                version,
                predecessor,
            } => write!(f, "version {version} has missing predecessor {predecessor}"),
            Self::NotAVersion {
                version,
                predecessor,
            } => write!(f, "version {version} follows non-version {predecessor}"),
            Self::Cycle { version } => write!(f, "version chain loops back to {version}"),
            Self::Diverged { tip, expected } => {
                write!(f, "{expected} is not an ancestor of {tip}")
            }
        }
    }
}

/// The versions reachable from a tip, newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct History {
    pub versions: Vec<(ContentId, VersionRecord)>,
    pub mismatches: Vec<AncestryMismatch>,
}

impl History {
    /// `true` if the walk reached the empty version without problems.
    pub fn is_complete(&self) -> bool {
        self.mismatches.is_empty()
            && self
                .versions
                .last()
                .is_some_and(|(_, record)| record.predecessor.is_none())
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        self.versions.iter().any(|(v, _)| v == id)
    }

    /// Payload ids, newest first.
    pub fn payloads(&self) -> Vec<ContentId> {
        self.versions.iter().map(|(_, r)| r.payload).collect()
    }
}

/// Read the version record stored under `id`.
pub fn load_version(store: &dyn DataStore, id: &ContentId) -> VersionResult<VersionRecord> {
    let value = get_json(store.content(), id).map_err(|e| match e {
        gentle_store::StoreError::CorruptObject { reason, .. } => VersionError::NotAVersion {
            id: *id,
            reason,
        },
        other => other.into(),
    })?;
    VersionRecord::from_json(&value).map_err(|reason| VersionError::NotAVersion { id: *id, reason })
}

/// Walk predecessors from `tip` until the empty version.
///
/// `tip` itself must be a version record. Problems further down the chain
/// end the walk and are reported in [`History::mismatches`].
pub fn history(store: &dyn DataStore, tip: &ContentId) -> VersionResult<History> {
    let mut out = History::default();
    let mut seen = HashSet::new();
    let mut current = *tip;
    let mut record = load_version(store, tip)?;
    loop {
        seen.insert(current);
        let predecessor = record.predecessor;
        out.versions.push((current, record));
        let Some(prev) = predecessor else {
            break;
        };
        if seen.contains(&prev) {
            out.mismatches.push(AncestryMismatch::Cycle { version: prev });
            break;
        }
        match load_version(store, &prev) {
            Ok(next) => {
                current = prev;
                record = next;
            }
            Err(VersionError::Store(e)) if e.is_not_found() => {
                out.mismatches.push(AncestryMismatch::MissingPredecessor {
                    version: current,
                    predecessor: prev,
                });
                break;
            }
            Err(VersionError::NotAVersion { .. }) => {
                out.mismatches.push(AncestryMismatch::NotAVersion {
                    version: current,
                    predecessor: prev,
                });
                break;
            }
            Err(e) => return Err(e),
        }
    }
    for mismatch in &out.mismatches {
        warn!(tip = %tip.short_hex(), %mismatch, "ancestry mismatch");
    }
    Ok(out)
}

/// Check that `expected` lies on the chain from `tip`.
///
/// Returns `None` when it does. Otherwise the first problem found: a
/// damaged chain, or [`AncestryMismatch::Diverged`].
pub fn check_ancestry(
    store: &dyn DataStore,
    tip: &ContentId,
    expected: &ContentId,
) -> VersionResult<Option<AncestryMismatch>> {
    let walked = history(store, tip)?;
    if walked.contains(expected) {
        return Ok(None);
    }
    let mismatch = walked
        .mismatches
        .into_iter()
        .next()
        .unwrap_or(AncestryMismatch::Diverged {
            tip: *tip,
            expected: *expected,
        });
    warn!(%mismatch, "ancestry check failed");
    Ok(Some(mismatch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{empty_version, make_version, put_version, store_version};
    use crate::record::{PAYLOAD_KEY, PREDECESSOR_KEY};
    use std::collections::BTreeMap;
    use std::sync::RwLock;

    use gentle_store::{
        put_json, ContentStore, InMemoryDataStore, InMemoryPointerStore, PointerStore, StoreError,
        StoreResult,
    };
    use gentle_types::PointerId;
    use serde_json::json;

    /// `n` versions behind a fresh pointer. Payloads are `"{tag} rev {i}"`,
    /// so chains with different tags never share a version.
    fn chain_of(store: &InMemoryDataStore, tag: &str, n: usize) -> (PointerId, Vec<ContentId>) {
        let p = PointerId::random();
        let versions = (0..n)
            .map(|i| {
                let payload = store.content().put(format!("{tag} rev {i}").as_bytes()).unwrap();
                put_version(store, &p, payload).unwrap()
            })
            .collect();
        (p, versions)
    }

    #[test]
    fn walks_back_to_empty_version() {
        let store = InMemoryDataStore::new();
        let (_, versions) = chain_of(&store, "main", 3);
        let walked = history(&store, &versions[2]).unwrap();
        assert!(walked.is_complete());
        assert_eq!(walked.versions.len(), 4);
        let ids: Vec<ContentId> = walked.versions.iter().map(|(id, _)| *id).collect();
        assert_eq!(
            ids,
            vec![versions[2], versions[1], versions[0], empty_version(&store).unwrap()]
        );
        assert_eq!(walked.payloads()[0], ContentId::digest(b"main rev 2"));
    }

    #[test]
    fn tip_must_be_a_version() {
        let store = InMemoryDataStore::new();
        let raw = store.content().put(b"plain").unwrap();
        assert!(matches!(
            history(&store, &raw).unwrap_err(),
            VersionError::NotAVersion { .. }
        ));
        let doc = put_json(store.content(), &json!({"title": "x"})).unwrap();
        assert!(history(&store, &doc).is_err());
    }

    #[test]
    fn missing_predecessor_is_reported() {
        let store = InMemoryDataStore::new();
        let payload = store.content().put(b"p").unwrap();
        let ghost = ContentId::digest(b"never stored");
        let orphan = put_json(
            store.content(),
            &json!({PAYLOAD_KEY: payload.to_hex(), PREDECESSOR_KEY: ghost.to_hex()}),
        )
        .unwrap();

        let walked = history(&store, &orphan).unwrap();
        assert_eq!(walked.versions.len(), 1);
        assert_eq!(
            walked.mismatches,
            vec![AncestryMismatch::MissingPredecessor {
                version: orphan,
                predecessor: ghost
            }]
        );
        assert!(!walked.is_complete());
    }

    #[test]
    fn non_version_predecessor_is_reported() {
        let store = InMemoryDataStore::new();
        let hello = store.content().put(b"hello").unwrap();
        let record = make_version(&store, Some(hello), hello, None).unwrap();
        let v = store_version(&store, &record).unwrap();

        let walked = history(&store, &v).unwrap();
        assert_eq!(
            walked.mismatches,
            vec![AncestryMismatch::NotAVersion {
                version: v,
                predecessor: hello
            }]
        );
    }

    #[test]
    fn check_ancestry_accepts_ancestors() {
        let store = InMemoryDataStore::new();
        let (_, versions) = chain_of(&store, "main", 4);
        assert_eq!(check_ancestry(&store, &versions[3], &versions[0]).unwrap(), None);
        assert_eq!(check_ancestry(&store, &versions[3], &versions[3]).unwrap(), None);
    }

    #[test]
    fn check_ancestry_reports_divergence() {
        let store = InMemoryDataStore::new();
        let (_, left) = chain_of(&store, "left", 2);
        let (_, right) = chain_of(&store, "right", 2);
        let mismatch = check_ancestry(&store, &left[1], &right[0]).unwrap();
        assert_eq!(
            mismatch,
            Some(AncestryMismatch::Diverged {
                tip: left[1],
                expected: right[0]
            })
        );
        // A newer version is not an ancestor of an older one.
        assert!(check_ancestry(&store, &left[0], &left[1]).unwrap().is_some());
        assert_ne!(left[0], right[0]);
    }

    // ---- damaged chains ----

    /// Content store that serves chosen bytes under chosen ids, so a test
    /// can build chains no honest store could hold.
    #[derive(Default)]
    struct ForgedContent(RwLock<BTreeMap<ContentId, Vec<u8>>>);

    impl ForgedContent {
        fn forge(&self, id: ContentId, record: &VersionRecord) {
            let bytes = serde_json::to_vec(&record.to_json()).unwrap();
            self.0.write().unwrap().insert(id, bytes);
        }
    }

    impl ContentStore for ForgedContent {
        fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
            let id = ContentId::digest(data);
            self.0.write().unwrap().insert(id, data.to_vec());
            Ok(id)
        }

        fn get(&self, id: &ContentId) -> StoreResult<Vec<u8>> {
            self.0
                .read()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::content_not_found(id))
        }

        fn contains(&self, id: &ContentId) -> StoreResult<bool> {
            Ok(self.0.read().unwrap().contains_key(id))
        }

        fn delete(&self, id: &ContentId) -> StoreResult<()> {
            self.0
                .write()
                .unwrap()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::content_not_found(id))
        }

        fn find(&self, prefix: &str) -> StoreResult<Vec<ContentId>> {
            Ok(self
                .0
                .read()
                .unwrap()
                .keys()
                .filter(|id| id.to_hex().starts_with(prefix))
                .copied()
                .collect())
        }
    }

    #[derive(Default)]
    struct ForgedStore {
        content: ForgedContent,
        pointers: InMemoryPointerStore,
    }

    impl DataStore for ForgedStore {
        fn content(&self) -> &dyn ContentStore {
            &self.content
        }

        fn pointers(&self) -> &dyn PointerStore {
            &self.pointers
        }
    }

    fn linked_to(predecessor: ContentId) -> VersionRecord {
        VersionRecord {
            predecessor: Some(predecessor),
            ..VersionRecord::empty()
        }
    }

    #[test]
    fn two_versions_naming_each_other_form_a_cycle() {
        let store = ForgedStore::default();
        let x = ContentId::digest(b"x");
        let y = ContentId::digest(b"y");
        store.content.forge(x, &linked_to(y));
        store.content.forge(y, &linked_to(x));

        let walked = history(&store, &x).unwrap();
        let ids: Vec<ContentId> = walked.versions.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![x, y]);
        assert_eq!(walked.mismatches, vec![AncestryMismatch::Cycle { version: x }]);
        assert!(!walked.is_complete());

        let elsewhere = ContentId::digest(b"elsewhere");
        assert_eq!(
            check_ancestry(&store, &x, &elsewhere).unwrap(),
            Some(AncestryMismatch::Cycle { version: x })
        );
        assert_eq!(check_ancestry(&store, &x, &y).unwrap(), None);
    }

    #[test]
    fn version_naming_itself_is_a_cycle() {
        let store = ForgedStore::default();
        let z = ContentId::digest(b"z");
        store.content.forge(z, &linked_to(z));

        let walked = history(&store, &z).unwrap();
        assert_eq!(walked.versions.len(), 1);
        assert_eq!(walked.mismatches, vec![AncestryMismatch::Cycle { version: z }]);
    }

    #[test]
    fn mismatch_display() {
        let id = ContentId::digest(b"v");
        let text = AncestryMismatch::Cycle { version: id }.to_string();
        assert!(text.contains(&id.to_hex()));
    }
}
