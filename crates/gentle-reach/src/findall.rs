//! Reachability closures.
//!
//! Starting from one or more roots, follow every reference found in JSON
//! documents and classify each identifier reached. Only values under
//! reference keys (see [`gentle_store::keys`]) are followed; everything else
//! in a document is ignored, including nested structure under plain keys.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;

use gentle_store::keys::{ROOT_CONTENT_KEY, ROOT_POINTER_KEY};
use gentle_store::{
    dereferenced, is_json_bearing, parse_json, put_json, reference_space, DataStore,
};
use gentle_types::{ContentId, Identifier, IdentifierSpace, PointerId, IDENTIFIER_LENGTH};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ReachError, ReachResult};

/// How a reached identifier was classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    Pointer,
    /// Content that was not read as JSON.
    Content,
    /// Content reached under a JSON-bearing key that parses as JSON.
    JsonContent,
}

impl Classification {
    pub const ALL: [Classification; 3] = [Self::Pointer, Self::Content, Self::JsonContent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pointer => "pointer",
            Self::Content => "content",
            Self::JsonContent => "json-content",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every identifier reached, by classification. Each identifier appears in
/// exactly one set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reachability {
    pub pointers: BTreeSet<PointerId>,
    pub content: BTreeSet<ContentId>,
    pub json_content: BTreeSet<ContentId>,
}

impl Reachability {
    pub fn len(&self) -> usize {
        self.pointers.len() + self.content.len() + self.json_content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn classification(&self, id: &Identifier) -> Option<Classification> {
        match id {
            Identifier::Pointer(p) => self.pointers.contains(p).then_some(Classification::Pointer),
            Identifier::Content(c) if self.content.contains(c) => Some(Classification::Content),
            Identifier::Content(c) if self.json_content.contains(c) => {
                Some(Classification::JsonContent)
            }
            Identifier::Content(_) => None,
        }
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.classification(id).is_some()
    }

    /// All content ids, plain and JSON, in sorted order.
    pub fn content_ids(&self) -> impl Iterator<Item = &ContentId> {
        self.content.union(&self.json_content)
    }

    /// Sorted hex ids of one classification.
    pub fn ids(&self, class: Classification) -> Vec<String> {
        match class {
            Classification::Pointer => self.pointers.iter().map(PointerId::to_hex).collect(),
            Classification::Content => self.content.iter().map(ContentId::to_hex).collect(),
            Classification::JsonContent => {
                self.json_content.iter().map(ContentId::to_hex).collect()
            }
        }
    }

    /// `{"pointer": [...], "content": [...], "json-content": [...]}`, each
    /// list sorted. All three keys are always present.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = Classification::ALL
            .iter()
            .map(|class| {
                let ids = self.ids(*class).into_iter().map(Value::String).collect();
                (class.as_str().to_string(), Value::Array(ids))
            })
            .collect();
        Value::Object(map)
    }

    fn record(&mut self, id: Identifier, class: Classification) {
        match (id, class) {
            (Identifier::Pointer(p), _) => {
                self.pointers.insert(p);
            }
            (Identifier::Content(c), Classification::JsonContent) => {
                self.json_content.insert(c);
            }
            (Identifier::Content(c), _) => {
                self.content.insert(c);
            }
        }
    }
}

/// Breadth-first walk over references. Each identifier is queued once,
/// under the key it was first reached by.
struct Walker<'a> {
    store: &'a dyn DataStore,
    seen: HashSet<Identifier>,
    queue: VecDeque<(Identifier, String)>,
    out: Reachability,
}

impl<'a> Walker<'a> {
    fn new(store: &'a dyn DataStore) -> Self {
        Self {
            store,
            seen: HashSet::new(),
            queue: VecDeque::new(),
            out: Reachability::default(),
        }
    }

    fn enqueue(&mut self, id: Identifier, key: &str) {
        if self.seen.insert(id) {
            self.queue.push_back((id, key.to_string()));
        }
    }

    fn run(mut self) -> ReachResult<Reachability> {
        while let Some((id, key)) = self.queue.pop_front() {
            match id {
                Identifier::Pointer(p) => {
                    let target = self.store.get_pointer(&p)?;
                    let key = dereferenced(&key);
                    if !self.store.content().contains(&target)? {
                        return Err(ReachError::DanglingReference {
                            key,
                            id: target.to_hex(),
                        });
                    }
                    self.out.record(id, Classification::Pointer);
                    self.enqueue(Identifier::Content(target), &key);
                }
                Identifier::Content(c) => self.visit_content(c, &key)?,
            }
        }
        Ok(self.out)
    }

    fn visit_content(&mut self, id: ContentId, key: &str) -> ReachResult<()> {
        if is_json_bearing(key) {
            let bytes = self.store.content().get(&id)?;
            if let Some(doc) = parse_json(&bytes) {
                self.out.record(Identifier::Content(id), Classification::JsonContent);
                return self.scan(&doc, None);
            }
        }
        self.out.record(Identifier::Content(id), Classification::Content);
        Ok(())
    }

    /// Collect the references in `value`. `key` is the reference key the
    /// value sits under, if any.
    fn scan(&mut self, value: &Value, key: Option<&str>) -> ReachResult<()> {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    if reference_space(k).is_some() {
                        self.scan(v, Some(k.as_str()))?;
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.scan(item, key)?;
                }
            }
            Value::String(s) => {
                if let Some(key) = key {
                    let id = self.reference(key, s)?;
                    self.enqueue(id, key);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Check that `value` under reference key `key` names an existing entry
    /// of the space the key calls for.
    fn reference(&self, key: &str, value: &str) -> ReachResult<Identifier> {
        let invalid = || ReachError::InvalidReference {
            key: key.to_string(),
            value: value.to_string(),
        };
        if value.len() != IDENTIFIER_LENGTH {
            return Err(invalid());
        }
        let expected = reference_space(key).ok_or_else(invalid)?;
        let content = ContentId::from_hex(value).map_err(|_| invalid())?;
        let pointer = PointerId::from_hash(*content.as_bytes());

        let (wanted, other) = match expected {
            IdentifierSpace::Content => (
                self.store.content().contains(&content)?,
                self.store.pointers().contains(&pointer)?,
            ),
            IdentifierSpace::Pointer => (
                self.store.pointers().contains(&pointer)?,
                self.store.content().contains(&content)?,
            ),
        };
        match (wanted, other) {
            (true, _) => Ok(match expected {
                IdentifierSpace::Content => Identifier::Content(content),
                IdentifierSpace::Pointer => Identifier::Pointer(pointer),
            }),
            (false, true) => Err(ReachError::WrongSpace {
                key: key.to_string(),
                id: value.to_string(),
                expected,
                found: match expected {
                    IdentifierSpace::Content => IdentifierSpace::Pointer,
                    IdentifierSpace::Pointer => IdentifierSpace::Content,
                },
            }),
            (false, false) => Err(ReachError::DanglingReference {
                key: key.to_string(),
                id: value.to_string(),
            }),
        }
    }
}

/// Everything in the store, classified without following references.
/// Content counts as JSON when its bytes parse as JSON.
fn enumerate(store: &dyn DataStore) -> ReachResult<Reachability> {
    let mut out = Reachability::default();
    for p in store.pointers().find("")? {
        out.record(Identifier::Pointer(p), Classification::Pointer);
    }
    for c in store.content().find("")? {
        let class = if parse_json(&store.content().get(&c)?).is_some() {
            Classification::JsonContent
        } else {
            Classification::Content
        };
        out.record(Identifier::Content(c), class);
    }
    Ok(out)
}

/// Find all identifiers reachable from `roots`.
///
/// Roots may be partial identifiers. A pointer root is followed to its
/// target, which is read as JSON if it parses; so is a content root. With
/// no roots, every entry of the store is listed instead.
pub fn findall(store: &dyn DataStore, roots: &[&str]) -> ReachResult<Reachability> {
    if roots.is_empty() {
        return enumerate(store);
    }
    let mut walker = Walker::new(store);
    for root in roots {
        let id = store.resolve(root)?;
        let key = match id.space() {
            IdentifierSpace::Pointer => ROOT_POINTER_KEY,
            IdentifierSpace::Content => ROOT_CONTENT_KEY,
        };
        walker.enqueue(id, key);
    }
    let out = walker.run()?;
    debug!(roots = roots.len(), reached = out.len(), "findall");
    Ok(out)
}

/// Like [`findall`], but store the result as canonical JSON and return its
/// id.
pub fn findall_stored(store: &dyn DataStore, roots: &[&str]) -> ReachResult<ContentId> {
    let reach = findall(store, roots)?;
    Ok(put_json(store.content(), &reach.to_json())?)
}
