//! JSON documents stored as content.
//!
//! Documents are serialized canonically (compact, object keys sorted) so the
//! same logical value always hashes to the same [`ContentId`].

use gentle_types::ContentId;
use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ContentStore, DataStore};

/// Compact serialization with object keys in sorted order.
pub fn canonical_json(value: &Value) -> StoreResult<Vec<u8>> {
    // `serde_json::Map` is a BTreeMap, so keys already come out sorted.
    Ok(serde_json::to_vec(value)?)
}

/// Serialize `value` canonically and store it.
pub fn put_json<T: Serialize + ?Sized>(store: &dyn ContentStore, value: &T) -> StoreResult<ContentId> {
    let value = serde_json::to_value(value)?;
    store.put(&canonical_json(&value)?)
}

/// Load and parse a stored JSON document.
pub fn get_json(store: &dyn ContentStore, id: &ContentId) -> StoreResult<Value> {
    let bytes = store.get(id)?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptObject {
        id: id.to_hex(),
        reason: format!("not a JSON document: {e}"),
    })
}

/// Parse `bytes` as JSON, or `None` if they are not a JSON document.
pub fn parse_json(bytes: &[u8]) -> Option<Value> {
    serde_json::from_slice(bytes).ok()
}

/// Call `f` with the JSON document stored under `id`.
pub fn with_json_arg<T, E>(
    store: &dyn ContentStore,
    id: &ContentId,
    f: impl FnOnce(Value) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<StoreError>,
{
    let value = get_json(store, id)?;
    f(value)
}

/// Resolve a possibly partial identifier that must name content, then call
/// `f` with the full id.
pub fn with_content_arg<T, E>(
    store: &dyn DataStore,
    prefix: &str,
    f: impl FnOnce(ContentId) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<StoreError>,
{
    let id = store.resolve_content(prefix)?;
    f(id)
}
