use gentle_store::{parse_json, put_json, DataStore, StoreError};
use gentle_types::{ContentId, PointerId, Timestamp};
use serde_json::Value;
use tracing::debug;

use crate::error::VersionResult;
use crate::record::VersionRecord;

/// What a new version carries.
#[derive(Clone, Debug, PartialEq)]
pub enum VersionPayload {
    /// Existing content, by id.
    Content(ContentId),
    /// A JSON document, stored canonically before the version is built.
    Json(Value),
}

impl From<ContentId> for VersionPayload {
    fn from(id: ContentId) -> Self {
        Self::Content(id)
    }
}

impl From<Value> for VersionPayload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Store the empty version (and the empty blob it names) and return its id.
///
/// Deterministic: every store yields the same id.
pub fn empty_version(store: &dyn DataStore) -> VersionResult<ContentId> {
    store.content().put(b"")?;
    Ok(put_json(store.content(), &VersionRecord::empty().to_json())?)
}

/// Build a version record for `payload` on top of `predecessor`.
///
/// The payload must exist; it is tagged as JSON when its bytes parse as
/// JSON. Without a predecessor the new version follows the empty version.
/// Without a timestamp the current local time is used. The record is
/// returned, not stored; see [`store_version`].
pub fn make_version(
    store: &dyn DataStore,
    predecessor: Option<ContentId>,
    payload: ContentId,
    timestamp: Option<Timestamp>,
) -> VersionResult<VersionRecord> {
    let bytes = store.content().get(&payload)?;
    let predecessor = match predecessor {
        Some(prev) => {
            if !store.content().contains(&prev)? {
                return Err(StoreError::content_not_found(&prev).into());
            }
            prev
        }
        None => empty_version(store)?,
    };
    Ok(VersionRecord {
        payload,
        payload_is_json: parse_json(&bytes).is_some(),
        predecessor: Some(predecessor),
        timestamp: Some(timestamp.unwrap_or_else(Timestamp::now)),
    })
}

/// Store `record` canonically and return its id.
pub fn store_version(store: &dyn DataStore, record: &VersionRecord) -> VersionResult<ContentId> {
    Ok(put_json(store.content(), &record.to_json())?)
}

fn payload_id(store: &dyn DataStore, payload: VersionPayload) -> VersionResult<ContentId> {
    match payload {
        VersionPayload::Content(id) => Ok(id),
        VersionPayload::Json(value) => Ok(put_json(store.content(), &value)?),
    }
}

/// The pointer's current target, or `None` if the pointer does not exist.
fn current_target(store: &dyn DataStore, pointer: &PointerId) -> VersionResult<Option<ContentId>> {
    match store.get_pointer(pointer) {
        Ok(id) => Ok(Some(id)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Append a version to the chain behind `pointer` and move the pointer to
/// it.
///
/// The pointer's current target becomes the predecessor; a pointer that does
/// not exist yet starts from the empty version and is created.
///
/// Not atomic: two concurrent calls on the same pointer may both read the
/// same predecessor, and the later pointer update wins. Use
/// [`put_version_checked`] to detect that instead.
pub fn put_version(
    store: &dyn DataStore,
    pointer: &PointerId,
    payload: impl Into<VersionPayload>,
) -> VersionResult<ContentId> {
    let payload = payload_id(store, payload.into())?;
    let predecessor = current_target(store, pointer)?;
    let record = make_version(store, predecessor, payload, None)?;
    let id = store_version(store, &record)?;
    store.set_pointer(pointer, &id)?;
    debug!(pointer = %pointer.short_hex(), version = %id.short_hex(), "put version");
    Ok(id)
}

/// Like [`put_version`], but the pointer is only moved if it still names the
/// predecessor that was read. Fails with [`StoreError::Conflict`] otherwise.
pub fn put_version_checked(
    store: &dyn DataStore,
    pointer: &PointerId,
    payload: impl Into<VersionPayload>,
) -> VersionResult<ContentId> {
    let payload = payload_id(store, payload.into())?;
    let predecessor = current_target(store, pointer)?;
    let record = make_version(store, predecessor, payload, None)?;
    let id = store_version(store, &record)?;
    store.set_pointer_checked(pointer, predecessor.as_ref(), &id)?;
    debug!(pointer = %pointer.short_hex(), version = %id.short_hex(), "put version (checked)");
    Ok(id)
}
