use gentle_types::{ContentId, Timestamp};
use serde_json::{Map, Value};

/// Key of a raw payload.
pub const PAYLOAD_KEY: &str = "content:content";

/// Key of a payload that is itself a JSON document.
pub const JSON_PAYLOAD_KEY: &str = "content:json:content";

/// Key of the predecessor version.
pub const PREDECESSOR_KEY: &str = "prev_version:metadata:content";

/// Key of the creation time, in [`Timestamp`] text form.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// One link of a version chain.
///
/// Serialized as a JSON object:
///
/// ```text
/// {
///   "content:content" | "content:json:content": "<payload id>",
///   "prev_version:metadata:content": "<predecessor id>",
///   "timestamp": "YYYY-MM-DD HH:MM:SS ±HHMM"
/// }
/// ```
///
/// The empty version is `{"content:content": <id of the empty blob>}`: no
/// predecessor and no timestamp. It is the root of every chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRecord {
    pub payload: ContentId,
    /// The payload parses as JSON.
    pub payload_is_json: bool,
    /// `None` only for the empty version.
    pub predecessor: Option<ContentId>,
    pub timestamp: Option<Timestamp>,
}

impl VersionRecord {
    /// The canonical empty version.
    pub fn empty() -> Self {
        Self {
            payload: ContentId::digest(b""),
            payload_is_json: false,
            predecessor: None,
            timestamp: None,
        }
    }

    pub fn is_empty_version(&self) -> bool {
        *self == Self::empty()
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        let payload_key = if self.payload_is_json {
            JSON_PAYLOAD_KEY
        } else {
            PAYLOAD_KEY
        };
        map.insert(payload_key.into(), Value::String(self.payload.to_hex()));
        if let Some(prev) = &self.predecessor {
            map.insert(PREDECESSOR_KEY.into(), Value::String(prev.to_hex()));
        }
        if let Some(ts) = &self.timestamp {
            map.insert(TIMESTAMP_KEY.into(), Value::String(ts.format()));
        }
        Value::Object(map)
    }

    /// Read a record back from JSON.
    ///
    /// Exactly one payload key must be present; other keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let map = value.as_object().ok_or("not a JSON object")?;
        let id_field = |key: &str| -> Result<Option<ContentId>, String> {
            match map.get(key) {
                None => Ok(None),
                Some(Value::String(s)) => ContentId::from_hex(s)
                    .map(Some)
                    .map_err(|e| format!("{key}: {e}")),
                Some(_) => Err(format!("{key} is not a string")),
            }
        };

        let (payload, payload_is_json) = match (id_field(PAYLOAD_KEY)?, id_field(JSON_PAYLOAD_KEY)?) {
            (Some(id), None) => (id, false),
            (None, Some(id)) => (id, true),
            (Some(_), Some(_)) => return Err("both payload keys present".into()),
            (None, None) => return Err("no payload key".into()),
        };
        let timestamp = match map.get(TIMESTAMP_KEY) {
            None => None,
            Some(Value::String(s)) => Some(Timestamp::parse(s).map_err(|e| e.to_string())?),
            Some(_) => return Err(format!("{TIMESTAMP_KEY} is not a string")),
        };
        Ok(Self {
            payload,
            payload_is_json,
            predecessor: id_field(PREDECESSOR_KEY)?,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_version_encoding() {
        assert_eq!(
            VersionRecord::empty().to_json(),
            json!({
                "content:content":
                    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
            })
        );
    }

    #[test]
    fn json_roundtrip_with_all_fields() {
        let record = VersionRecord {
            payload: ContentId::digest(b"{}"),
            payload_is_json: true,
            predecessor: Some(ContentId::digest(b"prev")),
            timestamp: Some(Timestamp::parse("2011-03-01 13:00:00 +0100").unwrap()),
        };
        let value = record.to_json();
        assert!(value.get(JSON_PAYLOAD_KEY).is_some());
        assert_eq!(value[TIMESTAMP_KEY], "2011-03-01 13:00:00 +0100");
        assert_eq!(VersionRecord::from_json(&value).unwrap(), record);
    }

    #[test]
    fn from_json_rejects_non_versions() {
        let id = ContentId::digest(b"x").to_hex();
        for value in [
            json!("string"),
            json!({}),
            json!({"title": id}),
            json!({PAYLOAD_KEY: id, JSON_PAYLOAD_KEY: id}),
            json!({PAYLOAD_KEY: "short"}),
            json!({PAYLOAD_KEY: id, PREDECESSOR_KEY: 7}),
            json!({PAYLOAD_KEY: id, TIMESTAMP_KEY: "yesterday"}),
        ] {
            assert!(VersionRecord::from_json(&value).is_err(), "accepted {value}");
        }
    }

    #[test]
    fn extra_keys_are_ignored() {
        let id = ContentId::digest(b"x");
        let value = json!({PAYLOAD_KEY: id.to_hex(), "note": "hi"});
        let record = VersionRecord::from_json(&value).unwrap();
        assert_eq!(record.payload, id);
        assert!(record.predecessor.is_none());
    }
}
