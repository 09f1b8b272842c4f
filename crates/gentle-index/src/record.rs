use gentle_store::{StoreError, StoreResult};
use gentle_types::ContentId;

/// Snapshot record magic bytes.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"GSNP";

/// Current snapshot record format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Encoded size: magic, version, timestamp, presence flag, previous id,
/// root id, CRC32.
pub const SNAPSHOT_RECORD_LEN: usize = 4 + 1 + 8 + 1 + 32 + 32 + 4;

/// A point-in-time root of the index, chained to its predecessor.
///
/// On-disk format (big-endian):
/// ```text
/// [4 bytes: "GSNP"] [1 byte: version]
/// [8 bytes: timestamp, i64 seconds since the epoch]
/// [1 byte: 1 if a previous snapshot exists, else 0] [32 bytes: previous id or zeros]
/// [32 bytes: root node id]
/// [4 bytes: CRC32 of everything before it]
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub timestamp: i64,
    pub previous: Option<ContentId>,
    pub root: ContentId,
}

impl SnapshotRecord {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SNAPSHOT_RECORD_LEN);
        buf.extend_from_slice(SNAPSHOT_MAGIC);
        buf.push(SNAPSHOT_VERSION);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        match &self.previous {
            Some(prev) => {
                buf.push(1);
                buf.extend_from_slice(prev.as_bytes());
            }
            None => {
                buf.push(0);
                buf.extend_from_slice(&[0u8; 32]);
            }
        }
        buf.extend_from_slice(self.root.as_bytes());
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Decode the record stored under `id`, verifying magic, version,
    /// length and checksum.
    pub fn decode(id: &ContentId, bytes: &[u8]) -> StoreResult<Self> {
        let corrupt = |reason: String| StoreError::CorruptObject {
            id: id.to_hex(),
            reason,
        };
        if bytes.len() != SNAPSHOT_RECORD_LEN {
            return Err(corrupt(format!(
                "snapshot record is {} bytes, expected {SNAPSHOT_RECORD_LEN}",
                bytes.len()
            )));
        }
        if &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(corrupt("bad snapshot magic".into()));
        }
        if bytes[4] != SNAPSHOT_VERSION {
            return Err(corrupt(format!("unsupported snapshot version {}", bytes[4])));
        }
        let body = &bytes[..SNAPSHOT_RECORD_LEN - 4];
        let stored_crc = u32::from_be_bytes(array(&bytes[SNAPSHOT_RECORD_LEN - 4..]));
        if crc32fast::hash(body) != stored_crc {
            return Err(corrupt("snapshot checksum mismatch".into()));
        }

        let timestamp = i64::from_be_bytes(array(&bytes[5..13]));
        let previous = match bytes[13] {
            0 => None,
            1 => Some(ContentId::from_hash(array(&bytes[14..46]))),
            flag => return Err(corrupt(format!("bad previous-snapshot flag {flag}"))),
        };
        let root = ContentId::from_hash(array(&bytes[46..78]));
        Ok(Self {
            timestamp,
            previous,
            root,
        })
    }
}

fn array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    out
}
