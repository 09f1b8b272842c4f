use gentle_types::{ContentId, IdentifierSpace, PointerId, TypeError};

/// Errors from content and pointer store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No entry with this identifier exists in the expected space.
    #[error("not found: {0}")]
    NotFound(String),

    /// A partial identifier matched more than one entry.
    #[error("ambiguous identifier {prefix:?}: {matches} matches")]
    Ambiguous { prefix: String, matches: usize },

    /// Wrong length or alphabet.
    #[error(transparent)]
    InvalidIdentifierFormat(#[from] TypeError),

    /// A pointer was aimed at content that does not exist.
    #[error("pointer {pointer} cannot reference missing content {target}")]
    InvalidContentReference { pointer: PointerId, target: ContentId },

    /// An identifier resolved to the other space.
    #[error("expected a {expected} identifier, {id} is a {found}")]
    WrongSpace {
        id: String,
        expected: IdentifierSpace,
        found: IdentifierSpace,
    },

    /// A compare-and-set found a different current value.
    #[error("conflicting update of {id}: expected {expected}, found {found}")]
    Conflict {
        id: String,
        expected: String,
        found: String,
    },

    /// Stored bytes do not hash to their identifier.
    #[error("hash mismatch for {id}: computed {computed}")]
    HashMismatch { id: ContentId, computed: ContentId },

    /// The stored data is malformed or cannot be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn content_not_found(id: &ContentId) -> Self {
        Self::NotFound(format!("content {id}"))
    }

    pub fn pointer_not_found(id: &PointerId) -> Self {
        Self::NotFound(format!("pointer {id}"))
    }

    /// No identifier in either space matches `prefix`.
    pub fn unresolved(prefix: &str) -> Self {
        Self::NotFound(format!("identifier {prefix:?}"))
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Render an optional content id for [`StoreError::Conflict`].
pub fn describe_target(id: Option<&ContentId>) -> String {
    id.map_or_else(|| "nothing".to_string(), ContentId::to_hex)
}
