//! Error types for version chains.

use gentle_store::StoreError;
use gentle_types::ContentId;

/// Errors that can occur while building or reading version chains.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    /// Underlying content or pointer store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The content is not a version record.
    #[error("{id} is not a version record: {reason}")]
    NotAVersion { id: ContentId, reason: String },
}

/// Convenience alias for version results.
pub type VersionResult<T> = Result<T, VersionError>;
