//! Error types for reachability and transfer.

use gentle_store::StoreError;
use gentle_types::IdentifierSpace;

/// Errors that can occur while following references.
#[derive(Debug, thiserror::Error)]
pub enum ReachError {
    /// Underlying content or pointer store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A reference value is not a full identifier.
    #[error("invalid reference under {key:?}: {value:?}")]
    InvalidReference {
        /// The key the value was found under.
        key: String,
        /// The offending value.
        value: String,
    },

    /// A reference names nothing in the store.
    #[error("dangling reference under {key:?}: {id}")]
    DanglingReference { key: String, id: String },

    /// A reference names an entry of the other space.
    #[error("reference under {key:?} expects {expected}, {id} is a {found}")]
    WrongSpace {
        key: String,
        id: String,
        expected: IdentifierSpace,
        found: IdentifierSpace,
    },
}

/// Convenience alias for reachability results.
pub type ReachResult<T> = Result<T, ReachError>;
