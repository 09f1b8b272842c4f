use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier format: {value:?}: {reason}")]
    InvalidIdentifierFormat { value: String, reason: String },

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },
}

impl TypeError {
    pub(crate) fn identifier(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifierFormat {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
