use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] gentle_store::StoreError),

    #[error("version error: {0}")]
    Version(#[from] gentle_version::VersionError),

    #[error("reachability error: {0}")]
    Reach(#[from] gentle_reach::ReachError),
}

impl From<gentle_types::TypeError> for SdkError {
    fn from(e: gentle_types::TypeError) -> Self {
        Self::Store(e.into())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
