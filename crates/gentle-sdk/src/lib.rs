//! High-level SDK for Gentle.
//!
//! [`Gentle`] opens a store described by a [`GentleConfig`] and exposes the
//! whole API over it: content, pointers, JSON documents, version chains,
//! reachability and transfer between stores.
//!
//! ```no_run
//! use gentle_sdk::{Gentle, GentleConfig};
//!
//! let g = Gentle::open(GentleConfig::fs("/var/lib/gentle").journaled(true))?;
//! let id = g.put(b"hello")?;
//! let p = g.new_pointer(&id.to_hex())?;
//! g.put_version(&p.to_hex(), id)?;
//! # Ok::<(), gentle_sdk::SdkError>(())
//! ```

pub mod config;
pub mod error;
pub mod gentle;
pub mod registry;

pub use config::GentleConfig;
pub use error::{SdkError, SdkResult};
pub use gentle::Gentle;
pub use registry::{BackendConstructor, BackendRegistry};

// Re-export key types
pub use gentle_reach::{Classification, Reachability, TransferReport};
pub use gentle_store::DataStore;
pub use gentle_types::{ContentId, Identifier, IdentifierSpace, PointerId, Timestamp};
pub use gentle_version::{AncestryMismatch, History, VersionPayload, VersionRecord};
