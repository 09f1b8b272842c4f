//! Reachability for Gentle.
//!
//! JSON documents refer to other entries through reference keys: a key
//! whose last `:`-separated segment is `content` or `pointer` holds the
//! identifier of a blob or a pointer. [`findall`] follows those references
//! from a set of roots and classifies everything it reaches; [`export`] and
//! [`import`] copy such a closure between two stores, identifiers intact.
//!
//! # Key Types
//!
//! - [`Reachability`] -- identifiers by [`Classification`]
//! - [`TransferReport`] -- counts of what a transfer copied

pub mod error;
pub mod findall;
pub mod transfer;

pub use error::{ReachError, ReachResult};
pub use findall::{findall, findall_stored, Classification, Reachability};
pub use transfer::{export, import, TransferReport};
