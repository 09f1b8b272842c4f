//! Foundation types for Gentle.
//!
//! Gentle is a content-addressable object store with mutable named pointers
//! layered on top. Every other Gentle crate depends on `gentle-types`.
//!
//! # Key Types
//!
//! - [`ContentId`] -- SHA-256 identifier of an immutable blob
//! - [`PointerId`] -- random identifier of a mutable pointer
//! - [`Identifier`] -- either of the two, tagged with its [`IdentifierSpace`]
//! - [`Timestamp`] -- local time with explicit UTC offset, `YYYY-MM-DD HH:MM:SS ±HHMM`
//!
//! Identifiers are 64 lowercase hex digits. Any shorter lowercase hex string
//! is a valid *partial* identifier, used only for lookups.

pub mod error;
pub mod identifier;
pub mod temporal;

pub use error::TypeError;
pub use identifier::{
    is_valid, validate, validate_partial, ContentId, Identifier, IdentifierSpace, PointerId,
    IDENTIFIER_DIGITS, IDENTIFIER_LENGTH,
};
pub use temporal::Timestamp;
