use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Number of hex digits in a full identifier (256 bits).
pub const IDENTIFIER_LENGTH: usize = 64;

/// The identifier alphabet, in radix order.
pub const IDENTIFIER_DIGITS: &str = "0123456789abcdef";

/// Returns `true` if `s` is a well-formed identifier.
///
/// With `partial == false` the string must be exactly
/// [`IDENTIFIER_LENGTH`] lowercase hex digits. With `partial == true` any
/// prefix of that, including the empty string, is accepted.
pub fn is_valid(s: &str, partial: bool) -> bool {
    let length_ok = if partial {
        s.len() <= IDENTIFIER_LENGTH
    } else {
        s.len() == IDENTIFIER_LENGTH
    };
    length_ok && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Validate a full identifier.
pub fn validate(s: &str) -> Result<(), TypeError> {
    if s.len() != IDENTIFIER_LENGTH {
        return Err(TypeError::identifier(
            s,
            format!("expected {IDENTIFIER_LENGTH} hex digits, got {}", s.len()),
        ));
    }
    validate_partial(s)
}

/// Validate a partial identifier (a lowercase hex prefix).
pub fn validate_partial(s: &str) -> Result<(), TypeError> {
    if s.len() > IDENTIFIER_LENGTH {
        return Err(TypeError::identifier(
            s,
            format!("longer than {IDENTIFIER_LENGTH} hex digits"),
        ));
    }
    if let Some(bad) = s.chars().find(|c| !IDENTIFIER_DIGITS.contains(*c)) {
        return Err(TypeError::identifier(
            s,
            format!("character {bad:?} is not a lowercase hex digit"),
        ));
    }
    Ok(())
}

fn decode_full(s: &str) -> Result<[u8; 32], TypeError> {
    validate(s)?;
    let mut out = [0u8; 32];
    hex::decode_to_slice(s, &mut out).map_err(|e| TypeError::identifier(s, e.to_string()))?;
    Ok(out)
}

fn nibble_of(bytes: &[u8; 32], depth: usize) -> usize {
    let byte = bytes[depth / 2];
    if depth % 2 == 0 {
        (byte >> 4) as usize
    } else {
        (byte & 0x0f) as usize
    }
}

/// Defines a 256-bit identifier newtype rendered as 64 lowercase hex digits.
macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Wrap a raw 256-bit value.
            pub const fn from_hash(hash: [u8; 32]) -> Self {
                Self(hash)
            }

            /// The raw 32 bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Full 64-digit lowercase hex form.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// First 8 hex digits, for log output.
            pub fn short_hex(&self) -> String {
                hex::encode(&self.0[..4])
            }

            /// Parse a full identifier. Partial identifiers are rejected.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                decode_full(s).map(Self)
            }

            /// The hex digit at position `depth` (0-based), as a radix index.
            ///
            /// # Panics
            ///
            /// Panics if `depth >= IDENTIFIER_LENGTH`.
            pub fn nibble(&self, depth: usize) -> usize {
                nibble_of(&self.0, depth)
            }

            /// Returns `true` if the hex form starts with `prefix`.
            pub fn starts_with(&self, prefix: &str) -> bool {
                self.to_hex().starts_with(prefix)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.short_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_identifier! {
    /// Content identifier: the SHA-256 hash of a blob.
    ///
    /// Identical bytes always produce the same `ContentId`, which doubles as
    /// the storage key of the blob.
    ContentId
}

hex_identifier! {
    /// Pointer identifier: a random 256-bit name for a mutable slot.
    PointerId
}

impl ContentId {
    /// Hash `data` with SHA-256.
    pub fn digest(data: &[u8]) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(data));
        Self(out)
    }

    /// Returns `true` if `data` hashes to this identifier.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::digest(data) == *self
    }
}

impl PointerId {
    /// Generate a fresh pointer identifier from the OS-seeded RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// The two disjoint identifier spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierSpace {
    Content,
    Pointer,
}

impl fmt::Display for IdentifierSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => f.write_str("content"),
            Self::Pointer => f.write_str("pointer"),
        }
    }
}

/// A full identifier together with the space it was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Content(ContentId),
    Pointer(PointerId),
}

impl Identifier {
    /// Which space this identifier belongs to.
    pub fn space(&self) -> IdentifierSpace {
        match self {
            Self::Content(_) => IdentifierSpace::Content,
            Self::Pointer(_) => IdentifierSpace::Pointer,
        }
    }

    /// Full hex form.
    pub fn to_hex(&self) -> String {
        match self {
            Self::Content(id) => id.to_hex(),
            Self::Pointer(id) => id.to_hex(),
        }
    }

    /// The content identifier, if this is one.
    pub fn as_content(&self) -> Option<ContentId> {
        match self {
            Self::Content(id) => Some(*id),
            Self::Pointer(_) => None,
        }
    }

    /// The pointer identifier, if this is one.
    pub fn as_pointer(&self) -> Option<PointerId> {
        match self {
            Self::Pointer(id) => Some(*id),
            Self::Content(_) => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<ContentId> for Identifier {
    fn from(id: ContentId) -> Self {
        Self::Content(id)
    }
}

impl From<PointerId> for Identifier {
    fn from(id: PointerId) -> Self {
        Self::Pointer(id)
    }
}
