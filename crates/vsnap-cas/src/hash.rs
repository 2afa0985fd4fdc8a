//! Content identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{compute_hash, hash_to_hex, hex_to_hash, Blake3Hash, CasError};

/// Lowercase hex BLAKE3 digest of a byte sequence.
///
/// Always 64 characters of `[0-9a-f]`; construction goes through
/// [`ContentHash::of`] or [`ContentHash::parse`], which enforce that.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash `data`.
    pub fn of(data: &[u8]) -> Self {
        Self::from_bytes(&compute_hash(data))
    }

    /// Wrap a raw 32-byte digest.
    pub fn from_bytes(hash: &Blake3Hash) -> Self {
        Self(hash_to_hex(hash))
    }

    /// Parse a hex digest. Uppercase input is normalized to lowercase.
    pub fn parse(hex: &str) -> Result<Self, CasError> {
        let lower = hex.to_ascii_lowercase();
        match hex_to_hash(&lower) {
            Some(_) => Ok(Self(lower)),
            None => Err(CasError::InvalidHash(hex.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }

    pub fn to_bytes(&self) -> Blake3Hash {
        // Invariant: self.0 is always valid hex of the right length.
        hex_to_hash(&self.0).unwrap_or([0u8; 32])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

impl FromStr for ContentHash {
    type Err = CasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = CasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}
