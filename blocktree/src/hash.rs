//! # Block Hashes
//!
//! The 32-byte content hash that identifies every block. The all-zero value
//! doubles as the wire-format "no block here" sentinel, so [`BlockHash`]
//! exposes [`is_zero`](BlockHash::is_zero) and the rest of the crate
//! normalizes zero hashes to `None` at API boundaries.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::config::HASH_LENGTH;
use crate::error::{BlocktreeError, Layer, SerializationReason};

/// A content hash identifying one block.
///
/// Equality, ordering, and hashing are byte-wise. Display is lowercase hex,
/// which is also the parse format accepted by [`FromStr`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockHash([u8; HASH_LENGTH]);

impl BlockHash {
    /// The all-zero hash, used on the wire to mean "no block".
    pub const ZERO: BlockHash = BlockHash([0u8; HASH_LENGTH]);

    /// Wrap raw hash bytes.
    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        BlockHash(bytes)
    }

    /// Build a hash from a byte slice, rejecting wrong lengths.
    ///
    /// This is the choke point for externally supplied hashes (CLI
    /// arguments, wire fields): anything that is not exactly
    /// [`HASH_LENGTH`] bytes fails with
    /// `Serialization(InvalidBlockHash)`.
    pub fn from_slice(slice: &[u8]) -> crate::error::Result<Self> {
        let bytes: [u8; HASH_LENGTH] = slice.try_into().map_err(|_| {
            BlocktreeError::serialization(Layer::Blockchain, SerializationReason::InvalidBlockHash)
        })?;
        Ok(BlockHash(bytes))
    }

    /// Parse a lowercase or uppercase hex string.
    pub fn from_hex(s: &str) -> crate::error::Result<Self> {
        let bytes = hex::decode(s).map_err(|_| {
            BlocktreeError::serialization(Layer::Blockchain, SerializationReason::InvalidBlockHash)
        })?;
        Self::from_slice(&bytes)
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// True for the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// Normalize the zero sentinel to `None`.
    pub fn into_option(self) -> Option<BlockHash> {
        if self.is_zero() {
            None
        } else {
            Some(self)
        }
    }

    /// Lowercase hex representation (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// True when the hash bytes begin with `prefix`.
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex chars is plenty to tell blocks apart in logs.
        write!(f, "BlockHash({}..)", &self.to_hex()[..8])
    }
}

impl FromStr for BlockHash {
    type Err = BlocktreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let h = BlockHash::from_bytes([0xAB; HASH_LENGTH]);
        let parsed = BlockHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn zero_is_sentinel() {
        assert!(BlockHash::ZERO.is_zero());
        assert_eq!(BlockHash::ZERO.into_option(), None);
        let h = BlockHash::from_bytes([1u8; HASH_LENGTH]);
        assert_eq!(h.into_option(), Some(h));
    }

    #[test]
    fn wrong_length_rejected() {
        let err = BlockHash::from_slice(&[0u8; 16]).unwrap_err();
        match err {
            BlocktreeError::Serialization { reason, .. } => {
                assert_eq!(reason, SerializationReason::InvalidBlockHash);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_prefix_match() {
        let mut bytes = [0u8; HASH_LENGTH];
        bytes[0] = 0xDE;
        bytes[1] = 0xAD;
        let h = BlockHash::from_bytes(bytes);
        assert!(h.starts_with(&[0xDE]));
        assert!(h.starts_with(&[0xDE, 0xAD]));
        assert!(!h.starts_with(&[0xBE]));
    }

    #[test]
    fn display_is_lowercase_hex() {
        let h = BlockHash::from_bytes([0xFF; HASH_LENGTH]);
        assert_eq!(h.to_string(), "f".repeat(64));
    }
}
