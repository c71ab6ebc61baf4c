//! # Error Taxonomy
//!
//! A single flat error type for the whole stack. Every failure carries the
//! layer it originated in plus a machine-readable reason code, so callers
//! (and the CLI's exit-code mapping) can dispatch on *what went wrong*
//! without string matching.
//!
//! Two kinds of "failure" deliberately do NOT appear here:
//!
//! - Validation walks (`validate_blockchain`, `validate_blocktree`) report
//!   their findings in a returned [`crate::chain::ValidationReport`]. A
//!   broken chain is an answer, not an exception.
//! - Cache misses and cache write failures. The cache is a hint; it is
//!   never allowed to fail an operation.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::hash::BlockHash;

/// Which layer of the stack produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// L1: content-addressed chains.
    Blockchain,
    /// L2: the parent/child tree overlay.
    Blocktree,
    /// L3: typed, signature-authenticated blocks.
    SecureBlocktree,
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::Blockchain => write!(f, "blockchain"),
            Layer::Blocktree => write!(f, "blocktree"),
            Layer::SecureBlocktree => write!(f, "secure-blocktree"),
        }
    }
}

/// Reason codes for byte-level encode/decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SerializationReason {
    /// A hash argument had the wrong length.
    #[error("invalid block hash")]
    InvalidBlockHash,
    /// A hash field on the wire was malformed.
    #[error("invalid hash field")]
    InvalidHash,
    /// An integer did not fit its fixed-width encoding, or a read ran past
    /// the end of the buffer.
    #[error("argument out of bounds")]
    ArgumentOutOfBounds,
    /// An unknown layer tag was encountered.
    #[error("invalid layer tag")]
    InvalidLayer,
    /// An unknown block-type or action tag was encountered.
    #[error("invalid block type tag")]
    InvalidBlockType,
}

/// Reason codes for structural block violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidBlockReason {
    /// The referenced block does not exist (or the reference was null where
    /// a real block is required).
    #[error("block is null or missing")]
    IsNull,
    /// A block's timestamp went backwards relative to its predecessor.
    #[error("timestamp precedes previous block")]
    InvalidTimestamp,
    /// The previous block already has a successor; chains never fork.
    #[error("next block already exists")]
    NextBlockExists,
    /// A parent reference does not resolve to a stored block.
    #[error("parent block does not exist")]
    InvalidParentBlock,
    /// The parent's block type does not admit this child type.
    #[error("invalid parent type for this block type")]
    InvalidParentType,
}

/// Reason codes for signature failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidSignatureReason {
    /// The signature does not verify against the declared public key.
    #[error("signature does not match")]
    DoesNotMatch,
    /// No ancestor key set covers the signing key.
    #[error("signing key is not authorized")]
    Unauthorized,
    /// The block carries no usable signature record.
    #[error("signature not found")]
    NotFound,
}

/// Reason codes for key-set failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidKeyReason {
    /// The key is absent from the relevant key set.
    #[error("key not found")]
    NotFound,
    /// The key exists but its validity window has closed.
    #[error("key expired")]
    Expired,
    /// The key exists but has already been revoked.
    #[error("key revoked")]
    Revoked,
}

/// The error type for every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum BlocktreeError {
    /// Byte-level encode/decode failure.
    #[error("serialization error in {layer}: {reason}")]
    Serialization {
        layer: Layer,
        reason: SerializationReason,
    },

    /// Structural violation of the block model.
    #[error("invalid block in {layer}: {reason}")]
    InvalidBlock {
        layer: Layer,
        reason: InvalidBlockReason,
        /// The offending block, when one can be named.
        block: Option<BlockHash>,
    },

    /// Signature verification or authorization failure.
    #[error("invalid signature in {layer}: {reason}")]
    InvalidSignature {
        layer: Layer,
        reason: InvalidSignatureReason,
    },

    /// Key-set lookup failure.
    #[error("invalid key in {layer}: {reason}")]
    InvalidKey {
        layer: Layer,
        reason: InvalidKeyReason,
    },

    /// Root installation attempted on a store that already holds blocks.
    #[error("root installation requires an empty store ({count} blocks present)")]
    InvalidRoot { count: u64 },

    /// A storage collaborator failed. Carried as a string so the store
    /// implementation (sled, memory, anything else) stays swappable.
    #[error("storage error: {0}")]
    Storage(String),

    /// A cryptographic primitive failed; surfaced unchanged.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl BlocktreeError {
    /// Shorthand for a serialization error.
    pub fn serialization(layer: Layer, reason: SerializationReason) -> Self {
        BlocktreeError::Serialization { layer, reason }
    }

    /// Shorthand for an invalid-block error with no named block.
    pub fn invalid_block(layer: Layer, reason: InvalidBlockReason) -> Self {
        BlocktreeError::InvalidBlock {
            layer,
            reason,
            block: None,
        }
    }

    /// Shorthand for an invalid-block error naming the offending block.
    pub fn invalid_block_at(layer: Layer, reason: InvalidBlockReason, block: BlockHash) -> Self {
        BlocktreeError::InvalidBlock {
            layer,
            reason,
            block: Some(block),
        }
    }

    /// Shorthand for a signature error.
    pub fn invalid_signature(layer: Layer, reason: InvalidSignatureReason) -> Self {
        BlocktreeError::InvalidSignature { layer, reason }
    }

    /// Shorthand for a key error.
    pub fn invalid_key(layer: Layer, reason: InvalidKeyReason) -> Self {
        BlocktreeError::InvalidKey { layer, reason }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BlocktreeError>;
