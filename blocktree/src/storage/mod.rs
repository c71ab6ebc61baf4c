//! # Byte Stores
//!
//! The storage collaborator: a content-addressed map from hash to raw block
//! bytes. This is the only persisted structure in the system; every index
//! the layers use is a rebuildable cache over it.
//!
//! Stores hash on write with the provider they are constructed with, so
//! `write_bytes` returns the content address and the "hash = digest of the
//! stored bytes" invariant cannot drift between store and layers.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: insertion-ordered, for tests and ephemeral runs.
//! - [`SledStore`]: embedded on-disk store for real data.
//!
//! Scans (`find_in_storage` / `map_in_storage`) take plain closures over
//! raw bytes. They exist because chain successors and child sets are not
//! indexed; the layers scan, then cache what they learned.

pub mod memory;
pub mod sled;

pub use self::sled::SledStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::hash::BlockHash;

/// Predicate over raw stored bytes.
pub type StorePredicate<'a> = &'a (dyn Fn(&[u8]) -> bool + Send + Sync);

/// Filter-map over raw stored bytes; `None` skips the entry.
pub type StoreMapFn<'a> = &'a (dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync);

/// A content-addressed byte store.
///
/// Implementations must be safe for concurrent readers. Writers racing on
/// the same chain tip are serialized above this trait (the head-uniqueness
/// check lives in the chain layer), so a store only needs atomic
/// single-key insertion.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Persist `bytes` under their content hash and return that hash.
    /// Writing identical bytes twice is a no-op returning the same hash.
    async fn write_bytes(&self, bytes: Vec<u8>) -> Result<BlockHash>;

    /// Read the bytes stored under `hash`, if any.
    async fn read_bytes(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>>;

    /// Return the first stored value matching `predicate`, if any.
    async fn find_in_storage(&self, predicate: StorePredicate<'_>) -> Result<Option<Vec<u8>>>;

    /// Apply `map` to every stored value, collecting the `Some` results.
    async fn map_in_storage(&self, map: StoreMapFn<'_>) -> Result<Vec<Vec<u8>>>;

    /// All stored hashes, optionally restricted to those whose bytes start
    /// with `prefix`. Order is implementation-defined.
    async fn list_keys(&self, prefix: Option<&[u8]>) -> Result<Vec<BlockHash>>;

    /// Number of stored entries.
    async fn count(&self) -> Result<u64>;
}
