//! # Block Cache
//!
//! A read-through index keyed by `(block, slot)`. Every entry is a pure
//! function of the immutable byte store, which buys a very forgiving
//! contract:
//!
//! - A miss is never an error; the layer recomputes and (usually) writes
//!   the answer back.
//! - Cache writes are best-effort. A crash between a store write and the
//!   matching cache update is benign; the next read rebuilds.
//! - The trait is infallible by design. An implementation that hits
//!   trouble should swallow it and behave like a miss.
//!
//! One sharp edge: [`BlockCache::push`] appends to a list slot only when
//! the slot already exists. Fabricating a one-element list for a block
//! whose full child set was never scanned would make a later reader
//! mistake a fragment for the whole answer.

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;

use crate::hash::BlockHash;

/// Which derived fact a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    /// The unique successor of a block within its chain.
    Next,
    /// The chain root reachable from a block.
    RootBlock,
    /// The chain tip, stored on the chain root.
    HeadBlock,
    /// The chain-root children of a block, stored on the parent.
    ChildBlocks,
}

impl fmt::Display for CacheSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheSlot::Next => write!(f, "next"),
            CacheSlot::RootBlock => write!(f, "rootBlock"),
            CacheSlot::HeadBlock => write!(f, "headBlock"),
            CacheSlot::ChildBlocks => write!(f, "childBlocks"),
        }
    }
}

/// A cached value: a single hash or an ordered hash list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Hash(BlockHash),
    HashList(Vec<BlockHash>),
}

impl CacheValue {
    /// The single hash, if this entry holds one.
    pub fn as_hash(&self) -> Option<BlockHash> {
        match self {
            CacheValue::Hash(h) => Some(*h),
            CacheValue::HashList(_) => None,
        }
    }

    /// The hash list, if this entry holds one.
    pub fn as_list(&self) -> Option<&[BlockHash]> {
        match self {
            CacheValue::Hash(_) => None,
            CacheValue::HashList(list) => Some(list),
        }
    }
}

/// The cache collaborator consumed by the layers.
#[async_trait]
pub trait BlockCache: Send + Sync {
    /// Look up `(block, slot)`. `None` is a miss.
    async fn read(&self, block: &BlockHash, slot: CacheSlot) -> Option<CacheValue>;

    /// Store `value` under `(block, slot)`, replacing any prior entry.
    async fn write(&self, block: &BlockHash, slot: CacheSlot, value: CacheValue);

    /// Append `value` to the list under `(block, slot)` when, and only
    /// when, that slot already holds a list.
    async fn push(&self, block: &BlockHash, slot: CacheSlot, value: BlockHash);
}

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

/// Concurrent in-memory cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<(BlockHash, CacheSlot), CacheValue>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache::default()
    }

    /// Number of populated entries. Test hook.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl BlockCache for MemoryCache {
    async fn read(&self, block: &BlockHash, slot: CacheSlot) -> Option<CacheValue> {
        self.entries.get(&(*block, slot)).map(|v| v.clone())
    }

    async fn write(&self, block: &BlockHash, slot: CacheSlot, value: CacheValue) {
        self.entries.insert((*block, slot), value);
    }

    async fn push(&self, block: &BlockHash, slot: CacheSlot, value: BlockHash) {
        if let Some(mut entry) = self.entries.get_mut(&(*block, slot)) {
            if let CacheValue::HashList(list) = entry.value_mut() {
                if !list.contains(&value) {
                    list.push(value);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NullCache
// ---------------------------------------------------------------------------

/// A cache that never remembers anything.
///
/// Exists to demonstrate (and test) that the layers treat the cache purely
/// as a hint: every operation must produce correct answers against this.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

#[async_trait]
impl BlockCache for NullCache {
    async fn read(&self, _block: &BlockHash, _slot: CacheSlot) -> Option<CacheValue> {
        None
    }

    async fn write(&self, _block: &BlockHash, _slot: CacheSlot, _value: CacheValue) {}

    async fn push(&self, _block: &BlockHash, _slot: CacheSlot, _value: BlockHash) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> BlockHash {
        BlockHash::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn read_write_roundtrip() {
        let cache = MemoryCache::new();
        assert_eq!(cache.read(&h(1), CacheSlot::Next).await, None);

        cache
            .write(&h(1), CacheSlot::Next, CacheValue::Hash(h(2)))
            .await;
        assert_eq!(
            cache.read(&h(1), CacheSlot::Next).await,
            Some(CacheValue::Hash(h(2)))
        );
    }

    #[tokio::test]
    async fn slots_are_independent() {
        let cache = MemoryCache::new();
        cache
            .write(&h(1), CacheSlot::Next, CacheValue::Hash(h(2)))
            .await;
        assert_eq!(cache.read(&h(1), CacheSlot::HeadBlock).await, None);
        assert_eq!(cache.read(&h(2), CacheSlot::Next).await, None);
    }

    #[tokio::test]
    async fn push_appends_only_to_existing_lists() {
        let cache = MemoryCache::new();

        // No list yet: push must not fabricate one.
        cache.push(&h(1), CacheSlot::ChildBlocks, h(2)).await;
        assert_eq!(cache.read(&h(1), CacheSlot::ChildBlocks).await, None);

        cache
            .write(&h(1), CacheSlot::ChildBlocks, CacheValue::HashList(vec![h(2)]))
            .await;
        cache.push(&h(1), CacheSlot::ChildBlocks, h(3)).await;

        let entry = cache.read(&h(1), CacheSlot::ChildBlocks).await.unwrap();
        assert_eq!(entry.as_list().unwrap(), &[h(2), h(3)]);
    }

    #[tokio::test]
    async fn push_deduplicates() {
        let cache = MemoryCache::new();
        cache
            .write(&h(1), CacheSlot::ChildBlocks, CacheValue::HashList(vec![h(2)]))
            .await;
        cache.push(&h(1), CacheSlot::ChildBlocks, h(2)).await;

        let entry = cache.read(&h(1), CacheSlot::ChildBlocks).await.unwrap();
        assert_eq!(entry.as_list().unwrap(), &[h(2)]);
    }

    #[tokio::test]
    async fn null_cache_never_remembers() {
        let cache = NullCache;
        cache
            .write(&h(1), CacheSlot::Next, CacheValue::Hash(h(2)))
            .await;
        assert_eq!(cache.read(&h(1), CacheSlot::Next).await, None);
    }

    #[test]
    fn cache_value_accessors() {
        let hash_value = CacheValue::Hash(h(1));
        assert_eq!(hash_value.as_hash(), Some(h(1)));
        assert!(hash_value.as_list().is_none());

        let list_value = CacheValue::HashList(vec![h(1), h(2)]);
        assert!(list_value.as_hash().is_none());
        assert_eq!(list_value.as_list().unwrap().len(), 2);
    }
}
