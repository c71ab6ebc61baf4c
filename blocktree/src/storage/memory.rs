//! In-memory byte store.
//!
//! Insertion-ordered so that scan-based answers (child sets, successor
//! lookups) come back in write order, which keeps tests deterministic.
//! Not persistent, obviously.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{BlockStore, StoreMapFn, StorePredicate};
use crate::crypto::CryptoProvider;
use crate::error::Result;
use crate::hash::BlockHash;

#[derive(Default)]
struct Inner {
    /// Hashes in insertion order.
    order: Vec<BlockHash>,
    /// Hash -> stored bytes.
    entries: HashMap<BlockHash, Vec<u8>>,
}

/// A hash-keyed map held entirely in memory.
pub struct MemoryStore {
    hasher: Arc<dyn CryptoProvider>,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Empty store hashing with `hasher`.
    pub fn new(hasher: Arc<dyn CryptoProvider>) -> Self {
        MemoryStore {
            hasher,
            inner: RwLock::new(Inner::default()),
        }
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn write_bytes(&self, bytes: Vec<u8>) -> Result<BlockHash> {
        let hash = self.hasher.hash(&bytes);
        let mut inner = self.inner.write();
        if !inner.entries.contains_key(&hash) {
            inner.order.push(hash);
            inner.entries.insert(hash, bytes);
        }
        Ok(hash)
    }

    async fn read_bytes(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().entries.get(hash).cloned())
    }

    async fn find_in_storage(&self, predicate: StorePredicate<'_>) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read();
        for hash in &inner.order {
            let bytes = &inner.entries[hash];
            if predicate(bytes) {
                return Ok(Some(bytes.clone()));
            }
        }
        Ok(None)
    }

    async fn map_in_storage(&self, map: StoreMapFn<'_>) -> Result<Vec<Vec<u8>>> {
        let inner = self.inner.read();
        Ok(inner
            .order
            .iter()
            .filter_map(|hash| map(&inner.entries[hash]))
            .collect())
    }

    async fn list_keys(&self, prefix: Option<&[u8]>) -> Result<Vec<BlockHash>> {
        let inner = self.inner.read();
        Ok(inner
            .order
            .iter()
            .filter(|hash| prefix.map_or(true, |p| hash.starts_with(p)))
            .copied()
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.inner.read().entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::StandardCrypto;

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(StandardCrypto::new()))
    }

    #[tokio::test]
    async fn write_read_roundtrip() {
        let store = store();
        let hash = store.write_bytes(b"some block".to_vec()).await.unwrap();
        assert_eq!(
            store.read_bytes(&hash).await.unwrap(),
            Some(b"some block".to_vec())
        );
    }

    #[tokio::test]
    async fn hash_is_content_address() {
        let store = store();
        let crypto = StandardCrypto::new();
        let hash = store.write_bytes(b"bytes".to_vec()).await.unwrap();
        assert_eq!(hash, crypto.hash(b"bytes"));
    }

    #[tokio::test]
    async fn duplicate_write_is_idempotent() {
        let store = store();
        let h1 = store.write_bytes(b"dup".to_vec()).await.unwrap();
        let h2 = store.write_bytes(b"dup".to_vec()).await.unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_hash_reads_none() {
        let store = store();
        let absent = BlockHash::from_bytes([9u8; 32]);
        assert_eq!(store.read_bytes(&absent).await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_returns_first_match_in_write_order() {
        let store = store();
        store.write_bytes(b"aa-one".to_vec()).await.unwrap();
        store.write_bytes(b"bb".to_vec()).await.unwrap();
        store.write_bytes(b"aa-two".to_vec()).await.unwrap();

        let found = store
            .find_in_storage(&|bytes| bytes.starts_with(b"aa"))
            .await
            .unwrap();
        assert_eq!(found, Some(b"aa-one".to_vec()));
    }

    #[tokio::test]
    async fn map_preserves_insertion_order() {
        let store = store();
        for payload in [b"1".to_vec(), b"2".to_vec(), b"3".to_vec()] {
            store.write_bytes(payload).await.unwrap();
        }
        let all = store
            .map_in_storage(&|bytes| Some(bytes.to_vec()))
            .await
            .unwrap();
        assert_eq!(all, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[tokio::test]
    async fn list_keys_honors_prefix() {
        let store = store();
        let h1 = store.write_bytes(b"alpha".to_vec()).await.unwrap();
        let h2 = store.write_bytes(b"beta".to_vec()).await.unwrap();

        let all = store.list_keys(None).await.unwrap();
        assert_eq!(all, vec![h1, h2]);

        let prefixed = store.list_keys(Some(&h2.as_bytes()[..4])).await.unwrap();
        assert_eq!(prefixed, vec![h2]);
    }
}
