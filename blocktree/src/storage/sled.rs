//! sled-backed byte store.
//!
//! One named tree, keyed by content hash. sled gives lock-free concurrent
//! reads and atomic single-key writes, which is exactly the contract
//! [`BlockStore`] asks for. Every write is flushed; blocks are small and
//! durability beats write throughput for an append-only store.
//!
//! Scans iterate the whole tree in key (hash) order. That order is
//! arbitrary with a content hash as the key, which is fine: callers that
//! care about order get it from chain links, not from the store.

use async_trait::async_trait;
use sled::{Config, Db, Tree};
use std::path::Path;
use std::sync::Arc;

use super::{BlockStore, StoreMapFn, StorePredicate};
use crate::crypto::CryptoProvider;
use crate::error::{BlocktreeError, Result};
use crate::hash::BlockHash;

/// Name of the sled tree holding block bytes.
const BLOCKS_TREE: &str = "blocks";

/// Persistent byte store over a sled database.
pub struct SledStore {
    hasher: Arc<dyn CryptoProvider>,
    db: Db,
    blocks: Tree,
}

fn sled_err(err: sled::Error) -> BlocktreeError {
    BlocktreeError::Storage(err.to_string())
}

impl SledStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, hasher: Arc<dyn CryptoProvider>) -> Result<Self> {
        let db = sled::open(path).map_err(sled_err)?;
        Self::from_db(db, hasher)
    }

    /// Open a temporary store that evaporates on drop. For tests.
    pub fn open_temporary(hasher: Arc<dyn CryptoProvider>) -> Result<Self> {
        let db = Config::new().temporary(true).open().map_err(sled_err)?;
        Self::from_db(db, hasher)
    }

    fn from_db(db: Db, hasher: Arc<dyn CryptoProvider>) -> Result<Self> {
        let blocks = db.open_tree(BLOCKS_TREE).map_err(sled_err)?;
        Ok(SledStore { hasher, db, blocks })
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(sled_err)?;
        Ok(())
    }
}

#[async_trait]
impl BlockStore for SledStore {
    async fn write_bytes(&self, bytes: Vec<u8>) -> Result<BlockHash> {
        let hash = self.hasher.hash(&bytes);
        self.blocks
            .insert(hash.as_bytes(), bytes)
            .map_err(sled_err)?;
        self.db.flush().map_err(sled_err)?;
        Ok(hash)
    }

    async fn read_bytes(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>> {
        let value = self.blocks.get(hash.as_bytes()).map_err(sled_err)?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    async fn find_in_storage(&self, predicate: StorePredicate<'_>) -> Result<Option<Vec<u8>>> {
        for entry in self.blocks.iter() {
            let (_key, value) = entry.map_err(sled_err)?;
            if predicate(&value) {
                return Ok(Some(value.to_vec()));
            }
        }
        Ok(None)
    }

    async fn map_in_storage(&self, map: StoreMapFn<'_>) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        for entry in self.blocks.iter() {
            let (_key, value) = entry.map_err(sled_err)?;
            if let Some(mapped) = map(&value) {
                out.push(mapped);
            }
        }
        Ok(out)
    }

    async fn list_keys(&self, prefix: Option<&[u8]>) -> Result<Vec<BlockHash>> {
        let mut out = Vec::new();
        let iter: Box<dyn Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>> = match prefix {
            Some(p) => Box::new(self.blocks.scan_prefix(p)),
            None => Box::new(self.blocks.iter()),
        };
        for entry in iter {
            let (key, _value) = entry.map_err(sled_err)?;
            out.push(BlockHash::from_slice(&key)?);
        }
        Ok(out)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.blocks.len() as u64)
    }
}
