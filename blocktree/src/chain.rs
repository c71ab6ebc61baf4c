//! # Chain Layer
//!
//! Content-addressed, append-only chains over an injected byte store. A
//! block is identified by the hash of its serialized bytes and points at
//! its predecessor, so a chain is a singly linked list discovered by
//! walking `prev` edges backwards.
//!
//! ## Wire layout
//!
//! ```text
//! [1 byte : prev_len - 1]
//! [prev   : prev hash, or a single zero byte when the block is a root]
//! [8 bytes: nonce      (random, never zero)]
//! [8 bytes: timestamp  (milliseconds, monotonic within a chain)]
//! [rest   : payload bytes owned by the layer above]
//! ```
//!
//! Big-endian throughout. The hash is computed over this entire buffer and
//! is not stored inside it.
//!
//! ## Invariants enforced on write
//!
//! - `prev`, when set, must resolve to a stored block.
//! - Timestamps never decrease along a chain.
//! - **Head uniqueness**: at most one block may claim any given `prev`.
//!   Chains never fork; a second append to the same tip fails with
//!   `NextBlockExists`. Racing writers are serialized by this check, which
//!   runs between reading the predecessor and persisting the new block.
//!
//! Nonce, timestamp, and hash are always generated here. Callers supply
//! only `prev` and payload, so there is no way to smuggle in a chosen
//! timestamp or identity.
//!
//! ## Caching
//!
//! Successor, chain-root, and head lookups are linear scans or walks, so
//! their answers are remembered in the injected cache. The cache is a pure
//! hint: every path first computes or verifies against the store and only
//! then records the answer.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{BlockCache, CacheSlot, CacheValue};
use crate::codec::{ByteReader, ByteWriter};
use crate::crypto::CryptoProvider;
use crate::error::{BlocktreeError, InvalidBlockReason, Layer, Result};
use crate::hash::BlockHash;
use crate::storage::BlockStore;
use crate::time::TimeSource;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A fully parsed chain block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Predecessor in the same chain; `None` marks a chain root.
    pub prev: Option<BlockHash>,
    /// Random 64-bit uniqueness nonce. Never zero.
    pub nonce: u64,
    /// Milliseconds since the Unix epoch at write time.
    pub timestamp: u64,
    /// Opaque payload owned by the layer above.
    pub data: Vec<u8>,
    /// Content hash of the serialized block.
    pub hash: BlockHash,
}

/// What a caller gets to choose when writing a block: the link and the
/// payload. Everything else is generated.
#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub prev: Option<BlockHash>,
    pub data: Vec<u8>,
}

/// Options threaded through write paths.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Run structural validation before persisting. On by default; turning
    /// it off is for bulk imports of data already known to be consistent.
    pub validate: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions { validate: true }
    }
}

/// Why a validation walk stopped believing the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationFailure {
    /// A `prev` link points at nothing.
    MissingBlock,
    /// A block's timestamp precedes its predecessor's.
    InvalidTimestamp,
    /// A `parent` link points at nothing (tree validation only).
    MissingParentBlock,
}

/// Outcome of a validation walk. Always returned, never raised; a broken
/// chain is a report, not an exception.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    /// Blocks visited before the walk ended.
    pub block_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ValidationFailure>,
    /// The block where the walk failed, when one can be named.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockHash>,
}

impl ValidationReport {
    fn valid(block_count: u64) -> Self {
        ValidationReport {
            is_valid: true,
            block_count,
            reason: None,
            block: None,
        }
    }

    pub(crate) fn invalid(
        block_count: u64,
        reason: ValidationFailure,
        block: Option<BlockHash>,
    ) -> Self {
        ValidationReport {
            is_valid: false,
            block_count,
            reason: Some(reason),
            block,
        }
    }
}

// ---------------------------------------------------------------------------
// Blockchain
// ---------------------------------------------------------------------------

/// The chain layer: serialization, link integrity, and chain walks over
/// injected collaborators.
pub struct Blockchain {
    pub(crate) store: Arc<dyn BlockStore>,
    pub(crate) cache: Arc<dyn BlockCache>,
    pub(crate) time: Arc<dyn TimeSource>,
    pub(crate) crypto: Arc<dyn CryptoProvider>,
}

impl Blockchain {
    /// Assemble the layer from its collaborators.
    pub fn new(
        store: Arc<dyn BlockStore>,
        cache: Arc<dyn BlockCache>,
        time: Arc<dyn TimeSource>,
        crypto: Arc<dyn CryptoProvider>,
    ) -> Self {
        Blockchain {
            store,
            cache,
            time,
            crypto,
        }
    }

    /// The byte store this layer writes to.
    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    /// The crypto provider this layer hashes with.
    pub fn crypto(&self) -> &Arc<dyn CryptoProvider> {
        &self.crypto
    }

    /// The time source consulted for new-block timestamps.
    pub fn time(&self) -> &Arc<dyn TimeSource> {
        &self.time
    }

    // -- Serialization ------------------------------------------------------

    /// Serialize block fields into the wire layout.
    pub fn serialize_block(
        prev: Option<&BlockHash>,
        nonce: u64,
        timestamp: u64,
        data: &[u8],
    ) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(Layer::Blockchain, 1 + 32 + 16 + data.len());
        writer.put_prev(prev);
        writer.put_u64(nonce);
        writer.put_u64(timestamp);
        writer.put_bytes(data);
        writer.into_bytes()
    }

    /// Parse raw block bytes, computing the content hash as a side effect.
    pub fn read_block_bytes(&self, bytes: &[u8]) -> Result<Block> {
        let mut reader = ByteReader::new(Layer::Blockchain, bytes);
        let prev = reader.take_prev()?;
        let nonce = reader.take_u64()?;
        let timestamp = reader.take_u64()?;
        let data = reader.take_remaining().to_vec();
        Ok(Block {
            prev,
            nonce,
            timestamp,
            data,
            hash: self.crypto.hash(bytes),
        })
    }

    /// Cheap extraction of just the `prev` field from raw bytes. Used by
    /// scans that match on linkage and must not pay for a full parse.
    /// Malformed bytes yield `None` rather than an error; a scan predicate
    /// has nowhere useful to put a failure.
    pub(crate) fn peek_prev(bytes: &[u8]) -> Option<Option<BlockHash>> {
        let mut reader = ByteReader::new(Layer::Blockchain, bytes);
        reader.take_prev().ok()
    }

    // -- Write path ---------------------------------------------------------

    /// Append a block and return its content hash.
    ///
    /// Generates the nonce and timestamp internally. With validation on
    /// (the default) this fails, leaving the store untouched, when:
    ///
    /// - `prev` is set but resolves to nothing (`IsNull`);
    /// - the fresh timestamp precedes the predecessor's
    ///   (`InvalidTimestamp`);
    /// - the predecessor already has a successor (`NextBlockExists`).
    pub async fn write_block(&self, data: BlockData, options: WriteOptions) -> Result<BlockHash> {
        let nonce = self.crypto.random_nonce();
        let timestamp = self.time.now();

        if options.validate {
            if let Some(prev) = data.prev {
                let prev_block = self.read_block(&prev).await?.ok_or_else(|| {
                    BlocktreeError::invalid_block_at(
                        Layer::Blockchain,
                        InvalidBlockReason::IsNull,
                        prev,
                    )
                })?;
                if timestamp < prev_block.timestamp {
                    return Err(BlocktreeError::invalid_block_at(
                        Layer::Blockchain,
                        InvalidBlockReason::InvalidTimestamp,
                        prev,
                    ));
                }
                if self.find_successor(&prev).await?.is_some() {
                    return Err(BlocktreeError::invalid_block_at(
                        Layer::Blockchain,
                        InvalidBlockReason::NextBlockExists,
                        prev,
                    ));
                }
            }
        }

        let bytes = Self::serialize_block(data.prev.as_ref(), nonce, timestamp, &data.data);
        let hash = self.store.write_bytes(bytes).await?;
        debug!(block = %hash, prev = ?data.prev, "wrote block");
        Ok(hash)
    }

    // -- Read paths ---------------------------------------------------------

    /// Read and parse the block stored under `hash`.
    ///
    /// The zero hash is the null sentinel and reads as `None`, as does any
    /// hash with no stored bytes.
    pub async fn read_block(&self, hash: &BlockHash) -> Result<Option<Block>> {
        if hash.is_zero() {
            return Ok(None);
        }
        match self.store.read_bytes(hash).await? {
            Some(bytes) => Ok(Some(self.read_block_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read the raw serialized bytes stored under `hash`.
    pub async fn read_raw_block(&self, hash: &BlockHash) -> Result<Option<Vec<u8>>> {
        if hash.is_zero() {
            return Ok(None);
        }
        self.store.read_bytes(hash).await
    }

    /// All stored block hashes, optionally filtered to a byte prefix.
    pub async fn list_blocks(&self, prefix: Option<&[u8]>) -> Result<Vec<BlockHash>> {
        self.store.list_keys(prefix).await
    }

    /// Number of blocks in the store.
    pub async fn count_blocks(&self) -> Result<u64> {
        self.store.count().await
    }

    // -- Chain walks --------------------------------------------------------

    /// Authoritative successor lookup: scan the store for the unique block
    /// whose `prev` is `hash`. Does not consult the cache.
    async fn find_successor(&self, hash: &BlockHash) -> Result<Option<BlockHash>> {
        let target = *hash;
        let found = self
            .store
            .find_in_storage(&move |bytes| Self::peek_prev(bytes) == Some(Some(target)))
            .await?;
        Ok(found.map(|bytes| self.crypto.hash(&bytes)))
    }

    /// The unique block following `hash` in its chain, if one exists.
    ///
    /// Consults the `next` cache slot first; on a miss the store is
    /// scanned and the answer written back.
    pub async fn get_next_block(&self, hash: &BlockHash) -> Result<Option<BlockHash>> {
        if let Some(value) = self.cache.read(hash, CacheSlot::Next).await {
            if let Some(next) = value.as_hash() {
                return Ok(Some(next));
            }
        }
        let next = self.find_successor(hash).await?;
        if let Some(next) = next {
            self.cache
                .write(hash, CacheSlot::Next, CacheValue::Hash(next))
                .await;
        }
        Ok(next)
    }

    /// Walk `prev` links from `hash` back to the chain root.
    ///
    /// Returns `None` when `hash` does not resolve or any link along the
    /// way is missing; a partial answer would not be a root.
    pub async fn get_root_block(&self, hash: &BlockHash) -> Result<Option<BlockHash>> {
        if let Some(value) = self.cache.read(hash, CacheSlot::RootBlock).await {
            if let Some(root) = value.as_hash() {
                return Ok(Some(root));
            }
        }

        let mut current = *hash;
        loop {
            let block = match self.read_block(&current).await? {
                Some(block) => block,
                None => return Ok(None),
            };
            match block.prev {
                Some(prev) => current = prev,
                None => break,
            }
        }

        self.cache
            .write(hash, CacheSlot::RootBlock, CacheValue::Hash(current))
            .await;
        Ok(Some(current))
    }

    /// Find the chain root for `hash`, then walk `next` links to the tip.
    ///
    /// Returns `None` for a single-block chain: no link was observed, so
    /// there is no head distinct from the root. Callers wanting "root or
    /// head, whichever is newest" should fall back to the root themselves.
    /// The result is cached on the root under the `headBlock` slot, but
    /// only when at least one link was walked.
    pub async fn get_head_block(&self, hash: &BlockHash) -> Result<Option<BlockHash>> {
        let root = match self.get_root_block(hash).await? {
            Some(root) => root,
            None => return Ok(None),
        };

        // A cached head is a hint for where to start walking, not an
        // answer: the chain may have grown past it since it was written.
        let mut current = match self.cache.read(&root, CacheSlot::HeadBlock).await {
            Some(value) => value.as_hash().unwrap_or(root),
            None => root,
        };
        let mut observed_link = current != root;

        while let Some(next) = self.get_next_block(&current).await? {
            current = next;
            observed_link = true;
        }

        if !observed_link {
            return Ok(None);
        }
        self.cache
            .write(&root, CacheSlot::HeadBlock, CacheValue::Hash(current))
            .await;
        Ok(Some(current))
    }

    // -- Validation ---------------------------------------------------------

    /// Walk `prev` links from `tip` to the chain root, checking link
    /// integrity and timestamp monotonicity. Total: failures come back in
    /// the report.
    pub async fn validate_blockchain(&self, tip: &BlockHash) -> Result<ValidationReport> {
        let mut count: u64 = 0;
        let mut current = *tip;
        // Hash and timestamp of the block whose `prev` we are following.
        let mut successor: Option<(BlockHash, u64)> = None;

        loop {
            let block = match self.read_block(&current).await? {
                Some(block) => block,
                None => {
                    return Ok(ValidationReport::invalid(
                        count,
                        ValidationFailure::MissingBlock,
                        Some(current),
                    ));
                }
            };
            count += 1;

            if let Some((succ_hash, succ_ts)) = successor {
                // The successor's timestamp must not precede this block's.
                if succ_ts < block.timestamp {
                    return Ok(ValidationReport::invalid(
                        count,
                        ValidationFailure::InvalidTimestamp,
                        Some(succ_hash),
                    ));
                }
            }

            match block.prev {
                Some(prev) => {
                    successor = Some((current, block.timestamp));
                    current = prev;
                }
                None => return Ok(ValidationReport::valid(count)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NullCache};
    use crate::crypto::StandardCrypto;
    use crate::storage::MemoryStore;
    use crate::time::MockTimeSource;

    fn chain() -> (Blockchain, Arc<MockTimeSource>) {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(StandardCrypto::new());
        let time = Arc::new(MockTimeSource::default());
        let blockchain = Blockchain::new(
            Arc::new(MemoryStore::new(Arc::clone(&crypto))),
            Arc::new(MemoryCache::new()),
            Arc::clone(&time) as Arc<dyn TimeSource>,
            crypto,
        );
        (blockchain, time)
    }

    async fn build_chain(chain: &Blockchain, length: usize) -> Vec<BlockHash> {
        let mut hashes = Vec::with_capacity(length);
        let mut prev = None;
        for i in 0..length {
            let hash = chain
                .write_block(
                    BlockData {
                        prev,
                        data: format!("block {i}").into_bytes(),
                    },
                    WriteOptions::default(),
                )
                .await
                .unwrap();
            hashes.push(hash);
            prev = Some(hash);
        }
        hashes
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let (chain, _) = chain();
        let hash = chain
            .write_block(
                BlockData {
                    prev: None,
                    data: b"payload".to_vec(),
                },
                WriteOptions::default(),
            )
            .await
            .unwrap();

        let block = chain.read_block(&hash).await.unwrap().unwrap();
        assert_eq!(block.data, b"payload");
        assert_eq!(block.prev, None);
        assert!(block.timestamp > 0);
        assert_ne!(block.nonce, 0);
        assert_eq!(block.hash, hash);
    }

    #[tokio::test]
    async fn zero_hash_reads_none() {
        let (chain, _) = chain();
        assert!(chain.read_block(&BlockHash::ZERO).await.unwrap().is_none());
        assert!(chain
            .read_raw_block(&BlockHash::ZERO)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn raw_bytes_reparse_to_same_block() {
        let (chain, _) = chain();
        let hash = chain
            .write_block(
                BlockData {
                    prev: None,
                    data: b"raw".to_vec(),
                },
                WriteOptions::default(),
            )
            .await
            .unwrap();

        let raw = chain.read_raw_block(&hash).await.unwrap().unwrap();
        let reparsed = chain.read_block_bytes(&raw).unwrap();
        assert_eq!(reparsed, chain.read_block(&hash).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn missing_prev_rejected() {
        let (chain, _) = chain();
        let ghost = BlockHash::from_bytes([0xEE; 32]);
        let err = chain
            .write_block(
                BlockData {
                    prev: Some(ghost),
                    data: vec![],
                },
                WriteOptions::default(),
            )
            .await
            .unwrap_err();
        match err {
            BlocktreeError::InvalidBlock { reason, block, .. } => {
                assert_eq!(reason, InvalidBlockReason::IsNull);
                assert_eq!(block, Some(ghost));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_successor_rejected() {
        let (chain, _) = chain();
        let root = build_chain(&chain, 2).await[0];

        let err = chain
            .write_block(
                BlockData {
                    prev: Some(root),
                    data: b"fork attempt".to_vec(),
                },
                WriteOptions::default(),
            )
            .await
            .unwrap_err();
        match err {
            BlocktreeError::InvalidBlock { reason, .. } => {
                assert_eq!(reason, InvalidBlockReason::NextBlockExists);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn backwards_timestamp_rejected() {
        let (chain, time) = chain();
        let root = build_chain(&chain, 1).await[0];

        time.set_next_timestamp(0);
        let err = chain
            .write_block(
                BlockData {
                    prev: Some(root),
                    data: vec![],
                },
                WriteOptions::default(),
            )
            .await
            .unwrap_err();
        match err {
            BlocktreeError::InvalidBlock { reason, .. } => {
                assert_eq!(reason, InvalidBlockReason::InvalidTimestamp);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn validation_can_be_skipped() {
        let (chain, _) = chain();
        let ghost = BlockHash::from_bytes([0xEE; 32]);
        // With validation off, a dangling prev is the caller's problem.
        let hash = chain
            .write_block(
                BlockData {
                    prev: Some(ghost),
                    data: vec![],
                },
                WriteOptions { validate: false },
            )
            .await
            .unwrap();
        assert!(chain.read_block(&hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn next_block_walks_forward() {
        let (chain, _) = chain();
        let hashes = build_chain(&chain, 3).await;

        assert_eq!(
            chain.get_next_block(&hashes[0]).await.unwrap(),
            Some(hashes[1])
        );
        assert_eq!(
            chain.get_next_block(&hashes[1]).await.unwrap(),
            Some(hashes[2])
        );
        assert_eq!(chain.get_next_block(&hashes[2]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn root_and_head_resolve() {
        let (chain, _) = chain();
        let hashes = build_chain(&chain, 5).await;
        let root = hashes[0];
        let tip = hashes[4];

        assert_eq!(chain.get_root_block(&tip).await.unwrap(), Some(root));
        assert_eq!(chain.get_root_block(&root).await.unwrap(), Some(root));
        assert_eq!(chain.get_head_block(&root).await.unwrap(), Some(tip));
        // From anywhere in the chain, the head is the same.
        assert_eq!(chain.get_head_block(&hashes[2]).await.unwrap(), Some(tip));
    }

    #[tokio::test]
    async fn single_block_chain_has_no_distinct_head() {
        let (chain, _) = chain();
        let root = build_chain(&chain, 1).await[0];
        assert_eq!(chain.get_head_block(&root).await.unwrap(), None);
    }

    #[tokio::test]
    async fn head_lookup_sees_growth_past_cached_value() {
        let (chain, _) = chain();
        let hashes = build_chain(&chain, 2).await;
        // Populate the headBlock cache entry.
        assert_eq!(
            chain.get_head_block(&hashes[0]).await.unwrap(),
            Some(hashes[1])
        );

        // Grow the chain; the stale cache entry must not mask the new tip.
        let tip = chain
            .write_block(
                BlockData {
                    prev: Some(hashes[1]),
                    data: vec![],
                },
                WriteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(chain.get_head_block(&hashes[0]).await.unwrap(), Some(tip));
    }

    #[tokio::test]
    async fn works_without_any_cache() {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(StandardCrypto::new());
        let chain = Blockchain::new(
            Arc::new(MemoryStore::new(Arc::clone(&crypto))),
            Arc::new(NullCache),
            Arc::new(MockTimeSource::default()),
            crypto,
        );
        let hashes = build_chain(&chain, 4).await;
        assert_eq!(
            chain.get_head_block(&hashes[0]).await.unwrap(),
            Some(hashes[3])
        );
        assert_eq!(
            chain.get_root_block(&hashes[3]).await.unwrap(),
            Some(hashes[0])
        );
    }

    #[tokio::test]
    async fn list_blocks_prefix_filter() {
        let (chain, _) = chain();
        let hashes = build_chain(&chain, 3).await;

        let all = chain.list_blocks(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let prefixed = chain
            .list_blocks(Some(&hashes[1].as_bytes()[..8]))
            .await
            .unwrap();
        assert_eq!(prefixed, vec![hashes[1]]);
    }

    #[tokio::test]
    async fn count_tracks_writes() {
        let (chain, _) = chain();
        assert_eq!(chain.count_blocks().await.unwrap(), 0);
        build_chain(&chain, 7).await;
        assert_eq!(chain.count_blocks().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn validate_healthy_chain() {
        let (chain, _) = chain();
        let hashes = build_chain(&chain, 10).await;
        let report = chain.validate_blockchain(&hashes[9]).await.unwrap();
        assert!(report.is_valid);
        assert_eq!(report.block_count, 10);
        assert!(report.reason.is_none());
    }

    #[tokio::test]
    async fn validate_reports_missing_link() {
        let (chain, _) = chain();
        let ghost = BlockHash::from_bytes([0xAA; 32]);
        // Forge a block pointing at a nonexistent predecessor.
        let orphan = chain
            .write_block(
                BlockData {
                    prev: Some(ghost),
                    data: vec![],
                },
                WriteOptions { validate: false },
            )
            .await
            .unwrap();

        let report = chain.validate_blockchain(&orphan).await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.reason, Some(ValidationFailure::MissingBlock));
        assert_eq!(report.block, Some(ghost));
        assert_eq!(report.block_count, 1);
    }

    #[tokio::test]
    async fn validate_reports_backwards_timestamp() {
        let (chain, time) = chain();
        let root = build_chain(&chain, 1).await[0];

        // Write a successor with a timestamp in the past, bypassing write
        // validation, then let the walk catch it.
        time.set_next_timestamp(1);
        let bad = chain
            .write_block(
                BlockData {
                    prev: Some(root),
                    data: vec![],
                },
                WriteOptions { validate: false },
            )
            .await
            .unwrap();

        let report = chain.validate_blockchain(&bad).await.unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.reason, Some(ValidationFailure::InvalidTimestamp));
        assert_eq!(report.block, Some(bad));
    }

    #[tokio::test]
    async fn equal_timestamps_are_legal() {
        let (chain, time) = chain();
        time.set_next_timestamp(500);
        time.set_next_timestamp(500);
        let root = build_chain(&chain, 1).await[0];
        let next = chain
            .write_block(
                BlockData {
                    prev: Some(root),
                    data: vec![],
                },
                WriteOptions::default(),
            )
            .await
            .unwrap();

        let report = chain.validate_blockchain(&next).await.unwrap();
        assert!(report.is_valid);
        assert_eq!(report.block_count, 2);
    }
}
