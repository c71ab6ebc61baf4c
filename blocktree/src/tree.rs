//! # Tree Layer
//!
//! Turns a flat set of chains into a tree. Each block's payload gains a
//! fixed header:
//!
//! ```text
//! [32 bytes: parent hash, all zeros when null]
//! [1 byte  : layer tag]
//! [rest    : payload owned by the layer above]
//! ```
//!
//! `parent` points at the *root of another chain*. Chains are the nodes of
//! the tree; parent edges between chain roots are the branches. Mid-chain
//! blocks may carry a parent value (appends inherit their chain's), but
//! tree traversal is defined on chain roots.
//!
//! Child enumeration has no index, so a child scan is a full pass over the
//! store. The result lands in the parent's `childBlocks` cache slot, and
//! subsequent appends of new children maintain that list via `push`.

use std::sync::Arc;
use tracing::debug;

use crate::cache::{BlockCache, CacheSlot, CacheValue};
use crate::chain::{Block, BlockData, Blockchain, ValidationFailure, ValidationReport, WriteOptions};
use crate::codec::{ByteReader, ByteWriter};
use crate::config::{LAYER_BLOCKTREE, LAYER_SECURE};
use crate::error::{BlocktreeError, InvalidBlockReason, Layer, Result, SerializationReason};
use crate::hash::BlockHash;
use crate::storage::BlockStore;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A chain block with its tree header parsed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBlock {
    /// Predecessor in the same chain; `None` marks a chain root.
    pub prev: Option<BlockHash>,
    /// Chain this block's chain hangs under; `None` at the tree root.
    pub parent: Option<BlockHash>,
    /// Layer tag of the payload.
    pub layer: u8,
    /// Random uniqueness nonce from the chain layer.
    pub nonce: u64,
    /// Write timestamp from the chain layer.
    pub timestamp: u64,
    /// Payload owned by the layer above.
    pub data: Vec<u8>,
    /// Content hash of the full serialized block.
    pub hash: BlockHash,
}

/// Caller-supplied fields for a tree write.
#[derive(Debug, Clone, Default)]
pub struct TreeBlockData {
    pub prev: Option<BlockHash>,
    pub parent: Option<BlockHash>,
    pub data: Vec<u8>,
    /// Layer tag; defaults to [`LAYER_BLOCKTREE`].
    pub layer: Option<u8>,
}

fn check_layer(layer: u8) -> Result<u8> {
    if layer == LAYER_BLOCKTREE || layer == LAYER_SECURE {
        Ok(layer)
    } else {
        Err(BlocktreeError::serialization(
            Layer::Blocktree,
            SerializationReason::InvalidLayer,
        ))
    }
}

// ---------------------------------------------------------------------------
// Blocktree
// ---------------------------------------------------------------------------

/// The tree layer, wrapping a [`Blockchain`].
pub struct Blocktree {
    chain: Blockchain,
}

impl Blocktree {
    /// Wrap an assembled chain layer.
    pub fn new(chain: Blockchain) -> Self {
        Blocktree { chain }
    }

    /// The underlying chain layer.
    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    // -- Serialization ------------------------------------------------------

    /// Compose the tree payload handed down to the chain layer.
    fn encode_payload(parent: Option<&BlockHash>, layer: u8, data: &[u8]) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::with_capacity(Layer::Blocktree, 33 + data.len());
        writer.put_hash_opt(parent);
        writer.put_u8(layer as u64)?;
        writer.put_bytes(data);
        Ok(writer.into_bytes())
    }

    /// Parse a chain block's payload into a [`TreeBlock`].
    fn parse_block(&self, block: Block) -> Result<TreeBlock> {
        let mut reader = ByteReader::new(Layer::Blocktree, &block.data);
        let parent = reader.take_hash_opt()?;
        let layer = check_layer(reader.take_u8()?)?;
        let data = reader.take_remaining().to_vec();
        Ok(TreeBlock {
            prev: block.prev,
            parent,
            layer,
            nonce: block.nonce,
            timestamp: block.timestamp,
            data,
            hash: block.hash,
        })
    }

    /// Cheap extraction of `(prev, parent)` from raw chain bytes, for scan
    /// predicates. Malformed bytes yield `None`.
    fn peek_links(bytes: &[u8]) -> Option<(Option<BlockHash>, Option<BlockHash>)> {
        let mut reader = ByteReader::new(Layer::Blocktree, bytes);
        let prev = reader.take_prev().ok()?;
        reader.take_u64().ok()?; // nonce
        reader.take_u64().ok()?; // timestamp
        let parent = reader.take_hash_opt().ok()?;
        Some((prev, parent))
    }

    // -- Write path ---------------------------------------------------------

    /// Write a tree block and return its hash.
    ///
    /// With validation on, a non-null `parent` must resolve to a stored
    /// block; a dangling parent fails with `InvalidParentBlock`. On
    /// success the new hash is appended to the parent's `childBlocks`
    /// cache list (when that list exists).
    pub async fn write_block(&self, data: TreeBlockData, options: WriteOptions) -> Result<BlockHash> {
        let layer = check_layer(data.layer.unwrap_or(LAYER_BLOCKTREE))?;

        if options.validate {
            if let Some(parent) = data.parent {
                if self.chain.read_block(&parent).await?.is_none() {
                    return Err(BlocktreeError::invalid_block_at(
                        Layer::Blocktree,
                        InvalidBlockReason::InvalidParentBlock,
                        parent,
                    ));
                }
            }
        }

        let payload = Self::encode_payload(data.parent.as_ref(), layer, &data.data)?;
        let hash = self
            .chain
            .write_block(
                BlockData {
                    prev: data.prev,
                    data: payload,
                },
                options,
            )
            .await?;

        // Only chain roots are children in the tree sense; an append that
        // inherits its chain's parent must not land in the child list.
        if data.prev.is_none() {
            if let Some(parent) = data.parent {
                self.chain
                    .cache
                    .push(&parent, CacheSlot::ChildBlocks, hash)
                    .await;
            }
        }
        Ok(hash)
    }

    // -- Read paths ---------------------------------------------------------

    /// Read a block with its tree header parsed.
    pub async fn read_block(&self, hash: &BlockHash) -> Result<Option<TreeBlock>> {
        match self.chain.read_block(hash).await? {
            Some(block) => Ok(Some(self.parse_block(block)?)),
            None => Ok(None),
        }
    }

    /// Read a block's parent link.
    ///
    /// Unlike [`read_block`](Self::read_block), an unresolvable hash is an
    /// error here: "no parent" and "no such block" must not collapse into
    /// the same answer.
    pub async fn get_parent_block(&self, hash: &BlockHash) -> Result<Option<BlockHash>> {
        let block = self.read_block(hash).await?.ok_or_else(|| {
            BlocktreeError::invalid_block_at(Layer::Blocktree, InvalidBlockReason::IsNull, *hash)
        })?;
        Ok(block.parent)
    }

    // -- Scans --------------------------------------------------------------

    /// Walk parent links from `hash` toward the tree root, collecting each
    /// visited block in order (starting block first).
    ///
    /// Parent edges are defined on chain roots; start at one, or accept
    /// that mid-chain parent values are followed as stored.
    pub async fn perform_parent_scan(&self, hash: &BlockHash) -> Result<Vec<TreeBlock>> {
        let mut blocks = Vec::new();
        let mut current = *hash;
        loop {
            let block = match self.read_block(&current).await? {
                Some(block) => block,
                None => break,
            };
            let parent = block.parent;
            blocks.push(block);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(blocks)
    }

    /// All chain roots whose parent is `hash`.
    ///
    /// Serves from the `childBlocks` cache slot when populated; otherwise
    /// scans the full store and writes the discovered list back.
    pub async fn perform_child_scan(&self, hash: &BlockHash) -> Result<Vec<TreeBlock>> {
        if let Some(value) = self.chain.cache.read(hash, CacheSlot::ChildBlocks).await {
            if let Some(list) = value.as_list() {
                let mut blocks = Vec::with_capacity(list.len());
                for child in list {
                    if let Some(block) = self.read_block(child).await? {
                        blocks.push(block);
                    }
                }
                return Ok(blocks);
            }
        }

        let target = *hash;
        let raw = self
            .chain
            .store
            .map_in_storage(&move |bytes| match Self::peek_links(bytes) {
                Some((None, Some(parent))) if parent == target => Some(bytes.to_vec()),
                _ => None,
            })
            .await?;

        let mut blocks = Vec::with_capacity(raw.len());
        for bytes in raw {
            let block = self.chain.read_block_bytes(&bytes)?;
            blocks.push(self.parse_block(block)?);
        }

        let hashes: Vec<BlockHash> = blocks.iter().map(|b| b.hash).collect();
        debug!(parent = %hash, children = hashes.len(), "rebuilt child list");
        self.chain
            .cache
            .write(hash, CacheSlot::ChildBlocks, CacheValue::HashList(hashes))
            .await;
        Ok(blocks)
    }

    // -- Validation ---------------------------------------------------------

    /// Validate the chain containing `start`, then every ancestor chain up
    /// to the tree root. Total: failures come back in the report.
    pub async fn validate_blocktree(&self, start: &BlockHash) -> Result<ValidationReport> {
        let mut total: u64 = 0;
        let mut current = *start;

        loop {
            let report = self.chain.validate_blockchain(&current).await?;
            total += report.block_count;
            if let Some(reason) = report.reason {
                return Ok(ValidationReport::invalid(total, reason, report.block));
            }

            let root = match self.chain.get_root_block(&current).await? {
                Some(root) => root,
                // The chain just validated, so its root must resolve; a
                // vanishing root means the store changed under us.
                None => {
                    return Ok(ValidationReport::invalid(
                        total,
                        ValidationFailure::MissingBlock,
                        Some(current),
                    ));
                }
            };

            let root_block = match self.read_block(&root).await? {
                Some(block) => block,
                None => {
                    return Ok(ValidationReport::invalid(
                        total,
                        ValidationFailure::MissingBlock,
                        Some(root),
                    ));
                }
            };

            match root_block.parent {
                None => {
                    return Ok(ValidationReport {
                        is_valid: true,
                        block_count: total,
                        reason: None,
                        block: None,
                    });
                }
                Some(parent) => {
                    if self.chain.read_block(&parent).await?.is_none() {
                        return Ok(ValidationReport::invalid(
                            total,
                            ValidationFailure::MissingParentBlock,
                            Some(parent),
                        ));
                    }
                    // Validate the ancestor chain in full, from its tip.
                    // Starting at the bare parent block would stop the
                    // backward walk right there and skip everything
                    // appended to that chain since.
                    current = self
                        .chain
                        .get_head_block(&parent)
                        .await?
                        .unwrap_or(parent);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
