//! # Secure Layer
//!
//! Typed blocks, key sets, and signature-authenticated mutation over the
//! tree layer. This is where the store stops being plumbing and becomes a
//! permission system:
//!
//! - Every block carries a type tag and a signature record.
//! - `root` and `keys` blocks carry key sets; a chain's most recent key
//!   set is its authority over the chains nested beneath it.
//! - A mutation is accepted only if its signer appears, with the right
//!   action and a live validity window, in some key set found by walking
//!   parent chain-roots from the write target up to the root block.
//!
//! ## Authority flows downward
//!
//! Keys on a chain govern its *children*, not the chain itself. Writing
//! to a zone requires a key from its parent (or higher); the zone's own
//! keys in turn govern the identities and sub-zones nested under it. The
//! root block anchors the whole walk and is the only self-authorizing
//! chain, which is what makes root key rotation possible.
//!
//! ## The trust anchor
//!
//! [`SecureBlocktree::install_root`] bootstraps an empty store with the
//! root block, the root zone, and the root zone's key set, all signed by
//! the root write key. Everything after that goes through the signed
//! mutation envelope.

pub mod broker;
pub mod keys;
pub mod signer;
pub mod types;

pub use broker::{BrokerToken, EncryptedSecret, MemoryBroker, SecretsBroker};
pub use keys::{KeyAction, KeyEntry, KeySet};
pub use signer::{BlockSigner, KeypairSigner, SigningRequest};
pub use types::{BlockType, OptionsRecord, SecureBlock, SecureBody, SignatureRecord};

use tracing::{debug, info};

use crate::chain::WriteOptions;
use crate::config::LAYER_SECURE;
use crate::crypto::CryptoProvider;
use crate::error::{
    BlocktreeError, InvalidBlockReason, InvalidSignatureReason, Layer, Result,
};
use crate::hash::BlockHash;
use crate::secure::types::{decode_payload, encode_payload, signing_message};
use crate::time::TimeSource;
use crate::tree::{Blocktree, TreeBlockData};

/// The hashes produced by a successful root installation, in write order.
#[derive(Debug, Clone, Copy)]
pub struct RootInstallation {
    /// The `root` block: the trust anchor.
    pub root: BlockHash,
    /// The root `zone` block, nested directly under the root.
    pub root_zone: BlockHash,
    /// The `keys` block carrying the root zone's key set.
    pub root_zone_keys: BlockHash,
}

/// How a mutation attaches to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Start a new chain under the target (zones, identities,
    /// collections).
    Nest,
    /// Append to the target's own chain (keys, options, records).
    Extend,
}

impl WriteMode {
    fn for_child(child: BlockType) -> WriteMode {
        match child {
            BlockType::Zone | BlockType::Identity | BlockType::Collection => WriteMode::Nest,
            BlockType::Keys | BlockType::Options | BlockType::Record => WriteMode::Extend,
            // The root is written once by install_root, never as a child.
            BlockType::Root => WriteMode::Nest,
        }
    }
}

/// The secure layer, wrapping a [`Blocktree`].
pub struct SecureBlocktree {
    tree: Blocktree,
}

impl SecureBlocktree {
    /// Wrap an assembled tree layer.
    pub fn new(tree: Blocktree) -> Self {
        SecureBlocktree { tree }
    }

    /// The underlying tree layer.
    pub fn tree(&self) -> &Blocktree {
        &self.tree
    }

    fn is_null(block: BlockHash) -> BlocktreeError {
        BlocktreeError::invalid_block_at(Layer::SecureBlocktree, InvalidBlockReason::IsNull, block)
    }

    // -- Reads --------------------------------------------------------------

    /// Read and fully parse a secure block, verifying its signature.
    ///
    /// Returns `None` for the zero hash and for absent blocks. A stored
    /// block whose payload is not layer-3, whose signature record is
    /// missing, or whose signature fails verification is an error, not a
    /// `None`: the bytes exist but cannot be trusted.
    pub async fn read_secure_block(&self, hash: &BlockHash) -> Result<Option<SecureBlock>> {
        let tree_block = match self.tree.read_block(hash).await? {
            Some(block) => block,
            None => return Ok(None),
        };
        if tree_block.layer != LAYER_SECURE {
            return Err(BlocktreeError::serialization(
                Layer::SecureBlocktree,
                crate::error::SerializationReason::InvalidLayer,
            ));
        }

        let payload = decode_payload(&tree_block.data)?;
        let message = signing_message(
            tree_block.prev.as_ref(),
            tree_block.parent.as_ref(),
            payload.block_type,
            &payload.body_bytes,
        );
        let verified = self.tree.chain().crypto().verify(
            &payload.signature.public_key,
            &payload.signature.signature,
            &message,
        );
        if !verified {
            return Err(BlocktreeError::invalid_signature(
                Layer::SecureBlocktree,
                InvalidSignatureReason::DoesNotMatch,
            ));
        }
        Ok(Some(SecureBlock::from_parts(tree_block, payload)))
    }

    /// Verify a stored block's signature against its own bytes.
    ///
    /// Fails with `DoesNotMatch` on a bad signature, `NotFound` when the
    /// block carries no signature record, and `IsNull` when `hash` does
    /// not resolve.
    pub async fn validate_signature(&self, hash: &BlockHash) -> Result<()> {
        match self.read_secure_block(hash).await? {
            Some(_) => Ok(()),
            None => Err(Self::is_null(*hash)),
        }
    }

    // -- Authorization ------------------------------------------------------

    /// The most recent key-bearing block on the chain rooted at
    /// `chain_root`: the latest `keys` block, or the chain root itself
    /// when it is the `root` block.
    async fn latest_key_block(&self, chain_root: &BlockHash) -> Result<Option<SecureBlock>> {
        let head = self
            .tree
            .chain()
            .get_head_block(chain_root)
            .await?
            .unwrap_or(*chain_root);

        let mut current = Some(head);
        while let Some(hash) = current {
            let block = match self.read_secure_block(&hash).await? {
                Some(block) => block,
                None => break,
            };
            if matches!(block.block_type, BlockType::Keys | BlockType::Root) {
                return Ok(Some(block));
            }
            current = block.prev;
        }
        Ok(None)
    }

    /// The key-bearing blocks consulted when authorizing a write whose
    /// parent is `start`, ordered from nearest level to the root.
    async fn key_blocks_toward_root(&self, start: &BlockHash) -> Result<Vec<SecureBlock>> {
        let mut out = Vec::new();
        let mut level = *start;
        loop {
            let level_root = self
                .tree
                .chain()
                .get_root_block(&level)
                .await?
                .ok_or_else(|| Self::is_null(level))?;
            if let Some(key_block) = self.latest_key_block(&level_root).await? {
                out.push(key_block);
            }
            let root_block = self
                .read_secure_block(&level_root)
                .await?
                .ok_or_else(|| Self::is_null(level_root))?;
            match root_block.parent {
                Some(parent) => level = parent,
                None => break,
            }
        }
        Ok(out)
    }

    /// Authorize `public_key` for `action` at `timestamp` against the key
    /// sets reachable from `start` upward.
    ///
    /// Returns the consulted key-bearing blocks up to and including the
    /// authorizing one. A key found only with a closed validity window
    /// converts the terminal failure from `Unauthorized` to
    /// `InvalidKey(Expired)`.
    async fn authorize(
        &self,
        start: &BlockHash,
        public_key: &crate::crypto::PublicKey,
        action: KeyAction,
        timestamp: u64,
    ) -> Result<Vec<SecureBlock>> {
        let levels = self.key_blocks_toward_root(start).await?;
        let mut trace = Vec::new();
        let mut saw_expired = false;

        for key_block in levels {
            let matched = key_block
                .key_set()
                .and_then(|keys| keys.find(action, public_key))
                .map(|entry| entry.is_valid_at(timestamp));
            trace.push(key_block);
            match matched {
                Some(true) => return Ok(trace),
                Some(false) => saw_expired = true,
                None => {}
            }
        }

        if saw_expired {
            Err(BlocktreeError::invalid_key(
                Layer::SecureBlocktree,
                crate::error::InvalidKeyReason::Expired,
            ))
        } else {
            Err(BlocktreeError::invalid_signature(
                Layer::SecureBlocktree,
                InvalidSignatureReason::Unauthorized,
            ))
        }
    }

    /// The ordered list of key-set blocks that authorize `hash`'s own
    /// signature, from its parent level up to the level that covers the
    /// signer. Judged at the block's write timestamp, so later rotations
    /// and revocations do not invalidate history.
    pub async fn perform_signature_trace(&self, hash: &BlockHash) -> Result<Vec<SecureBlock>> {
        let block = self
            .read_secure_block(hash)
            .await?
            .ok_or_else(|| Self::is_null(*hash))?;
        let start = match block.parent {
            Some(parent) => parent,
            None => self
                .tree
                .chain()
                .get_root_block(hash)
                .await?
                .ok_or_else(|| Self::is_null(*hash))?,
        };
        self.authorize(
            &start,
            &block.signature.public_key,
            KeyAction::Write,
            block.timestamp,
        )
        .await
    }

    // -- Write plumbing -----------------------------------------------------

    /// Sign, verify, authorize, and persist one secure block.
    ///
    /// `auth_start` is the chain the authorization walk begins at; `None`
    /// skips the walk entirely and exists solely for the root block, which
    /// has no ancestors to consult.
    async fn write_secure(
        &self,
        prev: Option<BlockHash>,
        parent: Option<BlockHash>,
        block_type: BlockType,
        body: &SecureBody,
        signer: &dyn BlockSigner,
        auth_start: Option<BlockHash>,
    ) -> Result<BlockHash> {
        let body_bytes = body.encode()?;
        let request = SigningRequest {
            prev,
            parent,
            block_type,
            payload: &body_bytes,
        };
        let (public_key, signature) = signer.sign(&request)?;

        // The signer is outside the trust boundary; never store a
        // signature without checking it against the declared key.
        let message = request.message();
        if !self
            .tree
            .chain()
            .crypto()
            .verify(&public_key, &signature, &message)
        {
            return Err(BlocktreeError::invalid_signature(
                Layer::SecureBlocktree,
                InvalidSignatureReason::DoesNotMatch,
            ));
        }

        if let Some(start) = auth_start {
            let now = self.tree.chain().time().now();
            self.authorize(&start, &public_key, KeyAction::Write, now)
                .await?;
        }

        let payload = encode_payload(
            block_type,
            &SignatureRecord {
                public_key,
                signature,
            },
            &body_bytes,
        )?;
        let hash = self
            .tree
            .write_block(
                TreeBlockData {
                    prev,
                    parent,
                    data: payload,
                    layer: Some(LAYER_SECURE),
                },
                WriteOptions::default(),
            )
            .await?;
        debug!(block = %hash, block_type = %block_type, "wrote secure block");
        Ok(hash)
    }

    /// Resolve a mutation target to its chain root and attachment mode,
    /// enforcing the parent-type rule table and the root-target gate.
    async fn resolve_target(
        &self,
        block: &BlockHash,
        child: BlockType,
    ) -> Result<(SecureBlock, WriteMode)> {
        if block.is_zero() {
            return Err(Self::is_null(*block));
        }
        // The target must exist...
        self.read_secure_block(block)
            .await?
            .ok_or_else(|| Self::is_null(*block))?;
        // ...and mutations are defined against its chain root.
        let chain_root_hash = self
            .tree
            .chain()
            .get_root_block(block)
            .await?
            .ok_or_else(|| Self::is_null(*block))?;
        let chain_root = self
            .read_secure_block(&chain_root_hash)
            .await?
            .ok_or_else(|| Self::is_null(chain_root_hash))?;

        // Only key operations may address the root block directly; the
        // root zone is the place for everything else.
        if chain_root.block_type == BlockType::Root && child != BlockType::Keys {
            return Err(Self::is_null(*block));
        }

        if !chain_root.block_type.admits_child(child) {
            return Err(BlocktreeError::invalid_block_at(
                Layer::SecureBlocktree,
                InvalidBlockReason::InvalidParentType,
                chain_root.hash,
            ));
        }

        Ok((chain_root, WriteMode::for_child(child)))
    }

    /// The shared mutation envelope behind every public write operation.
    async fn mutate(
        &self,
        block: &BlockHash,
        child: BlockType,
        body: SecureBody,
        signer: &dyn BlockSigner,
    ) -> Result<BlockHash> {
        let (chain_root, mode) = self.resolve_target(block, child).await?;

        let (prev, parent) = match mode {
            WriteMode::Nest => (None, Some(chain_root.hash)),
            WriteMode::Extend => {
                let head = self
                    .tree
                    .chain()
                    .get_head_block(&chain_root.hash)
                    .await?
                    .unwrap_or(chain_root.hash);
                (Some(head), chain_root.parent)
            }
        };

        // Authority lives with the new block's parent; a chain with no
        // parent is the root chain, which answers for itself.
        let auth_start = parent.unwrap_or(chain_root.hash);
        self.write_secure(prev, parent, child, &body, signer, Some(auth_start))
            .await
    }

    // -- Public operations --------------------------------------------------

    /// Bootstrap an empty store with the trust anchor.
    ///
    /// Writes, in order: the `root` block carrying `root_keys`; the root
    /// `zone` block nested under it; and a `keys` block on the root zone
    /// chain carrying `root_zone_keys`. All three are signed through
    /// `sign_as_root`, which must hold the root write key. Fails with
    /// `InvalidRoot` when the store already holds any block.
    pub async fn install_root(
        &self,
        root_keys: KeySet,
        root_zone_keys: KeySet,
        sign_as_root: &dyn BlockSigner,
    ) -> Result<RootInstallation> {
        let count = self.tree.chain().count_blocks().await?;
        if count > 0 {
            return Err(BlocktreeError::InvalidRoot { count });
        }

        let root = self
            .write_secure(
                None,
                None,
                BlockType::Root,
                &SecureBody::Keys(root_keys),
                sign_as_root,
                None,
            )
            .await?;
        let root_zone = self
            .write_secure(
                None,
                Some(root),
                BlockType::Zone,
                &SecureBody::Options(OptionsRecord::new()),
                sign_as_root,
                Some(root),
            )
            .await?;
        let root_zone_keys = self
            .write_secure(
                Some(root_zone),
                Some(root),
                BlockType::Keys,
                &SecureBody::Keys(root_zone_keys),
                sign_as_root,
                Some(root),
            )
            .await?;

        info!(%root, %root_zone, "installed root");
        Ok(RootInstallation {
            root,
            root_zone,
            root_zone_keys,
        })
    }

    /// Create a zone chain under `block` (the root zone or another zone).
    pub async fn create_zone(
        &self,
        block: &BlockHash,
        signer: &dyn BlockSigner,
        options: OptionsRecord,
    ) -> Result<BlockHash> {
        self.mutate(block, BlockType::Zone, SecureBody::Options(options), signer)
            .await
    }

    /// Create an identity chain under a zone.
    pub async fn create_identity(
        &self,
        block: &BlockHash,
        signer: &dyn BlockSigner,
        options: OptionsRecord,
    ) -> Result<BlockHash> {
        self.mutate(
            block,
            BlockType::Identity,
            SecureBody::Options(options),
            signer,
        )
        .await
    }

    /// Create a collection chain under an identity or zone.
    pub async fn create_collection(
        &self,
        block: &BlockHash,
        signer: &dyn BlockSigner,
        options: OptionsRecord,
    ) -> Result<BlockHash> {
        self.mutate(
            block,
            BlockType::Collection,
            SecureBody::Options(options),
            signer,
        )
        .await
    }

    /// Append an opaque record to a collection chain.
    pub async fn add_record(
        &self,
        block: &BlockHash,
        signer: &dyn BlockSigner,
        data: Vec<u8>,
    ) -> Result<BlockHash> {
        self.mutate(block, BlockType::Record, SecureBody::Record(data), signer)
            .await
    }

    /// Append a key set to `block`'s chain, rotating or extending its
    /// authority over nested chains.
    pub async fn set_keys(
        &self,
        block: &BlockHash,
        signer: &dyn BlockSigner,
        keys: KeySet,
    ) -> Result<BlockHash> {
        self.mutate(block, BlockType::Keys, SecureBody::Keys(keys), signer)
            .await
    }

    /// Append named metadata to `block`'s chain.
    pub async fn set_options(
        &self,
        block: &BlockHash,
        signer: &dyn BlockSigner,
        options: OptionsRecord,
    ) -> Result<BlockHash> {
        self.mutate(block, BlockType::Options, SecureBody::Options(options), signer)
            .await
    }

    /// Revoke keys on `block`'s chain.
    ///
    /// Reproduces the chain's effective key set with each listed key's
    /// validity window closed at the current timestamp, and appends it as
    /// a new `keys` block. History stays verifiable; only authority from
    /// now on is affected.
    pub async fn revoke_keys(
        &self,
        block: &BlockHash,
        signer: &dyn BlockSigner,
        revoked: &[crate::crypto::PublicKey],
    ) -> Result<BlockHash> {
        let (chain_root, _) = self.resolve_target(block, BlockType::Keys).await?;
        let effective = self
            .latest_key_block(&chain_root.hash)
            .await?
            .and_then(|kb| kb.key_set().cloned())
            .ok_or_else(|| {
                BlocktreeError::invalid_key(
                    Layer::SecureBlocktree,
                    crate::error::InvalidKeyReason::NotFound,
                )
            })?;

        let now = self.tree.chain().time().now();
        let mut updated = effective;
        for public_key in revoked {
            updated
                .revoke_key(public_key, now)
                .map_err(|reason| BlocktreeError::invalid_key(Layer::SecureBlocktree, reason))?;
        }

        self.mutate(block, BlockType::Keys, SecureBody::Keys(updated), signer)
            .await
    }

    // -- Trusted reads ------------------------------------------------------

    /// Collect the escrowed read secrets governing `block` and have
    /// `broker` re-encrypt them under `trusted_key`.
    ///
    /// The secrets are gathered from the key-bearing blocks along the
    /// authorization path (nearest level first). Fails with
    /// `InvalidKey(NotFound)` when no level escrows a read secret.
    pub async fn read_secret(
        &self,
        block: &BlockHash,
        trusted_key: &crate::crypto::PublicKey,
        broker: &dyn SecretsBroker,
    ) -> Result<Vec<Vec<u8>>> {
        let secure_block = self
            .read_secure_block(block)
            .await?
            .ok_or_else(|| Self::is_null(*block))?;
        let start = match secure_block.parent {
            Some(parent) => parent,
            None => self
                .tree
                .chain()
                .get_root_block(block)
                .await?
                .ok_or_else(|| Self::is_null(*block))?,
        };

        let mut secrets = Vec::new();
        for key_block in self.key_blocks_toward_root(&start).await? {
            if let Some(keys) = key_block.key_set() {
                for entry in keys.entries(KeyAction::Read) {
                    if let Some(ciphertext) = &entry.encrypted_secret {
                        secrets.push(EncryptedSecret {
                            public_key: entry.public_key,
                            ciphertext: ciphertext.clone(),
                        });
                    }
                }
            }
        }
        if secrets.is_empty() {
            return Err(BlocktreeError::invalid_key(
                Layer::SecureBlocktree,
                crate::error::InvalidKeyReason::NotFound,
            ));
        }

        let token = broker.request_token(block, trusted_key).await?;
        broker.reencrypt(&token, &secrets, trusted_key).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
