// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Blocktree: Layered Content-Addressed Block Store
//!
//! A hierarchical data store built from three thin layers, each with a
//! narrow contract to the one above:
//!
//! - **chain**: content-addressed, append-only chains. Blocks are
//!   identified by the hash of their bytes, link to a predecessor, and
//!   never fork: one successor per block, enforced at write time.
//! - **tree**: a parent overlay that links chain roots into a tree.
//!   Chains are the nodes; parent edges are the branches.
//! - **secure**: typed blocks, time-windowed key sets, and signature
//!   authorization walked from any block up to a single trust anchor.
//!
//! Storage, caching, time, and cryptography are injected collaborators
//! ([`storage::BlockStore`], [`cache::BlockCache`], [`time::TimeSource`],
//! [`crypto::CryptoProvider`]), so the layers contain no I/O of their own
//! and tests run against in-memory everything with a hand-cranked clock.
//!
//! ## Design Philosophy
//!
//! 1. The byte store is the only truth. Every index is a cache; every
//!    cache entry is recomputable.
//! 2. Written blocks are immutable. Mutation means appending, and
//!    "deleting" a key means closing its validity window.
//! 3. Authority flows downward: keys on a chain govern the chains nested
//!    under it, and every authorization question terminates at the root.

pub mod cache;
pub mod chain;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod secure;
pub mod storage;
pub mod time;
pub mod tree;

pub use cache::{BlockCache, CacheSlot, CacheValue, MemoryCache, NullCache};
pub use chain::{Block, BlockData, Blockchain, ValidationFailure, ValidationReport, WriteOptions};
pub use crypto::{CryptoProvider, HashAlgorithm, Keypair, PublicKey, Signature, StandardCrypto};
pub use error::{BlocktreeError, Layer, Result};
pub use hash::BlockHash;
pub use secure::{
    BlockSigner, BlockType, KeyAction, KeyEntry, KeySet, KeypairSigner, MemoryBroker,
    OptionsRecord, RootInstallation, SecretsBroker, SecureBlock, SecureBlocktree,
};
pub use storage::{BlockStore, MemoryStore, SledStore};
pub use time::{MockTimeSource, SystemTimeSource, TimeSource};
pub use tree::{Blocktree, TreeBlock, TreeBlockData};
