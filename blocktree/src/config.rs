//! # Protocol Constants
//!
//! Every magic number in the block format lives here. Wire-format widths
//! are load-bearing: changing any of them invalidates every stored block,
//! so treat this file as append-only once real data exists.

/// Length in bytes of a content hash. Both supported digest functions
/// (BLAKE3 and SHA-256) produce 32-byte output, so the wire format assumes
/// this width everywhere a fixed-size hash field appears.
pub const HASH_LENGTH: usize = 32;

/// Layer tag for plain tree blocks (parent/layer header over an opaque
/// payload).
pub const LAYER_BLOCKTREE: u8 = 2;

/// Layer tag for secure blocks (typed payload carrying a signature record).
pub const LAYER_SECURE: u8 = 3;

/// Sentinel meaning "this key never expires" in key-set validity windows.
pub const TIMESTAMP_FOREVER: u64 = u64::MAX;

/// Maximum byte length of a length-prefixed variable field. The prefix is
/// a 2-byte big-endian integer, so fields cap out just under 64 KiB.
pub const MAX_VAR_FIELD: usize = u16::MAX as usize;

/// Domain-separation context for session keys derived during hybrid
/// public-key encryption. Feeds BLAKE3's `derive_key` mode.
pub const SEALED_KEY_CONTEXT: &str = "blocktree 2026 sealed-secret session key";
