//! # CLI Interface
//!
//! Defines the command-line argument structure for `blocktree-node` using
//! `clap` derive. One subcommand per store operation, grouped the way the
//! layers are: chain commands, tree commands, secure commands.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Blocktree store CLI.
///
/// Operates directly on a sled-backed store directory. Every command
/// prints a JSON result on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(
    name = "blocktree-node",
    about = "Layered content-addressed block store CLI",
    version,
    propagate_version = true
)]
pub struct NodeCli {
    /// Path to the store directory. Created on first write.
    #[arg(long, short = 'd', env = "BLOCKTREE_DATA_DIR", default_value = ".blocktree", global = true)]
    pub data_dir: PathBuf,

    /// Default log level when RUST_LOG is not set.
    #[arg(long, env = "BLOCKTREE_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "BLOCKTREE_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by every signed secure-layer mutation.
#[derive(Args, Debug)]
pub struct SignedArgs {
    /// Target block hash (hex).
    pub block: String,

    /// Path to a hex-encoded 32-byte signing key seed.
    #[arg(long, short = 'k')]
    pub key_file: PathBuf,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a signing keypair; writes the seed to a file and prints
    /// the public key.
    Keygen {
        /// Where to write the hex seed.
        #[arg(long, short = 'o', default_value = "blocktree.key")]
        out: PathBuf,
    },

    // -- Chain layer --------------------------------------------------------
    /// Append a block to the chain layer.
    WriteBlock {
        /// Previous block hash (hex); omit to start a new chain.
        #[arg(long)]
        prev: Option<String>,
        /// Payload string.
        #[arg(long, default_value = "")]
        data: String,
    },
    /// Read a block and print its fields.
    ReadBlock { hash: String },
    /// Read a block's raw serialized bytes as hex.
    ReadRawBlock { hash: String },
    /// List stored block hashes, optionally filtered by hex prefix.
    ListBlocks {
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Count stored blocks.
    CountBlocks,
    /// Resolve the head (tip) of the chain containing a block.
    GetHeadBlock { hash: String },
    /// Walk and check one chain; prints a validation report.
    ValidateBlockchain { hash: String },

    // -- Tree layer ---------------------------------------------------------
    /// Append a tree block with an optional parent link.
    WriteTreeBlock {
        #[arg(long)]
        prev: Option<String>,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long, default_value = "")]
        data: String,
    },
    /// Read a block with its tree header parsed.
    ReadTreeBlock { hash: String },
    /// Walk parent links from a block to the tree root.
    ParentScan { hash: String },
    /// List the chain roots nested under a block.
    ChildScan { hash: String },
    /// Print a block's parent hash.
    GetParentBlock { hash: String },
    /// Validate a chain and every ancestor chain above it.
    ValidateBlocktree { hash: String },

    // -- Secure layer -------------------------------------------------------
    /// Install the trust anchor into an empty store.
    InstallRoot {
        /// Hex seed file for the root write key.
        #[arg(long)]
        root_key_file: PathBuf,
        /// Hex seed file for the root zone's write key.
        #[arg(long)]
        root_zone_key_file: PathBuf,
    },
    /// Create a zone under a zone (or the root zone).
    CreateZone {
        #[command(flatten)]
        signed: SignedArgs,
        /// `key=value` options; repeatable.
        #[arg(long = "option", short = 'O')]
        options: Vec<String>,
    },
    /// Create an identity under a zone.
    CreateIdentity {
        #[command(flatten)]
        signed: SignedArgs,
        #[arg(long = "option", short = 'O')]
        options: Vec<String>,
    },
    /// Create a collection under an identity or zone.
    CreateCollection {
        #[command(flatten)]
        signed: SignedArgs,
        #[arg(long = "option", short = 'O')]
        options: Vec<String>,
    },
    /// Append an opaque record to a collection.
    AddRecord {
        #[command(flatten)]
        signed: SignedArgs,
        /// Record payload string.
        #[arg(long, default_value = "")]
        data: String,
    },
    /// Replace the effective key set on a block's chain.
    SetKeys {
        #[command(flatten)]
        signed: SignedArgs,
        /// Hex public keys granted write access; repeatable.
        #[arg(long = "write-key")]
        write_keys: Vec<String>,
        /// Hex public keys granted read access; repeatable.
        #[arg(long = "read-key")]
        read_keys: Vec<String>,
    },
    /// Append named metadata to a block's chain.
    SetOptions {
        #[command(flatten)]
        signed: SignedArgs,
        #[arg(long = "option", short = 'O')]
        options: Vec<String>,
    },
    /// Revoke keys on a block's chain.
    RevokeKeys {
        #[command(flatten)]
        signed: SignedArgs,
        /// Hex public keys to revoke; repeatable.
        #[arg(long = "revoke")]
        revoked: Vec<String>,
    },
    /// Read a fully parsed secure block.
    ReadSecureBlock { hash: String },
    /// Verify a stored block's signature.
    ValidateSignature { hash: String },
}
