//! # Command Execution
//!
//! Wires CLI subcommands to the store layers. Each invocation opens the
//! sled-backed stack fresh, runs one operation, and renders the result as
//! JSON. Errors map onto the documented exit codes:
//!
//! | code | meaning |
//! |------|---------------------------------|
//! | 0    | success                         |
//! | 1    | validation error                |
//! | 2    | signature or key error          |
//! | 3    | serialization error             |
//! | 4    | I/O or storage error            |

use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use blocktree::secure::SecureBody;
use blocktree::{
    Block, BlockData, BlockHash, Blockchain, Blocktree, BlocktreeError, CryptoProvider, KeySet,
    Keypair, KeypairSigner, MemoryCache, OptionsRecord, PublicKey, SecureBlock, SecureBlocktree,
    SledStore, StandardCrypto, SystemTimeSource, TreeBlock, TreeBlockData, WriteOptions,
};

use crate::cli::{Commands, NodeCli, SignedArgs};

// ---------------------------------------------------------------------------
// Errors and exit codes
// ---------------------------------------------------------------------------

/// Anything a command can fail with.
#[derive(Debug)]
pub enum CommandError {
    /// Failure surfaced by the store layers.
    Store(BlocktreeError),
    /// Local I/O failure (key files, record files).
    Io(anyhow::Error),
}

impl CommandError {
    /// The process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Store(err) => match err {
                BlocktreeError::InvalidBlock { .. } | BlocktreeError::InvalidRoot { .. } => 1,
                BlocktreeError::InvalidSignature { .. }
                | BlocktreeError::InvalidKey { .. }
                | BlocktreeError::Crypto(_) => 2,
                BlocktreeError::Serialization { .. } => 3,
                BlocktreeError::Storage(_) => 4,
            },
            CommandError::Io(_) => 4,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Store(err) => write!(f, "{err}"),
            CommandError::Io(err) => write!(f, "{err:#}"),
        }
    }
}

impl From<BlocktreeError> for CommandError {
    fn from(err: BlocktreeError) -> Self {
        CommandError::Store(err)
    }
}

type CmdResult<T> = std::result::Result<T, CommandError>;

// ---------------------------------------------------------------------------
// Stack assembly and argument parsing
// ---------------------------------------------------------------------------

/// Open the full layer stack over the sled store at `data_dir`.
fn open_stack(data_dir: &Path) -> CmdResult<(SecureBlocktree, Arc<dyn CryptoProvider>)> {
    let crypto: Arc<dyn CryptoProvider> = Arc::new(StandardCrypto::new());
    let store = SledStore::open(data_dir, Arc::clone(&crypto))?;
    let chain = Blockchain::new(
        Arc::new(store),
        Arc::new(MemoryCache::new()),
        Arc::new(SystemTimeSource),
        Arc::clone(&crypto),
    );
    Ok((SecureBlocktree::new(Blocktree::new(chain)), crypto))
}

fn parse_hash(s: &str) -> CmdResult<BlockHash> {
    Ok(BlockHash::from_hex(s)?)
}

fn parse_opt_hash(s: &Option<String>) -> CmdResult<Option<BlockHash>> {
    s.as_deref().map(BlockHash::from_hex).transpose().map_err(Into::into)
}

fn parse_public_key(s: &str) -> CmdResult<PublicKey> {
    PublicKey::from_hex(s).map_err(|e| CommandError::Store(e.into()))
}

/// Parse repeated `key=value` pairs into an options record.
fn parse_options(pairs: &[String]) -> CmdResult<OptionsRecord> {
    let mut record = OptionsRecord::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            CommandError::Io(anyhow::anyhow!(
                "invalid option '{pair}': expected key=value"
            ))
        })?;
        record.set(key, value);
    }
    Ok(record)
}

/// Load a signer from a hex seed file.
fn load_signer(signed: &SignedArgs, crypto: &Arc<dyn CryptoProvider>) -> CmdResult<KeypairSigner> {
    let keypair = load_keypair(&signed.key_file)?;
    Ok(KeypairSigner::new(keypair, Arc::clone(crypto)))
}

fn load_keypair(path: &Path) -> CmdResult<Keypair> {
    let seed_hex = std::fs::read_to_string(path).map_err(|e| {
        CommandError::Io(anyhow::anyhow!("cannot read key file {}: {e}", path.display()))
    })?;
    Keypair::from_hex(&seed_hex).map_err(|e| CommandError::Store(e.into()))
}

// ---------------------------------------------------------------------------
// JSON rendering
// ---------------------------------------------------------------------------

fn hash_json(hash: Option<&BlockHash>) -> Value {
    match hash {
        Some(h) => json!(h.to_hex()),
        None => Value::Null,
    }
}

fn block_json(block: &Block) -> Value {
    json!({
        "hash": block.hash.to_hex(),
        "prev": hash_json(block.prev.as_ref()),
        "nonce": block.nonce,
        "timestamp": block.timestamp,
        "data": String::from_utf8_lossy(&block.data),
    })
}

fn tree_block_json(block: &TreeBlock) -> Value {
    json!({
        "hash": block.hash.to_hex(),
        "prev": hash_json(block.prev.as_ref()),
        "parent": hash_json(block.parent.as_ref()),
        "layer": block.layer,
        "nonce": block.nonce,
        "timestamp": block.timestamp,
        "data": String::from_utf8_lossy(&block.data),
    })
}

fn key_set_json(keys: &KeySet) -> Value {
    let entries: Vec<Value> = keys
        .iter()
        .map(|(action, entry)| {
            json!({
                "action": format!("{action:?}").to_lowercase(),
                "publicKey": entry.public_key.to_hex(),
                "validFrom": entry.valid_from,
                "validTo": entry.valid_to,
                "hasEscrowedSecret": entry.encrypted_secret.is_some(),
            })
        })
        .collect();
    json!(entries)
}

fn secure_block_json(block: &SecureBlock) -> Value {
    let body = match &block.body {
        SecureBody::Keys(keys) => json!({ "keys": key_set_json(keys) }),
        SecureBody::Options(options) => {
            let map: serde_json::Map<String, Value> = options
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect();
            json!({ "options": map })
        }
        SecureBody::Record(bytes) => json!({ "record": hex::encode(bytes) }),
    };
    json!({
        "hash": block.hash.to_hex(),
        "type": block.block_type.to_string(),
        "prev": hash_json(block.prev.as_ref()),
        "parent": hash_json(block.parent.as_ref()),
        "timestamp": block.timestamp,
        "signer": block.signature.public_key.to_hex(),
        "body": body,
    })
}

fn report_json(report: &blocktree::ValidationReport) -> Value {
    serde_json::to_value(report).unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Execute one CLI invocation and return its JSON result.
pub async fn execute(cli: NodeCli) -> CmdResult<Value> {
    // Keygen touches no store; handle it before opening sled.
    if let Commands::Keygen { out } = &cli.command {
        let keypair = Keypair::generate();
        std::fs::write(out, hex::encode(keypair.secret_key_bytes())).map_err(|e| {
            CommandError::Io(anyhow::anyhow!(
                "cannot write key file {}: {e}",
                out.display()
            ))
        })?;
        return Ok(json!({
            "publicKey": keypair.public_key().to_hex(),
            "keyFile": out.display().to_string(),
        }));
    }

    let (secure, crypto) = open_stack(&cli.data_dir)?;
    let tree = secure.tree();
    let chain = tree.chain();

    match cli.command {
        Commands::Keygen { .. } => unreachable!("handled above"),

        // -- Chain layer ----------------------------------------------------
        Commands::WriteBlock { prev, data } => {
            let hash = chain
                .write_block(
                    BlockData {
                        prev: parse_opt_hash(&prev)?,
                        data: data.into_bytes(),
                    },
                    WriteOptions::default(),
                )
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::ReadBlock { hash } => {
            let block = chain.read_block(&parse_hash(&hash)?).await?;
            Ok(block.map(|b| block_json(&b)).unwrap_or(Value::Null))
        }
        Commands::ReadRawBlock { hash } => {
            let bytes = chain.read_raw_block(&parse_hash(&hash)?).await?;
            Ok(bytes.map(|b| json!(hex::encode(b))).unwrap_or(Value::Null))
        }
        Commands::ListBlocks { prefix } => {
            let prefix_bytes = prefix
                .map(|p| {
                    hex::decode(&p).map_err(|_| {
                        CommandError::Store(BlocktreeError::serialization(
                            blocktree::Layer::Blockchain,
                            blocktree::error::SerializationReason::InvalidBlockHash,
                        ))
                    })
                })
                .transpose()?;
            let hashes = chain.list_blocks(prefix_bytes.as_deref()).await?;
            let out: Vec<String> = hashes.iter().map(BlockHash::to_hex).collect();
            Ok(json!({ "count": out.len(), "blocks": out }))
        }
        Commands::CountBlocks => {
            let count = chain.count_blocks().await?;
            Ok(json!({ "count": count }))
        }
        Commands::GetHeadBlock { hash } => {
            let head = chain.get_head_block(&parse_hash(&hash)?).await?;
            Ok(json!({ "head": hash_json(head.as_ref()) }))
        }
        Commands::ValidateBlockchain { hash } => {
            let report = chain.validate_blockchain(&parse_hash(&hash)?).await?;
            Ok(report_json(&report))
        }

        // -- Tree layer -----------------------------------------------------
        Commands::WriteTreeBlock { prev, parent, data } => {
            let hash = tree
                .write_block(
                    TreeBlockData {
                        prev: parse_opt_hash(&prev)?,
                        parent: parse_opt_hash(&parent)?,
                        data: data.into_bytes(),
                        layer: None,
                    },
                    WriteOptions::default(),
                )
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::ReadTreeBlock { hash } => {
            let block = tree.read_block(&parse_hash(&hash)?).await?;
            Ok(block.map(|b| tree_block_json(&b)).unwrap_or(Value::Null))
        }
        Commands::ParentScan { hash } => {
            let blocks = tree.perform_parent_scan(&parse_hash(&hash)?).await?;
            Ok(json!(blocks.iter().map(tree_block_json).collect::<Vec<_>>()))
        }
        Commands::ChildScan { hash } => {
            let blocks = tree.perform_child_scan(&parse_hash(&hash)?).await?;
            Ok(json!(blocks.iter().map(tree_block_json).collect::<Vec<_>>()))
        }
        Commands::GetParentBlock { hash } => {
            let parent = tree.get_parent_block(&parse_hash(&hash)?).await?;
            Ok(json!({ "parent": hash_json(parent.as_ref()) }))
        }
        Commands::ValidateBlocktree { hash } => {
            let report = tree.validate_blocktree(&parse_hash(&hash)?).await?;
            Ok(report_json(&report))
        }

        // -- Secure layer ---------------------------------------------------
        Commands::InstallRoot {
            root_key_file,
            root_zone_key_file,
        } => {
            let root_keypair = load_keypair(&root_key_file)?;
            let zone_keypair = load_keypair(&root_zone_key_file)?;

            let mut root_keys = KeySet::new();
            root_keys.grant_forever(blocktree::KeyAction::Write, root_keypair.public_key());
            let mut zone_keys = KeySet::new();
            zone_keys.grant_forever(blocktree::KeyAction::Write, zone_keypair.public_key());

            let signer = KeypairSigner::new(root_keypair, Arc::clone(&crypto));
            let installed = secure.install_root(root_keys, zone_keys, &signer).await?;
            Ok(json!({
                "root": installed.root.to_hex(),
                "rootZone": installed.root_zone.to_hex(),
                "rootZoneKeys": installed.root_zone_keys.to_hex(),
            }))
        }
        Commands::CreateZone { signed, options } => {
            let signer = load_signer(&signed, &crypto)?;
            let hash = secure
                .create_zone(&parse_hash(&signed.block)?, &signer, parse_options(&options)?)
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::CreateIdentity { signed, options } => {
            let signer = load_signer(&signed, &crypto)?;
            let hash = secure
                .create_identity(&parse_hash(&signed.block)?, &signer, parse_options(&options)?)
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::CreateCollection { signed, options } => {
            let signer = load_signer(&signed, &crypto)?;
            let hash = secure
                .create_collection(&parse_hash(&signed.block)?, &signer, parse_options(&options)?)
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::AddRecord { signed, data } => {
            let signer = load_signer(&signed, &crypto)?;
            let hash = secure
                .add_record(&parse_hash(&signed.block)?, &signer, data.into_bytes())
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::SetKeys {
            signed,
            write_keys,
            read_keys,
        } => {
            let signer = load_signer(&signed, &crypto)?;
            let mut keys = KeySet::new();
            for key in &write_keys {
                keys.grant_forever(blocktree::KeyAction::Write, parse_public_key(key)?);
            }
            for key in &read_keys {
                keys.grant_forever(blocktree::KeyAction::Read, parse_public_key(key)?);
            }
            let hash = secure
                .set_keys(&parse_hash(&signed.block)?, &signer, keys)
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::SetOptions { signed, options } => {
            let signer = load_signer(&signed, &crypto)?;
            let hash = secure
                .set_options(&parse_hash(&signed.block)?, &signer, parse_options(&options)?)
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::RevokeKeys { signed, revoked } => {
            let signer = load_signer(&signed, &crypto)?;
            let mut keys = Vec::with_capacity(revoked.len());
            for key in &revoked {
                keys.push(parse_public_key(key)?);
            }
            let hash = secure
                .revoke_keys(&parse_hash(&signed.block)?, &signer, &keys)
                .await?;
            Ok(json!({ "hash": hash.to_hex() }))
        }
        Commands::ReadSecureBlock { hash } => {
            let block = secure.read_secure_block(&parse_hash(&hash)?).await?;
            Ok(block.map(|b| secure_block_json(&b)).unwrap_or(Value::Null))
        }
        Commands::ValidateSignature { hash } => {
            secure.validate_signature(&parse_hash(&hash)?).await?;
            Ok(json!({ "valid": true }))
        }
    }
}
