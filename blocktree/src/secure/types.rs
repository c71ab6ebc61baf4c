//! # Typed Secure Blocks
//!
//! The secure layer's payload format and its parsed representation. Every
//! secure payload starts with a one-byte type tag, carries a signature
//! record, and ends with a type-specific body:
//!
//! ```text
//! [1 byte : block type tag]
//! [var    : signing public key]
//! [var    : signature bytes]
//! [rest   : body (key set, options record, or raw record bytes)]
//! ```
//!
//! The signature covers `prev || parent || type || body` (hashes
//! zero-filled when null), composed by [`signing_message`]. The signature
//! record itself sits outside the signed region, which is what lets a
//! reader reconstruct the exact message from the stored block.
//!
//! Per-type bodies are dispatched through [`SecureBody`]; the `match` in
//! its codec doubles as the exhaustiveness check for the type table.

use std::collections::BTreeMap;

use crate::codec::{ByteReader, ByteWriter};
use crate::crypto::{PublicKey, Signature};
use crate::error::{BlocktreeError, Layer, Result, SerializationReason};
use crate::hash::BlockHash;
use crate::secure::keys::KeySet;
use crate::tree::TreeBlock;

// ---------------------------------------------------------------------------
// BlockType
// ---------------------------------------------------------------------------

/// The kind of a secure block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// The single trust anchor; carries the root key set.
    Root,
    /// A named authority region; may nest under the root or another zone.
    Zone,
    /// A principal within a zone.
    Identity,
    /// A container for records under an identity or zone.
    Collection,
    /// Key rotation/addition/revocation on an existing chain.
    Keys,
    /// Named metadata on an existing chain.
    Options,
    /// Opaque application data in a collection.
    Record,
}

impl BlockType {
    /// Wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            BlockType::Root => 0,
            BlockType::Zone => 1,
            BlockType::Identity => 2,
            BlockType::Collection => 3,
            BlockType::Keys => 4,
            BlockType::Options => 5,
            BlockType::Record => 6,
        }
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(BlockType::Root),
            1 => Ok(BlockType::Zone),
            2 => Ok(BlockType::Identity),
            3 => Ok(BlockType::Collection),
            4 => Ok(BlockType::Keys),
            5 => Ok(BlockType::Options),
            6 => Ok(BlockType::Record),
            _ => Err(BlocktreeError::serialization(
                Layer::SecureBlocktree,
                SerializationReason::InvalidBlockType,
            )),
        }
    }

    /// The parent-type rule table: may a block of type `child` be written
    /// under a chain whose root has type `self`?
    pub fn admits_child(&self, child: BlockType) -> bool {
        use BlockType::*;
        match (self, child) {
            (Root, Zone) | (Root, Keys) | (Root, Options) => true,
            (Zone, Zone) | (Zone, Identity) | (Zone, Collection) | (Zone, Keys)
            | (Zone, Options) => true,
            (Identity, Collection) | (Identity, Keys) | (Identity, Options) => true,
            (Collection, Keys) | (Collection, Options) | (Collection, Record) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockType::Root => "root",
            BlockType::Zone => "zone",
            BlockType::Identity => "identity",
            BlockType::Collection => "collection",
            BlockType::Keys => "keys",
            BlockType::Options => "options",
            BlockType::Record => "record",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// OptionsRecord
// ---------------------------------------------------------------------------

/// A sorted string-to-string metadata record. The `name` key is the
/// conventional display name of a zone, identity, or collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsRecord {
    entries: BTreeMap<String, String>,
}

impl OptionsRecord {
    pub fn new() -> Self {
        OptionsRecord::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The conventional `name` entry.
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode as `[2B count]` then `[var key][var value]` pairs in key
    /// order, so equal records always produce equal bytes.
    pub fn encode_into(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.put_u16(self.entries.len() as u64)?;
        for (key, value) in &self.entries {
            writer.put_var(key.as_bytes())?;
            writer.put_var(value.as_bytes())?;
        }
        Ok(())
    }

    /// Decode from `reader`.
    pub fn decode_from(reader: &mut ByteReader<'_>) -> Result<OptionsRecord> {
        let count = reader.take_u16()?;
        let mut record = OptionsRecord::new();
        for _ in 0..count {
            let key = string_field(reader.take_var()?)?;
            let value = string_field(reader.take_var()?)?;
            record.set(key, value);
        }
        Ok(record)
    }
}

fn string_field(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| {
        BlocktreeError::serialization(
            Layer::SecureBlocktree,
            SerializationReason::ArgumentOutOfBounds,
        )
    })
}

// ---------------------------------------------------------------------------
// Signature record and bodies
// ---------------------------------------------------------------------------

/// The signature attached to a secure block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    /// The key that produced the signature.
    pub public_key: PublicKey,
    /// Signature over [`signing_message`].
    pub signature: Signature,
}

/// The type-specific body of a secure block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecureBody {
    /// Carried by `root` and `keys` blocks.
    Keys(KeySet),
    /// Carried by `zone`, `identity`, `collection`, and `options` blocks.
    Options(OptionsRecord),
    /// Carried by `record` blocks.
    Record(Vec<u8>),
}

impl SecureBody {
    /// Serialize the body alone. These are the signed bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::new(Layer::SecureBlocktree);
        match self {
            SecureBody::Keys(keys) => keys.encode_into(&mut writer)?,
            SecureBody::Options(options) => options.encode_into(&mut writer)?,
            SecureBody::Record(bytes) => writer.put_bytes(bytes),
        }
        Ok(writer.into_bytes())
    }

    /// Parse a body of the shape `block_type` expects.
    pub fn decode(block_type: BlockType, reader: &mut ByteReader<'_>) -> Result<SecureBody> {
        match block_type {
            BlockType::Root | BlockType::Keys => {
                Ok(SecureBody::Keys(KeySet::decode_from(reader)?))
            }
            BlockType::Zone
            | BlockType::Identity
            | BlockType::Collection
            | BlockType::Options => Ok(SecureBody::Options(OptionsRecord::decode_from(reader)?)),
            BlockType::Record => Ok(SecureBody::Record(reader.take_remaining().to_vec())),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload codec
// ---------------------------------------------------------------------------

/// The bytes a secure-block signature covers: `prev || parent || type ||
/// body`, with null hashes zero-filled to full width.
pub fn signing_message(
    prev: Option<&BlockHash>,
    parent: Option<&BlockHash>,
    block_type: BlockType,
    body: &[u8],
) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(Layer::SecureBlocktree, 65 + body.len());
    writer.put_hash_opt(prev);
    writer.put_hash_opt(parent);
    // The tag fits a byte by construction.
    writer.put_bytes(&[block_type.tag()]);
    writer.put_bytes(body);
    writer.into_bytes()
}

/// Assemble the full secure payload handed down to the tree layer.
pub(crate) fn encode_payload(
    block_type: BlockType,
    signature: &SignatureRecord,
    body: &[u8],
) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::with_capacity(Layer::SecureBlocktree, 101 + body.len());
    writer.put_u8(block_type.tag() as u64)?;
    writer.put_var(signature.public_key.as_bytes())?;
    writer.put_var(signature.signature.as_bytes())?;
    writer.put_bytes(body);
    Ok(writer.into_bytes())
}

/// A parsed secure payload, with the raw body bytes kept around for
/// signature verification.
#[derive(Debug)]
pub(crate) struct ParsedPayload {
    pub block_type: BlockType,
    pub signature: SignatureRecord,
    pub body: SecureBody,
    pub body_bytes: Vec<u8>,
}

/// Parse a secure payload (the tree layer's `data`).
pub(crate) fn decode_payload(bytes: &[u8]) -> Result<ParsedPayload> {
    let mut reader = ByteReader::new(Layer::SecureBlocktree, bytes);
    let block_type = BlockType::from_tag(reader.take_u8()?)?;

    let key_bytes = reader.take_var()?;
    let sig_bytes = reader.take_var()?;
    if key_bytes.is_empty() || sig_bytes.is_empty() {
        return Err(BlocktreeError::invalid_signature(
            Layer::SecureBlocktree,
            crate::error::InvalidSignatureReason::NotFound,
        ));
    }
    let signature = SignatureRecord {
        public_key: PublicKey::try_from_slice(key_bytes)?,
        signature: Signature::try_from_slice(sig_bytes)?,
    };

    let body_bytes = reader.take_remaining().to_vec();
    let mut body_reader = ByteReader::new(Layer::SecureBlocktree, &body_bytes);
    let body = SecureBody::decode(block_type, &mut body_reader)?;

    Ok(ParsedPayload {
        block_type,
        signature,
        body,
        body_bytes,
    })
}

// ---------------------------------------------------------------------------
// SecureBlock
// ---------------------------------------------------------------------------

/// A fully parsed secure block: chain metadata, tree linkage, type,
/// signature, and body.
#[derive(Debug, Clone)]
pub struct SecureBlock {
    pub prev: Option<BlockHash>,
    pub parent: Option<BlockHash>,
    pub nonce: u64,
    pub timestamp: u64,
    pub layer: u8,
    pub block_type: BlockType,
    pub signature: SignatureRecord,
    pub body: SecureBody,
    pub hash: BlockHash,
}

impl SecureBlock {
    pub(crate) fn from_parts(tree_block: TreeBlock, payload: ParsedPayload) -> Self {
        SecureBlock {
            prev: tree_block.prev,
            parent: tree_block.parent,
            nonce: tree_block.nonce,
            timestamp: tree_block.timestamp,
            layer: tree_block.layer,
            block_type: payload.block_type,
            signature: payload.signature,
            body: payload.body,
            hash: tree_block.hash,
        }
    }

    /// The key set, for `root` and `keys` blocks.
    pub fn key_set(&self) -> Option<&KeySet> {
        match &self.body {
            SecureBody::Keys(keys) => Some(keys),
            _ => None,
        }
    }

    /// The options record, for blocks that carry one.
    pub fn options(&self) -> Option<&OptionsRecord> {
        match &self.body {
            SecureBody::Options(options) => Some(options),
            _ => None,
        }
    }

    /// The raw record bytes, for `record` blocks.
    pub fn record(&self) -> Option<&[u8]> {
        match &self.body {
            SecureBody::Record(bytes) => Some(bytes),
            _ => None,
        }
    }
}
