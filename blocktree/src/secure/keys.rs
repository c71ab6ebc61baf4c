//! # Key Sets
//!
//! The authorization unit of the secure layer: a mapping from action to an
//! ordered list of time-windowed public keys. Key sets travel in `root`
//! and `keys` blocks; the most recent one on a chain is that chain's
//! effective authority over its children.
//!
//! Validity windows are half-open, `[valid_from, valid_to)`, with
//! [`TIMESTAMP_FOREVER`] as the open-ended sentinel. Revocation clamps
//! `valid_to` to the revocation instant, which makes it effective
//! immediately without rewriting history.
//!
//! An entry may carry the member's private key sealed to the secrets
//! broker. That ciphertext is opaque here; it exists so trusted readers
//! can ask the broker to re-encrypt it for them.

use std::collections::BTreeMap;

use crate::codec::{ByteReader, ByteWriter};
use crate::config::TIMESTAMP_FOREVER;
use crate::crypto::PublicKey;
use crate::error::{BlocktreeError, InvalidKeyReason, Layer, Result, SerializationReason};

/// What an authorized key is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyAction {
    Read,
    Write,
}

impl KeyAction {
    /// Wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            KeyAction::Read => 1,
            KeyAction::Write => 2,
        }
    }

    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(KeyAction::Read),
            2 => Ok(KeyAction::Write),
            _ => Err(BlocktreeError::serialization(
                Layer::SecureBlocktree,
                SerializationReason::InvalidBlockType,
            )),
        }
    }
}

/// One authorized key with its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub public_key: PublicKey,
    /// First instant (inclusive) at which the key is valid.
    pub valid_from: u64,
    /// First instant (exclusive) at which the key is no longer valid.
    pub valid_to: u64,
    /// The member's private key sealed to the secrets broker, when escrow
    /// is in use.
    pub encrypted_secret: Option<Vec<u8>>,
}

impl KeyEntry {
    /// An entry valid from the beginning of time, forever.
    pub fn forever(public_key: PublicKey) -> Self {
        KeyEntry {
            public_key,
            valid_from: 0,
            valid_to: TIMESTAMP_FOREVER,
            encrypted_secret: None,
        }
    }

    /// An entry with an explicit validity window.
    pub fn windowed(public_key: PublicKey, valid_from: u64, valid_to: u64) -> Self {
        KeyEntry {
            public_key,
            valid_from,
            valid_to,
            encrypted_secret: None,
        }
    }

    /// Attach an escrowed secret to this entry.
    pub fn with_secret(mut self, encrypted_secret: Vec<u8>) -> Self {
        self.encrypted_secret = Some(encrypted_secret);
        self
    }

    /// Whether the window contains `timestamp`.
    pub fn is_valid_at(&self, timestamp: u64) -> bool {
        self.valid_from <= timestamp && timestamp < self.valid_to
    }
}

/// A mapping from action to authorized key entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    entries: BTreeMap<KeyAction, Vec<KeyEntry>>,
}

impl KeySet {
    pub fn new() -> Self {
        KeySet::default()
    }

    /// Append an entry under `action`.
    pub fn insert(&mut self, action: KeyAction, entry: KeyEntry) {
        self.entries.entry(action).or_default().push(entry);
    }

    /// Convenience: grant `public_key` the action with no expiry.
    pub fn grant_forever(&mut self, action: KeyAction, public_key: PublicKey) {
        self.insert(action, KeyEntry::forever(public_key));
    }

    /// Entries for `action`, empty when the action is absent.
    pub fn entries(&self, action: KeyAction) -> &[KeyEntry] {
        self.entries.get(&action).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find the entry for `(action, public_key)`, if present.
    pub fn find(&self, action: KeyAction, public_key: &PublicKey) -> Option<&KeyEntry> {
        self.entries(action)
            .iter()
            .find(|entry| &entry.public_key == public_key)
    }

    /// Total number of entries across all actions.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(action, entry)` pairs in action order.
    pub fn iter(&self) -> impl Iterator<Item = (KeyAction, &KeyEntry)> {
        self.entries
            .iter()
            .flat_map(|(action, entries)| entries.iter().map(move |e| (*action, e)))
    }

    /// Close `public_key`'s validity window at `at`, across every action.
    ///
    /// Fails with `NotFound` when the key appears nowhere, and `Revoked`
    /// when every appearance is already dead at `at`.
    pub fn revoke_key(
        &mut self,
        public_key: &PublicKey,
        at: u64,
    ) -> std::result::Result<(), InvalidKeyReason> {
        let mut found = false;
        let mut clamped = false;
        for entries in self.entries.values_mut() {
            for entry in entries.iter_mut() {
                if &entry.public_key == public_key {
                    found = true;
                    if entry.valid_to > at {
                        entry.valid_to = at;
                        clamped = true;
                    }
                }
            }
        }
        if !found {
            return Err(InvalidKeyReason::NotFound);
        }
        if !clamped {
            return Err(InvalidKeyReason::Revoked);
        }
        Ok(())
    }

    // -- Wire format --------------------------------------------------------
    //
    // [1B action count]
    //   per action: [1B action tag] [2B entry count]
    //     per entry: [var public key] [8B valid_from] [8B valid_to]
    //                [var encrypted secret, empty when absent]

    /// Encode into `writer`.
    pub fn encode_into(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.put_u8(self.entries.len() as u64)?;
        for (action, entries) in &self.entries {
            writer.put_u8(action.tag() as u64)?;
            writer.put_u16(entries.len() as u64)?;
            for entry in entries {
                writer.put_var(entry.public_key.as_bytes())?;
                writer.put_u64(entry.valid_from);
                writer.put_u64(entry.valid_to);
                writer.put_var(entry.encrypted_secret.as_deref().unwrap_or(&[]))?;
            }
        }
        Ok(())
    }

    /// Decode from `reader`.
    pub fn decode_from(reader: &mut ByteReader<'_>) -> Result<KeySet> {
        let mut set = KeySet::new();
        let action_count = reader.take_u8()?;
        for _ in 0..action_count {
            let action = KeyAction::from_tag(reader.take_u8()?)?;
            let entry_count = reader.take_u16()?;
            for _ in 0..entry_count {
                let public_key = PublicKey::try_from_slice(reader.take_var()?)?;
                let valid_from = reader.take_u64()?;
                let valid_to = reader.take_u64()?;
                let secret = reader.take_var()?;
                let mut entry = KeyEntry::windowed(public_key, valid_from, valid_to);
                if !secret.is_empty() {
                    entry = entry.with_secret(secret.to_vec());
                }
                set.insert(action, entry);
            }
        }
        Ok(set)
    }
}
