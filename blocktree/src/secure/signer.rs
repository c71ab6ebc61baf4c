//! # Block Signers
//!
//! The signing seam. Private key material never enters the secure layer:
//! at write time the layer hands a [`SigningRequest`] to a caller-supplied
//! [`BlockSigner`], which returns the public key it signed with and the
//! signature bytes. An implementation may hold a keypair in memory,
//! delegate to an HSM, or route through the secrets broker; the layer
//! cannot tell and does not care.

use std::sync::Arc;

use crate::crypto::{CryptoProvider, Keypair, PublicKey, Signature};
use crate::error::Result;
use crate::hash::BlockHash;
use crate::secure::types::{signing_message, BlockType};

/// Everything a signer needs to compose the canonical signing message for
/// the block under construction.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub prev: Option<BlockHash>,
    pub parent: Option<BlockHash>,
    pub block_type: BlockType,
    /// The encoded type-specific body.
    pub payload: &'a [u8],
}

impl SigningRequest<'_> {
    /// The canonical bytes a signature must cover.
    pub fn message(&self) -> Vec<u8> {
        signing_message(
            self.prev.as_ref(),
            self.parent.as_ref(),
            self.block_type,
            self.payload,
        )
    }
}

/// Produces signatures for secure blocks.
pub trait BlockSigner: Send + Sync {
    /// Sign the canonical message for `request`, returning the signing
    /// public key and the signature.
    fn sign(&self, request: &SigningRequest<'_>) -> Result<(PublicKey, Signature)>;
}

/// A signer backed by an in-memory keypair.
pub struct KeypairSigner {
    keypair: Keypair,
    crypto: Arc<dyn CryptoProvider>,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair, crypto: Arc<dyn CryptoProvider>) -> Self {
        KeypairSigner { keypair, crypto }
    }

    /// The key this signer signs with.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }
}

impl BlockSigner for KeypairSigner {
    fn sign(&self, request: &SigningRequest<'_>) -> Result<(PublicKey, Signature)> {
        let signature = self.crypto.sign(&self.keypair, &request.message());
        Ok((self.keypair.public_key(), signature))
    }
}
