//! # Secrets Broker
//!
//! The trusted-read collaborator. Key-set entries may carry a member's
//! private key sealed to the broker's public key; the broker is the only
//! party that can open those boxes. A trusted reader asks the secure layer
//! for a block's secrets, the layer collects the sealed entries along the
//! authorization path, and the broker re-encrypts them under the reader's
//! own trusted key.
//!
//! The broker never hands out plaintext and the secure layer never sees
//! it either: material goes in sealed to the broker and comes out sealed
//! to the requester. Requests are authenticated by a broker-signed token
//! so that a re-encryption response can be tied to the block and key it
//! was issued for.
//!
//! [`MemoryBroker`] is the in-process reference implementation; a real
//! deployment would put this behind an HSM or a hardened service.

use async_trait::async_trait;
use std::sync::Arc;

use crate::codec::ByteWriter;
use crate::crypto::{CryptoProvider, Keypair, PublicKey, Signature};
use crate::error::{BlocktreeError, InvalidSignatureReason, Layer, Result};
use crate::hash::BlockHash;
use crate::time::TimeSource;

/// An encrypted secret lifted out of a key-set entry.
#[derive(Debug, Clone)]
pub struct EncryptedSecret {
    /// The authorized public key this secret belongs to.
    pub public_key: PublicKey,
    /// The member's private key, sealed to the broker.
    pub ciphertext: Vec<u8>,
}

/// A broker-signed re-encryption authorization.
#[derive(Debug, Clone)]
pub struct BrokerToken {
    /// The block the request was issued for.
    pub block: BlockHash,
    /// The requester's key; re-encrypted output is sealed to this.
    pub trusted_key: PublicKey,
    /// Issue timestamp, milliseconds.
    pub issued_at: u64,
    /// The broker's identity key.
    pub broker_key: PublicKey,
    /// Broker signature over the token fields.
    pub signature: Signature,
}

/// The canonical bytes a token signature covers.
fn token_message(block: &BlockHash, trusted_key: &PublicKey, issued_at: u64) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(Layer::SecureBlocktree, 72);
    writer.put_bytes(block.as_bytes());
    writer.put_bytes(trusted_key.as_bytes());
    writer.put_u64(issued_at);
    writer.into_bytes()
}

/// Re-encryption service for escrowed secrets.
#[async_trait]
pub trait SecretsBroker: Send + Sync {
    /// Issue a signed token authorizing re-encryption of `block`'s secrets
    /// under `trusted_key`.
    async fn request_token(
        &self,
        block: &BlockHash,
        trusted_key: &PublicKey,
    ) -> Result<BrokerToken>;

    /// Re-encrypt `secrets` under `trusted_key`, after validating `token`.
    /// Returns the re-sealed payloads in input order.
    async fn reencrypt(
        &self,
        token: &BrokerToken,
        secrets: &[EncryptedSecret],
        trusted_key: &PublicKey,
    ) -> Result<Vec<Vec<u8>>>;
}

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

/// An in-process broker holding its identity keypair in memory.
pub struct MemoryBroker {
    keypair: Keypair,
    crypto: Arc<dyn CryptoProvider>,
    time: Arc<dyn TimeSource>,
}

impl MemoryBroker {
    pub fn new(crypto: Arc<dyn CryptoProvider>, time: Arc<dyn TimeSource>) -> Self {
        let keypair = crypto.generate_keypair();
        MemoryBroker {
            keypair,
            crypto,
            time,
        }
    }

    /// The broker's public key. Seal escrowed secrets to this.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Seal `secret` to this broker, producing the ciphertext a key-set
    /// entry carries.
    pub fn escrow(&self, secret: &[u8]) -> Result<Vec<u8>> {
        Ok(self.crypto.encrypt(&self.keypair.public_key(), secret)?)
    }
}

#[async_trait]
impl SecretsBroker for MemoryBroker {
    async fn request_token(
        &self,
        block: &BlockHash,
        trusted_key: &PublicKey,
    ) -> Result<BrokerToken> {
        let issued_at = self.time.now();
        let message = token_message(block, trusted_key, issued_at);
        let signature = self.crypto.sign(&self.keypair, &message);
        Ok(BrokerToken {
            block: *block,
            trusted_key: *trusted_key,
            issued_at,
            broker_key: self.keypair.public_key(),
            signature,
        })
    }

    async fn reencrypt(
        &self,
        token: &BrokerToken,
        secrets: &[EncryptedSecret],
        trusted_key: &PublicKey,
    ) -> Result<Vec<Vec<u8>>> {
        // The token must be ours, untampered, and issued for this key.
        let message = token_message(&token.block, &token.trusted_key, token.issued_at);
        let token_ok = token.broker_key == self.keypair.public_key()
            && token.trusted_key == *trusted_key
            && self
                .crypto
                .verify(&token.broker_key, &token.signature, &message);
        if !token_ok {
            return Err(BlocktreeError::invalid_signature(
                Layer::SecureBlocktree,
                InvalidSignatureReason::DoesNotMatch,
            ));
        }

        let mut out = Vec::with_capacity(secrets.len());
        for secret in secrets {
            let plaintext = self.crypto.decrypt(&self.keypair, &secret.ciphertext)?;
            out.push(self.crypto.encrypt(trusted_key, &plaintext)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::StandardCrypto;
    use crate::time::MockTimeSource;

    fn broker() -> MemoryBroker {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(StandardCrypto::new());
        MemoryBroker::new(crypto, Arc::new(MockTimeSource::default()))
    }

    #[tokio::test]
    async fn escrow_reencrypt_roundtrip() {
        let broker = broker();
        let crypto = StandardCrypto::new();
        let member = Keypair::generate();
        let reader = Keypair::generate();

        let sealed = broker.escrow(&member.secret_key_bytes()).unwrap();
        let block = BlockHash::from_bytes([5; 32]);
        let token = broker
            .request_token(&block, &reader.public_key())
            .await
            .unwrap();

        let secrets = vec![EncryptedSecret {
            public_key: member.public_key(),
            ciphertext: sealed,
        }];
        let out = broker
            .reencrypt(&token, &secrets, &reader.public_key())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);

        // Only the trusted reader can open the re-sealed payload.
        let recovered = crypto.decrypt(&reader, &out[0]).unwrap();
        assert_eq!(recovered, member.secret_key_bytes());
    }

    #[tokio::test]
    async fn token_for_other_key_rejected() {
        let broker = broker();
        let reader = Keypair::generate();
        let other = Keypair::generate();
        let block = BlockHash::from_bytes([5; 32]);

        let token = broker
            .request_token(&block, &reader.public_key())
            .await
            .unwrap();
        let err = broker
            .reencrypt(&token, &[], &other.public_key())
            .await
            .unwrap_err();
        match err {
            BlocktreeError::InvalidSignature { reason, .. } => {
                assert_eq!(reason, InvalidSignatureReason::DoesNotMatch);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tampered_token_rejected() {
        let broker = broker();
        let reader = Keypair::generate();
        let block = BlockHash::from_bytes([5; 32]);

        let mut token = broker
            .request_token(&block, &reader.public_key())
            .await
            .unwrap();
        token.issued_at += 1;

        assert!(broker
            .reencrypt(&token, &[], &reader.public_key())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn foreign_ciphertext_fails_decryption() {
        let broker = broker();
        let crypto = StandardCrypto::new();
        let reader = Keypair::generate();
        let stranger = Keypair::generate();
        let block = BlockHash::from_bytes([5; 32]);

        // Sealed to some other key, not the broker's.
        let sealed = crypto
            .encrypt(&stranger.public_key(), b"not for the broker")
            .unwrap();
        let token = broker
            .request_token(&block, &reader.public_key())
            .await
            .unwrap();
        let secrets = vec![EncryptedSecret {
            public_key: stranger.public_key(),
            ciphertext: sealed,
        }];
        assert!(broker
            .reencrypt(&token, &secrets, &reader.public_key())
            .await
            .is_err());
    }
}
