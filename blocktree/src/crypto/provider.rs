//! # Crypto Provider
//!
//! The injected cryptography seam. Layers above depend on this trait only;
//! [`StandardCrypto`] is the batteries-included implementation.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::keys::{Keypair, PublicKey, Signature};
use super::{sealed, CryptoError};
use crate::hash::BlockHash;

/// Which digest function identifies block content.
///
/// BLAKE3 is the default: faster on every platform that matters and with
/// no known reason to prefer SHA-256 beyond interoperability. Both yield
/// 32 bytes, so the choice never leaks into the wire format. Pick one per
/// store and never change it; hashes are identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

/// Cryptographic operations the block layers depend on.
///
/// Object-safe so the layers can hold an `Arc<dyn CryptoProvider>`. All
/// methods are synchronous; these are CPU-bound primitives with no I/O.
pub trait CryptoProvider: Send + Sync {
    /// Content hash of `data`.
    fn hash(&self, data: &[u8]) -> BlockHash;

    /// `n` bytes from a CSPRNG.
    fn random_bytes(&self, n: usize) -> Vec<u8>;

    /// A random non-zero 64-bit nonce.
    fn random_nonce(&self) -> u64;

    /// Generate a fresh signing keypair.
    fn generate_keypair(&self) -> Keypair;

    /// Sign `message` with `keypair`.
    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Signature;

    /// Verify `signature` over `message` against `public_key`.
    fn verify(&self, public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool;

    /// Seal `plaintext` so only the holder of `recipient`'s secret key can
    /// read it.
    fn encrypt(&self, recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Open a sealed box produced by [`encrypt`](CryptoProvider::encrypt).
    fn decrypt(&self, recipient: &Keypair, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// The standard software provider: BLAKE3/SHA-256 hashing, Ed25519
/// signatures, X25519 + AES-256-GCM sealed boxes, `OsRng` randomness.
#[derive(Debug, Clone, Default)]
pub struct StandardCrypto {
    algorithm: HashAlgorithm,
}

impl StandardCrypto {
    /// Provider with the default BLAKE3 digest.
    pub fn new() -> Self {
        StandardCrypto::default()
    }

    /// Provider with an explicit digest choice.
    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        StandardCrypto { algorithm }
    }
}

impl CryptoProvider for StandardCrypto {
    fn hash(&self, data: &[u8]) -> BlockHash {
        match self.algorithm {
            HashAlgorithm::Blake3 => BlockHash::from_bytes(*blake3::hash(data).as_bytes()),
            HashAlgorithm::Sha256 => {
                let digest = Sha256::digest(data);
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&digest);
                BlockHash::from_bytes(bytes)
            }
        }
    }

    fn random_bytes(&self, n: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; n];
        OsRng.fill_bytes(&mut bytes);
        bytes
    }

    fn random_nonce(&self) -> u64 {
        // Zero is reserved as "no nonce"; the retry costs nothing and only
        // fires once per 2^64 draws.
        loop {
            let nonce = OsRng.next_u64();
            if nonce != 0 {
                return nonce;
            }
        }
    }

    fn generate_keypair(&self) -> Keypair {
        Keypair::generate()
    }

    fn sign(&self, keypair: &Keypair, message: &[u8]) -> Signature {
        keypair.sign(message)
    }

    fn verify(&self, public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool {
        public_key.verify(message, signature)
    }

    fn encrypt(&self, recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        sealed::seal(recipient, plaintext)
    }

    fn decrypt(&self, recipient: &Keypair, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        sealed::open(recipient, ciphertext)
    }
}
