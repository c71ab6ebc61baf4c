//! # Cryptographic Primitives
//!
//! Everything the store needs from cryptography, behind one injected
//! provider:
//!
//! - **Content hashing**: BLAKE3 by default, SHA-256 as the alternate.
//!   Both produce 32 bytes, which is what the wire format assumes.
//! - **Signatures**: Ed25519 via `ed25519-dalek`. Deterministic, compact,
//!   fast to verify, and with strict verification so degenerate signatures
//!   are rejected.
//! - **Public-key encryption**: a hybrid sealed box: the recipient's
//!   Ed25519 key is mapped to its X25519 form, an ephemeral ECDH exchange
//!   derives an AES-256-GCM session key through BLAKE3's `derive_key`, and
//!   the ciphertext travels with the ephemeral public key and nonce.
//! - **Randomness**: `OsRng` for nonces and key generation.
//!
//! The [`CryptoProvider`] trait is the seam: the layers above never name a
//! concrete algorithm, so tests or an HSM-backed deployment can swap the
//! whole provider without touching block logic.

pub mod keys;
pub mod provider;
pub mod sealed;

pub use keys::{Keypair, PublicKey, Signature};
pub use provider::{CryptoProvider, HashAlgorithm, StandardCrypto};

use thiserror::Error;

/// Errors from cryptographic primitives.
///
/// Deliberately vague about *why* something failed. The difference between
/// "wrong key" and "corrupted ciphertext" is nobody's business but the
/// caller's debugger.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignatureBytes,

    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed: wrong key or corrupted ciphertext")]
    DecryptFailed,
}
