//! # Sealed Boxes
//!
//! Public-key encryption for key escrow: seal bytes to an Ed25519 public
//! key so that only the matching secret key can open them. Used to carry
//! encrypted member secrets inside key sets and to re-encrypt them for a
//! requesting reader.
//!
//! ## Construction
//!
//! 1. Map the recipient's Ed25519 key to its X25519 (Montgomery) form.
//! 2. Generate an ephemeral X25519 keypair and run Diffie-Hellman against
//!    the recipient key.
//! 3. Derive a 256-bit session key from the shared secret with BLAKE3's
//!    `derive_key`, binding both public keys into the derivation so a
//!    ciphertext cannot be replayed toward a different recipient.
//! 4. Encrypt with AES-256-GCM under a random 96-bit nonce.
//!
//! ## Wire format
//!
//! `[32 bytes: ephemeral public key] [12 bytes: nonce] [ciphertext + tag]`.
//!
//! The raw DH output is never used as a key directly; curve points have
//! algebraic structure, and AES wants uniform bytes. The KDF step is not
//! optional.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{x25519, EphemeralSecret, PublicKey as XPublicKey};

use super::keys::{Keypair, PublicKey};
use super::CryptoError;
use crate::config::SEALED_KEY_CONTEXT;

/// AES-GCM nonce width in bytes.
const NONCE_LENGTH: usize = 12;

/// Ephemeral public key width in bytes.
const EPHEMERAL_LENGTH: usize = 32;

/// Derive the AES session key from the DH shared secret and both public
/// keys.
fn derive_session_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(SEALED_KEY_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral);
    hasher.update(recipient);
    *hasher.finalize().as_bytes()
}

/// Seal `plaintext` to `recipient`.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let recipient_point = recipient.montgomery_bytes()?;

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = XPublicKey::from(&ephemeral_secret).to_bytes();
    let shared = ephemeral_secret
        .diffie_hellman(&XPublicKey::from(recipient_point))
        .to_bytes();

    let session_key = derive_session_key(&shared, &ephemeral_public, &recipient_point);
    let cipher =
        Aes256Gcm::new_from_slice(&session_key).map_err(|_| CryptoError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::EncryptFailed)?;

    let mut out = Vec::with_capacity(EPHEMERAL_LENGTH + NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&ephemeral_public);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed box with the recipient's keypair.
pub fn open(recipient: &Keypair, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < EPHEMERAL_LENGTH + NONCE_LENGTH {
        return Err(CryptoError::DecryptFailed);
    }
    let (ephemeral_bytes, rest) = sealed.split_at(EPHEMERAL_LENGTH);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LENGTH);

    let ephemeral: [u8; 32] = ephemeral_bytes
        .try_into()
        .map_err(|_| CryptoError::DecryptFailed)?;
    let recipient_point = recipient.public_key().montgomery_bytes()?;
    let shared = x25519(recipient.x25519_scalar_bytes(), ephemeral);

    let session_key = derive_session_key(&shared, &ephemeral, &recipient_point);
    let cipher =
        Aes256Gcm::new_from_slice(&session_key).map_err(|_| CryptoError::DecryptFailed)?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::DecryptFailed)
}
