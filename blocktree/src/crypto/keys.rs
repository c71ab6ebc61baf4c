//! # Key Material
//!
//! Ed25519 keypairs, public keys, and signatures.
//!
//! Every authorized action in the store traces back to one of these. The
//! types wrap `ed25519-dalek` rather than exposing it so that key handling
//! has one audit point and the rest of the crate deals in fixed, boring
//! byte shapes.
//!
//! Security notes:
//!
//! - Private keys are zeroized on drop by the underlying library.
//! - Key generation uses the OS CSPRNG.
//! - `Debug` impls never print secret material. Keep it that way.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::CryptoError;

/// An Ed25519 keypair. The atomic unit of authority in the store.
pub struct Keypair {
    signing_key: SigningKey,
}

/// The public half of a keypair, safe to embed in blocks and key sets.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
///
/// Stored as a `Vec<u8>` because signatures arrive off the wire in
/// variable-length fields; anything that is not exactly 64 bytes simply
/// fails verification.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Keypair {
    /// Generate a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Keypair { signing_key }
    }

    /// Construct a keypair deterministically from a 32-byte seed.
    ///
    /// In Ed25519 the 32-byte secret key *is* the seed. A weak seed makes
    /// a weak key; feed this from a CSPRNG or a proper KDF.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Keypair {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load a keypair from a hex-encoded 32-byte seed.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| CryptoError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self::from_seed(&arr))
    }

    /// The public key for this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message. Deterministic per RFC 8032.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Verify a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Export the raw seed bytes. Handle with care; this is the whole
    /// secret.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// The clamped X25519 scalar corresponding to this Ed25519 secret.
    ///
    /// Used by the sealed-box decryption path; see
    /// [`crate::crypto::sealed`].
    pub(crate) fn x25519_scalar_bytes(&self) -> [u8; 32] {
        self.signing_key.to_scalar_bytes()
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Keypair {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material, not even partially.
        write!(f, "Keypair(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        // Public-key comparison only; comparing secrets non-constant-time
        // is a habit not worth forming.
        self.public_key() == other.public_key()
    }
}

impl Eq for Keypair {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

impl PublicKey {
    /// Wrap raw public key bytes without validation.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PublicKey { bytes }
    }

    /// Build from a slice, validating length and that the bytes are a real
    /// Ed25519 point. Low-order and off-curve values are rejected here
    /// rather than surfacing later as unverifiable signatures.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(PublicKey { bytes })
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Verify a signature. Returns a plain boolean; most callers want a
    /// yes/no answer, not a failure taxonomy.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig_bytes: [u8; 64] = match signature.bytes.as_slice().try_into() {
            Ok(b) => b,
            Err(_) => return false,
        };
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&sig_bytes))
            .is_ok()
    }

    /// The Montgomery (X25519) form of this key, for ECDH.
    pub(crate) fn montgomery_bytes(&self) -> Result<[u8; 32], CryptoError> {
        let vk =
            VerifyingKey::from_bytes(&self.bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(vk.to_montgomery().to_bytes())
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

impl Signature {
    /// Wrap a 64-byte signature.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Signature {
            bytes: bytes.to_vec(),
        }
    }

    /// Wrap signature bytes off the wire, validating the length.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        if slice.len() != 64 {
            return Err(CryptoError::InvalidSignatureBytes);
        }
        Ok(Signature {
            bytes: slice.to_vec(),
        })
    }

    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex, 128 characters for a well-formed signature.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 16 {
            write!(f, "Signature({}..)", &hex_str[..16])
        } else {
            write!(f, "Signature({hex_str})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"append this block");
        assert!(kp.verify(b"append this block", &sig));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"correct message");
        assert!(!kp.verify(b"wrong message", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let sig = kp1.sign(b"message");
        assert!(!kp2.verify(b"message", &sig));
    }

    #[test]
    fn deterministic_from_seed() {
        let kp1 = Keypair::from_seed(&[42u8; 32]);
        let kp2 = Keypair::from_seed(&[42u8; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_hex_seed_roundtrip() {
        let kp = Keypair::generate();
        let hex_seed = hex::encode(kp.secret_key_bytes());
        let restored = Keypair::from_hex(&hex_seed).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn test_invalid_hex_seed_rejected() {
        assert!(Keypair::from_hex("deadbeef").is_err());
        assert!(Keypair::from_hex("not hex at all").is_err());
    }

    #[test]
    fn public_key_slice_validation() {
        let kp = Keypair::generate();
        let pk = PublicKey::try_from_slice(kp.public_key().as_bytes()).unwrap();
        assert_eq!(pk, kp.public_key());
        assert!(PublicKey::try_from_slice(&[0u8; 16]).is_err());
    }

    #[test]
    fn signature_slice_validation() {
        assert!(Signature::try_from_slice(&[0u8; 63]).is_err());
        assert!(Signature::try_from_slice(&[0u8; 64]).is_ok());
    }

    #[test]
    fn signatures_are_deterministic() {
        let kp = Keypair::generate();
        let s1 = kp.sign(b"same bytes");
        let s2 = kp.sign(b"same bytes");
        assert_eq!(s1, s2);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::generate();
        let debug_str = format!("{kp:?}");
        assert!(debug_str.starts_with("Keypair(pub="));
        let seed_hex = hex::encode(kp.secret_key_bytes());
        assert!(!debug_str.contains(&seed_hex));
    }
}
