//! Key material for node identities.
//!
//! Nodes are identified by an Ed25519 public key; the governance state maps
//! derived [`crate::NodeId`]s to these keys. Keys cross the wire as raw byte
//! strings, so [`PublicKey::from_bytes`] is the single point where untrusted
//! key bytes are validated.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

/// Error parsing public-key bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The byte string is not 32 bytes long.
    #[error("expected 32 key bytes, got {0}")]
    WrongLength(usize),

    /// The bytes do not decode to a valid curve point.
    #[error("invalid public key encoding")]
    InvalidKey,
}

/// A validated Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Parse and validate public-key bytes.
    ///
    /// Rejects byte strings of the wrong length and encodings that are not a
    /// valid curve point, so every constructed `PublicKey` is usable.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::WrongLength(bytes.len()))?;
        VerifyingKey::from_bytes(&raw).map_err(|_| KeyError::InvalidKey)?;
        Ok(PublicKey(raw))
    }

    /// The serialized key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Serialize to an owned byte vector (the wire form).
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", &hex::encode(&self.0[..4]))
    }
}

/// An Ed25519 keypair.
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the OS entropy source.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Derive a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_roundtrip() {
        let key = KeyPair::generate().public_key();
        let parsed = PublicKey::from_bytes(&key.to_vec()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let a = KeyPair::from_seed(&[7u8; 32]);
        let b = KeyPair::from_seed(&[7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());

        let c = KeyPair::from_seed(&[8u8; 32]);
        assert_ne!(a.public_key(), c.public_key());
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert_eq!(
            PublicKey::from_bytes(&[0u8; 16]),
            Err(KeyError::WrongLength(16))
        );
    }

    #[test]
    fn test_rejects_invalid_point() {
        // All-0xFF is not a valid compressed Edwards point.
        assert_eq!(
            PublicKey::from_bytes(&[0xFFu8; 32]),
            Err(KeyError::InvalidKey)
        );
    }
}
