//! 32-byte hash primitive.
//!
//! All content addressing in the governance state uses Keccak-256. The
//! [`Hash`] type wraps the raw digest and is cheap to copy and compare.

use sbor::prelude::*;
use sha3::{Digest, Keccak256};
use std::fmt;
use thiserror::Error;

/// A 32-byte Keccak-256 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct Hash([u8; 32]);

/// Error parsing a hash from a hex string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    /// The string is not valid hexadecimal.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded byte length is not 32.
    #[error("expected 32 bytes, got {0}")]
    WrongLength(usize),
}

impl Hash {
    /// The all-zero hash. Returned by lookups for rounds that do not exist.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Hash arbitrary bytes with Keccak-256.
    pub fn from_bytes(data: &[u8]) -> Self {
        let digest = Keccak256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Hash(bytes)
    }

    /// Wrap an existing 32-byte digest without hashing.
    pub fn from_hash_bytes(bytes: &[u8; 32]) -> Self {
        Hash(*bytes)
    }

    /// Parse a hash from a hex string (with or without a `0x` prefix).
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(s).map_err(|e| HexError::InvalidHex(e.to_string()))?;
        if decoded.len() != 32 {
            return Err(HexError::WrongLength(decoded.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Hash(bytes))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether this is the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Truncated rendering keeps logs readable.
        write!(f, "Hash({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..", &self.to_hex()[..8])
    }
}
