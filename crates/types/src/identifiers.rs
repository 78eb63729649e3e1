//! Node identifiers.

use crate::{Hash, PublicKey};
use sbor::prelude::*;
use std::fmt;

/// A 32-byte node identifier, derived deterministically from the node's
/// public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Derive the identifier for a public key (Keccak-256 of the key bytes).
    pub fn from_public_key(key: &PublicKey) -> Self {
        NodeId(*Hash::from_bytes(key.as_bytes()).as_bytes())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}..)", &hex::encode(&self.0[..4]))
    }
}
