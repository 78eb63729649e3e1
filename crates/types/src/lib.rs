//! Core types for the tessera governance emulation.
//!
//! This crate provides the foundational types consumed by the governance
//! state machine:
//!
//! - **Primitives**: [`Hash`], public keys and keypairs
//! - **Identifiers**: [`NodeId`], derived from public keys
//! - **Governance types**: [`GovernanceConfig`], DKG records
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod config;
mod crypto;
mod dkg;
mod hash;
mod identifiers;

pub use config::GovernanceConfig;
pub use crypto::{KeyError, KeyPair, PublicKey};
pub use dkg::{DkgComplaint, DkgFinalize, DkgMasterPublicKey};
pub use hash::{Hash, HexError};
pub use identifiers::NodeId;
