//! Replicated governance state for a consensus full node.
//!
//! This crate emulates the global governance state a full node derives from
//! the chain: configuration parameters, the participating node set, per-round
//! common reference strings, and per-round DKG artifacts. It is both a store
//! and a state-change protocol:
//!
//! 1. Participants submit [`StateChange`] requests through
//!    [`GovernanceState::request_change`].
//! 2. Pending requests are packed into a canonical byte batch
//!    ([`GovernanceState::pack_requests`]) and embedded in a block payload.
//! 3. Every node applies the identical batch
//!    ([`GovernanceState::apply`]) and converges deterministically.
//!
//! Local mode short-circuits steps 2–3 and applies requests immediately,
//! which is what single-node setups and tests want.

mod clone;
mod error;
mod pending;
mod request;
mod state;

pub use error::{StateError, StateMismatch};
pub use request::{decode_batch, encode_batch, CrsAddition, StateChange, StateChangeType};
pub use state::GovernanceState;
