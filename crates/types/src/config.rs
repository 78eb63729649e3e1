//! Governance configuration parameters.

use std::time::Duration;

/// Scalar governance parameters, as seen by every node at a given point in
/// the replicated request stream.
///
/// Returned by snapshot accessors; a plain value type with no interior
/// references, so callers can hold it across lock boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernanceConfig {
    /// Number of parallel chains.
    pub num_chains: u32,
    /// Byzantine-agreement latency parameter.
    pub lambda_ba: Duration,
    /// DKG phase latency parameter.
    pub lambda_dkg: Duration,
    /// Total-ordering parameter.
    pub k: i64,
    /// Total-ordering adoption ratio.
    pub phi_ratio: f32,
    /// Number of notaries drawn per round.
    pub notary_set_size: u32,
    /// Number of DKG participants drawn per round.
    pub dkg_set_size: u32,
    /// Wall-clock length of a round.
    pub round_interval: Duration,
    /// Lower bound between consecutive blocks on a chain.
    pub min_block_interval: Duration,
    /// Upper bound between consecutive blocks on a chain.
    pub max_block_interval: Duration,
}
