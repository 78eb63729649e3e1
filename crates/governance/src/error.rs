//! Error types for governance state changes.

use thiserror::Error;

/// Errors raised while validating, applying, or (de)serializing state change
/// requests.
///
/// `ForkedCrs`, `MissingPreviousCrs`, and `ProposerIsFinal` come from
/// request-time validation, where a rejection drops only that request.
/// `DuplicatedChange` is returned there too, but the applier also raises it
/// for a CRS round that is no longer next, and any error during batch
/// application aborts the remainder of the batch. The remaining variants are
/// always fatal to the batch being processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The change is already reflected in the state; applying it again would
    /// have no effect.
    #[error("duplicated change")]
    DuplicatedChange,

    /// A different CRS was proposed for a round that already has one.
    #[error("forked CRS")]
    ForkedCrs,

    /// A CRS was proposed for a round beyond the next one in the chain.
    #[error("missing previous CRS")]
    MissingPreviousCrs,

    /// A complaint targets a proposer that has already finalized its DKG
    /// phase for the round.
    #[error("proposer is final")]
    ProposerIsFinal,

    /// The decoder encountered a state change ordinal outside the closed set.
    #[error("unknown state change type: {0}")]
    UnknownStateChangeType(u8),

    /// The batch or one of its payloads failed to decode.
    #[error("failed to decode request batch: {0}")]
    Decode(String),

    /// A request batch failed to encode.
    #[error("failed to encode request batch: {0}")]
    Encode(String),

    /// An add-node payload is not a valid public key.
    #[error("invalid public key in add-node request")]
    KeyParse,
}

/// Identifies the first sub-state found to diverge when comparing two
/// governance states structurally.
///
/// Returned by [`crate::GovernanceState::equal`]; the variant names the
/// sub-state so reconciliation failures point at the culprit directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateMismatch {
    /// Configuration scalars differ.
    #[error("config not equal")]
    Config,

    /// Local-mode flags differ.
    #[error("local flag not equal")]
    LocalFlag,

    /// Node sets differ.
    #[error("node set not equal")]
    NodeSet,

    /// Per-round DKG complaint tables differ.
    #[error("dkg complaints not equal")]
    DkgComplaints,

    /// Per-round DKG master public key tables differ.
    #[error("dkg master public keys not equal")]
    DkgMasterPublicKeys,

    /// Per-round DKG finalization tables differ.
    #[error("dkg finalizations not equal")]
    DkgFinals,

    /// CRS chains differ.
    #[error("crs not equal")]
    Crs,

    /// Pending coalesced config changes differ.
    #[error("pending configs not equal")]
    PendingConfigs,

    /// Pending node additions differ.
    #[error("pending nodes not equal")]
    PendingNodes,

    /// Pending DKG complaints differ.
    #[error("pending dkg complaints not equal")]
    PendingDkgComplaints,

    /// Pending DKG finalizations differ.
    #[error("pending dkg finalizations not equal")]
    PendingDkgFinals,

    /// Pending DKG master public keys differ.
    #[error("pending dkg master public keys not equal")]
    PendingDkgMasterPublicKeys,

    /// Pending CRS additions differ.
    #[error("pending crs not equal")]
    PendingCrs,
}
