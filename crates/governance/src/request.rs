//! State change requests and their canonical wire form.
//!
//! A request batch crosses the network as the SBOR encoding of a sequence of
//! `(tag, payload)` pairs, where the payload is itself the SBOR encoding of
//! the tag's typed value. Keeping the payload opaque at the outer layer means
//! the batch framing never changes when a payload type evolves.
//!
//! Numeric coercions happen here, at the codec boundary: durations travel as
//! u64 nanoseconds, the signed ordering parameter as its two's-complement
//! bit pattern, and the phi ratio as its IEEE-754 bit pattern. Decoding
//! restores the caller-facing types, so a packed-then-unpacked batch compares
//! equal to the original.

use sbor::prelude::*;
use std::fmt;
use std::time::Duration;
use tessera_types::{DkgComplaint, DkgFinalize, DkgMasterPublicKey, Hash, PublicKey};

use crate::error::StateError;

/// Wire-stable tag for each kind of state change.
///
/// The ordinals are part of the wire format and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum StateChangeType {
    /// Reserved zero tag; never carried by a valid batch.
    Nothing = 0,
    AddCrs = 1,
    AddDkgComplaint = 2,
    AddDkgMasterPublicKey = 3,
    AddDkgFinal = 4,
    ChangeNumChains = 5,
    ChangeLambdaBa = 6,
    ChangeLambdaDkg = 7,
    ChangeRoundInterval = 8,
    ChangeMinBlockInterval = 9,
    ChangeMaxBlockInterval = 10,
    ChangeK = 11,
    ChangePhiRatio = 12,
    ChangeNotarySetSize = 13,
    ChangeDkgSetSize = 14,
    AddNode = 15,
}

impl StateChangeType {
    /// Parse a wire tag. Returns `None` for ordinals outside the closed set.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Nothing,
            1 => Self::AddCrs,
            2 => Self::AddDkgComplaint,
            3 => Self::AddDkgMasterPublicKey,
            4 => Self::AddDkgFinal,
            5 => Self::ChangeNumChains,
            6 => Self::ChangeLambdaBa,
            7 => Self::ChangeLambdaDkg,
            8 => Self::ChangeRoundInterval,
            9 => Self::ChangeMinBlockInterval,
            10 => Self::ChangeMaxBlockInterval,
            11 => Self::ChangeK,
            12 => Self::ChangePhiRatio,
            13 => Self::ChangeNotarySetSize,
            14 => Self::ChangeDkgSetSize,
            15 => Self::AddNode,
            _ => return None,
        })
    }

    /// The wire ordinal.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for StateChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Request to append the CRS for a specific round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub struct CrsAddition {
    /// Round the CRS is proposed for.
    pub round: u64,
    /// The proposed common reference string.
    pub crs: Hash,
}

/// A single typed state change request.
///
/// One variant per wire tag 1–15; the applier is a total match over this
/// enum, so an unrepresentable "unknown change" can never reach it.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// Append a CRS for the next round.
    AddCrs(CrsAddition),
    /// Record a complaint against a DKG proposer.
    AddDkgComplaint(DkgComplaint),
    /// Record a proposer's master public key.
    AddDkgMasterPublicKey(DkgMasterPublicKey),
    /// Record a proposer's DKG finalization.
    AddDkgFinal(DkgFinalize),
    /// Replace the number of chains.
    ChangeNumChains(u32),
    /// Replace the BA latency parameter.
    ChangeLambdaBa(Duration),
    /// Replace the DKG latency parameter.
    ChangeLambdaDkg(Duration),
    /// Replace the round interval.
    ChangeRoundInterval(Duration),
    /// Replace the minimum block interval.
    ChangeMinBlockInterval(Duration),
    /// Replace the maximum block interval.
    ChangeMaxBlockInterval(Duration),
    /// Replace the total-ordering parameter.
    ChangeK(i64),
    /// Replace the total-ordering adoption ratio.
    ChangePhiRatio(f32),
    /// Replace the notary set size.
    ChangeNotarySetSize(u32),
    /// Replace the DKG set size.
    ChangeDkgSetSize(u32),
    /// Register a node by its serialized public key.
    AddNode(Vec<u8>),
}

impl StateChange {
    /// Convenience constructor serializing a public key for registration.
    pub fn add_node(key: &PublicKey) -> Self {
        StateChange::AddNode(key.to_vec())
    }

    /// The wire tag for this change.
    pub fn change_type(&self) -> StateChangeType {
        match self {
            StateChange::AddCrs(_) => StateChangeType::AddCrs,
            StateChange::AddDkgComplaint(_) => StateChangeType::AddDkgComplaint,
            StateChange::AddDkgMasterPublicKey(_) => StateChangeType::AddDkgMasterPublicKey,
            StateChange::AddDkgFinal(_) => StateChangeType::AddDkgFinal,
            StateChange::ChangeNumChains(_) => StateChangeType::ChangeNumChains,
            StateChange::ChangeLambdaBa(_) => StateChangeType::ChangeLambdaBa,
            StateChange::ChangeLambdaDkg(_) => StateChangeType::ChangeLambdaDkg,
            StateChange::ChangeRoundInterval(_) => StateChangeType::ChangeRoundInterval,
            StateChange::ChangeMinBlockInterval(_) => StateChangeType::ChangeMinBlockInterval,
            StateChange::ChangeMaxBlockInterval(_) => StateChangeType::ChangeMaxBlockInterval,
            StateChange::ChangeK(_) => StateChangeType::ChangeK,
            StateChange::ChangePhiRatio(_) => StateChangeType::ChangePhiRatio,
            StateChange::ChangeNotarySetSize(_) => StateChangeType::ChangeNotarySetSize,
            StateChange::ChangeDkgSetSize(_) => StateChangeType::ChangeDkgSetSize,
            StateChange::AddNode(_) => StateChangeType::AddNode,
        }
    }

    /// Encode this change's payload (without the tag).
    fn encode_payload(&self) -> Result<Vec<u8>, StateError> {
        let encoded = match self {
            StateChange::AddCrs(req) => sbor::basic_encode(req),
            StateChange::AddDkgComplaint(comp) => sbor::basic_encode(comp),
            StateChange::AddDkgMasterPublicKey(mpk) => sbor::basic_encode(mpk),
            StateChange::AddDkgFinal(fin) => sbor::basic_encode(fin),
            StateChange::ChangeNumChains(n) => sbor::basic_encode(n),
            StateChange::ChangeLambdaBa(d)
            | StateChange::ChangeLambdaDkg(d)
            | StateChange::ChangeRoundInterval(d)
            | StateChange::ChangeMinBlockInterval(d)
            | StateChange::ChangeMaxBlockInterval(d) => {
                sbor::basic_encode(&(d.as_nanos() as u64))
            }
            StateChange::ChangeK(k) => sbor::basic_encode(&(*k as u64)),
            StateChange::ChangePhiRatio(phi) => sbor::basic_encode(&phi.to_bits()),
            StateChange::ChangeNotarySetSize(n) => sbor::basic_encode(n),
            StateChange::ChangeDkgSetSize(n) => sbor::basic_encode(n),
            StateChange::AddNode(bytes) => sbor::basic_encode(bytes),
        };
        encoded.map_err(|e| StateError::Encode(format!("{:?}", e)))
    }

    /// Decode a payload for the given wire tag.
    fn decode_payload(ty: u8, payload: &[u8]) -> Result<Self, StateError> {
        let ty = StateChangeType::from_u8(ty).ok_or(StateError::UnknownStateChangeType(ty))?;

        fn decode<T: sbor::prelude::BasicDecode>(payload: &[u8]) -> Result<T, StateError> {
            sbor::basic_decode(payload).map_err(|e| StateError::Decode(format!("{:?}", e)))
        }

        Ok(match ty {
            StateChangeType::Nothing => {
                return Err(StateError::UnknownStateChangeType(ty.as_u8()))
            }
            StateChangeType::AddCrs => StateChange::AddCrs(decode(payload)?),
            StateChangeType::AddDkgComplaint => StateChange::AddDkgComplaint(decode(payload)?),
            StateChangeType::AddDkgMasterPublicKey => {
                StateChange::AddDkgMasterPublicKey(decode(payload)?)
            }
            StateChangeType::AddDkgFinal => StateChange::AddDkgFinal(decode(payload)?),
            StateChangeType::ChangeNumChains => StateChange::ChangeNumChains(decode(payload)?),
            StateChangeType::ChangeLambdaBa => {
                StateChange::ChangeLambdaBa(Duration::from_nanos(decode(payload)?))
            }
            StateChangeType::ChangeLambdaDkg => {
                StateChange::ChangeLambdaDkg(Duration::from_nanos(decode(payload)?))
            }
            StateChangeType::ChangeRoundInterval => {
                StateChange::ChangeRoundInterval(Duration::from_nanos(decode(payload)?))
            }
            StateChangeType::ChangeMinBlockInterval => {
                StateChange::ChangeMinBlockInterval(Duration::from_nanos(decode(payload)?))
            }
            StateChangeType::ChangeMaxBlockInterval => {
                StateChange::ChangeMaxBlockInterval(Duration::from_nanos(decode(payload)?))
            }
            StateChangeType::ChangeK => {
                StateChange::ChangeK(decode::<u64>(payload)? as i64)
            }
            StateChangeType::ChangePhiRatio => {
                StateChange::ChangePhiRatio(f32::from_bits(decode(payload)?))
            }
            StateChangeType::ChangeNotarySetSize => {
                StateChange::ChangeNotarySetSize(decode(payload)?)
            }
            StateChangeType::ChangeDkgSetSize => StateChange::ChangeDkgSetSize(decode(payload)?),
            StateChangeType::AddNode => StateChange::AddNode(decode(payload)?),
        })
    }
}

/// Raw wire form of one request: tag plus opaque payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
struct RawStateChange {
    ty: u8,
    payload: Vec<u8>,
}

/// Encode a request batch into its canonical byte form.
pub fn encode_batch(changes: &[StateChange]) -> Result<Vec<u8>, StateError> {
    let raw: Vec<RawStateChange> = changes
        .iter()
        .map(|change| {
            Ok(RawStateChange {
                ty: change.change_type().as_u8(),
                payload: change.encode_payload()?,
            })
        })
        .collect::<Result<_, StateError>>()?;
    sbor::basic_encode(&raw).map_err(|e| StateError::Encode(format!("{:?}", e)))
}

/// Decode a canonical byte batch back into typed requests.
///
/// Fails on the first unknown tag or malformed payload; a batch either
/// decodes completely or not at all.
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<StateChange>, StateError> {
    let raw: Vec<RawStateChange> =
        sbor::basic_decode(bytes).map_err(|e| StateError::Decode(format!("{:?}", e)))?;
    raw.iter()
        .map(|r| StateChange::decode_payload(r.ty, &r.payload))
        .collect()
}
