//! The replicated governance state.
//!
//! [`GovernanceState`] is the authoritative view of governance parameters,
//! the participating node set, the per-round CRS chain, and per-round DKG
//! artifacts. Every node converges on the same view by applying identical
//! request batches extracted from committed blocks.
//!
//! # Dual-mode operation
//!
//! In **local** mode a request is validated and applied immediately; there is
//! no pending buffer and no broadcast. In **replicated** mode a request is
//! validated against the current state and parked in the pending buffer until
//! [`GovernanceState::pack_requests`] serializes it into a block payload;
//! the state itself only changes through [`GovernanceState::apply`].
//!
//! # Locking
//!
//! Two locks guard two disjoint sub-states: a readers/writer lock over the
//! authoritative state and a mutex over the pending buffer. Whenever an
//! operation holds both (`pack_requests`, `Clone`, `equal`), it takes the
//! pending lock first; every mutation path takes at most one lock at a
//! time. `equal` locks two instances and orders them by address, so
//! opposite-direction comparisons racing on two threads acquire the locks
//! in one global order.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use tessera_types::{
    DkgComplaint, DkgFinalize, DkgMasterPublicKey, GovernanceConfig, Hash, NodeId, PublicKey,
};
use tracing::{debug, warn};

use crate::clone::{clone_dkg_complaint, clone_dkg_finalize, clone_dkg_master_public_key};
use crate::error::{StateError, StateMismatch};
use crate::pending::PendingChanges;
use crate::request::{decode_batch, encode_batch, CrsAddition, StateChange};

/// Preimage of the genesis CRS, fixed for every network.
const GENESIS_CRS_SEED: &[u8] = b"__ DEXON";

/// The authoritative sub-state guarded by the state lock.
struct StateCore {
    // Configuration scalars.
    num_chains: u32,
    lambda_ba: Duration,
    lambda_dkg: Duration,
    k: i64,
    phi_ratio: f32,
    notary_set_size: u32,
    dkg_set_size: u32,
    round_interval: Duration,
    min_block_interval: Duration,
    max_block_interval: Duration,

    // Registered nodes, keyed by derived identity.
    nodes: HashMap<NodeId, PublicKey>,

    // DKG tables, outer key is the round. Complaints per proposer keep
    // insertion order; master public keys and finalizations are
    // one-per-proposer with last writer wins.
    dkg_complaints: HashMap<u64, HashMap<NodeId, Vec<DkgComplaint>>>,
    dkg_master_public_keys: HashMap<u64, HashMap<NodeId, DkgMasterPublicKey>>,
    dkg_finals: HashMap<u64, HashMap<NodeId, DkgFinalize>>,

    // CRS chain, dense from round 0. crs[i] is the CRS for round i.
    crs: Vec<Hash>,
}

impl StateCore {
    /// Pre-application validity check.
    ///
    /// Only CRS additions and DKG complaints can be rejected here; every
    /// other change is unconditionally valid at the request stage.
    fn validate(&self, change: &StateChange) -> Result<(), StateError> {
        match change {
            StateChange::AddDkgComplaint(comp) => {
                // Complaints against a finalized proposer are ignored.
                if self
                    .dkg_finals
                    .get(&comp.round)
                    .is_some_and(|finals| finals.contains_key(&comp.proposer))
                {
                    return Err(StateError::ProposerIsFinal);
                }
                // So are complaints we already hold, structurally.
                if self
                    .dkg_complaints
                    .get(&comp.round)
                    .and_then(|per_proposer| per_proposer.get(&comp.proposer))
                    .is_some_and(|comps| comps.iter().any(|existing| existing == comp))
                {
                    return Err(StateError::DuplicatedChange);
                }
                Ok(())
            }
            StateChange::AddCrs(req) => {
                let next_round = self.crs.len() as u64;
                if req.round < next_round {
                    if self.crs[req.round as usize] != req.crs {
                        Err(StateError::ForkedCrs)
                    } else {
                        Err(StateError::DuplicatedChange)
                    }
                } else if req.round == next_round {
                    Ok(())
                } else {
                    Err(StateError::MissingPreviousCrs)
                }
            }
            _ => Ok(()),
        }
    }

    /// Apply a single change. Total over the change enum; the only apply-time
    /// rejections are a CRS round that is no longer next and an add-node
    /// payload that fails key parsing.
    fn apply_one(&mut self, change: StateChange) -> Result<(), StateError> {
        match change {
            StateChange::AddNode(bytes) => {
                let key = PublicKey::from_bytes(&bytes).map_err(|_| StateError::KeyParse)?;
                self.nodes.insert(NodeId::from_public_key(&key), key);
            }
            StateChange::AddCrs(req) => {
                // The chain may have advanced between validation and apply.
                if req.round != self.crs.len() as u64 {
                    return Err(StateError::DuplicatedChange);
                }
                self.crs.push(req.crs);
            }
            StateChange::AddDkgComplaint(comp) => {
                self.dkg_complaints
                    .entry(comp.round)
                    .or_default()
                    .entry(comp.proposer)
                    .or_default()
                    .push(comp);
            }
            StateChange::AddDkgMasterPublicKey(mpk) => {
                self.dkg_master_public_keys
                    .entry(mpk.round)
                    .or_default()
                    .insert(mpk.proposer, mpk);
            }
            StateChange::AddDkgFinal(fin) => {
                self.dkg_finals
                    .entry(fin.round)
                    .or_default()
                    .insert(fin.proposer, fin);
            }
            StateChange::ChangeNumChains(n) => self.num_chains = n,
            StateChange::ChangeLambdaBa(d) => self.lambda_ba = d,
            StateChange::ChangeLambdaDkg(d) => self.lambda_dkg = d,
            StateChange::ChangeRoundInterval(d) => self.round_interval = d,
            StateChange::ChangeMinBlockInterval(d) => self.min_block_interval = d,
            StateChange::ChangeMaxBlockInterval(d) => self.max_block_interval = d,
            StateChange::ChangeK(k) => self.k = k,
            StateChange::ChangePhiRatio(phi) => self.phi_ratio = phi,
            StateChange::ChangeNotarySetSize(n) => self.notary_set_size = n,
            StateChange::ChangeDkgSetSize(n) => self.dkg_set_size = n,
        }
        Ok(())
    }

    /// The current configuration as a value type.
    fn snapshot_config(&self) -> GovernanceConfig {
        GovernanceConfig {
            num_chains: self.num_chains,
            lambda_ba: self.lambda_ba,
            lambda_dkg: self.lambda_dkg,
            k: self.k,
            phi_ratio: self.phi_ratio,
            notary_set_size: self.notary_set_size,
            dkg_set_size: self.dkg_set_size,
            round_interval: self.round_interval,
            min_block_interval: self.min_block_interval,
            max_block_interval: self.max_block_interval,
        }
    }

    /// Deep copy sharing no storage with `self`. DKG records are copied by
    /// codec round-trip so the copy is isolated even if a record internally
    /// aliases shared buffers.
    fn deep_clone(&self) -> StateCore {
        let dkg_complaints = self
            .dkg_complaints
            .iter()
            .map(|(&round, per_proposer)| {
                let copied = per_proposer
                    .iter()
                    .map(|(&proposer, comps)| {
                        (proposer, comps.iter().map(clone_dkg_complaint).collect())
                    })
                    .collect();
                (round, copied)
            })
            .collect();
        let dkg_master_public_keys = self
            .dkg_master_public_keys
            .iter()
            .map(|(&round, per_proposer)| {
                let copied = per_proposer
                    .iter()
                    .map(|(&proposer, mpk)| (proposer, clone_dkg_master_public_key(mpk)))
                    .collect();
                (round, copied)
            })
            .collect();
        let dkg_finals = self
            .dkg_finals
            .iter()
            .map(|(&round, per_proposer)| {
                let copied = per_proposer
                    .iter()
                    .map(|(&proposer, fin)| (proposer, clone_dkg_finalize(fin)))
                    .collect();
                (round, copied)
            })
            .collect();

        StateCore {
            num_chains: self.num_chains,
            lambda_ba: self.lambda_ba,
            lambda_dkg: self.lambda_dkg,
            k: self.k,
            phi_ratio: self.phi_ratio,
            notary_set_size: self.notary_set_size,
            dkg_set_size: self.dkg_set_size,
            round_interval: self.round_interval,
            min_block_interval: self.min_block_interval,
            max_block_interval: self.max_block_interval,
            nodes: self.nodes.clone(),
            dkg_complaints,
            dkg_master_public_keys,
            dkg_finals,
            crs: self.crs.clone(),
        }
    }

    /// Compare configuration scalars.
    fn config_equal(&self, other: &StateCore) -> Result<(), StateMismatch> {
        let equal = self.num_chains == other.num_chains
            && self.lambda_ba == other.lambda_ba
            && self.lambda_dkg == other.lambda_dkg
            && self.k == other.k
            && self.phi_ratio == other.phi_ratio
            && self.notary_set_size == other.notary_set_size
            && self.dkg_set_size == other.dkg_set_size
            && self.round_interval == other.round_interval
            && self.min_block_interval == other.min_block_interval
            && self.max_block_interval == other.max_block_interval;
        if equal {
            Ok(())
        } else {
            Err(StateMismatch::Config)
        }
    }

    /// Compare node set, DKG tables, and the CRS chain, reporting the first
    /// diverging sub-state.
    fn tables_equal(&self, other: &StateCore) -> Result<(), StateMismatch> {
        if self.nodes.len() != other.nodes.len() {
            return Err(StateMismatch::NodeSet);
        }
        for (id, key) in &self.nodes {
            if other.nodes.get(id) != Some(key) {
                return Err(StateMismatch::NodeSet);
            }
        }

        // Complaint sequences must match per (round, proposer) in insertion
        // order; the replicated request stream makes that order identical on
        // every node.
        if self.dkg_complaints.len() != other.dkg_complaints.len() {
            return Err(StateMismatch::DkgComplaints);
        }
        for (round, per_proposer) in &self.dkg_complaints {
            let Some(other_per_proposer) = other.dkg_complaints.get(round) else {
                return Err(StateMismatch::DkgComplaints);
            };
            if per_proposer.len() != other_per_proposer.len() {
                return Err(StateMismatch::DkgComplaints);
            }
            for (proposer, comps) in per_proposer {
                if other_per_proposer.get(proposer) != Some(comps) {
                    return Err(StateMismatch::DkgComplaints);
                }
            }
        }

        if self.dkg_master_public_keys.len() != other.dkg_master_public_keys.len() {
            return Err(StateMismatch::DkgMasterPublicKeys);
        }
        for (round, per_proposer) in &self.dkg_master_public_keys {
            let Some(other_per_proposer) = other.dkg_master_public_keys.get(round) else {
                return Err(StateMismatch::DkgMasterPublicKeys);
            };
            if per_proposer.len() != other_per_proposer.len() {
                return Err(StateMismatch::DkgMasterPublicKeys);
            }
            for (proposer, mpk) in per_proposer {
                if other_per_proposer.get(proposer) != Some(mpk) {
                    return Err(StateMismatch::DkgMasterPublicKeys);
                }
            }
        }

        if self.dkg_finals.len() != other.dkg_finals.len() {
            return Err(StateMismatch::DkgFinals);
        }
        for (round, per_proposer) in &self.dkg_finals {
            let Some(other_per_proposer) = other.dkg_finals.get(round) else {
                return Err(StateMismatch::DkgFinals);
            };
            if per_proposer.len() != other_per_proposer.len() {
                return Err(StateMismatch::DkgFinals);
            }
            for (proposer, fin) in per_proposer {
                if other_per_proposer.get(proposer) != Some(fin) {
                    return Err(StateMismatch::DkgFinals);
                }
            }
        }

        if self.crs != other.crs {
            return Err(StateMismatch::Crs);
        }
        Ok(())
    }
}

/// The governance state of a full node.
///
/// Constructed once at genesis and mutated exclusively through
/// [`request_change`](Self::request_change) (local mode) or
/// [`apply`](Self::apply) (replicated batches). All accessors return deep
/// copies or value types; no internal storage is ever exposed.
pub struct GovernanceState {
    /// Local mode applies requests immediately instead of buffering them.
    local: bool,
    /// Authoritative state. Write-locked only by the applier.
    core: RwLock<StateCore>,
    /// Pending buffer for replicated mode.
    pending: Mutex<PendingChanges>,
}

impl GovernanceState {
    /// Construct the genesis state.
    ///
    /// Every sizing parameter starts at the node count; latency-derived
    /// parameters are multiples of `lambda`. The CRS chain starts with the
    /// fixed genesis CRS at round 0.
    pub fn new(node_pub_keys: &[PublicKey], lambda: Duration, local: bool) -> Self {
        let nodes: HashMap<NodeId, PublicKey> = node_pub_keys
            .iter()
            .map(|key| (NodeId::from_public_key(key), *key))
            .collect();
        let node_count = nodes.len() as u32;

        let core = StateCore {
            num_chains: node_count,
            lambda_ba: lambda,
            lambda_dkg: lambda * 10,
            k: 0,
            phi_ratio: 0.667,
            notary_set_size: node_count,
            dkg_set_size: node_count,
            round_interval: lambda * 10000,
            min_block_interval: Duration::from_millis(1),
            max_block_interval: lambda * 8,
            nodes,
            dkg_complaints: HashMap::new(),
            dkg_master_public_keys: HashMap::new(),
            dkg_finals: HashMap::new(),
            crs: vec![Hash::from_bytes(GENESIS_CRS_SEED)],
        };

        Self {
            local,
            core: RwLock::new(core),
            pending: Mutex::new(PendingChanges::default()),
        }
    }

    /// Submit a single state change request.
    ///
    /// The request is validated against the current state either way. In
    /// local mode it is then applied immediately; in replicated mode it is
    /// parked in the pending buffer for the next
    /// [`pack_requests`](Self::pack_requests).
    pub fn request_change(&self, change: StateChange) -> Result<(), StateError> {
        if self.local {
            let mut core = self.core.write().expect("RwLock poisoned");
            Self::validated(&core, &change)?;
            return core.apply_one(change);
        }

        // Validate under the read lock, then release it before touching the
        // pending buffer: pack_requests holds pending-then-state, so this
        // path must never hold state-then-pending.
        {
            let core = self.core.read().expect("RwLock poisoned");
            Self::validated(&core, &change)?;
        }
        self.pending.lock().expect("Mutex poisoned").push(change);
        Ok(())
    }

    fn validated(core: &StateCore, change: &StateChange) -> Result<(), StateError> {
        core.validate(change).map_err(|err| {
            debug!(%err, change_type = %change.change_type(), "rejected state change request");
            err
        })
    }

    /// Submit a CRS for a specific round.
    pub fn propose_crs(&self, round: u64, crs: Hash) -> Result<(), StateError> {
        self.request_change(StateChange::AddCrs(CrsAddition { round, crs }))
    }

    /// Apply a committed request batch.
    ///
    /// The whole batch is applied under one write lock, so readers observe
    /// either none or all of it. An error aborts the remainder of the batch
    /// but keeps the changes already applied; callers are expected to only
    /// feed batches that were validated at pack time.
    pub fn apply(&self, batch: &[u8]) -> Result<(), StateError> {
        let changes = decode_batch(batch)?;
        let mut core = self.core.write().expect("RwLock poisoned");
        debug!(requests = changes.len(), "applying state change batch");
        for change in changes {
            if let Err(err) = core.apply_one(change) {
                warn!(%err, "state change batch aborted mid-application");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Serialize the pending requests into a block payload.
    ///
    /// Coalesced config changes are drained; the node/DKG/CRS buffers are
    /// packed but deliberately **not** cleared, since their lifetime is tied
    /// to confirmation of the block that carries them. Callers that need
    /// deterministic drainage use [`reset_pending`](Self::reset_pending)
    /// once that confirmation arrives.
    pub fn pack_requests(&self) -> Result<Vec<u8>, StateError> {
        // The one site holding both locks, in the canonical order.
        let mut pending = self.pending.lock().expect("Mutex poisoned");
        let mut packed = pending.drain_configs();

        // Hold the state read lock while packing the stateful requests so
        // they are serialized against a stable view.
        let _core = self.core.read().expect("RwLock poisoned");
        packed.extend(pending.non_config_changes());
        debug!(requests = packed.len(), "packed pending state changes");
        encode_batch(&packed)
    }

    /// Clear every pending buffer.
    pub fn reset_pending(&self) {
        self.pending.lock().expect("Mutex poisoned").reset();
    }

    /// The current configuration and the registered public keys.
    ///
    /// The key slice is unordered; both returns are copies the caller owns.
    pub fn snapshot(&self) -> (GovernanceConfig, Vec<PublicKey>) {
        let core = self.core.read().expect("RwLock poisoned");
        let keys = core.nodes.values().copied().collect();
        (core.snapshot_config(), keys)
    }

    /// The CRS for `round`, or the zero hash if that round has none yet.
    pub fn crs(&self, round: u64) -> Hash {
        let core = self.core.read().expect("RwLock poisoned");
        core.crs
            .get(round as usize)
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    /// All complaints received for `round`, flattened across proposers.
    /// Deep copies; callers may mutate freely.
    pub fn dkg_complaints(&self, round: u64) -> Vec<DkgComplaint> {
        let core = self.core.read().expect("RwLock poisoned");
        let Some(per_proposer) = core.dkg_complaints.get(&round) else {
            return Vec::new();
        };
        per_proposer
            .values()
            .flat_map(|comps| comps.iter().map(clone_dkg_complaint))
            .collect()
    }

    /// All master public keys received for `round`. Deep copies.
    pub fn dkg_master_public_keys(&self, round: u64) -> Vec<DkgMasterPublicKey> {
        let core = self.core.read().expect("RwLock poisoned");
        let Some(per_proposer) = core.dkg_master_public_keys.get(&round) else {
            return Vec::new();
        };
        per_proposer
            .values()
            .map(clone_dkg_master_public_key)
            .collect()
    }

    /// Whether strictly more than `threshold` proposers have finalized
    /// `round`.
    pub fn is_dkg_final(&self, round: u64, threshold: usize) -> bool {
        let core = self.core.read().expect("RwLock poisoned");
        core.dkg_finals
            .get(&round)
            .map_or(0, |finals| finals.len())
            > threshold
    }

    /// Structural comparison, reporting the first diverging sub-state.
    ///
    /// Comparison order: config, local flag, node set, DKG complaints,
    /// master public keys, finalizations, CRS chain, then the pending
    /// buffers.
    ///
    /// Locks both instances, ordering them by address so that concurrent
    /// comparisons in opposite directions (`a.equal(&b)` racing
    /// `b.equal(&a)`) acquire the two pending locks in the same global
    /// order and cannot deadlock. Within each instance the order stays
    /// pending before state.
    pub fn equal(&self, other: &GovernanceState) -> Result<(), StateMismatch> {
        if std::ptr::eq(self, other) {
            return Ok(());
        }
        let (first, second) = if (self as *const GovernanceState as usize)
            < (other as *const GovernanceState as usize)
        {
            (self, other)
        } else {
            (other, self)
        };
        let first_pending = first.pending.lock().expect("Mutex poisoned");
        let second_pending = second.pending.lock().expect("Mutex poisoned");
        let first_core = first.core.read().expect("RwLock poisoned");
        let second_core = second.core.read().expect("RwLock poisoned");

        // Every sub-comparison is symmetric, so first/second need not map
        // back to self/other.
        first_core.config_equal(&second_core)?;
        if self.local != other.local {
            return Err(StateMismatch::LocalFlag);
        }
        first_core.tables_equal(&second_core)?;
        first_pending.equal(&second_pending)
    }
}

impl Clone for GovernanceState {
    /// Deep copy sharing no mutable state with `self`.
    fn clone(&self) -> Self {
        let pending = self.pending.lock().expect("Mutex poisoned");
        let core = self.core.read().expect("RwLock poisoned");
        Self {
            local: self.local,
            core: RwLock::new(core.deep_clone()),
            pending: Mutex::new(pending.deep_clone()),
        }
    }
}
