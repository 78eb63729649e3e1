//! Pending buffer for not-yet-broadcast change requests.
//!
//! In replicated mode, validated requests accumulate here until
//! `pack_requests` serializes them into a block payload. Config changes are
//! coalesced per type (last writer wins); everything else is an ordered
//! sequence.

use std::collections::BTreeMap;
use tessera_types::{DkgComplaint, DkgFinalize, DkgMasterPublicKey};

use crate::clone::{clone_dkg_complaint, clone_dkg_finalize, clone_dkg_master_public_key};
use crate::error::StateMismatch;
use crate::request::{CrsAddition, StateChange, StateChangeType};

/// Locally accumulated change requests awaiting broadcast.
///
/// Packing consumes `configs` but leaves the other buffers untouched; they
/// are cleared by the caller (via [`crate::GovernanceState::reset_pending`])
/// once the block carrying them is confirmed.
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    /// Coalesced config changes, keyed by type so each type appears at most
    /// once. A `BTreeMap` so packing drains in ordinal order and identical
    /// pending state packs to identical bytes on every replica.
    pub configs: BTreeMap<StateChangeType, StateChange>,
    /// Serialized public keys of nodes awaiting registration.
    pub nodes: Vec<Vec<u8>>,
    /// DKG complaints in submission order.
    pub complaints: Vec<DkgComplaint>,
    /// DKG finalizations in submission order.
    pub finals: Vec<DkgFinalize>,
    /// DKG master public keys in submission order.
    pub master_public_keys: Vec<DkgMasterPublicKey>,
    /// CRS additions in submission order.
    pub crs: Vec<CrsAddition>,
}

impl PendingChanges {
    /// File a validated change into the matching buffer.
    pub fn push(&mut self, change: StateChange) {
        match change {
            StateChange::AddNode(bytes) => self.nodes.push(bytes),
            StateChange::AddCrs(req) => self.crs.push(req),
            StateChange::AddDkgComplaint(comp) => self.complaints.push(comp),
            StateChange::AddDkgMasterPublicKey(mpk) => self.master_public_keys.push(mpk),
            StateChange::AddDkgFinal(fin) => self.finals.push(fin),
            config => {
                self.configs.insert(config.change_type(), config);
            }
        }
    }

    /// Drain the coalesced config changes, in ordinal order.
    pub fn drain_configs(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.configs).into_values().collect()
    }

    /// The non-config buffers as a request sequence, in pack order. Does not
    /// consume anything.
    pub fn non_config_changes(&self) -> Vec<StateChange> {
        let mut changes = Vec::with_capacity(
            self.nodes.len()
                + self.complaints.len()
                + self.finals.len()
                + self.master_public_keys.len()
                + self.crs.len(),
        );
        changes.extend(self.nodes.iter().cloned().map(StateChange::AddNode));
        changes.extend(
            self.complaints
                .iter()
                .cloned()
                .map(StateChange::AddDkgComplaint),
        );
        changes.extend(self.finals.iter().cloned().map(StateChange::AddDkgFinal));
        changes.extend(
            self.master_public_keys
                .iter()
                .cloned()
                .map(StateChange::AddDkgMasterPublicKey),
        );
        changes.extend(self.crs.iter().copied().map(StateChange::AddCrs));
        changes
    }

    /// Clear every buffer.
    pub fn reset(&mut self) {
        self.configs.clear();
        self.nodes.clear();
        self.complaints.clear();
        self.finals.clear();
        self.master_public_keys.clear();
        self.crs.clear();
    }

    /// Deep copy sharing no storage with `self`. DKG records are copied by
    /// codec round-trip, everything else element-wise.
    pub fn deep_clone(&self) -> PendingChanges {
        PendingChanges {
            configs: self.configs.clone(),
            nodes: self.nodes.clone(),
            complaints: self.complaints.iter().map(clone_dkg_complaint).collect(),
            finals: self.finals.iter().map(clone_dkg_finalize).collect(),
            master_public_keys: self
                .master_public_keys
                .iter()
                .map(clone_dkg_master_public_key)
                .collect(),
            crs: self.crs.clone(),
        }
    }

    /// Structural comparison against another pending buffer, reporting the
    /// first diverging sub-buffer.
    pub fn equal(&self, other: &PendingChanges) -> Result<(), StateMismatch> {
        if self.configs != other.configs {
            return Err(StateMismatch::PendingConfigs);
        }
        if self.nodes != other.nodes {
            return Err(StateMismatch::PendingNodes);
        }
        if self.complaints != other.complaints {
            return Err(StateMismatch::PendingDkgComplaints);
        }
        if self.finals != other.finals {
            return Err(StateMismatch::PendingDkgFinals);
        }
        if self.master_public_keys != other.master_public_keys {
            return Err(StateMismatch::PendingDkgMasterPublicKeys);
        }
        if self.crs != other.crs {
            return Err(StateMismatch::PendingCrs);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::{Hash, NodeId};

    fn node(seed: u8) -> NodeId {
        NodeId([seed; 32])
    }

    #[test]
    fn test_configs_coalesce_per_type() {
        let mut pending = PendingChanges::default();
        pending.push(StateChange::ChangeNumChains(5));
        pending.push(StateChange::ChangeNotarySetSize(9));
        pending.push(StateChange::ChangeNumChains(7));

        let drained = pending.drain_configs();
        assert_eq!(
            drained,
            vec![
                StateChange::ChangeNumChains(7),
                StateChange::ChangeNotarySetSize(9),
            ]
        );
        assert!(pending.configs.is_empty());
    }

    #[test]
    fn test_drain_order_follows_ordinals() {
        let mut pending = PendingChanges::default();
        pending.push(StateChange::ChangeDkgSetSize(1));
        pending.push(StateChange::ChangeNumChains(2));
        pending.push(StateChange::ChangeK(3));

        let types: Vec<_> = pending
            .drain_configs()
            .iter()
            .map(|c| c.change_type())
            .collect();
        assert_eq!(
            types,
            vec![
                StateChangeType::ChangeNumChains,
                StateChangeType::ChangeK,
                StateChangeType::ChangeDkgSetSize,
            ]
        );
    }

    #[test]
    fn test_non_config_changes_preserve_insertion_order() {
        let mut pending = PendingChanges::default();
        pending.push(StateChange::AddDkgComplaint(DkgComplaint {
            proposer: node(1),
            round: 0,
            private_share: vec![1],
        }));
        pending.push(StateChange::AddDkgComplaint(DkgComplaint {
            proposer: node(1),
            round: 0,
            private_share: vec![2],
        }));
        pending.push(StateChange::AddCrs(CrsAddition {
            round: 1,
            crs: Hash::from_bytes(b"crs"),
        }));

        let changes = pending.non_config_changes();
        assert_eq!(changes.len(), 3);
        // Complaints come before CRS additions, each in insertion order.
        match (&changes[0], &changes[1], &changes[2]) {
            (
                StateChange::AddDkgComplaint(a),
                StateChange::AddDkgComplaint(b),
                StateChange::AddCrs(_),
            ) => {
                assert_eq!(a.private_share, vec![1]);
                assert_eq!(b.private_share, vec![2]);
            }
            other => panic!("unexpected pack order: {:?}", other),
        }
        // Not consumed.
        assert_eq!(pending.complaints.len(), 2);
        assert_eq!(pending.crs.len(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut pending = PendingChanges::default();
        pending.push(StateChange::ChangeNumChains(5));
        pending.push(StateChange::AddNode(vec![0u8; 32]));
        pending.push(StateChange::AddDkgFinal(DkgFinalize {
            proposer: node(1),
            round: 0,
        }));

        pending.reset();
        assert!(pending.configs.is_empty());
        assert!(pending.nodes.is_empty());
        assert!(pending.finals.is_empty());
        assert!(pending.non_config_changes().is_empty());
    }

    #[test]
    fn test_equal_reports_diverging_buffer() {
        let mut a = PendingChanges::default();
        let b = PendingChanges::default();
        assert_eq!(a.equal(&b), Ok(()));

        a.push(StateChange::ChangeNumChains(5));
        assert_eq!(a.equal(&b), Err(StateMismatch::PendingConfigs));

        a.reset();
        a.push(StateChange::AddNode(vec![1u8; 32]));
        assert_eq!(a.equal(&b), Err(StateMismatch::PendingNodes));
    }
}
