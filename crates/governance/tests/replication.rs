//! End-to-end replication scenarios.
//!
//! Exercises the pack/apply protocol across multiple governance states the
//! way the surrounding consensus would: one node accumulates requests in
//! replicated mode, packs them into a block payload, and every node applies
//! the identical bytes.

use std::time::Duration;
use tessera_governance::{
    decode_batch, GovernanceState, StateChange, StateError, StateMismatch,
};
use tessera_types::{
    DkgComplaint, DkgFinalize, DkgMasterPublicKey, Hash, KeyPair, NodeId, PublicKey,
};

const LAMBDA: Duration = Duration::from_millis(100);

fn make_keys(count: u8) -> Vec<PublicKey> {
    (1..=count)
        .map(|i| KeyPair::from_seed(&[i; 32]).public_key())
        .collect()
}

fn replicated_pair() -> (GovernanceState, GovernanceState) {
    let keys = make_keys(4);
    (
        GovernanceState::new(&keys, LAMBDA, false),
        GovernanceState::new(&keys, LAMBDA, false),
    )
}

fn node(seed: u8) -> NodeId {
    NodeId([seed; 32])
}

#[test]
fn config_changes_coalesce_across_pack() {
    let (a, b) = replicated_pair();

    a.request_change(StateChange::ChangeNumChains(5)).unwrap();
    a.request_change(StateChange::ChangeNumChains(7)).unwrap();

    let batch = a.pack_requests().unwrap();

    // Exactly one ChangeNumChains survives, carrying the last value.
    let decoded = decode_batch(&batch).unwrap();
    assert_eq!(decoded, vec![StateChange::ChangeNumChains(7)]);

    b.apply(&batch).unwrap();
    assert_eq!(b.snapshot().0.num_chains, 7);
}

#[test]
fn phi_ratio_replicates_bit_exactly() {
    let (a, b) = replicated_pair();

    a.request_change(StateChange::ChangePhiRatio(0.333)).unwrap();
    let batch = a.pack_requests().unwrap();
    b.apply(&batch).unwrap();

    assert_eq!(b.snapshot().0.phi_ratio.to_bits(), 0.333f32.to_bits());
}

#[test]
fn duration_parameters_replicate_exactly() {
    let (a, b) = replicated_pair();

    a.request_change(StateChange::ChangeLambdaBa(Duration::from_micros(12_345)))
        .unwrap();
    a.request_change(StateChange::ChangeRoundInterval(Duration::from_secs(90)))
        .unwrap();
    a.request_change(StateChange::ChangeK(-3)).unwrap();

    let batch = a.pack_requests().unwrap();
    b.apply(&batch).unwrap();

    let (config, _) = b.snapshot();
    assert_eq!(config.lambda_ba, Duration::from_micros(12_345));
    assert_eq!(config.round_interval, Duration::from_secs(90));
    assert_eq!(config.k, -3);
}

#[test]
fn packed_batch_converges_producer_and_replica() {
    let (a, b) = replicated_pair();
    let new_key = KeyPair::from_seed(&[99; 32]).public_key();

    // A mixed workload: config changes, DKG records, a CRS, a node.
    a.request_change(StateChange::ChangeNumChains(8)).unwrap();
    a.request_change(StateChange::ChangeDkgSetSize(6)).unwrap();
    a.request_change(StateChange::AddDkgComplaint(DkgComplaint {
        proposer: node(1),
        round: 0,
        private_share: vec![0xEE],
    }))
    .unwrap();
    a.request_change(StateChange::AddDkgMasterPublicKey(DkgMasterPublicKey {
        proposer: node(2),
        round: 0,
        public_key_shares: vec![0xDD],
    }))
    .unwrap();
    a.request_change(StateChange::AddDkgFinal(DkgFinalize {
        proposer: node(3),
        round: 0,
    }))
    .unwrap();
    a.propose_crs(1, Hash::from_bytes(b"round 1")).unwrap();
    a.request_change(StateChange::add_node(&new_key)).unwrap();

    let batch = a.pack_requests().unwrap();

    // Both the producer and the replica ingest the committed batch.
    a.apply(&batch).unwrap();
    b.apply(&batch).unwrap();

    // The authoritative states match; only the producer's pending buffers
    // still hold the non-config requests (pack does not drain them). The
    // first such buffer to diverge is the pending nodes.
    assert_eq!(a.equal(&b), Err(StateMismatch::PendingNodes));

    a.reset_pending();
    assert_eq!(a.equal(&b), Ok(()));
    assert_eq!(b.equal(&a), Ok(()));

    // Spot-check the converged state.
    let (config, keys) = b.snapshot();
    assert_eq!(config.num_chains, 8);
    assert_eq!(config.dkg_set_size, 6);
    assert!(keys.contains(&new_key));
    assert_eq!(b.crs(1), Hash::from_bytes(b"round 1"));
    assert_eq!(b.dkg_complaints(0).len(), 1);
    assert_eq!(b.dkg_master_public_keys(0).len(), 1);
    assert!(b.is_dkg_final(0, 0));
}

#[test]
fn pack_drains_configs_but_not_stateful_buffers() {
    let (a, _) = replicated_pair();

    a.request_change(StateChange::ChangeNumChains(5)).unwrap();
    a.request_change(StateChange::AddDkgComplaint(DkgComplaint {
        proposer: node(1),
        round: 0,
        private_share: vec![1],
    }))
    .unwrap();

    let first = decode_batch(&a.pack_requests().unwrap()).unwrap();
    assert_eq!(first.len(), 2);

    // Packing again: the config change is gone, the complaint is repeated.
    let second = decode_batch(&a.pack_requests().unwrap()).unwrap();
    assert_eq!(second.len(), 1);
    assert!(matches!(second[0], StateChange::AddDkgComplaint(_)));

    // After an explicit reset nothing is left to pack.
    a.reset_pending();
    let third = decode_batch(&a.pack_requests().unwrap()).unwrap();
    assert!(third.is_empty());
}

#[test]
fn identical_pending_state_packs_identical_bytes() {
    let (a, b) = replicated_pair();

    // Insert the same config changes in different orders.
    a.request_change(StateChange::ChangeDkgSetSize(6)).unwrap();
    a.request_change(StateChange::ChangeNumChains(8)).unwrap();
    b.request_change(StateChange::ChangeNumChains(8)).unwrap();
    b.request_change(StateChange::ChangeDkgSetSize(6)).unwrap();

    assert_eq!(a.pack_requests().unwrap(), b.pack_requests().unwrap());
}

#[test]
fn replicated_crs_validation_tracks_applied_state() {
    let (a, b) = replicated_pair();
    let h1 = Hash::from_bytes(b"round 1");

    a.propose_crs(1, h1).unwrap();
    let batch = a.pack_requests().unwrap();
    a.apply(&batch).unwrap();
    b.apply(&batch).unwrap();

    // Round 1 now exists everywhere; re-proposing it is rejected against the
    // applied state, and skipping ahead still fails.
    assert_eq!(a.propose_crs(1, h1), Err(StateError::DuplicatedChange));
    assert_eq!(
        b.propose_crs(1, Hash::from_bytes(b"fork")),
        Err(StateError::ForkedCrs)
    );
    assert_eq!(
        b.propose_crs(3, Hash::from_bytes(b"round 3")),
        Err(StateError::MissingPreviousCrs)
    );
    assert_eq!(b.propose_crs(2, Hash::from_bytes(b"round 2")), Ok(()));
}

#[test]
fn stale_crs_addition_is_rejected_at_apply_time() {
    let (a, b) = replicated_pair();
    let h1 = Hash::from_bytes(b"round 1");

    // Two nodes each pack a valid CRS addition for round 1.
    a.propose_crs(1, h1).unwrap();
    b.propose_crs(1, h1).unwrap();
    let batch_a = a.pack_requests().unwrap();
    let batch_b = b.pack_requests().unwrap();

    let observer = GovernanceState::new(&make_keys(4), LAMBDA, false);
    observer.apply(&batch_a).unwrap();

    // The second batch carries a round that is no longer next.
    assert_eq!(observer.apply(&batch_b), Err(StateError::DuplicatedChange));
    assert_eq!(observer.crs(1), h1);
    assert_eq!(observer.crs(2), Hash::ZERO);
}

#[test]
fn clone_of_replicated_state_carries_pending_buffers() {
    let (a, _) = replicated_pair();

    a.request_change(StateChange::ChangeNumChains(9)).unwrap();
    a.request_change(StateChange::AddDkgFinal(DkgFinalize {
        proposer: node(1),
        round: 0,
    }))
    .unwrap();

    let copied = a.clone();
    assert_eq!(copied.equal(&a), Ok(()));

    // The copy packs the same batch the original would.
    assert_eq!(
        copied.pack_requests().unwrap(),
        a.pack_requests().unwrap()
    );

    // And the copy's buffers are independent of the original's.
    a.reset_pending();
    let from_copy = decode_batch(&copied.pack_requests().unwrap()).unwrap();
    assert_eq!(from_copy.len(), 1);
    assert!(decode_batch(&a.pack_requests().unwrap()).unwrap().is_empty());
}
