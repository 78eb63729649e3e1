//! Deep copies of DKG records via canonical codec round-trips.
//!
//! Round-tripping through the codec guarantees the copy shares no storage
//! with the source regardless of how the record is laid out internally. A
//! codec failure here means a record that previously decoded successfully no
//! longer encodes, which indicates corruption; that is a panic, not an error.

use tessera_types::{DkgComplaint, DkgFinalize, DkgMasterPublicKey};

pub(crate) fn clone_dkg_complaint(comp: &DkgComplaint) -> DkgComplaint {
    let bytes = sbor::basic_encode(comp).expect("complaint must re-encode");
    sbor::basic_decode(&bytes).expect("complaint must re-decode")
}

pub(crate) fn clone_dkg_master_public_key(mpk: &DkgMasterPublicKey) -> DkgMasterPublicKey {
    let bytes = sbor::basic_encode(mpk).expect("master public key must re-encode");
    sbor::basic_decode(&bytes).expect("master public key must re-decode")
}

pub(crate) fn clone_dkg_finalize(fin: &DkgFinalize) -> DkgFinalize {
    let bytes = sbor::basic_encode(fin).expect("finalization must re-encode");
    sbor::basic_decode(&bytes).expect("finalization must re-decode")
}
