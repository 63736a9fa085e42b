//! A peer: the local registry of bowls, keyed by share.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use quill_core::{Bowl, ShareId};

/// A cheaply-clonable handle to one local peer's registered shares.
#[derive(Clone, Default)]
pub struct Peer {
    bowls: Arc<Mutex<HashMap<ShareId, Bowl>>>,
}

impl Peer {
    /// An empty peer, serving no shares yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the bowl serving `share`.
    pub fn add_share(&self, share: ShareId, bowl: Bowl) {
        self.bowls.lock().insert(share, bowl);
    }

    /// Unregisters `share`, returning its bowl if it was present.
    pub fn remove_share(&self, share: &ShareId) -> Option<Bowl> {
        self.bowls.lock().remove(share)
    }

    /// The bowl serving `share`, if this peer holds it.
    pub fn bowl(&self, share: &ShareId) -> Option<Bowl> {
        self.bowls.lock().get(share).cloned()
    }

    /// Every share this peer currently serves, in unspecified order.
    pub fn shares(&self) -> Vec<ShareId> {
        self.bowls.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{BowlConfig, DefaultValidator, Ed25519Verifier, MemoryDriver};

    #[test]
    fn registers_and_looks_up_shares() {
        let peer = Peer::new();
        let share: ShareId = "+gardening.friends123".parse().unwrap();
        let bowl = Bowl::new(MemoryDriver::new(), DefaultValidator::new(Ed25519Verifier), BowlConfig::default()).unwrap();
        peer.add_share(share.clone(), bowl);
        assert_eq!(peer.shares(), vec![share.clone()]);
        assert!(peer.bowl(&share).is_some());
        assert!(peer.remove_share(&share).is_some());
        assert!(peer.bowl(&share).is_none());
    }
}
