//! The sync RPC surface: what a [`crate::sync::SyncCoordinator`]
//! calls against a remote peer. Consumed as an abstract service — this
//! crate never assumes a concrete wire transport or codec; a real
//! implementation would sit on top of whatever transport is available and
//! likely serialize with the same `rkyv` encoding `quill_core`'s
//! `SledDriver` already uses for storage.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use quill_core::{Document, ShareId};

use crate::peer::Peer;

/// One partner's sync RPC surface, as seen by a local [`crate::sync::SyncCoordinator`].
#[async_trait]
pub trait Syncer: Send + Sync {
    /// The blake3 hash of `salt || share` for every share this side holds
    /// — a privacy-preserving commitment a coordinator uses to discover
    /// shares in common without either side listing shares the other
    /// doesn't already know about.
    async fn salted_handshake(&self, salt: [u8; 32]) -> Result<HashSet<[u8; 32]>>;

    /// The highest `_localIndex` this side has stored for `share`, or
    /// `None` if it doesn't hold `share` at all.
    async fn get_share_state(&self, share: &ShareId) -> Result<Option<u64>>;

    /// Up to `limit` documents for `share` with `_localIndex >= from_index`,
    /// ordered by `_localIndex` ascending. `from_index` is a cursor naming
    /// the next index the caller hasn't pulled yet, not the last index it
    /// has — a caller holding up through index `N` passes `N + 1`, which is
    /// exactly what [`crate::sync::SyncCoordinator`] tracks as `pulled`.
    async fn get_docs(&self, share: &ShareId, from_index: u64, limit: usize) -> Result<Vec<Document>>;
}

pub(crate) fn hash_share(salt: &[u8; 32], share: &ShareId) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(share.as_str().as_bytes());
    *hasher.finalize().as_bytes()
}

/// A [`Syncer`] backed directly by a local [`Peer`], with no transport at
/// all — same-process convergence tests drive two [`Peer`]s against each
/// other's [`LoopbackSyncer`].
pub struct LoopbackSyncer {
    peer: Peer,
}

impl LoopbackSyncer {
    /// Serves `peer`'s shares directly to whatever coordinator holds this syncer.
    pub fn new(peer: Peer) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl Syncer for LoopbackSyncer {
    async fn salted_handshake(&self, salt: [u8; 32]) -> Result<HashSet<[u8; 32]>> {
        Ok(self
            .peer
            .shares()
            .iter()
            .map(|share| hash_share(&salt, share))
            .collect())
    }

    async fn get_share_state(&self, share: &ShareId) -> Result<Option<u64>> {
        Ok(self.peer.bowl(share).map(|bowl| bowl.highest_local_index()))
    }

    async fn get_docs(&self, share: &ShareId, from_index: u64, limit: usize) -> Result<Vec<Document>> {
        Ok(self
            .peer
            .bowl(share)
            .map(|bowl| bowl.documents_from(from_index, limit))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{BowlConfig, DefaultValidator, Ed25519Verifier, MemoryDriver};

    #[async_std::test]
    async fn handshake_hashes_every_held_share() {
        let peer = Peer::new();
        let share: ShareId = "+gardening.friends123".parse().unwrap();
        let bowl = test_bowl();
        peer.add_share(share.clone(), bowl);
        let syncer = LoopbackSyncer::new(peer);
        let hashes = syncer.salted_handshake([7u8; 32]).await.unwrap();
        assert_eq!(hashes, [hash_share(&[7u8; 32], &share)].into_iter().collect());
    }

    fn test_bowl() -> quill_core::Bowl {
        quill_core::Bowl::new(MemoryDriver::new(), DefaultValidator::new(Ed25519Verifier), BowlConfig::default()).unwrap()
    }
}
