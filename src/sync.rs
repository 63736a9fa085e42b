//! Convergence between two peers over one share at a time.
//!
//! A [`SyncCoordinator`] discovers the shares it has in common with a
//! partner through a salted-hash handshake, then drives one
//! [`SyncSession`] per common share, pulling batches of documents until
//! each side has caught the other up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quill_core::ShareId;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::peer::Peer;
use crate::rpc::{hash_share, Syncer};

/// One share's progress against one partner.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncStatus {
    /// The highest partner-reported `_localIndex` observed so far for this
    /// share. Monotonic: a partner that regresses doesn't move it backward.
    pub partner_max_local_index_so_far: u64,
    /// The next `_localIndex` this session will request.
    pub pulled: u64,
    /// True once a poll returned fewer than `batchLimit` documents and
    /// `pulled` has caught up to `partnerMaxLocalIndexSoFar`.
    pub caught_up: bool,
}

/// Coordinates convergence with one partner across every share in common.
pub struct SyncCoordinator {
    local: Peer,
    partner: Arc<dyn Syncer>,
    config: SyncConfig,
    sessions: parking_lot::Mutex<HashMap<ShareId, SyncStatus>>,
    closed: AtomicBool,
}

impl SyncCoordinator {
    /// Coordinates `local`'s convergence against `partner` over every share
    /// they turn out to hold in common.
    pub fn new(local: Peer, partner: Arc<dyn Syncer>, config: SyncConfig) -> Self {
        Self {
            local,
            partner,
            config,
            sessions: parking_lot::Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Finds the shares both sides hold, without either side revealing
    /// shares the other doesn't already know about.
    pub async fn discover_common_shares(&self) -> Result<Vec<ShareId>> {
        let mut salt = [0u8; 32];
        getrandom::getrandom(&mut salt).map_err(|e| Error::Network(anyhow::anyhow!(e)))?;
        let partner_hashes = self.partner.salted_handshake(salt).await?;
        Ok(self
            .local
            .shares()
            .into_iter()
            .filter(|share| partner_hashes.contains(&hash_share(&salt, share)))
            .collect())
    }

    /// The current status of every share this coordinator has polled at
    /// least once.
    pub fn status(&self) -> HashMap<ShareId, SyncStatus> {
        self.sessions.lock().clone()
    }

    /// Polls every common share once, pulling at most `batchLimit`
    /// documents per share this round.
    pub async fn sync_all(&self) -> Result<HashMap<ShareId, SyncStatus>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        let mut statuses = HashMap::new();
        for share in self.discover_common_shares().await? {
            let status = self.sync_share(&share).await?;
            statuses.insert(share, status);
        }
        Ok(statuses)
    }

    /// Polls `share` once: asks the partner's current state, pulls one
    /// batch if behind, and upserts every document pulled into the local
    /// bowl.
    #[tracing::instrument(skip(self), fields(share = %share))]
    pub async fn sync_share(&self, share: &ShareId) -> Result<SyncStatus> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        let bowl = self
            .local
            .bowl(share)
            .ok_or_else(|| Error::UnknownShare(share.clone()))?;

        let mut status = self
            .sessions
            .lock()
            .get(share)
            .copied()
            .unwrap_or_default();

        let partner_index = self.partner.get_share_state(share).await?.unwrap_or(0);
        status.partner_max_local_index_so_far = status.partner_max_local_index_so_far.max(partner_index);

        if status.pulled > status.partner_max_local_index_so_far {
            status.caught_up = true;
        } else {
            let batch = self
                .partner
                .get_docs(share, status.pulled, self.config.batch_limit)
                .await?;
            for doc in &batch {
                if let quill_core::UpsertResult::Invalid(err) = bowl.upsert(doc.clone())? {
                    tracing::warn!(share = %share, path = %doc.path, %err, "partner sent an invalid document");
                }
            }
            if let Some(last_index) = batch.last().and_then(|d| d.local_index) {
                status.pulled = last_index + 1;
            }
            status.caught_up = batch.len() < self.config.batch_limit
                && status.pulled > status.partner_max_local_index_so_far;
            tracing::debug!(pulled = batch.len(), caught_up = status.caught_up, "pulled batch");
        }

        self.sessions.lock().insert(share.clone(), status);
        Ok(status)
    }

    /// Polls `share` repeatedly until this session reports `caughtUp`.
    pub async fn sync_until_caught_up(&self, share: &ShareId) -> Result<SyncStatus> {
        loop {
            let status = self.sync_share(share).await?;
            if status.caught_up {
                return Ok(status);
            }
        }
    }

    /// Idempotent: a coordinator that's already closed stays closed, and
    /// every in-flight or future call observes [`Error::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
