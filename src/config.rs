//! Tunables for the sync layer.

use std::time::Duration;

/// Configures a [`crate::sync::SyncCoordinator`].
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// How often an owner should call `sync_all` on its own schedule; the
    /// coordinator itself doesn't spawn timers.
    pub poll_interval: Duration,
    /// Documents pulled per batch, per share, per round. Default 10.
    pub batch_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_limit: 10,
        }
    }
}
