//! Tunables for the bowl and its satellites.

use std::time::Duration;

/// Configures a [`crate::bowl::Bowl`].
#[derive(Clone, Debug)]
pub struct BowlConfig {
    /// How often the background expiry sweep runs, beyond the one that
    /// always happens at construction. Default one hour.
    pub sweep_interval: Duration,
}

impl Default for BowlConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

/// Configures an async follower's batching.
#[derive(Clone, Copy, Debug)]
pub struct AsyncFollowerConfig {
    /// Documents delivered per batch before yielding. Default 40.
    pub batch_size: usize,
}

impl Default for AsyncFollowerConfig {
    fn default() -> Self {
        Self { batch_size: 40 }
    }
}

/// Configures a [`crate::cache::ReplicaCache`].
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    /// How long an entry remains valid after computation, independent of
    /// the version counter. Default effectively unbounded —
    /// invalidation in practice is driven by the version counter, not TTL.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: Duration::MAX }
    }
}
