//! A read-through memoizer over a bowl's closed query surface.
//!
//! Every entry is keyed by the operation and its arguments. A per-entry
//! TTL invalidates independently of the version. In addition, every
//! currently-held entry is recomputed and renotified the moment a write is
//! accepted: [`ReplicaCache::new`] registers a cache hook that runs inline,
//! with the bowl's lock already held, at the end of every accepted
//! `upsert` — so a consumer relying on `on_update` learns about a write
//! without having to poll a read first, and without this cache ever taking
//! out a second lock on the same bowl.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::bowl::{self, Bowl, BowlInner};
use crate::config::CacheConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::query::{OrderBy, Query};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
enum CacheKey {
    AllDocs,
    LatestDocs,
    AllDocsAtPath(String),
    LatestDocAtPath(String),
    Query(Query),
}

#[derive(Clone, Debug)]
enum CacheValue {
    Docs(Vec<Document>),
    Doc(Option<Document>),
}

fn compute_value_unlocked(inner: &BowlInner, key: &CacheKey) -> CacheValue {
    match key {
        CacheKey::AllDocs => CacheValue::Docs(bowl::all_docs_unlocked(inner)),
        CacheKey::LatestDocs => CacheValue::Docs(bowl::latest_docs_unlocked(inner)),
        CacheKey::AllDocsAtPath(path) => CacheValue::Docs(bowl::all_docs_at_path_unlocked(inner, path)),
        CacheKey::LatestDocAtPath(path) => CacheValue::Doc(bowl::latest_doc_at_path_unlocked(inner, path)),
        CacheKey::Query(query) => CacheValue::Docs(bowl::query_docs_unlocked(inner, query)),
    }
}

struct Entry {
    value: CacheValue,
    version: u64,
    computed_at: Instant,
}

/// Notified whenever an entry is (re)computed, naming the read call that
/// changed.
pub type UpdateListener = Box<dyn Fn() + Send>;

struct Shared {
    config: CacheConfig,
    entries: Mutex<HashMap<CacheKey, Entry>>,
    closed: Mutex<bool>,
    listeners: Mutex<Vec<UpdateListener>>,
}

impl Shared {
    fn fresh(&self, entry: &Entry, current_version: u64) -> bool {
        entry.version == current_version && entry.computed_at.elapsed() < self.config.ttl
    }

    fn notify(&self) {
        for listener in self.listeners.lock().iter() {
            listener();
        }
    }

    /// Recomputes every currently-held key against the bowl's already-locked
    /// state, firing one `on_update` notification per key refreshed. Called
    /// from the cache hook at the end of `upsert`, so it must stay cheap and
    /// must not call back into the bowl (its lock is already held).
    fn refresh_held_keys(&self, inner: &BowlInner) {
        if *self.closed.lock() {
            return;
        }
        let version = bowl::version_unlocked(inner);
        let keys: Vec<CacheKey> = self.entries.lock().keys().cloned().collect();
        for key in keys {
            let value = compute_value_unlocked(inner, &key);
            tracing::trace!(?key, version, "recomputed cache entry on write");
            self.entries.lock().insert(
                key,
                Entry {
                    value,
                    version,
                    computed_at: Instant::now(),
                },
            );
            self.notify();
        }
    }
}

/// A read-through cache in front of one [`Bowl`].
pub struct ReplicaCache {
    bowl: Bowl,
    shared: Arc<Shared>,
}

impl ReplicaCache {
    pub fn new(bowl: Bowl, config: CacheConfig) -> Self {
        let shared = Arc::new(Shared {
            config,
            entries: Mutex::new(HashMap::new()),
            closed: Mutex::new(false),
            listeners: Mutex::new(Vec::new()),
        });
        let hook_shared = shared.clone();
        bowl.register_cache_hook(Arc::new(move |inner: &BowlInner| {
            hook_shared.refresh_held_keys(inner);
        }));
        Self { bowl, shared }
    }

    /// Registers a callback invoked after any entry is refreshed.
    pub fn on_update(&self, listener: UpdateListener) {
        self.shared.listeners.lock().push(listener);
    }

    /// Stops serving reads; every subsequent call returns [`Error::Closed`].
    /// The write-time hook stays registered but becomes a no-op, since
    /// `refresh_held_keys` checks this same flag.
    pub fn close(&self) {
        *self.shared.closed.lock() = true;
    }

    fn get_or_compute(&self, key: CacheKey) -> Result<CacheValue> {
        if *self.shared.closed.lock() {
            return Err(Error::Closed);
        }
        let current_version = self.bowl.version();
        {
            let entries = self.shared.entries.lock();
            if let Some(entry) = entries.get(&key) {
                if self.shared.fresh(entry, current_version) {
                    return Ok(entry.value.clone());
                }
            }
        }
        let value = match &key {
            CacheKey::AllDocs => CacheValue::Docs(self.bowl.get_all_docs()),
            CacheKey::LatestDocs => CacheValue::Docs(self.bowl.get_latest_docs()),
            CacheKey::AllDocsAtPath(path) => CacheValue::Docs(self.bowl.get_all_docs_at_path(path)),
            CacheKey::LatestDocAtPath(path) => CacheValue::Doc(self.bowl.get_latest_doc_at_path(path)),
            CacheKey::Query(query) => CacheValue::Docs(self.bowl.query_docs(query.clone())),
        };
        tracing::trace!(?key, version = current_version, "recomputed cache entry");
        self.shared.entries.lock().insert(
            key,
            Entry {
                value: value.clone(),
                version: current_version,
                computed_at: Instant::now(),
            },
        );
        self.shared.notify();
        Ok(value)
    }

    pub fn get_all_docs(&self) -> Result<Vec<Document>> {
        match self.get_or_compute(CacheKey::AllDocs)? {
            CacheValue::Docs(docs) => Ok(docs),
            CacheValue::Doc(_) => unreachable!("AllDocs always computes Docs"),
        }
    }

    pub fn get_latest_docs(&self) -> Result<Vec<Document>> {
        match self.get_or_compute(CacheKey::LatestDocs)? {
            CacheValue::Docs(docs) => Ok(docs),
            CacheValue::Doc(_) => unreachable!("LatestDocs always computes Docs"),
        }
    }

    pub fn get_all_docs_at_path(&self, path: &str) -> Result<Vec<Document>> {
        let key = CacheKey::AllDocsAtPath(path.to_string());
        match self.get_or_compute(key)? {
            CacheValue::Docs(docs) => Ok(docs),
            CacheValue::Doc(_) => unreachable!("AllDocsAtPath always computes Docs"),
        }
    }

    pub fn get_latest_doc_at_path(&self, path: &str) -> Result<Option<Document>> {
        let key = CacheKey::LatestDocAtPath(path.to_string());
        match self.get_or_compute(key)? {
            CacheValue::Doc(doc) => Ok(doc),
            CacheValue::Docs(_) => unreachable!("LatestDocAtPath always computes Doc"),
        }
    }

    pub fn query_docs(&self, query: Query) -> Result<Vec<Document>> {
        let key = CacheKey::Query(query);
        match self.get_or_compute(key)? {
            CacheValue::Docs(docs) => Ok(docs),
            CacheValue::Doc(_) => unreachable!("Query always computes Docs"),
        }
    }

    pub fn query_paths(&self, query: Query, order_by: OrderBy) -> Result<Vec<String>> {
        Ok(crate::query::query_paths(&self.query_docs(query)?, order_by))
    }

    pub fn query_authors(&self, query: Query) -> Result<Vec<crate::id::AuthorId>> {
        Ok(crate::query::query_authors(&self.query_docs(query)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Crypto, Ed25519Verifier};
    use crate::document::WriteInput;
    use crate::driver::MemoryDriver;
    use crate::validator::DefaultValidator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[async_std::test]
    async fn cache_serves_stale_value_until_version_changes() {
        let validator = DefaultValidator::new(Ed25519Verifier);
        let bowl = Bowl::new(MemoryDriver::new(), validator, Default::default()).unwrap();
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        bowl.write(&crypto, WriteInput::new("/suzy/a", "x")).await.unwrap();

        let cache = ReplicaCache::new(bowl.clone(), CacheConfig::default());
        let first = cache.get_latest_docs().unwrap();
        assert_eq!(first.len(), 1);

        bowl.write(&crypto, WriteInput::new("/suzy/b", "y")).await.unwrap();
        let second = cache.get_latest_docs().unwrap();
        assert_eq!(second.len(), 2);
    }

    #[async_std::test]
    async fn cache_notifies_on_refresh() {
        let validator = DefaultValidator::new(Ed25519Verifier);
        let bowl = Bowl::new(MemoryDriver::new(), validator, Default::default()).unwrap();
        let cache = ReplicaCache::new(bowl, CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        cache.on_update(Box::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        cache.get_latest_docs().unwrap();
        cache.get_latest_docs().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[async_std::test]
    async fn write_pushes_a_notification_without_an_intervening_read() {
        let validator = DefaultValidator::new(Ed25519Verifier);
        let bowl = Bowl::new(MemoryDriver::new(), validator, Default::default()).unwrap();
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let cache = ReplicaCache::new(bowl.clone(), CacheConfig::default());
        cache.get_latest_docs().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        cache.on_update(Box::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));

        bowl.write(&crypto, WriteInput::new("/suzy/a", "x")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[async_std::test]
    async fn closed_cache_rejects_reads() {
        let validator = DefaultValidator::new(Ed25519Verifier);
        let bowl = Bowl::new(MemoryDriver::new(), validator, Default::default()).unwrap();
        let cache = ReplicaCache::new(bowl, CacheConfig::default());
        cache.close();
        assert!(matches!(cache.get_latest_docs(), Err(Error::Closed)));
    }
}
