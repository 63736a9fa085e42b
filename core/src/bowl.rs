//! The document bowl: the single mutual-exclusion domain around one
//! share's documents, its in-memory indexes, its write-event broadcast, and
//! its expiry sweep.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::{AsyncFollowerConfig, BowlConfig};
use crate::crypto::Crypto;
use crate::document::{Document, WriteInput};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::follower::{
    logging_error_handler, AsyncFollower, AsyncWaker, ErrorHandler, FollowerError, FollowerId,
    SyncFollower, SyncFollowerEntry, SyncFollowerHandle,
};
use crate::id::AuthorId;
use crate::query::{self, History, Query};
use crate::validator::Validator;

/// The outcome of accepting (or not) one document into a bowl.
#[derive(Debug)]
pub enum UpsertResult {
    /// Failed validation; never stored.
    Invalid(crate::validator::ValidationError),
    /// Lost the overwrite-order comparison against what's already
    /// stored at `(path, author)`; discarded.
    Obsolete,
    /// Bit-for-bit identical to what's already stored; a no-op.
    AlreadyHadIt,
    /// Accepted and stored, but a different author's document is still the
    /// latest one at this path.
    AcceptedButNotLatest(Document),
    /// Accepted and stored, and is now the latest document at this path
    /// across all authors.
    AcceptedAndLatest(Document),
}

impl UpsertResult {
    /// The stored document, if this upsert accepted one.
    pub fn accepted(&self) -> Option<&Document> {
        match self {
            UpsertResult::AcceptedButNotLatest(d) | UpsertResult::AcceptedAndLatest(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, UpsertResult::AcceptedAndLatest(_))
    }
}

/// Broadcast to every follower on acceptance.
#[derive(Debug, Clone)]
pub struct WriteEvent {
    pub doc: Document,
    pub is_latest: bool,
    pub previous_doc_same_author: Option<Document>,
    pub previous_latest_doc: Option<Document>,
}

fn same_content(a: &Document, b: &Document) -> bool {
    a.path == b.path
        && a.author == b.author
        && a.timestamp == b.timestamp
        && a.content == b.content
        && a.signature == b.signature
        && a.format == b.format
        && a.delete_after == b.delete_after
}

/// A hook invoked with the bowl's already-locked state at the end of every
/// accepted `upsert`, used by [`crate::cache::ReplicaCache`] to recompute its
/// held entries without taking out a second lock on the same bowl.
pub(crate) type CacheHook = Arc<dyn Fn(&BowlInner) + Send + Sync>;

pub(crate) struct BowlInner {
    driver: Box<dyn Driver>,
    validator: Box<dyn Validator>,
    config: BowlConfig,
    now: Box<dyn Fn() -> i64 + Send + Sync>,
    by_local_index: BTreeMap<u64, Document>,
    by_path_author: HashMap<(String, String), Document>,
    /// Per path, every author's current document, newest-first by
    /// overwrite order — the first entry is the path's latest.
    by_path: HashMap<String, Vec<Document>>,
    highest_local_index: u64,
    version: u64,
    sync_followers: Vec<SyncFollowerEntry>,
    next_follower_id: FollowerId,
    async_wakers: Vec<AsyncWaker>,
    cache_hooks: Vec<CacheHook>,
    last_sweep: Instant,
    closed: bool,
}

/// Every retained document at `path`, in unspecified order, with expired
/// documents filtered out regardless of whether they've been physically
/// swept yet.
pub(crate) fn all_docs_unlocked(inner: &BowlInner) -> Vec<Document> {
    let now = inner.now();
    inner.by_path_author.values().filter(|d| !d.is_expired(now)).cloned().collect()
}

pub(crate) fn latest_docs_unlocked(inner: &BowlInner) -> Vec<Document> {
    let now = inner.now();
    inner
        .by_path
        .values()
        .filter_map(|docs| docs.iter().find(|d| !d.is_expired(now)).cloned())
        .collect()
}

pub(crate) fn all_docs_at_path_unlocked(inner: &BowlInner, path: &str) -> Vec<Document> {
    let now = inner.now();
    inner
        .by_path
        .get(path)
        .map(|docs| docs.iter().filter(|d| !d.is_expired(now)).cloned().collect())
        .unwrap_or_default()
}

pub(crate) fn latest_doc_at_path_unlocked(inner: &BowlInner, path: &str) -> Option<Document> {
    let now = inner.now();
    inner.by_path.get(path)?.iter().find(|d| !d.is_expired(now)).cloned()
}

pub(crate) fn query_docs_unlocked(inner: &BowlInner, query: &Query) -> Vec<Document> {
    let base = match query.history {
        History::Latest => latest_docs_unlocked(inner),
        History::All => all_docs_unlocked(inner),
    };
    query::evaluate(base, query)
}

pub(crate) fn version_unlocked(inner: &BowlInner) -> u64 {
    inner.version
}

impl BowlInner {
    fn now(&self) -> i64 {
        (self.now)()
    }

    fn path_key(path: &str, author: &AuthorId) -> (String, String) {
        (path.to_string(), author.as_str().to_string())
    }

    /// Re-sorts `path`'s author vector into overwrite order, newest-first.
    fn resort_path(&mut self, path: &str) {
        if let Some(docs) = self.by_path.get_mut(path) {
            docs.sort_by(|a, b| a.overwrite_cmp(b).reverse());
        }
    }

    fn latest_at_path(&self, path: &str) -> Option<&Document> {
        self.by_path.get(path).and_then(|docs| docs.first())
    }

    fn remove_from_indexes(&mut self, doc: &Document) {
        if let Some(idx) = doc.local_index {
            self.by_local_index.remove(&idx);
        }
        self.by_path_author
            .remove(&Self::path_key(&doc.path, &doc.author));
        if let Some(docs) = self.by_path.get_mut(&doc.path) {
            docs.retain(|d| d.author != doc.author);
        }
    }

    fn insert_into_indexes(&mut self, doc: Document) {
        self.by_local_index
            .insert(doc.local_index.expect("accepted document carries a local index"), doc.clone());
        self.by_path_author
            .insert(Self::path_key(&doc.path, &doc.author), doc.clone());
        self.by_path.entry(doc.path.clone()).or_default().push(doc);
    }

    fn wake_async_followers(&mut self) {
        self.async_wakers.retain(|weak| {
            if let Some(shared) = weak.upgrade() {
                shared.wake();
                true
            } else {
                false
            }
        });
    }

    /// Removes every document whose `deleteAfter` has passed. Expired
    /// documents that arrived via sync are accepted (and broadcast) before
    /// this sweep removes them.
    fn sweep_expired(&mut self) -> Result<()> {
        let now = self.now();
        let expired: Vec<Document> = self
            .by_local_index
            .values()
            .filter(|d| d.is_expired(now))
            .cloned()
            .collect();
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "sweeping expired documents");
        }
        for doc in expired {
            self.driver.remove(&doc.path, &doc.author)?;
            self.remove_from_indexes(&doc);
        }
        self.last_sweep = Instant::now();
        Ok(())
    }

    fn maybe_sweep(&mut self) -> Result<()> {
        if self.last_sweep.elapsed() >= self.config.sweep_interval {
            self.sweep_expired()?;
        }
        Ok(())
    }
}

/// A cheaply-clonable handle to one share's document bowl. Every
/// clone shares the same underlying mutex and indexes.
#[derive(Clone)]
pub struct Bowl {
    inner: Arc<Mutex<BowlInner>>,
}

impl Bowl {
    /// Builds a bowl over `driver`'s existing documents, recovering
    /// `highestLocalIndex` from the maximum `local_index` observed, and
    /// running one expiry sweep before returning.
    pub fn new(
        driver: impl Driver + 'static,
        validator: impl Validator + 'static,
        config: BowlConfig,
    ) -> Result<Self> {
        Self::with_clock(driver, validator, config, || now_micros())
    }

    /// As [`Self::new`], but with an injected time source — used by tests
    /// that need deterministic `now`.
    pub fn with_clock(
        driver: impl Driver + 'static,
        validator: impl Validator + 'static,
        config: BowlConfig,
        now: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Result<Self> {
        let docs = driver.iter_all()?;
        let mut by_local_index = BTreeMap::new();
        let mut by_path_author = HashMap::new();
        let mut by_path: HashMap<String, Vec<Document>> = HashMap::new();
        let mut highest_local_index = 0;
        for doc in docs {
            if let Some(idx) = doc.local_index {
                highest_local_index = highest_local_index.max(idx);
                by_local_index.insert(idx, doc.clone());
            }
            by_path_author.insert(BowlInner::path_key(&doc.path, &doc.author), doc.clone());
            by_path.entry(doc.path.clone()).or_default().push(doc);
        }
        for docs in by_path.values_mut() {
            docs.sort_by(|a, b| a.overwrite_cmp(b).reverse());
        }
        let mut inner = BowlInner {
            driver: Box::new(driver),
            validator: Box::new(validator),
            config,
            now: Box::new(now),
            by_local_index,
            by_path_author,
            by_path,
            highest_local_index,
            version: 0,
            sync_followers: Vec::new(),
            next_follower_id: 0,
            async_wakers: Vec::new(),
            cache_hooks: Vec::new(),
            last_sweep: Instant::now(),
            closed: false,
        };
        inner.sweep_expired()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Monotonically increasing, bumped on every accepted upsert — the key
    /// [`crate::cache::ReplicaCache`] invalidates against.
    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    /// Signs `input` through `crypto` with `timestamp = max(now, latest_at_path.timestamp + 1)`
    /// and upserts the result. Declared `async` because a remote or
    /// hardware-backed [`Crypto`] service may suspend here; the bundled
    /// [`crate::crypto::Ed25519Crypto`] resolves immediately.
    pub async fn write(&self, crypto: &dyn Crypto, input: WriteInput) -> Result<UpsertResult> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::Closed);
        }
        let now = inner.now();
        let min_timestamp = inner
            .latest_at_path(&input.path)
            .map(|d| d.timestamp + 1)
            .unwrap_or(i64::MIN);
        let timestamp = now.max(min_timestamp);
        drop(inner);
        let doc = Document::sign(input, timestamp, crypto);
        self.upsert(doc)
    }

    /// Accepts or rejects `doc` under the overwrite order, without
    /// suspending.
    #[tracing::instrument(skip(self, doc), fields(path = %doc.path, author = %doc.author))]
    pub fn upsert(&self, doc: Document) -> Result<UpsertResult> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::Closed);
        }
        let now = inner.now();
        if let Err(err) = inner.validator.validate(&doc, now) {
            tracing::warn!(%err, "rejected document");
            return Ok(UpsertResult::Invalid(err));
        }

        let key = BowlInner::path_key(&doc.path, &doc.author);
        let previous_doc_same_author = inner.by_path_author.get(&key).cloned();
        if let Some(previous) = &previous_doc_same_author {
            if same_content(previous, &doc) {
                return Ok(UpsertResult::AlreadyHadIt);
            }
            if doc.overwrite_cmp(previous) != std::cmp::Ordering::Greater {
                return Ok(UpsertResult::Obsolete);
            }
        }

        let previous_latest_doc = inner.latest_at_path(&doc.path).cloned();

        inner.highest_local_index += 1;
        let local_index = inner.highest_local_index;
        let mut accepted = doc;
        accepted.local_index = Some(local_index);

        inner.driver.put(&accepted)?;
        if let Some(previous) = &previous_doc_same_author {
            inner.remove_from_indexes(previous);
        }
        inner.insert_into_indexes(accepted.clone());
        inner.resort_path(&accepted.path);
        inner.version += 1;

        let is_latest = inner
            .latest_at_path(&accepted.path)
            .map(|d| d.author == accepted.author)
            .unwrap_or(false);

        let event = WriteEvent {
            doc: accepted.clone(),
            is_latest,
            previous_doc_same_author,
            // Non-null only when this document became the new latest and a
            // prior latest existed at this path.
            previous_latest_doc: if is_latest { previous_latest_doc } else { None },
        };
        self.broadcast(&mut inner, &event);

        let now = inner.now();
        if accepted.is_expired(now) {
            inner.driver.remove(&accepted.path, &accepted.author)?;
            inner.remove_from_indexes(&accepted);
        }
        inner.maybe_sweep()?;

        let hooks = inner.cache_hooks.clone();
        for hook in &hooks {
            hook(&inner);
        }

        tracing::debug!(local_index, is_latest, "accepted document");
        Ok(if is_latest {
            UpsertResult::AcceptedAndLatest(accepted)
        } else {
            UpsertResult::AcceptedButNotLatest(accepted)
        })
    }

    /// Registers a hook run with the bowl's locked state at the end of
    /// every accepted `upsert` — used by [`crate::cache::ReplicaCache`] to
    /// recompute its held entries in the same critical section, without
    /// re-locking this bowl from inside the hook.
    pub(crate) fn register_cache_hook(&self, hook: CacheHook) {
        self.inner.lock().cache_hooks.push(hook);
    }

    fn broadcast(&self, inner: &mut BowlInner, event: &WriteEvent) {
        for follower in inner.sync_followers.iter_mut() {
            if follower.quitting {
                continue;
            }
            if let Err(err) = follower.callback.on_event(event) {
                (follower.error_handler)(FollowerError {
                    local_index: event.doc.local_index.unwrap_or_default(),
                    error: err,
                });
            }
            follower.next_index = event.doc.local_index.unwrap_or_default() + 1;
        }
        inner.wake_async_followers();
    }

    /// Every retained document, in unspecified order. Expired documents
    /// are never returned, whether or not they've been physically swept.
    pub fn get_all_docs(&self) -> Vec<Document> {
        let mut inner = self.inner.lock();
        let _ = inner.maybe_sweep();
        all_docs_unlocked(&inner)
    }

    /// The per-path latest document only, skipping any expired latest in
    /// favor of the next-newest unexpired document at that path.
    pub fn get_latest_docs(&self) -> Vec<Document> {
        let mut inner = self.inner.lock();
        let _ = inner.maybe_sweep();
        latest_docs_unlocked(&inner)
    }

    pub fn get_all_docs_at_path(&self, path: &str) -> Vec<Document> {
        let mut inner = self.inner.lock();
        let _ = inner.maybe_sweep();
        all_docs_at_path_unlocked(&inner, path)
    }

    pub fn get_latest_doc_at_path(&self, path: &str) -> Option<Document> {
        let mut inner = self.inner.lock();
        let _ = inner.maybe_sweep();
        latest_doc_at_path_unlocked(&inner, path)
    }

    fn base_set(&self, history: History) -> Vec<Document> {
        match history {
            History::Latest => self.get_latest_docs(),
            History::All => self.get_all_docs(),
        }
    }

    /// Evaluates the closed query shape.
    pub fn query_docs(&self, query: Query) -> Vec<Document> {
        let base = self.base_set(query.history);
        query::evaluate(base, &query)
    }

    pub fn query_paths(&self, query: Query) -> Vec<String> {
        let order_by = query.order_by;
        query::query_paths(&self.query_docs(query), order_by)
    }

    pub fn query_authors(&self, query: Query) -> Vec<AuthorId> {
        query::query_authors(&self.query_docs(query))
    }

    /// Forces an expiry sweep now, instead of waiting for the next
    /// opportunistic call to cross `sweep_interval`.
    pub fn sweep_now(&self) -> Result<()> {
        self.inner.lock().sweep_expired()
    }

    /// The highest `_localIndex` assigned so far, `0` if the bowl is empty
    /// — what a sync partner compares its own progress against.
    pub fn highest_local_index(&self) -> u64 {
        self.inner.lock().highest_local_index
    }

    /// Documents from `next_index` onward (inclusive), oldest first, up to
    /// `limit` — the batch an async follower or sync session pulls.
    pub fn documents_from(&self, next_index: u64, limit: usize) -> Vec<Document> {
        self.inner
            .lock()
            .by_local_index
            .range(next_index..)
            .take(limit)
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    /// Registers a synchronous follower: `follower` is driven inline
    /// with every document from `next_index` onward before this call
    /// returns, then inline again on every subsequent upsert.
    pub fn register_sync_follower(
        &self,
        next_index: u64,
        follower: impl SyncFollower + 'static,
        error_handler: Option<ErrorHandler>,
    ) -> SyncFollowerHandle {
        let error_handler = error_handler.unwrap_or_else(logging_error_handler);
        let mut entry = SyncFollowerEntry {
            id: 0,
            next_index,
            quitting: false,
            callback: Box::new(follower),
            error_handler,
        };
        let catch_up = self.documents_from(next_index, usize::MAX);
        for doc in catch_up {
            let is_latest = self
                .get_latest_doc_at_path(&doc.path)
                .map(|latest| latest.author == doc.author)
                .unwrap_or(false);
            let local_index = doc.local_index.unwrap_or_default();
            // Replayed catch-up events don't reconstruct the predecessor
            // documents that existed at original acceptance time.
            let event = WriteEvent {
                doc,
                is_latest,
                previous_doc_same_author: None,
                previous_latest_doc: None,
            };
            if let Err(err) = entry.callback.on_event(&event) {
                (entry.error_handler)(FollowerError {
                    local_index,
                    error: err,
                });
            }
            entry.next_index = local_index + 1;
        }

        let mut inner = self.inner.lock();
        let id = inner.next_follower_id;
        inner.next_follower_id += 1;
        entry.id = id;
        inner.sync_followers.push(entry);
        drop(inner);
        SyncFollowerHandle {
            id,
            bowl: self.clone(),
        }
    }

    pub(crate) fn unsubscribe_sync_follower(&self, id: FollowerId) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.sync_followers.iter_mut().find(|f| f.id == id) {
            entry.quitting = true;
        }
    }

    /// Registers an asynchronous follower: a [`futures::Stream`] of
    /// batches starting at `next_index`.
    pub fn register_async_follower(&self, next_index: u64, config: AsyncFollowerConfig) -> AsyncFollower {
        AsyncFollower::new(self.clone(), next_index, config.batch_size)
    }

    pub(crate) fn register_async_waker(&self, waker: AsyncWaker) {
        self.inner.lock().async_wakers.push(waker);
    }

    /// Stops accepting writes and serving followers; in-flight handles
    /// observe [`Error::Closed`] on their next call.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }
}

fn now_micros() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Crypto, Ed25519Verifier};
    use crate::driver::MemoryDriver;
    use crate::validator::DefaultValidator;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn bowl_with_clock(clock: Arc<AtomicI64>) -> Bowl {
        let validator = DefaultValidator::new(Ed25519Verifier);
        Bowl::with_clock(MemoryDriver::new(), validator, BowlConfig::default(), move || {
            clock.load(Ordering::SeqCst)
        })
        .unwrap()
    }

    #[async_std::test]
    async fn first_write_is_accepted_and_latest() {
        let bowl = bowl_with_clock(Arc::new(AtomicI64::new(1_000)));
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let result = bowl.write(&crypto, WriteInput::new("/suzy/a", "hi")).await.unwrap();
        assert!(matches!(result, UpsertResult::AcceptedAndLatest(_)));
        assert_eq!(result.accepted().unwrap().local_index, Some(1));
    }

    #[async_std::test]
    async fn second_write_same_author_replaces_first() {
        let bowl = bowl_with_clock(Arc::new(AtomicI64::new(1_000)));
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        bowl.write(&crypto, WriteInput::new("/suzy/a", "hi")).await.unwrap();
        bowl.write(&crypto, WriteInput::new("/suzy/a", "bye")).await.unwrap();
        let all = bowl.get_all_docs_at_path("/suzy/a");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, b"bye".to_vec());
        assert_eq!(all[0].local_index, Some(2));
    }

    #[async_std::test]
    async fn obsolete_upsert_is_rejected() {
        let bowl = bowl_with_clock(Arc::new(AtomicI64::new(1_000)));
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let doc = Document::sign(WriteInput::new("/suzy/a", "newer"), 500, &crypto);
        bowl.upsert(doc).unwrap();
        let stale = Document::sign(WriteInput::new("/suzy/a", "older"), 100, &crypto);
        assert!(matches!(bowl.upsert(stale).unwrap(), UpsertResult::Obsolete));
    }

    #[async_std::test]
    async fn concurrent_authors_resolve_latest_by_overwrite_order() {
        let bowl = bowl_with_clock(Arc::new(AtomicI64::new(1_000)));
        let suzy = Ed25519Crypto::generate("shared").unwrap();
        let bob = Ed25519Crypto::generate("shared").unwrap();
        let a = bowl.upsert(Document::sign(WriteInput::new("/shared/doc", "a"), 100, &suzy)).unwrap();
        let b = bowl.upsert(Document::sign(WriteInput::new("/shared/doc", "b"), 200, &bob)).unwrap();
        assert!(matches!(a, UpsertResult::AcceptedAndLatest(_)));
        assert!(matches!(b, UpsertResult::AcceptedAndLatest(_)));
        let latest = bowl.get_latest_doc_at_path("/shared/doc").unwrap();
        assert_eq!(latest.content, b"b".to_vec());
        assert_eq!(bowl.get_all_docs_at_path("/shared/doc").len(), 2);
    }

    #[async_std::test]
    async fn sync_follower_catches_up_then_follows_live() {
        let bowl = bowl_with_clock(Arc::new(AtomicI64::new(1_000)));
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        bowl.write(&crypto, WriteInput::new("/suzy/a", "1")).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let handle = bowl.register_sync_follower(
            0,
            move |event: &WriteEvent| {
                seen2.lock().push(event.doc.local_index.unwrap());
                Ok(())
            },
            None,
        );
        assert_eq!(*seen.lock(), vec![1]);

        bowl.write(&crypto, WriteInput::new("/suzy/b", "2")).await.unwrap();
        assert_eq!(*seen.lock(), vec![1, 2]);

        handle.unsubscribe();
        bowl.write(&crypto, WriteInput::new("/suzy/c", "3")).await.unwrap();
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[async_std::test]
    async fn async_follower_delivers_batches_and_sleeps_when_caught_up() {
        let bowl = bowl_with_clock(Arc::new(AtomicI64::new(1_000)));
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        for i in 0..3 {
            bowl.write(&crypto, WriteInput::new(format!("/suzy/{}", i), "x")).await.unwrap();
        }
        let mut follower = bowl.register_async_follower(0, AsyncFollowerConfig { batch_size: 2 });
        let first = follower.next().await.unwrap();
        assert_eq!(first.len(), 2);
        let second = follower.next().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(follower.state(), crate::follower::FollowerState::Sleeping);
    }

    #[async_std::test]
    async fn expired_document_is_accepted_then_swept() {
        let clock = Arc::new(AtomicI64::new(1_000));
        let bowl = bowl_with_clock(clock.clone());
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let input = WriteInput::new("/suzy/a", "ephemeral").with_delete_after(1_500);
        let result = bowl.write(&crypto, input).await.unwrap();
        assert!(result.accepted().is_some());

        clock.store(2_000, Ordering::SeqCst);
        bowl.sweep_now().unwrap();
        assert!(bowl.get_latest_doc_at_path("/suzy/a").is_none());
    }

    #[async_std::test]
    async fn closed_bowl_rejects_writes() {
        let bowl = bowl_with_clock(Arc::new(AtomicI64::new(1_000)));
        bowl.close();
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        assert!(matches!(
            bowl.write(&crypto, WriteInput::new("/suzy/a", "x")).await,
            Err(Error::Closed)
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::crypto::{Ed25519Crypto, Ed25519Verifier};
    use crate::driver::MemoryDriver;
    use crate::validator::DefaultValidator;
    use proptest::prelude::*;

    const PATHS: &[&str] = &["/shared/a", "/shared/b", "/shared/c"];

    fn authors() -> Vec<Ed25519Crypto> {
        vec![
            Ed25519Crypto::generate("suzy").unwrap(),
            Ed25519Crypto::generate("bob").unwrap(),
        ]
    }

    /// A sequence of `(path_index, author_index, timestamp, content)` steps.
    fn steps() -> impl Strategy<Value = Vec<(usize, usize, i64, u8)>> {
        prop::collection::vec((0..PATHS.len(), 0..2usize, 1i64..1_000_000, any::<u8>()), 1..60)
    }

    proptest! {
        #[test]
        fn overwrite_order_and_local_index_hold_after_every_step(steps in steps()) {
            let bowl = Bowl::new(
                MemoryDriver::new(),
                DefaultValidator::new(Ed25519Verifier),
                BowlConfig::default(),
            ).unwrap();
            let authors = authors();
            let mut highest_seen = 0u64;

            for (path_idx, author_idx, ts, content) in steps {
                let path = PATHS[path_idx];
                let doc = Document::sign(
                    WriteInput::new(path, vec![content]),
                    ts,
                    &authors[author_idx],
                );
                let result = bowl.upsert(doc).unwrap();

                if let Some(accepted) = result.accepted() {
                    let idx = accepted.local_index.unwrap();
                    prop_assert!(idx > highest_seen);
                    highest_seen = idx;
                }

                for docs_at_path in bowl.get_all_docs_at_path(path).windows(2) {
                    prop_assert_eq!(
                        docs_at_path[0].overwrite_cmp(&docs_at_path[1]),
                        std::cmp::Ordering::Greater
                    );
                }
            }

            for latest in bowl.get_latest_docs() {
                let at_path = bowl.get_all_docs_at_path(&latest.path);
                prop_assert!(!at_path.is_empty());
                let head = at_path.into_iter().max_by(|a, b| a.overwrite_cmp(b)).unwrap();
                prop_assert_eq!(latest.content, head.content);
                prop_assert_eq!(latest.author, head.author);
            }
        }
    }
}
