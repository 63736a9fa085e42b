//! `quill-core`: the per-share document bowl.
//!
//! A share is a flat, append-only set of signed [`Document`]s, each keyed by
//! `(path, author)`. Writers don't coordinate: when two authors write the
//! same path concurrently, every replica that has seen both documents
//! resolves the same "latest" one, deterministically, from the documents
//! alone — no central sequencer, no multi-document transactions.
//!
//! A [`Bowl`](bowl::Bowl) is this crate's one stateful type: it owns a
//! [`Driver`](driver::Driver) for persistence, a [`Validator`](validator::Validator)
//! for acceptance, an in-memory index over every document it holds, and the
//! followers and caches registered against it. Everything above the bowl —
//! peer registries, sync handshakes, wire transport — lives in the `quill`
//! crate that wraps this one.
//!
//! Cryptographic signing/verification, persistence, and format validation
//! are all consumed as abstract services (the [`Crypto`](crypto::Crypto),
//! [`Verify`](crypto::Verify), [`Driver`](driver::Driver) and
//! [`Validator`](validator::Validator) traits); this crate supplies working
//! default implementations but never assumes they're the only ones.
#![warn(missing_docs)]

pub mod bowl;
pub mod cache;
pub mod config;
pub mod crypto;
pub mod document;
pub mod driver;
pub mod error;
pub mod follower;
pub mod id;
pub mod query;
pub mod util;
pub mod validator;
mod wire;

pub use crate::bowl::{Bowl, UpsertResult, WriteEvent};
pub use crate::cache::ReplicaCache;
pub use crate::config::{AsyncFollowerConfig, BowlConfig, CacheConfig};
pub use crate::crypto::{Crypto, Ed25519Crypto, Ed25519Verifier, Signature, Verify};
pub use crate::document::{ContentHash, Document, WriteInput};
pub use crate::driver::{Driver, MemoryDriver, SledDriver};
pub use crate::error::{Error, Result};
pub use crate::follower::{AsyncFollower, FollowerState, SyncFollower, SyncFollowerHandle};
pub use crate::id::{AuthorId, ShareId};
pub use crate::query::{Filter, History, OrderBy, Query, StartAt};
pub use crate::validator::{DefaultValidator, Validator, ValidationError};
