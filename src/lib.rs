//! `quill`: a local-first, peer-to-peer replicated document store.
//!
//! Each share is a [`quill_core::Bowl`], owned by exactly one local
//! [`Peer`]. Two peers converge by exchanging documents through a
//! [`SyncCoordinator`], which discovers the shares they have in common and
//! pulls each one to convergence over whatever [`Syncer`] transport the
//! caller supplies — this crate ships [`LoopbackSyncer`] for same-process
//! use and testing; a networked implementation is an exercise for the
//! embedding application.
#![warn(missing_docs)]

mod config;
mod error;
mod peer;
mod rpc;
mod sync;

pub use crate::config::SyncConfig;
pub use crate::error::{Error, Result};
pub use crate::peer::Peer;
pub use crate::rpc::{LoopbackSyncer, Syncer};
pub use crate::sync::{SyncCoordinator, SyncStatus};

pub use quill_core as core;

/// Installs the same `tracing` + `log-panics` setup every binary embedding
/// this crate is expected to run with, honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    tracing_log::LogTracer::init().ok();
    let env = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "info".to_owned());
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_span_events(FmtSpan::ACTIVE | FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::new(env))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    log_panics::init();
}
