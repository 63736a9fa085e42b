//! The closed, public error surface for the peer/sync layer.

use quill_core::ShareId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no bowl registered for share {0}")]
    UnknownShare(ShareId),
    #[error("sync coordinator is closed")]
    Closed,
    #[error(transparent)]
    Core(#[from] quill_core::Error),
    #[error("sync transport error: {0}")]
    Network(anyhow::Error),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Network(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
