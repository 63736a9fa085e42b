//! The closed, public error surface for this crate.

use crate::validator::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("driver error: {0}")]
    Driver(anyhow::Error),
    #[error("bowl is closed")]
    Closed,
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Driver(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
