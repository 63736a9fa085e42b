//! Format validation, consumed as an abstract service.
//!
//! The bowl never hand-rolls document acceptance rules beyond the overwrite
//! order; everything else — path grammar, timestamp range, signature
//! verification, and per-path authorization — is delegated to a
//! [`Validator`].

use anyhow::Result;

use crate::crypto::Verify;
use crate::document::Document;

/// Why a document was rejected by a [`Validator`].
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("path is not printable ASCII or violates the path grammar: {0:?}")]
    MalformedPath(String),
    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
    #[error("signature does not verify")]
    SignatureMismatch,
    #[error("author {author} is not authorized to write {path}")]
    Unauthorized { author: String, path: String },
    #[error("unknown format tag: {0}")]
    UnknownFormat(String),
}

/// A pluggable document validator.
pub trait Validator: Send + Sync {
    /// Returns `Ok(())` if `doc` is well-formed, in-range, correctly
    /// signed, and its author is authorized to write its path; otherwise
    /// the specific [`ValidationError`].
    fn validate(&self, doc: &Document, now_micros: i64) -> Result<(), ValidationError>;
}

/// The default validator: printable-ASCII paths, a small timestamp skew
/// tolerance, ed25519 signature verification, and per-path ownership-prefix
/// authorization.
pub struct DefaultValidator<V> {
    verify: V,
    /// Maximum amount a document's timestamp may exceed `now`.
    pub max_skew_micros: i64,
}

impl<V: Verify> DefaultValidator<V> {
    pub fn new(verify: V) -> Self {
        Self {
            verify,
            max_skew_micros: 10 * 60 * 1_000_000,
        }
    }

    pub fn with_max_skew(mut self, max_skew_micros: i64) -> Self {
        self.max_skew_micros = max_skew_micros;
        self
    }

    fn validate_path(path: &str) -> bool {
        !path.is_empty() && path.chars().all(|c| c.is_ascii_graphic() || c == ' ')
    }
}

impl<V: Verify> Validator for DefaultValidator<V> {
    fn validate(&self, doc: &Document, now_micros: i64) -> Result<(), ValidationError> {
        if !Self::validate_path(&doc.path) {
            return Err(ValidationError::MalformedPath(doc.path.clone()));
        }
        if doc.timestamp <= 0 || doc.timestamp > now_micros + self.max_skew_micros {
            return Err(ValidationError::TimestampOutOfRange(doc.timestamp));
        }
        if !doc.author.owns_path(&doc.path) {
            return Err(ValidationError::Unauthorized {
                author: doc.author.as_str().to_string(),
                path: doc.path.clone(),
            });
        }
        doc.verify_integrity(&self.verify)
            .map_err(|_| ValidationError::SignatureMismatch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Crypto, Ed25519Verifier};
    use crate::document::WriteInput;

    fn validator() -> DefaultValidator<Ed25519Verifier> {
        DefaultValidator::new(Ed25519Verifier)
    }

    #[test]
    fn accepts_well_formed_document() {
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let doc = Document::sign(WriteInput::new("/suzy/a", "hi"), 100, &crypto);
        validator().validate(&doc, 1_000_000).unwrap();
    }

    #[test]
    fn rejects_unauthorized_author() {
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let doc = Document::sign(WriteInput::new("/bob/a", "hi"), 100, &crypto);
        assert!(matches!(
            validator().validate(&doc, 1_000_000),
            Err(ValidationError::Unauthorized { .. })
        ));
    }

    #[test]
    fn rejects_future_timestamp() {
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let doc = Document::sign(WriteInput::new("/suzy/a", "hi"), i64::MAX, &crypto);
        assert!(matches!(
            validator().validate(&doc, 1_000_000),
            Err(ValidationError::TimestampOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_tampered_signature() {
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let mut doc = Document::sign(WriteInput::new("/suzy/a", "hi"), 100, &crypto);
        doc.content = b"tampered".to_vec();
        assert!(matches!(
            validator().validate(&doc, 1_000_000),
            Err(ValidationError::SignatureMismatch)
        ));
    }
}
