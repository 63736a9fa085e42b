//! The immutable, signed [`Document`] record.

use std::cmp::Ordering;

use anyhow::{anyhow, Result};

use crate::crypto::{Crypto, Signature};
use crate::id::AuthorId;

/// A content hash, `blake3(content)`.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(content: &[u8]) -> Self {
        Self(*blake3::hash(content).as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The fields of a document the author chooses when writing; everything
/// else (`author`, `timestamp`, `contentHash`, `contentLength`, `signature`)
/// is derived by [`crate::bowl::Bowl::write`].
#[derive(Clone, Debug)]
pub struct WriteInput {
    pub path: String,
    pub content: Vec<u8>,
    /// Optional schema-version tag, opaque to the bowl.
    pub format: Option<String>,
    /// Optional expiry, microseconds since epoch.
    pub delete_after: Option<i64>,
}

impl WriteInput {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            format: None,
            delete_after: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_delete_after(mut self, delete_after: i64) -> Self {
        self.delete_after = Some(delete_after);
        self
    }
}

/// An immutable, signed document. Frozen after [`crate::bowl::Bowl::upsert`]
/// accepts it; `local_index` is `None` until the owning bowl assigns one.
#[derive(Clone, Debug)]
pub struct Document {
    pub path: String,
    pub author: AuthorId,
    pub timestamp: i64,
    pub content: Vec<u8>,
    pub content_hash: ContentHash,
    pub content_length: u64,
    pub signature: Signature,
    pub format: Option<String>,
    pub delete_after: Option<i64>,
    pub local_index: Option<u64>,
}

impl Document {
    /// Builds the bytes covered by the signature — everything except
    /// `_localIndex`, which is never signed or trusted from the wire.
    pub fn signable_bytes(
        path: &str,
        author: &AuthorId,
        timestamp: i64,
        content_hash: &ContentHash,
        content_length: u64,
        format: Option<&str>,
        delete_after: Option<i64>,
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(path.len() as u32).to_be_bytes());
        buf.extend_from_slice(path.as_bytes());
        let author = author.as_str();
        buf.extend_from_slice(&(author.len() as u32).to_be_bytes());
        buf.extend_from_slice(author.as_bytes());
        buf.extend_from_slice(&timestamp.to_be_bytes());
        buf.extend_from_slice(content_hash.as_bytes());
        buf.extend_from_slice(&content_length.to_be_bytes());
        match format {
            Some(f) => {
                buf.push(1);
                buf.extend_from_slice(&(f.len() as u32).to_be_bytes());
                buf.extend_from_slice(f.as_bytes());
            }
            None => buf.push(0),
        }
        match delete_after {
            Some(d) => {
                buf.push(1);
                buf.extend_from_slice(&d.to_be_bytes());
            }
            None => buf.push(0),
        }
        buf
    }

    /// Signs and constructs a new, unstored document. `timestamp` must
    /// already reflect the `max(now, latest_at_path + 1)` rule.
    pub fn sign(input: WriteInput, timestamp: i64, crypto: &dyn Crypto) -> Self {
        let author = crypto.author().clone();
        let content_hash = ContentHash::of(&input.content);
        let content_length = input.content.len() as u64;
        let payload = Self::signable_bytes(
            &input.path,
            &author,
            timestamp,
            &content_hash,
            content_length,
            input.format.as_deref(),
            input.delete_after,
        );
        let signature = crypto.sign(&payload);
        Self {
            path: input.path,
            author,
            timestamp,
            content: input.content,
            content_hash,
            content_length,
            signature,
            format: input.format,
            delete_after: input.delete_after,
            local_index: None,
        }
    }

    /// Verifies that `content_hash`/`content_length` are consistent with
    /// `content`, and that `signature` covers the signable fields. Does not
    /// check authorization or timestamp range — that is the [`crate::validator::Validator`]'s job.
    pub fn verify_integrity(&self, verify: &dyn crate::crypto::Verify) -> Result<()> {
        if self.content_hash.as_bytes() != ContentHash::of(&self.content).as_bytes() {
            return Err(anyhow!("content hash does not match content"));
        }
        if self.content_length != self.content.len() as u64 {
            return Err(anyhow!("content length does not match content"));
        }
        let payload = Self::signable_bytes(
            &self.path,
            &self.author,
            self.timestamp,
            &self.content_hash,
            self.content_length,
            self.format.as_deref(),
            self.delete_after,
        );
        verify.verify(&self.author, &payload, &self.signature)
    }

    /// The overwrite order key:
    /// `self` wins over `other` at the same (path, author) iff this
    /// returns `Greater`.
    pub fn overwrite_cmp(&self, other: &Document) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.signature.cmp(&other.signature))
    }

    /// The path-order key.
    pub fn path_order_cmp(&self, other: &Document) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.overwrite_cmp(other).reverse())
    }

    /// True if `expiry` has passed relative to `now_micros`.
    pub fn is_expired(&self, now_micros: i64) -> bool {
        matches!(self.delete_after, Some(expiry) if expiry <= now_micros)
    }
}
