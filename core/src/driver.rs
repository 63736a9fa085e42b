//! The persisted driver contract — append-with-replace keyed by
//! `(path, author)`, consumed as an abstract service. [`MemoryDriver`] is
//! the in-memory reference implementation used by default and in tests;
//! [`SledDriver`] demonstrates the same contract against an embedded
//! on-disk store. SQLite/IndexedDB-backed drivers would implement the
//! same trait.

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::document::Document;
use crate::id::AuthorId;
use crate::util::Ref;
use crate::wire::WireDocument;

/// A persistent index over the documents of one share.
///
/// The bowl is the sole owner of its driver and reconstructs its
/// in-memory indexes from [`Driver::iter_all`] at construction, recovering
/// `highestLocalIndex` from the maximum `local_index` observed.
pub trait Driver: Send + Sync {
    /// Inserts or replaces the document at `(doc.path, doc.author)`,
    /// returning whatever was previously stored there.
    fn put(&self, doc: &Document) -> Result<Option<Document>>;

    /// Removes the document at `(path, author)`, if any.
    fn remove(&self, path: &str, author: &AuthorId) -> Result<Option<Document>>;

    /// Returns every stored document, in unspecified order; the bowl sorts
    /// them into its own indexes.
    fn iter_all(&self) -> Result<Vec<Document>>;
}

/// In-memory [`Driver`], the default backend and the one used by every
/// test in this crate.
#[derive(Default)]
pub struct MemoryDriver {
    docs: Mutex<BTreeMap<(String, String), Document>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &str, author: &AuthorId) -> (String, String) {
        (path.to_string(), author.as_str().to_string())
    }
}

impl Driver for MemoryDriver {
    fn put(&self, doc: &Document) -> Result<Option<Document>> {
        let key = Self::key(&doc.path, &doc.author);
        Ok(self.docs.lock().insert(key, doc.clone()))
    }

    fn remove(&self, path: &str, author: &AuthorId) -> Result<Option<Document>> {
        Ok(self.docs.lock().remove(&Self::key(path, author)))
    }

    fn iter_all(&self) -> Result<Vec<Document>> {
        Ok(self.docs.lock().values().cloned().collect())
    }
}

/// `sled`-backed [`Driver`], storing each document's wire encoding keyed by
/// `path \0 author`.
pub struct SledDriver {
    tree: sled::Tree,
}

impl SledDriver {
    pub fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    fn key(path: &str, author: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(path.len() + author.len() + 1);
        key.extend_from_slice(path.as_bytes());
        key.push(0);
        key.extend_from_slice(author.as_bytes());
        key
    }

    fn decode(bytes: &[u8]) -> Result<Document> {
        let wire: WireDocument = Ref::<WireDocument>::checked(bytes)?.to_owned()?;
        Document::try_from(wire)
    }
}

impl Driver for SledDriver {
    fn put(&self, doc: &Document) -> Result<Option<Document>> {
        let key = Self::key(&doc.path, doc.author.as_str());
        let wire = WireDocument::from(doc);
        let bytes = Ref::archive(&wire);
        let prev = self.tree.insert(key, bytes.as_bytes())?;
        prev.map(|bytes| Self::decode(&bytes)).transpose()
    }

    fn remove(&self, path: &str, author: &AuthorId) -> Result<Option<Document>> {
        let key = Self::key(path, author.as_str());
        self.tree
            .remove(key)?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }

    fn iter_all(&self) -> Result<Vec<Document>> {
        self.tree
            .iter()
            .values()
            .map(|res| Self::decode(&res?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Crypto;
    use crate::document::WriteInput;

    fn signed(path: &str, content: &str, ts: i64, shortname: &str) -> Document {
        let crypto = Ed25519Crypto::generate(shortname).unwrap();
        Document::sign(WriteInput::new(path, content), ts, &crypto)
    }

    #[test]
    fn memory_driver_replaces_by_path_author() {
        let driver = MemoryDriver::new();
        let doc = signed("/suzy/a", "x", 100, "suzy");
        assert!(driver.put(&doc).unwrap().is_none());
        let mut doc2 = doc.clone();
        doc2.content = b"y".to_vec();
        let prev = driver.put(&doc2).unwrap().unwrap();
        assert_eq!(prev.content, b"x".to_vec());
        assert_eq!(driver.iter_all().unwrap().len(), 1);
    }

    #[test]
    fn sled_driver_roundtrips_through_wire_encoding() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let driver = SledDriver::new(db.open_tree("docs").unwrap());
        let doc = signed("/suzy/a", "hello", 100, "suzy");
        driver.put(&doc).unwrap();
        let all = driver.iter_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, doc.content);
        assert_eq!(all[0].path, doc.path);
    }

    #[test]
    fn sled_driver_recovers_after_reopen() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        {
            let driver = SledDriver::new(db.open_tree("docs").unwrap());
            driver.put(&signed("/suzy/a", "hello", 100, "suzy")).unwrap();
        }
        let driver = SledDriver::new(db.open_tree("docs").unwrap());
        assert_eq!(driver.iter_all().unwrap().len(), 1);
    }
}
