//! The wire representation of a [`Document`] — a flat, archivable mapping
//! serialized with `rkyv`. Used to persist documents in
//! [`crate::driver::SledDriver`].

use anyhow::{anyhow, Result};
use bytecheck::CheckBytes;
use rkyv::{Archive, Deserialize, Serialize};

use crate::crypto::Signature;
use crate::document::{ContentHash, Document};

#[derive(Clone, Debug, Archive, Serialize, Deserialize)]
#[archive_attr(derive(Debug, CheckBytes))]
pub struct WireDocument {
    pub path: String,
    pub author: String,
    pub timestamp: i64,
    pub content: Vec<u8>,
    pub content_hash: [u8; 32],
    pub content_length: u64,
    pub signature: Vec<u8>,
    pub format: Option<String>,
    pub delete_after: Option<i64>,
    /// Present for documents already stored by some bowl; the receiver
    /// must overwrite this with its own assignment at upsert.
    pub local_index: Option<u64>,
}

impl From<&Document> for WireDocument {
    fn from(doc: &Document) -> Self {
        Self {
            path: doc.path.clone(),
            author: doc.author.as_str().to_string(),
            timestamp: doc.timestamp,
            content: doc.content.clone(),
            content_hash: *doc.content_hash.as_bytes(),
            content_length: doc.content_length,
            signature: doc.signature.as_bytes().to_vec(),
            format: doc.format.clone(),
            delete_after: doc.delete_after,
            local_index: doc.local_index,
        }
    }
}

impl TryFrom<WireDocument> for Document {
    type Error = anyhow::Error;

    fn try_from(wire: WireDocument) -> Result<Self> {
        let author = wire
            .author
            .parse()
            .map_err(|err| anyhow!("invalid author address on the wire: {}", err))?;
        Ok(Document {
            path: wire.path,
            author,
            timestamp: wire.timestamp,
            content: wire.content,
            content_hash: ContentHash::from_bytes(wire.content_hash),
            content_length: wire.content_length,
            signature: Signature::from_bytes(wire.signature),
            format: wire.format,
            delete_after: wire.delete_after,
            local_index: wire.local_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Crypto;
    use crate::document::WriteInput;

    #[test]
    fn wire_roundtrip_preserves_fields() {
        let crypto = Ed25519Crypto::generate("suzy").unwrap();
        let mut doc = Document::sign(WriteInput::new("/suzy/a", "hi"), 100, &crypto);
        doc.local_index = Some(7);
        let wire = WireDocument::from(&doc);
        let back = Document::try_from(wire).unwrap();
        assert_eq!(back.path, doc.path);
        assert_eq!(back.author.as_str(), doc.author.as_str());
        assert_eq!(back.timestamp, doc.timestamp);
        assert_eq!(back.content, doc.content);
        assert_eq!(back.local_index, doc.local_index);
    }
}
