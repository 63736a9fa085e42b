//! Cryptographic primitives consumed as an abstract service.
//!
//! The bowl never hard-codes a signature scheme: it signs through the
//! [`Crypto`] capability and verifies through [`Validator`](crate::validator::Validator).
//! [`Ed25519Crypto`] is the default, concrete implementation, built on
//! `ed25519-dalek`.

use anyhow::{anyhow, Result};
use ed25519_dalek::{Keypair as DalekKeypair, PublicKey, SecretKey, Signature as DalekSignature};
use ed25519_dalek::{Signer, Verifier};

use crate::id::AuthorId;

/// A signature over a document's signable fields, hex-encoded on the wire.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Overwrite order compares signatures lexicographically as bytes.
impl Ord for Signature {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Signature {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// A keypair capable of signing on behalf of one [`AuthorId`].
///
/// The crypto service is abstract: callers obtain a [`Keypair`] from
/// whatever external key-management component they use, and the bowl only
/// ever calls [`Keypair::author`] and [`Keypair::sign`].
pub trait Crypto: Send + Sync {
    /// The author address this keypair signs on behalf of.
    fn author(&self) -> &AuthorId;

    /// Signs `payload`, returning a signature covering exactly those bytes.
    fn sign(&self, payload: &[u8]) -> Signature;
}

/// Verifies a signature against a payload and claimed author, independent of
/// which concrete [`Crypto`] implementation produced it.
pub trait Verify: Send + Sync {
    fn verify(&self, author: &AuthorId, payload: &[u8], signature: &Signature) -> Result<()>;
}

/// Default ed25519 implementation of [`Crypto`]/[`Verify`].
pub struct Ed25519Crypto {
    author: AuthorId,
    keypair: DalekKeypair,
}

impl Ed25519Crypto {
    /// Generates a new random keypair and derives its author address from
    /// the public key, using `shortname` as the human-readable prefix.
    pub fn generate(shortname: &str) -> Result<Self> {
        let mut secret_bytes = [0u8; 32];
        getrandom::getrandom(&mut secret_bytes)?;
        let secret = SecretKey::from_bytes(&secret_bytes).map_err(|e| anyhow!(e))?;
        let public = PublicKey::from(&secret);
        let keypair = DalekKeypair { secret, public };
        let author = format!("@{}.{}", shortname, base32_lower(&public.to_bytes())).parse()?;
        Ok(Self { author, keypair })
    }
}

impl Crypto for Ed25519Crypto {
    fn author(&self) -> &AuthorId {
        &self.author
    }

    fn sign(&self, payload: &[u8]) -> Signature {
        Signature(self.keypair.sign(payload).to_bytes().to_vec())
    }
}

/// Verifies signatures produced by any [`Ed25519Crypto`] keypair, given the
/// claimed author's embedded public key.
pub struct Ed25519Verifier;

impl Verify for Ed25519Verifier {
    fn verify(&self, author: &AuthorId, payload: &[u8], signature: &Signature) -> Result<()> {
        let key_part = author
            .as_str()
            .rsplit_once('.')
            .map(|(_, key)| key)
            .ok_or_else(|| anyhow!("malformed author address: {}", author))?;
        let public_bytes = base32_lower_decode(key_part)
            .ok_or_else(|| anyhow!("malformed public key in author address: {}", author))?;
        let public = PublicKey::from_bytes(&public_bytes).map_err(|e| anyhow!(e))?;
        let sig_bytes: [u8; 64] = signature
            .as_bytes()
            .try_into()
            .map_err(|_| anyhow!("signature must be 64 bytes"))?;
        let sig = DalekSignature::from(sig_bytes);
        public.verify(payload, &sig).map_err(|e| anyhow!(e))
    }
}

/// Lowercase base32 encoding (RFC4648, no padding) used for the suffix of
/// author/share addresses — printable ASCII, matches `AuthorId`/`ShareId`'s grammar.
fn base32_lower(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut buf = 0u32;
    let mut bits = 0u32;
    for &b in bytes {
        buf = (buf << 8) | b as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buf >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buf << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_lower_decode(s: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut buf = 0u32;
    let mut bits = 0u32;
    let mut out = Vec::with_capacity(s.len() * 5 / 8);
    for c in s.chars() {
        let val = ALPHABET.iter().position(|&a| a as char == c)? as u32;
        buf = (buf << 5) | val;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buf >> bits) & 0xff) as u8);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let keypair = Ed25519Crypto::generate("suzy").unwrap();
        let payload = b"hello world";
        let sig = keypair.sign(payload);
        Ed25519Verifier
            .verify(keypair.author(), payload, &sig)
            .unwrap();
    }

    #[test]
    fn tampered_payload_fails() {
        let keypair = Ed25519Crypto::generate("suzy").unwrap();
        let sig = keypair.sign(b"hello world");
        assert!(Ed25519Verifier
            .verify(keypair.author(), b"goodbye world", &sig)
            .is_err());
    }
}
