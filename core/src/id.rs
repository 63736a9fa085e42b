use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

fn is_lower_alpha_digit(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

fn is_suffix_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// A share address: `+name.suffix`.
///
/// `name` is lowercase letters/digits starting with a letter; `suffix` is at
/// least six base32-like characters. Validation here is the minimal grammar
/// check used internally by the bowl and the sync handshake; a full format
/// validator may apply stricter rules.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ShareId(String);

impl ShareId {
    /// Returns the share address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('+')
            .ok_or_else(|| anyhow!("share address must start with '+': {}", s))?;
        let (name, suffix) = rest
            .split_once('.')
            .ok_or_else(|| anyhow!("share address missing '.': {}", s))?;
        let mut chars = name.chars();
        let first = chars
            .next()
            .ok_or_else(|| anyhow!("share address name is empty: {}", s))?;
        if !first.is_ascii_lowercase() {
            return Err(anyhow!("share address name must start with a letter: {}", s));
        }
        if !chars.all(is_lower_alpha_digit) {
            return Err(anyhow!(
                "share address name must be lowercase letters/digits: {}",
                s
            ));
        }
        if suffix.len() < 6 || !suffix.chars().all(is_suffix_char) {
            return Err(anyhow!("share address suffix too short or invalid: {}", s));
        }
        Ok(Self(s.to_string()))
    }
}

impl FromStr for ShareId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ShareId({})", self.0)
    }
}

/// An author address: `@shortname.publickey`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AuthorId(String);

impl AuthorId {
    /// Returns the author address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('@')
            .ok_or_else(|| anyhow!("author address must start with '@': {}", s))?;
        let (name, key) = rest
            .split_once('.')
            .ok_or_else(|| anyhow!("author address missing '.': {}", s))?;
        let mut chars = name.chars();
        let first = chars
            .next()
            .ok_or_else(|| anyhow!("author address name is empty: {}", s))?;
        if !first.is_ascii_lowercase() {
            return Err(anyhow!(
                "author address name must start with a letter: {}",
                s
            ));
        }
        if !chars.all(is_lower_alpha_digit) {
            return Err(anyhow!(
                "author address name must be lowercase letters/digits: {}",
                s
            ));
        }
        if key.len() < 6 || !key.chars().all(is_suffix_char) {
            return Err(anyhow!("author address key too short or invalid: {}", s));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns true if this author is permitted to write the given path
    /// under the default per-path ownership-prefix rule: the path's first
    /// segment (delimited by `/`) must equal the author's shortname.
    pub fn owns_path(&self, path: &str) -> bool {
        let shortname = self.0[1..].split('.').next().unwrap_or_default();
        path.trim_start_matches('/')
            .split('/')
            .next()
            .map(|first| first == shortname)
            .unwrap_or(false)
    }
}

impl FromStr for AuthorId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AuthorId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_id_grammar() {
        assert!("+gardening.friends123".parse::<ShareId>().is_ok());
        assert!("gardening.friends123".parse::<ShareId>().is_err());
        assert!("+Gardening.friends123".parse::<ShareId>().is_err());
        assert!("+gardening.fr".parse::<ShareId>().is_err());
        assert!("+gardening".parse::<ShareId>().is_err());
    }

    #[test]
    fn author_id_grammar() {
        assert!("@suzy.b2uhs4u4s4".parse::<AuthorId>().is_ok());
        assert!("suzy.b2uhs4u4s4".parse::<AuthorId>().is_err());
        assert!("@suzy".parse::<AuthorId>().is_err());
    }

    #[test]
    fn owns_path_prefix() {
        let author: AuthorId = "@suzy.b2uhs4u4s4".parse().unwrap();
        assert!(author.owns_path("/suzy/notes.txt"));
        assert!(!author.owns_path("/bob/notes.txt"));
    }
}
