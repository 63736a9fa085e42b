//! The closed query shape and its evaluation order.

use std::cmp::Ordering;

use crate::document::Document;
use crate::id::AuthorId;

/// Whether a query scans every retained document or only the per-path
/// latest.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum History {
    Latest,
    All,
}

impl Default for History {
    fn default() -> Self {
        History::Latest
    }
}

/// Sort axis. `PathAsc`/`PathDesc` sort by the
/// natural path-order: `path` in the given direction, `timestamp DESC`
/// as the tie-break, matching [`Document::path_order_cmp`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OrderBy {
    PathAsc,
    PathDesc,
    LocalIndexAsc,
    LocalIndexDesc,
}

impl Default for OrderBy {
    fn default() -> Self {
        OrderBy::PathAsc
    }
}

/// Inclusive bound to resume a query from; ignored unless it
/// matches the active `orderBy` axis.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum StartAt {
    Path(String),
    LocalIndex(u64),
}

/// All filter predicates present are ANDed together.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Filter {
    pub path: Option<String>,
    pub path_starts_with: Option<String>,
    pub path_ends_with: Option<String>,
    pub author: Option<AuthorId>,
    pub timestamp: Option<i64>,
    pub timestamp_gt: Option<i64>,
    pub timestamp_lt: Option<i64>,
    pub content_length: Option<u64>,
    pub content_length_gt: Option<u64>,
    pub content_length_lt: Option<u64>,
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        if let Some(path) = &self.path {
            if &doc.path != path {
                return false;
            }
        }
        if let Some(prefix) = &self.path_starts_with {
            if !doc.path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(suffix) = &self.path_ends_with {
            if !doc.path.ends_with(suffix.as_str()) {
                return false;
            }
        }
        if let Some(author) = &self.author {
            if &doc.author != author {
                return false;
            }
        }
        if let Some(ts) = self.timestamp {
            if doc.timestamp != ts {
                return false;
            }
        }
        if let Some(ts) = self.timestamp_gt {
            if !(doc.timestamp > ts) {
                return false;
            }
        }
        if let Some(ts) = self.timestamp_lt {
            if !(doc.timestamp < ts) {
                return false;
            }
        }
        if let Some(len) = self.content_length {
            if doc.content_length != len {
                return false;
            }
        }
        if let Some(len) = self.content_length_gt {
            if !(doc.content_length > len) {
                return false;
            }
        }
        if let Some(len) = self.content_length_lt {
            if !(doc.content_length < len) {
                return false;
            }
        }
        true
    }
}

/// The closed query shape.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Query {
    pub history: History,
    pub order_by: OrderBy,
    pub start_at: Option<StartAt>,
    pub filter: Filter,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn start_at(mut self, start_at: StartAt) -> Self {
        self.start_at = Some(start_at);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

fn order_cmp(order_by: OrderBy, a: &Document, b: &Document) -> Ordering {
    match order_by {
        OrderBy::PathAsc => a.path_order_cmp(b),
        OrderBy::PathDesc => a.path_order_cmp(b).reverse(),
        OrderBy::LocalIndexAsc => a.local_index.cmp(&b.local_index),
        OrderBy::LocalIndexDesc => a.local_index.cmp(&b.local_index).reverse(),
    }
}

/// Evaluates `query` over `base`:
/// sort by `orderBy`, skip until `startAt`, filter, then truncate to
/// `limit` — in that order.
pub fn evaluate(base: Vec<Document>, query: &Query) -> Vec<Document> {
    let mut docs = base;
    docs.sort_by(|a, b| order_cmp(query.order_by, a, b));

    if let Some(start_at) = &query.start_at {
        let skip = match (start_at, query.order_by) {
            (StartAt::Path(path), OrderBy::PathAsc) => docs
                .iter()
                .position(|d| d.path.as_str() >= path.as_str())
                .unwrap_or(docs.len()),
            (StartAt::Path(path), OrderBy::PathDesc) => docs
                .iter()
                .position(|d| d.path.as_str() <= path.as_str())
                .unwrap_or(docs.len()),
            (StartAt::LocalIndex(idx), OrderBy::LocalIndexAsc) => docs
                .iter()
                .position(|d| d.local_index.unwrap_or(0) >= *idx)
                .unwrap_or(docs.len()),
            (StartAt::LocalIndex(idx), OrderBy::LocalIndexDesc) => docs
                .iter()
                .position(|d| d.local_index.unwrap_or(0) <= *idx)
                .unwrap_or(docs.len()),
            // startAt is ignored when its axis doesn't match orderBy.
            _ => 0,
        };
        docs.drain(..skip);
    }

    docs.retain(|d| query.filter.matches(d));

    if let Some(limit) = query.limit {
        docs.truncate(limit);
    }
    docs
}

/// `queryPaths` convenience projection: unique paths in ascending
/// order, reversed if `orderBy = path DESC`.
pub fn query_paths(docs: &[Document], order_by: OrderBy) -> Vec<String> {
    let mut paths: Vec<String> = docs.iter().map(|d| d.path.clone()).collect();
    paths.sort();
    paths.dedup();
    if order_by == OrderBy::PathDesc {
        paths.reverse();
    }
    paths
}

/// `queryAuthors` convenience projection: unique authors ascending.
pub fn query_authors(docs: &[Document]) -> Vec<AuthorId> {
    let mut authors: Vec<AuthorId> = docs.iter().map(|d| d.author.clone()).collect();
    authors.sort();
    authors.dedup();
    authors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Crypto;
    use crate::document::WriteInput;

    fn doc(path: &str, content: &str, ts: i64, local_index: u64, shortname: &str) -> Document {
        let crypto = Ed25519Crypto::generate(shortname).unwrap();
        let mut d = Document::sign(WriteInput::new(path, content), ts, &crypto);
        d.local_index = Some(local_index);
        d
    }

    #[test]
    fn path_asc_orders_naturally() {
        let docs = vec![
            doc("/suzy/b", "x", 100, 2, "suzy"),
            doc("/suzy/a", "x", 100, 1, "suzy"),
        ];
        let result = evaluate(docs, &Query::new());
        assert_eq!(result[0].path, "/suzy/a");
        assert_eq!(result[1].path, "/suzy/b");
    }

    #[test]
    fn local_index_desc_and_limit() {
        let docs = vec![
            doc("/suzy/a", "x", 100, 1, "suzy"),
            doc("/suzy/b", "x", 100, 2, "suzy"),
            doc("/suzy/c", "x", 100, 3, "suzy"),
        ];
        let q = Query::new().order_by(OrderBy::LocalIndexDesc).limit(2);
        let result = evaluate(docs, &q);
        assert_eq!(
            result.iter().map(|d| d.local_index.unwrap()).collect::<Vec<_>>(),
            vec![3, 2]
        );
    }

    #[test]
    fn path_ends_with_is_suffix_match() {
        let docs = vec![
            doc("/suzy/notes.txt", "x", 100, 1, "suzy"),
            doc("/suzy/notes.md", "x", 100, 2, "suzy"),
        ];
        let f = Filter {
            path_ends_with: Some(".txt".into()),
            ..Default::default()
        };
        let result = evaluate(docs, &Query::new().filter(f));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "/suzy/notes.txt");
    }

    #[test]
    fn start_at_path_is_inclusive_lower_bound() {
        let docs = vec![
            doc("/suzy/a", "x", 100, 1, "suzy"),
            doc("/suzy/b", "x", 100, 2, "suzy"),
            doc("/suzy/c", "x", 100, 3, "suzy"),
        ];
        let q = Query::new().start_at(StartAt::Path("/suzy/b".into()));
        let result = evaluate(docs, &q);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].path, "/suzy/b");
    }
}
