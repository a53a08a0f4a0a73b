//! Hierarchical key paths.
//!
//! A path is an ordered sequence of dimension values joined by
//! [`SEGMENT_DELIMITER`]. Segments built through [`KeyPath::from_segments`]
//! are escaped, so a dimension value containing `/` or `%` still decomposes
//! back into the same segments when a view walks the store.

use std::fmt::{Display, Formatter};

/// Separator between path segments.
pub const SEGMENT_DELIMITER: char = '/';

const ESCAPE: char = '%';

/// Dimension path of one aggregation bucket, without its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(String);

impl KeyPath {
    /// Joins dimension values into a path, escaping each one.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for (i, segment) in segments.into_iter().enumerate() {
            if i > 0 {
                path.push(SEGMENT_DELIMITER);
            }
            escape_into(segment.as_ref(), &mut path);
        }
        KeyPath(path)
    }

    /// Takes a pre-formatted path whose `/` characters are segment
    /// delimiters. Any `%` is escaped, so views read the segments back
    /// verbatim; a segment value can't contain `/` this way.
    pub fn raw(path: impl Into<String>) -> Self {
        let path = path.into();
        if !path.contains(ESCAPE) {
            return KeyPath(path);
        }
        let mut escaped = String::with_capacity(path.len() + 2);
        for c in path.chars() {
            match c {
                ESCAPE => escaped.push_str("%25"),
                c => escaped.push(c),
            }
        }
        KeyPath(escaped)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prepends a namespace to form the full store key.
    pub fn full_key(&self, namespace: &str) -> String {
        let mut key = String::with_capacity(namespace.len() + self.0.len());
        key.push_str(namespace);
        key.push_str(&self.0);
        key
    }
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        KeyPath::raw(path)
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        KeyPath::raw(path)
    }
}

/// Splits a namespace-stripped path back into unescaped segments.
///
/// Expects the escaping applied by [`KeyPath`]'s constructors.
pub fn split_segments(path: &str) -> Vec<String> {
    path.split(SEGMENT_DELIMITER).map(unescape).collect()
}

fn escape_into(segment: &str, out: &mut String) {
    for c in segment.chars() {
        match c {
            ESCAPE => out.push_str("%25"),
            SEGMENT_DELIMITER => out.push_str("%2F"),
            c => out.push(c),
        }
    }
}

fn unescape(segment: &str) -> String {
    if !segment.contains(ESCAPE) {
        return segment.to_string();
    }
    segment.replace("%2F", "/").replace("%25", "%")
}
