//! Paths into a value tree.
//!
//! A path is a sequence of segments, each either a map key or a sequence
//! index. Paths address the target of draft writes and show up in error
//! messages and dispatch diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Map key access.
    Key(String),
    /// Sequence index access.
    Index(usize),
}

impl Seg {
    /// Get the key if this is a key segment.
    #[inline]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Seg::Key(k) => Some(k),
            Seg::Index(_) => None,
        }
    }

    /// Get the index if this is an index segment.
    #[inline]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Seg::Key(_) => None,
            Seg::Index(i) => Some(*i),
        }
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, ".{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// A complete path into a value tree.
///
/// # Examples
///
/// ```
/// use floe_state::{path, Path};
///
/// let p = Path::root().key("users").index(0).key("name");
/// assert_eq!(p.to_string(), "$.users[0].name");
/// assert_eq!(p, path!("users", 0, "name"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// Create an empty path (the document root).
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create a path from a vector of segments.
    #[inline]
    pub fn from_segments(segments: Vec<Seg>) -> Self {
        Self(segments)
    }

    /// Append a key segment (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    /// Push a segment (mutating).
    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    /// The segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// True for the root path.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Join this path with another.
    #[inline]
    pub fn join(&self, other: &Path) -> Path {
        let mut result = self.clone();
        result.0.extend(other.0.iter().cloned());
        result
    }

    /// The path without its last segment, `None` at the root.
    #[inline]
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Iterate over the segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

/// Parse a dot-separated key path, e.g. `"user.address.city"`.
///
/// Empty segments are skipped; index segments cannot be expressed in
/// this form; use [`path!`](crate::path) or the builder API for those.
pub fn parse_path(path: &str) -> Path {
    let mut result = Path::root();
    for segment in path.split('.') {
        if !segment.is_empty() {
            result = result.key(segment);
        }
    }
    result
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl From<&str> for Path {
    fn from(key: &str) -> Self {
        Path::root().key(key)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Construct a [`Path`] from a sequence of segments.
///
/// String literals become key segments, integers become index segments.
///
/// # Examples
///
/// ```
/// use floe_state::path;
///
/// let p = path!("items", 0, "name");
/// assert_eq!(p.to_string(), "$.items[0].name");
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::Seg::from($seg));
        )+
        p
    }};
}
