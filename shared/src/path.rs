//! Store paths
//!
//! A path is an ordered list of segments. A segment is either a concrete key or the
//! wildcard, which matches any single child key when used in a query.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One element of a store path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    Key(String),
    Wildcard,
}

impl PathSegment {
    /// Check whether this segment, used as a pattern, matches `other`
    pub fn matches(&self, other: &PathSegment) -> bool {
        match (self, other) {
            (PathSegment::Wildcard, _) => true,
            (PathSegment::Key(a), PathSegment::Key(b)) => a == b,
            (PathSegment::Key(_), PathSegment::Wildcard) => false,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Wildcard => write!(f, "*"),
        }
    }
}

/// Ordered sequence of path segments identifying a location in the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// Create a path from anything that yields segments
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Return a new path with `segment` appended
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Return a new path with a trailing wildcard
    pub fn wildcard(&self) -> Self {
        self.child(PathSegment::Wildcard)
    }

    /// Parent path, or `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if any segment is a wildcard
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| *s == PathSegment::Wildcard)
    }

    /// Check whether this path, used as a query pattern, matches a concrete path
    pub fn matches(&self, concrete: &Path) -> bool {
        self.segments.len() == concrete.segments.len()
            && self
                .segments
                .iter()
                .zip(&concrete.segments)
                .all(|(p, c)| p.matches(c))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}
