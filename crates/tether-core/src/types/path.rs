//! Target object paths.
//!
//! Every object in the model is addressed by a [`TargetPath`]: an ordered list
//! of segments that is unique within one model. Keys name attributes or
//! collections (`Processes`), indices name elements (`[4242]`). The text form
//! is the one backends and logs use:
//!
//! ```text
//! Sessions[0].Processes[4242].Threads[1]
//! ```
//!
//! The empty path is the root.

use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};

/// One step in a [`TargetPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment
{
    /// Named attribute or collection, rendered `.name`
    Key(String),
    /// Element of a collection, rendered `[index]`
    Index(String),
}

impl PathSegment
{
    /// The bare name or index text.
    #[must_use]
    pub fn as_str(&self) -> &str
    {
        match self {
            Self::Key(key) | Self::Index(key) => key,
        }
    }

    /// Whether this segment is an index.
    #[must_use]
    pub fn is_index(&self) -> bool
    {
        matches!(self, Self::Index(_))
    }
}

impl fmt::Display for PathSegment
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Path uniquely identifying an object in the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TargetPath(Vec<PathSegment>);

impl TargetPath
{
    /// The root path.
    #[must_use]
    pub const fn root() -> Self
    {
        Self(Vec::new())
    }

    /// Build a path from segments.
    #[must_use]
    pub fn from_segments(segments: Vec<PathSegment>) -> Self
    {
        Self(segments)
    }

    /// Parse the dotted/bracketed text form.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` on empty keys, stray dots or unbalanced brackets.
    pub fn parse(text: &str) -> ModelResult<Self>
    {
        let malformed = |why: &str| ModelError::InvalidArgument(format!("malformed path {text:?}: {why}"));
        let mut segments = Vec::new();
        let mut rest = text.trim();
        let mut expect_key = false;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                if expect_key {
                    return Err(malformed("index directly after '.'"));
                }
                let close = after.find(']').ok_or_else(|| malformed("unterminated '['"))?;
                let index = &after[..close];
                if index.is_empty() || index.contains('[') {
                    return Err(malformed("empty or nested index"));
                }
                segments.push(PathSegment::Index(index.to_string()));
                rest = &after[close + 1..];
            } else if let Some(after) = rest.strip_prefix('.') {
                if segments.is_empty() || expect_key {
                    return Err(malformed("empty key"));
                }
                expect_key = true;
                rest = after;
                continue;
            } else {
                if !segments.is_empty() && !expect_key {
                    return Err(malformed("missing '.' before key"));
                }
                let end = rest.find(|c: char| matches!(c, '.' | '[' | ']')).unwrap_or(rest.len());
                if end == 0 {
                    return Err(malformed("unexpected ']'"));
                }
                segments.push(PathSegment::Key(rest[..end].to_string()));
                rest = &rest[end..];
            }
            expect_key = false;
        }

        if expect_key {
            return Err(malformed("trailing '.'"));
        }
        Ok(Self(segments))
    }

    /// Child path with an extra key segment.
    #[must_use]
    pub fn child(&self, key: impl Into<String>) -> Self
    {
        self.with(PathSegment::Key(key.into()))
    }

    /// Child path with an extra index segment.
    #[must_use]
    pub fn index(&self, index: impl fmt::Display) -> Self
    {
        self.with(PathSegment::Index(index.to_string()))
    }

    /// Child path with an arbitrary extra segment.
    #[must_use]
    pub fn with(&self, segment: PathSegment) -> Self
    {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// Parent path, `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self>
    {
        self.0.split_last().map(|(_, init)| Self(init.to_vec()))
    }

    /// Last segment, `None` at the root.
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment>
    {
        self.0.last()
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment]
    {
        &self.0
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.0.len()
    }

    #[must_use]
    pub fn is_root(&self) -> bool
    {
        self.0.is_empty()
    }

    /// Whether `self` equals `other` or is one of its ancestors.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &TargetPath) -> bool
    {
        other.0.starts_with(&self.0)
    }

    /// This path followed by each ancestor, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = TargetPath> + '_
    {
        (0..=self.0.len()).rev().map(|len| Self(self.0[..len].to_vec()))
    }
}

impl fmt::Display for TargetPath
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for (position, segment) in self.0.iter().enumerate() {
            if position > 0 && !segment.is_index() {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for TargetPath
{
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        Self::parse(s)
    }
}
