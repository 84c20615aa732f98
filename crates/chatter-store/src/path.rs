//! Document and collection paths.
//!
//! Paths alternate collection and document segments:
//! `users` is a collection, `users/u1` a document, `users/u1/items` a
//! sub-collection of that document, and so on.

use std::fmt;

use crate::error::{Result, StoreError};

fn validate_segment(segment: &str, whole: &str) -> Result<()> {
    if segment.is_empty() || segment.contains('/') || segment.chars().any(char::is_control) {
        return Err(StoreError::InvalidPath(whole.to_string()));
    }
    Ok(())
}

fn segment_count(raw: &str) -> Result<usize> {
    let mut count = 0;
    for segment in raw.split('/') {
        validate_segment(segment, raw)?;
        count += 1;
    }
    Ok(count)
}

/// Path of a collection (odd number of segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: &str) -> Result<Self> {
        validate_segment(name, name)?;
        Ok(Self(name.to_string()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if segment_count(raw)? % 2 == 1 {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidPath(raw.to_string()))
        }
    }

    /// The document `id` inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocPath> {
        validate_segment(id, id)?;
        Ok(DocPath(format!("{}/{}", self.0, id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a single document (even number of segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath(String);

impl DocPath {
    pub fn parse(raw: &str) -> Result<Self> {
        if segment_count(raw)? % 2 == 0 {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidPath(raw.to_string()))
        }
    }

    /// The last segment.
    pub fn id(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, id)| id).unwrap_or(&self.0)
    }

    /// The collection holding this document.
    pub fn parent(&self) -> CollectionPath {
        let parent = self.0.rsplit_once('/').map(|(p, _)| p).unwrap_or_default();
        CollectionPath(parent.to_string())
    }

    /// A sub-collection nested under this document.
    pub fn collection(&self, name: &str) -> Result<CollectionPath> {
        validate_segment(name, name)?;
        Ok(CollectionPath(format!("{}/{}", self.0, name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
