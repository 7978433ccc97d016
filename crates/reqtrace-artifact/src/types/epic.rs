//! Epic artifact

use serde::{Deserialize, Serialize};

/// Top-level grouping of related requirements
///
/// The root of every trace tree. Epics provide context for scoring their
/// requirements but are never scored or refined themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Epic {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Requirement ids grouped under this epic, in presentation order
    pub parent_requirements: Vec<String>,
}

impl Epic {
    /// Create an epic with no requirements
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            parent_requirements: Vec::new(),
        }
    }

    /// With requirement ids
    #[inline]
    #[must_use]
    pub fn with_requirements<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_requirements = ids.into_iter().map(Into::into).collect();
        self
    }
}
