//! Requirement artifact

use serde::{Deserialize, Serialize};

/// A single functional or non-functional need
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirement {
    pub requirement_id: String,
    pub title: String,
    pub description: String,
    /// Free-form classification, e.g. "functional" or "non_functional"
    #[serde(rename = "type")]
    pub requirement_type: String,
    pub acceptance_criteria: Vec<String>,
}

impl Requirement {
    /// Create a functional requirement without acceptance criteria
    #[inline]
    #[must_use]
    pub fn new(
        requirement_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            requirement_id: requirement_id.into(),
            title: title.into(),
            description: description.into(),
            requirement_type: "functional".to_string(),
            acceptance_criteria: Vec::new(),
        }
    }

    /// With acceptance criteria
    #[inline]
    #[must_use]
    pub fn with_criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptance_criteria = criteria.into_iter().map(Into::into).collect();
        self
    }

    /// With requirement type
    #[inline]
    #[must_use]
    pub fn with_type(mut self, requirement_type: impl Into<String>) -> Self {
        self.requirement_type = requirement_type.into();
        self
    }
}
