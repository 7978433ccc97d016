//! User story artifact

use serde::{Deserialize, Serialize};

/// Structured Given/When/Then acceptance criterion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryCriterion {
    pub given: String,
    pub when: String,
    pub then: String,
}

impl StoryCriterion {
    /// Create a criterion from its three clauses
    #[inline]
    #[must_use]
    pub fn new(given: impl Into<String>, when: impl Into<String>, then: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            when: when.into(),
            then: then.into(),
        }
    }

    /// All three clauses carry text
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.given.trim().is_empty() && !self.when.trim().is_empty() && !self.then.trim().is_empty()
    }

    /// Clauses joined with spaces
    #[must_use]
    pub fn text(&self) -> String {
        format!("{} {} {}", self.given, self.when, self.then)
    }
}

/// Persona/action/benefit statement decomposing a requirement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStory {
    pub id: String,
    pub title: String,
    pub persona: String,
    pub action: String,
    pub benefit: String,
    pub acceptance_criteria: Vec<StoryCriterion>,
    pub parent_requirement_id: Option<String>,
}

impl UserStory {
    /// Create an empty story under a requirement
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, parent_requirement_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            parent_requirement_id: Some(parent_requirement_id.into()),
            ..Self::default()
        }
    }

    /// With persona, action and benefit
    #[inline]
    #[must_use]
    pub fn with_statement(
        mut self,
        persona: impl Into<String>,
        action: impl Into<String>,
        benefit: impl Into<String>,
    ) -> Self {
        self.persona = persona.into();
        self.action = action.into();
        self.benefit = benefit.into();
        self
    }

    /// With Given/When/Then criteria
    #[inline]
    #[must_use]
    pub fn with_criteria(mut self, criteria: Vec<StoryCriterion>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    /// "As a ..., I want ..., so that ..." rendering
    #[must_use]
    pub fn statement(&self) -> String {
        format!(
            "As a {}, I want {}, so that {}",
            self.persona, self.action, self.benefit
        )
    }

    /// All criterion clauses joined with spaces
    #[must_use]
    pub fn criteria_text(&self) -> String {
        self.acceptance_criteria
            .iter()
            .map(StoryCriterion::text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
