//! Test case artifact

use serde::{Deserialize, Serialize};

/// One step of a test procedure
///
/// Upstream generators emit the step instruction either as `action` or as
/// `description`; both are kept and [`TestStep::instruction`] picks whichever
/// is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestStep {
    pub action: String,
    pub description: String,
    pub expected_result: String,
}

impl TestStep {
    /// Create a step from an action and its expected result
    #[inline]
    #[must_use]
    pub fn new(action: impl Into<String>, expected_result: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            description: String::new(),
            expected_result: expected_result.into(),
        }
    }

    /// The step instruction, preferring `action` over `description`
    #[inline]
    #[must_use]
    pub fn instruction(&self) -> &str {
        if self.action.trim().is_empty() {
            &self.description
        } else {
            &self.action
        }
    }

    /// Has both an instruction and an expected result
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.instruction().trim().is_empty() && !self.expected_result.trim().is_empty()
    }
}

/// Verification procedure for a user story
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub description: String,
    pub steps: Vec<TestStep>,
    pub expected_result: String,
    pub test_type: String,
    pub parent_user_story_id: Option<String>,
}

impl TestCase {
    /// Create a functional test case with no steps
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, parent_user_story_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            test_type: "functional".to_string(),
            parent_user_story_id: Some(parent_user_story_id.into()),
            ..Self::default()
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With steps
    #[inline]
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<TestStep>) -> Self {
        self.steps = steps;
        self
    }

    /// With overall expected result
    #[inline]
    #[must_use]
    pub fn with_expected_result(mut self, expected: impl Into<String>) -> Self {
        self.expected_result = expected.into();
        self
    }

    /// With test type
    #[inline]
    #[must_use]
    pub fn with_test_type(mut self, test_type: impl Into<String>) -> Self {
        self.test_type = test_type.into();
        self
    }

    /// Step instructions and expected results joined with spaces
    #[must_use]
    pub fn steps_text(&self) -> String {
        self.steps
            .iter()
            .map(|s| format!("{} {}", s.instruction(), s.expected_result))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
