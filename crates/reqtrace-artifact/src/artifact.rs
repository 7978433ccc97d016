//! Tagged union over the four trace artifact kinds
//!
//! [`TraceArtifact`] is what a trace node owns. Its accessors are total:
//! every kind answers `id()`, `title()`, `text()` and so on, falling back to
//! an empty value where a kind has no such field, so scoring and refinement
//! code never has to check for optional attributes.

use crate::hash::ContentHash;
use crate::node_type::NodeType;
use crate::types::{Epic, Requirement, TestCase, UserStory};
use serde::{Deserialize, Serialize};

/// Any artifact that can sit in a trace tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceArtifact {
    Epic(Epic),
    Requirement(Requirement),
    UserStory(UserStory),
    TestCase(TestCase),
}

impl TraceArtifact {
    /// Trace level of this artifact
    #[inline]
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Epic(_) => NodeType::Epic,
            Self::Requirement(_) => NodeType::Requirement,
            Self::UserStory(_) => NodeType::UserStory,
            Self::TestCase(_) => NodeType::TestCase,
        }
    }

    /// Artifact identifier (`requirement_id` for requirements)
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Epic(e) => &e.id,
            Self::Requirement(r) => &r.requirement_id,
            Self::UserStory(s) => &s.id,
            Self::TestCase(t) => &t.id,
        }
    }

    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Epic(e) => &e.title,
            Self::Requirement(r) => &r.title,
            Self::UserStory(s) => &s.title,
            Self::TestCase(t) => &t.title,
        }
    }

    /// Free-text description; stories have none and answer with their action
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Epic(e) => &e.description,
            Self::Requirement(r) => &r.description,
            Self::UserStory(s) => &s.action,
            Self::TestCase(t) => &t.description,
        }
    }

    /// Id of the trace parent named by this artifact's foreign key
    #[inline]
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Self::Epic(_) | Self::Requirement(_) => None,
            Self::UserStory(s) => s.parent_requirement_id.as_deref(),
            Self::TestCase(t) => t.parent_user_story_id.as_deref(),
        }
    }

    /// Every textual field joined with spaces, for lexical analysis
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Epic(e) => format!("{} {}", e.title, e.description),
            Self::Requirement(r) => format!(
                "{} {} {}",
                r.title,
                r.description,
                r.acceptance_criteria.join(" ")
            ),
            Self::UserStory(s) => format!(
                "{} {} {} {} {}",
                s.title,
                s.persona,
                s.action,
                s.benefit,
                s.criteria_text()
            ),
            Self::TestCase(t) => format!(
                "{} {} {} {} {}",
                t.title,
                t.description,
                t.test_type,
                t.steps_text(),
                t.expected_result
            ),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_epic(&self) -> Option<&Epic> {
        match self {
            Self::Epic(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_requirement(&self) -> Option<&Requirement> {
        match self {
            Self::Requirement(r) => Some(r),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_user_story(&self) -> Option<&UserStory> {
        match self {
            Self::UserStory(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_test_case(&self) -> Option<&TestCase> {
        match self {
            Self::TestCase(t) => Some(t),
            _ => None,
        }
    }

    /// Check that this artifact belongs at the given trace level
    ///
    /// # Errors
    /// Returns [`ArtifactError::KindMismatch`] when the kinds differ
    pub fn expect_type(&self, expected: NodeType) -> Result<(), ArtifactError> {
        let actual = self.node_type();
        if actual == expected {
            Ok(())
        } else {
            Err(ArtifactError::KindMismatch { expected, actual })
        }
    }

    /// Blake3 digest of the JSON encoding
    ///
    /// Encoding these plain-data types cannot fail in practice; if it ever
    /// does the zero digest is returned.
    #[must_use]
    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::compute_serializable(self).unwrap_or_default()
    }
}

impl From<Epic> for TraceArtifact {
    fn from(value: Epic) -> Self {
        Self::Epic(value)
    }
}

impl From<Requirement> for TraceArtifact {
    fn from(value: Requirement) -> Self {
        Self::Requirement(value)
    }
}

impl From<UserStory> for TraceArtifact {
    fn from(value: UserStory) -> Self {
        Self::UserStory(value)
    }
}

impl From<TestCase> for TraceArtifact {
    fn from(value: TestCase) -> Self {
        Self::TestCase(value)
    }
}

/// Errors related to artifact operations
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Artifact kind does not match the trace level it was placed at
    #[error("artifact kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: NodeType, actual: NodeType },

    /// A version number outside the log was requested
    #[error("version {requested} out of range (log holds {len})")]
    VersionOutOfRange { requested: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StoryCriterion, TestStep};

    #[test]
    fn accessors_are_total_across_kinds() {
        let artifacts: Vec<TraceArtifact> = vec![
            Epic::new("E-1", "Checkout", "Buy things").into(),
            Requirement::new("REQ-1", "Pay", "Pay by card").into(),
            UserStory::new("US-1", "Pay story", "REQ-1").into(),
            TestCase::new("TC-1", "Pay test", "US-1").into(),
        ];
        let ids: Vec<&str> = artifacts.iter().map(TraceArtifact::id).collect();
        assert_eq!(ids, vec!["E-1", "REQ-1", "US-1", "TC-1"]);
        for a in &artifacts {
            assert!(!a.title().is_empty());
            assert!(!a.text().is_empty());
        }
    }

    #[test]
    fn parent_id_follows_foreign_keys() {
        let story: TraceArtifact = UserStory::new("US-1", "t", "REQ-7").into();
        let test: TraceArtifact = TestCase::new("TC-1", "t", "US-1").into();
        let req: TraceArtifact = Requirement::new("REQ-7", "t", "d").into();
        assert_eq!(story.parent_id(), Some("REQ-7"));
        assert_eq!(test.parent_id(), Some("US-1"));
        assert_eq!(req.parent_id(), None);
    }

    #[test]
    fn text_includes_nested_fields() {
        let story: TraceArtifact = UserStory::new("US-1", "Login", "REQ-1")
            .with_criteria(vec![StoryCriterion::new("a locked account", "login", "rejected")])
            .into();
        assert!(story.text().contains("locked"));

        let test: TraceArtifact = TestCase::new("TC-1", "Login", "US-1")
            .with_steps(vec![TestStep::new("enter invalid password", "error shown")])
            .into();
        assert!(test.text().contains("invalid"));
    }

    #[test]
    fn expect_type_reports_mismatch() {
        let req: TraceArtifact = Requirement::new("REQ-1", "t", "d").into();
        assert!(req.expect_type(NodeType::Requirement).is_ok());
        let err = req.expect_type(NodeType::TestCase).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::KindMismatch {
                expected: NodeType::TestCase,
                actual: NodeType::Requirement
            }
        ));
    }

    #[test]
    fn tagged_serde_round_trip() {
        let req: TraceArtifact = Requirement::new("REQ-1", "t", "d").into();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["kind"], "requirement");
        let back: TraceArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a: TraceArtifact = Requirement::new("REQ-1", "t", "d").into();
        let b: TraceArtifact = Requirement::new("REQ-1", "t", "d2").into();
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
