//! Scoring dimensions
//!
//! Each node type is scored on its own fixed set of [`Dimension`]s. Two
//! extra dimensions, [`Dimension::ChildrenCoverage`] and
//! [`Dimension::Overall`], are added by bottom-up evaluation only.

use reqtrace_artifact::NodeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-dimension scores in [0, 1]
pub type DimensionScores = BTreeMap<Dimension, f64>;

/// A named quality axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    // requirement vs epic
    ScopeCoverage,
    Clarity,
    Feasibility,
    AcceptanceQuality,
    // user story vs requirement
    CriteriaCoverage,
    PersonaFit,
    ActionCompleteness,
    Testability,
    // test case vs user story
    CriteriaVerification,
    StepCompleteness,
    BoundaryCoverage,
    NegativePaths,
    // bottom-up feedback
    ChildrenCoverage,
    Overall,
}

const REQUIREMENT_DIMENSIONS: &[Dimension] = &[
    Dimension::ScopeCoverage,
    Dimension::Clarity,
    Dimension::Feasibility,
    Dimension::AcceptanceQuality,
];

const USER_STORY_DIMENSIONS: &[Dimension] = &[
    Dimension::CriteriaCoverage,
    Dimension::PersonaFit,
    Dimension::ActionCompleteness,
    Dimension::Testability,
];

const TEST_CASE_DIMENSIONS: &[Dimension] = &[
    Dimension::CriteriaVerification,
    Dimension::StepCompleteness,
    Dimension::BoundaryCoverage,
    Dimension::NegativePaths,
];

impl Dimension {
    /// Dimensions scored for a node type; empty for epics
    #[inline]
    #[must_use]
    pub fn for_node_type(node_type: NodeType) -> &'static [Dimension] {
        match node_type {
            NodeType::Epic => &[],
            NodeType::Requirement => REQUIREMENT_DIMENSIONS,
            NodeType::UserStory => USER_STORY_DIMENSIONS,
            NodeType::TestCase => TEST_CASE_DIMENSIONS,
        }
    }

    /// Wire name, matching the serde representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScopeCoverage => "scope_coverage",
            Self::Clarity => "clarity",
            Self::Feasibility => "feasibility",
            Self::AcceptanceQuality => "acceptance_quality",
            Self::CriteriaCoverage => "criteria_coverage",
            Self::PersonaFit => "persona_fit",
            Self::ActionCompleteness => "action_completeness",
            Self::Testability => "testability",
            Self::CriteriaVerification => "criteria_verification",
            Self::StepCompleteness => "step_completeness",
            Self::BoundaryCoverage => "boundary_coverage",
            Self::NegativePaths => "negative_paths",
            Self::ChildrenCoverage => "children_coverage",
            Self::Overall => "overall",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a score into [0, 1], mapping NaN to 0
#[inline]
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
