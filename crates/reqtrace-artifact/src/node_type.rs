//! Trace-axis node types and refinement stages
//!
//! [`NodeType`] names the four levels of the trace hierarchy
//! (Epic → Requirement → UserStory → TestCase). [`Stage`] names the
//! refinement mode that produced a given artifact version.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Level of an artifact in the trace hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Root grouping of requirements
    Epic,
    /// Functional or non-functional need
    Requirement,
    /// Persona/action/benefit decomposition of a requirement
    UserStory,
    /// Verification procedure for a user story
    TestCase,
}

impl NodeType {
    /// Stable identifier used in configuration and reports
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Requirement => "requirement",
            Self::UserStory => "user_story",
            Self::TestCase => "test_case",
        }
    }

    /// Type of the children this level expands into
    ///
    /// Test cases are leaves of the trace axis.
    #[inline]
    #[must_use]
    pub fn child_type(&self) -> Option<NodeType> {
        match self {
            Self::Epic => Some(Self::Requirement),
            Self::Requirement => Some(Self::UserStory),
            Self::UserStory => Some(Self::TestCase),
            Self::TestCase => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "epic" => Ok(Self::Epic),
            "requirement" => Ok(Self::Requirement),
            "user_story" => Ok(Self::UserStory),
            "test_case" => Ok(Self::TestCase),
            other => Err(UnknownVariant {
                kind: "node_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Refinement mode that produced an artifact version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Initial artifact, either supplied by the caller or drafted as a stub
    #[default]
    Draft,
    /// Qualitative refinement (LLM-backed when available)
    Improve,
    /// Structural repair of a badly deficient artifact
    Debug,
}

impl Stage {
    /// Stable identifier used in logs and reports
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Improve => "improve",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "improve" => Ok(Self::Improve),
            "debug" => Ok(Self::Debug),
            other => Err(UnknownVariant {
                kind: "stage_name",
                value: other.to_string(),
            }),
        }
    }
}

/// A string did not name any variant of a closed enum
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: '{value}'")]
pub struct UnknownVariant {
    /// Which enum was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}
