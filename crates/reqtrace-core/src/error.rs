//! Error types for reqtrace core
//!
//! Only construction-time problems escape the public API as [`TraceError`].
//! LLM failures ([`LlmError`]) and contract violations in LLM responses
//! ([`ResponseError`]) are absorbed by the component that made the call and
//! surfaced as issue text.

use reqtrace_artifact::{ArtifactError, NodeType, UnknownVariant};

use crate::tree::NodeId;

/// Main reqtrace error type
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Node type or stage string outside its enum
    #[error("invalid variant: {0}")]
    InvalidVariant(#[from] UnknownVariant),

    /// Artifact placed at the wrong trace level
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Configuration out of range
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Node id does not belong to this tree
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Child type does not follow the trace mapping
    #[error("cannot attach {child} under {parent}")]
    InvalidChild { parent: NodeType, child: NodeType },
}

impl TraceError {
    /// Create configuration error
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Failures of the injected LLM call
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport, auth or provider failure
    #[error("llm transport failed: {0}")]
    Transport(#[from] anyhow::Error),

    /// Call exceeded its deadline
    #[error("llm call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Provider returned nothing
    #[error("llm returned an empty response")]
    EmptyResponse,

    /// Response did not satisfy the expected contract
    #[error("llm response rejected: {0}")]
    Response(#[from] ResponseError),
}

impl LlmError {
    /// Issue text recorded on the node when this failure is absorbed
    ///
    /// The `[llm]` prefix marks infrastructure degradation as opposed to
    /// domain quality gaps.
    #[must_use]
    pub fn as_issue(&self, during: &str) -> String {
        format!("[llm] {during} unavailable: {self}")
    }
}

/// Violations of a typed LLM response contract
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// No JSON object could be located in the response text
    #[error("no JSON object found in response")]
    NoJsonObject,

    /// JSON did not decode into the contract type
    #[error("response does not match contract: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response decoded but carried none of the expected fields
    #[error("response contains no applicable fields")]
    NoApplicableFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_error_display() {
        let err = TraceError::config("quality_threshold must be in [0, 1]");
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn unknown_variant_converts() {
        let parsed = "feature".parse::<NodeType>().map_err(TraceError::from);
        assert!(matches!(parsed, Err(TraceError::InvalidVariant(_))));
    }

    #[test]
    fn response_errors_convert_into_llm_errors() {
        let err = LlmError::from(ResponseError::NoJsonObject);
        assert!(matches!(err, LlmError::Response(ResponseError::NoJsonObject)));
        assert!(err.to_string().contains("no JSON object"));
    }

    #[test]
    fn issue_text_is_prefixed() {
        let issue = LlmError::EmptyResponse.as_issue("evaluation");
        assert!(issue.starts_with("[llm] evaluation unavailable"));
    }
}
