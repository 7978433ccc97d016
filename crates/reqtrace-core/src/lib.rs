//! reqtrace core - epic-rooted iterative refinement
//!
//! Walks an Epic → Requirement → UserStory → TestCase trace tree, scores
//! every artifact relative to its parent and refines weak artifacts under a
//! bounded LLM-call budget until a quality gate is met.
//!
//! # Components
//!
//! - [`TraceTree`] / [`TraceNode`]: arena of nodes with version history and scores
//! - [`TraceEvaluator`]: deterministic tier-1 scoring with LLM escalation
//! - [`TraceExpander`]: stub drafting, LLM-backed improve, rule-based repair
//! - [`TraceWalker`]: depth-first refinement with bottom-up feedback
//!
//! # Example
//!
//! ```rust,ignore
//! use reqtrace_core::prelude::*;
//!
//! # async fn example() -> Result<(), TraceError> {
//! let walker = TraceWalker::new(TraceConfig::default(), None)?;
//! let walk = walker.walk_epic(epic, ArtifactSet::new().with_requirements(reqs)).await?;
//!
//! println!("{}/{} nodes complete", walk.result.nodes_complete, walk.result.nodes_total);
//! for artifact in walk.tree.refined_artifacts() {
//!     store.replace(artifact);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod contract;
pub mod dimension;
pub mod error;
pub mod evaluator;
pub mod expander;
mod lexical;
pub mod llm;
pub mod result;
pub mod tree;
pub mod walker;

// Re-exports for convenience
pub use config::{ScoringTuning, TraceConfig, TypeOverride, TypeOverrides, WeightTable};
pub use dimension::{Dimension, DimensionScores};
pub use error::{LlmError, ResponseError, TraceError};
pub use evaluator::{Evaluation, TraceEvaluator};
pub use expander::{Refinement, TraceExpander};
pub use llm::{LlmClient, LlmFn, TimeoutLlm};
pub use result::{EpicWalk, LlmUsage, TraceWalkResult};
pub use tree::{ArtifactSet, NodeId, NodeSummary, ParentContext, TraceNode, TraceTree};
pub use walker::{TraceWalker, WalkContext};

pub use reqtrace_artifact::{
    Epic, NodeType, Requirement, Stage, StoryCriterion, TestCase, TestStep, TraceArtifact,
    UserStory,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for walking an epic
    pub use crate::{
        ArtifactSet, Epic, EpicWalk, LlmClient, LlmFn, NodeType, Requirement, StoryCriterion,
        TestCase, TestStep, TraceConfig, TraceError, TraceWalkResult, TraceWalker, UserStory,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub(crate) mod testing {
    use crate::error::LlmError;
    use crate::llm::LlmClient;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub Llm {}

        #[async_trait]
        impl LlmClient for Llm {
            async fn call(&self, prompt: &str) -> Result<String, LlmError>;
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;
    use testing::MockLlm;

    #[tokio::test]
    async fn llm_scores_lift_a_node_to_complete() {
        let mut mock = MockLlm::new();
        mock.expect_call().returning(|prompt| {
            if prompt.starts_with("Score this requirement") {
                Ok(r#"{"scores": {"scope_coverage": 0.9, "clarity": 0.9,
                    "feasibility": 0.9, "acceptance_quality": 0.9}}"#
                    .to_string())
            } else {
                Err(LlmError::EmptyResponse)
            }
        });

        let epic = Epic::new("EP-1", "Billing", "Invoices for customers").with_requirements(["REQ-1"]);
        let set = ArtifactSet::new().with_requirements(vec![Requirement::new("REQ-1", "x", "y")]);
        let walker = TraceWalker::new(TraceConfig::default(), Some(Arc::new(mock))).unwrap();
        let walk = walker.walk_epic(epic, set).await.unwrap();

        let req = walk.tree.node(walk.tree.root()).children()[0];
        let node = walk.tree.node(req);
        assert!(node.is_complete());
        assert_eq!(node.versions().original().stage(), Stage::Draft);
        assert!(node.quality_score() >= 0.7);
        assert!(walk.result.evaluator_calls >= 1);
    }

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
