//! Artifact generation and refinement
//!
//! [`TraceExpander`] never edits an artifact in place. Every operation
//! returns a new [`TraceArtifact`] which the walker records as the node's
//! next version.

use crate::config::TraceConfig;
use crate::contract::{apply_patch, patch_schema};
use crate::error::{LlmError, TraceError};
use crate::lexical::{truncate_chars, word_count};
use crate::llm::LlmClient;
use crate::tree::{NodeId, ParentContext, TraceTree};
use reqtrace_artifact::{
    NodeType, Requirement, Stage, TestCase, TestStep, TraceArtifact, UserStory,
};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const GENERIC_BENEFIT: &str = "I can complete my task without assistance";
const GENERIC_OUTCOME: &str = "The system behaves as the user story specifies";
const CLARITY_MIN_WORDS: usize = 10;

/// A refined artifact ready to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// New artifact value
    pub artifact: TraceArtifact,
    /// Stage marker to record with it
    pub stage: Stage,
    /// Whether an LLM call was attempted
    pub llm_attempted: bool,
    /// Whether the LLM patch was applied
    pub llm_applied: bool,
    /// Absorbed failures, for the node's refinement log
    pub notes: Vec<String>,
}

/// Drafts child artifacts and refines existing ones
pub struct TraceExpander {
    config: Arc<TraceConfig>,
    llm: Option<Arc<dyn LlmClient>>,
    llm_calls: AtomicU32,
}

impl fmt::Debug for TraceExpander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceExpander")
            .field("has_llm", &self.llm.is_some())
            .field("llm_calls", &self.llm_calls())
            .finish_non_exhaustive()
    }
}

impl TraceExpander {
    /// Create expander
    #[must_use]
    pub fn new(config: Arc<TraceConfig>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            config,
            llm,
            llm_calls: AtomicU32::new(0),
        }
    }

    /// LLM-backed improve attempts made by this expander over its lifetime
    #[inline]
    #[must_use]
    pub fn llm_calls(&self) -> u32 {
        self.llm_calls.load(Ordering::Relaxed)
    }

    /// Stub children for a parent artifact
    ///
    /// A requirement yields one user story and a user story yields one test
    /// case. Epics yield nothing since their requirements are listed up
    /// front, and test cases have no children.
    #[must_use]
    pub fn draft(&self, parent: &TraceArtifact) -> Vec<TraceArtifact> {
        match parent {
            TraceArtifact::Epic(_) | TraceArtifact::TestCase(_) => Vec::new(),
            TraceArtifact::Requirement(req) => vec![self.draft_story(req).into()],
            TraceArtifact::UserStory(story) => vec![draft_test_case(story).into()],
        }
    }

    fn draft_story(&self, req: &Requirement) -> UserStory {
        let source = if req.description.trim().is_empty() {
            &req.title
        } else {
            &req.description
        };
        let action = truncate_chars(source.trim(), self.config.scoring.draft_action_chars);
        let mut story = UserStory::new(
            format!("{}-US-1", req.requirement_id),
            format!("Story for {}", req.title),
            req.requirement_id.clone(),
        );
        story.persona = "user".to_string();
        story.action = action;
        story
    }

    /// Refine a node, preferring the LLM when one is configured and allowed
    ///
    /// Any LLM failure or empty patch falls back to the rule-based path;
    /// the failure is kept in [`Refinement::notes`].
    ///
    /// # Errors
    /// [`TraceError::UnknownNode`] when `id` is not in `tree`
    pub async fn improve(
        &self,
        tree: &TraceTree,
        id: NodeId,
        issues: &[String],
        allow_llm: bool,
    ) -> Result<Refinement, TraceError> {
        let node = tree.get(id)?;
        let artifact = node.artifact();
        let parent = tree.parent_of(id).map(|p| p.artifact());

        let llm = match &self.llm {
            Some(llm) if allow_llm && node.node_type() != NodeType::Epic => llm,
            _ => return Ok(self.fallback(artifact, parent, Stage::Improve, false, Vec::new())),
        };

        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        let prompt = refinement_prompt(artifact, &tree.parent_context(id), issues);
        let outcome = match llm.call(&prompt).await {
            Ok(text) => apply_patch(artifact, &text).map_err(LlmError::from),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(patched) => Ok(Refinement {
                artifact: patched,
                stage: Stage::Improve,
                llm_attempted: true,
                llm_applied: true,
                notes: Vec::new(),
            }),
            Err(err) => {
                tracing::warn!("LLM refinement failed for {}: {}", node.node_id(), err);
                let notes = vec![err.as_issue("refinement")];
                Ok(self.fallback(artifact, parent, Stage::Improve, true, notes))
            }
        }
    }

    /// Structural repair for nodes scoring below the debug threshold
    ///
    /// # Errors
    /// [`TraceError::UnknownNode`] when `id` is not in `tree`
    pub fn debug(&self, tree: &TraceTree, id: NodeId, issues: &[String]) -> Result<Refinement, TraceError> {
        let node = tree.get(id)?;
        tracing::debug!("Debugging {} with {} issues", node.node_id(), issues.len());
        let parent = tree.parent_of(id).map(|p| p.artifact());
        Ok(self.fallback(node.artifact(), parent, Stage::Debug, false, Vec::new()))
    }

    fn fallback(
        &self,
        artifact: &TraceArtifact,
        parent: Option<&TraceArtifact>,
        stage: Stage,
        llm_attempted: bool,
        notes: Vec<String>,
    ) -> Refinement {
        Refinement {
            artifact: self.rule_based(artifact, parent),
            stage,
            llm_attempted,
            llm_applied: false,
            notes,
        }
    }

    /// Deterministic repair of missing structure
    #[must_use]
    pub fn rule_based(&self, artifact: &TraceArtifact, parent: Option<&TraceArtifact>) -> TraceArtifact {
        match artifact {
            TraceArtifact::Epic(_) => artifact.clone(),
            TraceArtifact::Requirement(req) => repair_requirement(req).into(),
            TraceArtifact::UserStory(story) => {
                repair_story(story, parent.and_then(TraceArtifact::as_requirement)).into()
            }
            TraceArtifact::TestCase(test) => repair_test_case(test).into(),
        }
    }
}

fn repair_requirement(req: &Requirement) -> Requirement {
    let mut out = req.clone();
    let subject = if out.title.trim().is_empty() {
        out.requirement_id.clone()
    } else {
        out.title.trim().to_string()
    };
    if out.description.trim().is_empty() {
        out.description = format!("The system shall support {subject}.");
    }
    if word_count(&out.description) < CLARITY_MIN_WORDS {
        out.description = format!(
            "{} The system shall provide {subject} with observable and verifiable outcomes for every user.",
            out.description.trim()
        );
    }
    if out.acceptance_criteria.is_empty() {
        out.acceptance_criteria
            .push(format!("{subject} is implemented and verified against its description"));
    }
    out
}

fn repair_story(story: &UserStory, parent: Option<&Requirement>) -> UserStory {
    let mut out = story.clone();
    if out.persona.trim().is_empty() {
        out.persona = "user".to_string();
    }
    if out.action.trim().is_empty() {
        let source = parent
            .map(|r| r.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| story.title.trim());
        out.action = if source.is_empty() {
            "complete the described workflow".to_string()
        } else {
            format!("use {}", source.to_lowercase())
        };
    }
    if out.benefit.trim().is_empty() {
        out.benefit = GENERIC_BENEFIT.to_string();
    }
    out
}

fn repair_test_case(test: &TestCase) -> TestCase {
    let mut out = test.clone();
    if out.steps.is_empty() {
        let subject = if out.title.trim().is_empty() {
            out.id.clone()
        } else {
            out.title.trim().to_string()
        };
        out.steps.push(TestStep::new(
            format!("Execute the scenario for {subject}"),
            GENERIC_OUTCOME,
        ));
    }
    if out.expected_result.trim().is_empty() {
        out.expected_result = GENERIC_OUTCOME.to_string();
    }
    out
}

fn draft_test_case(story: &UserStory) -> TestCase {
    let subject = if story.title.trim().is_empty() {
        story.id.clone()
    } else {
        story.title.trim().to_string()
    };
    let instruction = if story.action.trim().is_empty() {
        format!("Perform the workflow of {subject}")
    } else {
        format!("As {}, {}", story.persona.trim(), story.action.trim())
    };
    TestCase::new(
        format!("{}-TC-1", story.id),
        format!("Verify {subject}"),
        story.id.clone(),
    )
    .with_description(format!("Verify that {subject} behaves as specified"))
    .with_steps(vec![TestStep::new(instruction, GENERIC_OUTCOME)])
    .with_test_type("functional")
}

fn refinement_prompt(artifact: &TraceArtifact, context: &ParentContext, issues: &[String]) -> String {
    let node_type = artifact.node_type();
    let issues = if issues.is_empty() {
        "- none recorded".to_string()
    } else {
        issues
            .iter()
            .map(|i| format!("- {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Improve this {node_type} so it addresses the issues below and stays consistent with its parent.\n\n\
         Parent context:\n{}\n\n\
         Current artifact:\n{}\n\n\
         Issues:\n{issues}\n\n\
         Respond with a single JSON object containing only the fields you change, matching this schema:\n{}\n",
        serde_json::to_string_pretty(context).unwrap_or_default(),
        serde_json::to_string_pretty(artifact).unwrap_or_default(),
        patch_schema(node_type),
    )
}
