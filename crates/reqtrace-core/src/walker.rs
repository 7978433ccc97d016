//! Depth-first refinement walk
//!
//! [`TraceWalker`] drives each node below the epic root through:
//!
//! 1. Evaluate against the parent; complete nodes skip refinement
//! 2. Refine (debug below the debug threshold, improve otherwise) until
//!    complete, out of iterations, out of budget or stagnating
//! 3. Draft stub children for leaves that are not test cases
//! 4. Walk each child
//! 5. Bottom-up pass: when the children pull the node's overall score
//!    below its last score, run one more improve pass
//!
//! All per-walk state lives in a [`WalkContext`], so one walker can serve
//! several epics concurrently.

use crate::config::TraceConfig;
use crate::error::TraceError;
use crate::evaluator::TraceEvaluator;
use crate::expander::{Refinement, TraceExpander};
use crate::llm::LlmClient;
use crate::result::{EpicWalk, LlmUsage, TraceWalkResult};
use crate::tree::{ArtifactSet, NodeId, TraceNode, TraceTree};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqtrace_artifact::{Epic, NodeType};
use std::sync::Arc;
use std::time::Instant;
use ulid::Ulid;

/// Mutable state of one epic walk
#[derive(Debug, Clone)]
pub struct WalkContext {
    walk_id: Ulid,
    max_llm_calls: u32,
    usage: LlmUsage,
}

impl WalkContext {
    fn new(max_llm_calls: u32) -> Self {
        Self {
            walk_id: Ulid::new(),
            max_llm_calls,
            usage: LlmUsage::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn walk_id(&self) -> Ulid {
        self.walk_id
    }

    /// Calls charged so far
    #[inline]
    #[must_use]
    pub fn usage(&self) -> LlmUsage {
        self.usage
    }

    /// Whether another LLM call fits in the budget
    #[inline]
    #[must_use]
    pub fn budget_remaining(&self) -> bool {
        self.usage.total() < self.max_llm_calls
    }

    fn charge_evaluator(&mut self, attempted: bool) {
        if attempted {
            self.usage.evaluator_calls += 1;
        }
    }

    fn charge_expander(&mut self, attempted: bool) {
        if attempted {
            self.usage.expander_calls += 1;
        }
    }
}

/// Orchestrates evaluation and refinement over a trace tree
#[derive(Debug)]
pub struct TraceWalker {
    config: Arc<TraceConfig>,
    evaluator: TraceEvaluator,
    expander: TraceExpander,
}

impl TraceWalker {
    /// Create walker; `llm = None` runs fully programmatic
    ///
    /// # Errors
    /// [`TraceError::ConfigError`] when the configuration fails validation
    pub fn new(config: TraceConfig, llm: Option<Arc<dyn LlmClient>>) -> Result<Self, TraceError> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            evaluator: TraceEvaluator::new(Arc::clone(&config), llm.clone()),
            expander: TraceExpander::new(Arc::clone(&config), llm),
            config,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn evaluator(&self) -> &TraceEvaluator {
        &self.evaluator
    }

    #[inline]
    #[must_use]
    pub fn expander(&self) -> &TraceExpander {
        &self.expander
    }

    /// Build the trace tree for an epic and walk it
    ///
    /// # Errors
    /// Only on internal tree inconsistencies; LLM failures and budget
    /// exhaustion are absorbed.
    pub async fn walk_epic(&self, epic: Epic, artifacts: ArtifactSet) -> Result<EpicWalk, TraceError> {
        let tree = TraceTree::build(epic, artifacts, &self.config);
        self.walk_tree(tree).await
    }

    /// Walk an already built tree
    ///
    /// # Errors
    /// See [`TraceWalker::walk_epic`]
    pub async fn walk_tree(&self, mut tree: TraceTree) -> Result<EpicWalk, TraceError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut ctx = WalkContext::new(self.config.max_total_llm_calls);

        tracing::info!(
            "Walking epic {} ({} nodes, walk {})",
            tree.node(tree.root()).node_id(),
            tree.len(),
            ctx.walk_id()
        );

        let children = tree.node(tree.root()).children().to_vec();
        for child in children {
            self.walk_node(&mut tree, child, &mut ctx).await?;
        }

        let result = TraceWalkResult::from_tree(
            &tree,
            ctx.walk_id(),
            started_at,
            clock.elapsed().as_secs_f64(),
            ctx.usage(),
        );
        tracing::info!(
            "Walk of {} finished: {}/{} complete, {} refined, {} LLM calls",
            result.epic_id,
            result.nodes_complete,
            result.nodes_total,
            result.nodes_refined,
            result.llm_calls_used
        );
        Ok(EpicWalk { result, tree })
    }

    fn walk_node<'a>(
        &'a self,
        tree: &'a mut TraceTree,
        id: NodeId,
        ctx: &'a mut WalkContext,
    ) -> BoxFuture<'a, Result<(), TraceError>> {
        async move {
            self.refine_node(tree, id, ctx).await?;
            self.draft_children(tree, id)?;

            let children = tree.node(id).children().to_vec();
            for child in &children {
                self.walk_node(tree, *child, ctx).await?;
            }

            if !children.is_empty() && ctx.budget_remaining() {
                self.feedback_pass(tree, id, ctx).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn refine_node(
        &self,
        tree: &mut TraceTree,
        id: NodeId,
        ctx: &mut WalkContext,
    ) -> Result<(), TraceError> {
        let node_type = tree.get(id)?.node_type();
        let threshold = self.config.effective_threshold(node_type);

        let evaluation = self.evaluator.evaluate(tree, id, ctx.budget_remaining()).await?;
        ctx.charge_evaluator(evaluation.llm_attempted);
        let mut score = evaluation.aggregate;
        if score >= threshold {
            self.complete(tree, id, score)?;
            return Ok(());
        }

        loop {
            let node = tree.node(id);
            if node.is_complete()
                || node.iteration_count() >= node.max_iterations()
                || !ctx.budget_remaining()
            {
                break;
            }

            let issues = node.quality_issues().to_vec();
            let refinement = if score < self.config.debug_threshold {
                self.expander.debug(tree, id, &issues)?
            } else {
                let refinement = self
                    .expander
                    .improve(tree, id, &issues, ctx.budget_remaining())
                    .await?;
                ctx.charge_expander(refinement.llm_attempted);
                refinement
            };

            let before = score;
            score = self.apply(tree, id, refinement, before, ctx).await?;
            if score >= threshold {
                self.complete(tree, id, score)?;
                break;
            }
            if (score - before).abs() < self.config.stagnation_epsilon {
                tracing::debug!("Refinement of {} stagnated at {:.3}", tree.node(id).node_id(), score);
                tree.get_mut(id)?.log(format!("stagnated at {score:.3}"));
                break;
            }
        }
        Ok(())
    }

    fn draft_children(&self, tree: &mut TraceTree, id: NodeId) -> Result<(), TraceError> {
        let node = tree.get(id)?;
        if !node.is_leaf() || node.node_type() == NodeType::TestCase {
            return Ok(());
        }
        let Some(child_type) = node.node_type().child_type() else {
            return Ok(());
        };

        let drafts = self.expander.draft(node.artifact());
        if !drafts.is_empty() {
            tracing::debug!("Drafting {} {} under {}", drafts.len(), child_type, node.node_id());
        }
        for artifact in drafts {
            let child = TraceNode::new(
                child_type,
                artifact,
                self.config.effective_max_iterations(child_type),
            )?;
            tree.add_child(id, child)?;
        }
        Ok(())
    }

    async fn feedback_pass(
        &self,
        tree: &mut TraceTree,
        id: NodeId,
        ctx: &mut WalkContext,
    ) -> Result<(), TraceError> {
        let last = tree.get(id)?.quality_score();
        let overall = self.evaluator.evaluate_with_children(tree, id)?;
        if overall >= last - self.config.feedback_gap {
            return Ok(());
        }

        tracing::debug!(
            "Children of {} pull overall to {:.3} from {:.3}",
            tree.node(id).node_id(),
            overall,
            last
        );
        let mut issues = tree.node(id).quality_issues().to_vec();
        issues.push(format!(
            "children coverage gap: overall {overall:.2} is below {last:.2}"
        ));
        let refinement = self
            .expander
            .improve(tree, id, &issues, ctx.budget_remaining())
            .await?;
        ctx.charge_expander(refinement.llm_attempted);

        let score = self.apply(tree, id, refinement, last, ctx).await?;
        let threshold = self.config.effective_threshold(tree.node(id).node_type());
        if score >= threshold && !tree.node(id).is_complete() {
            self.complete(tree, id, score)?;
        }
        Ok(())
    }

    /// Score a refinement, record it as the next version and return the new score
    async fn apply(
        &self,
        tree: &mut TraceTree,
        id: NodeId,
        refinement: Refinement,
        before: f64,
        ctx: &mut WalkContext,
    ) -> Result<f64, TraceError> {
        let evaluation = self
            .evaluator
            .evaluate_candidate(tree, id, &refinement.artifact, ctx.budget_remaining())
            .await?;
        ctx.charge_evaluator(evaluation.llm_attempted);

        let node = tree.get_mut(id)?;
        for note in refinement.notes {
            node.log(note);
        }
        node.record_refinement(refinement.artifact, refinement.stage, before, evaluation.aggregate)?;
        node.set_evaluation(evaluation.scores, evaluation.issues);
        Ok(evaluation.aggregate)
    }

    fn complete(&self, tree: &mut TraceTree, id: NodeId, score: f64) -> Result<(), TraceError> {
        let node = tree.get_mut(id)?;
        node.mark_complete();
        tracing::info!(
            "{} {} complete at {:.3} after {} refinements",
            node.node_type(),
            node.node_id(),
            score,
            node.iteration_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::testing::MockLlm;
    use reqtrace_artifact::{Requirement, TestCase, UserStory};

    fn weak_epic() -> (Epic, ArtifactSet) {
        let epic = Epic::new("EP-1", "Reporting", "Analysts export monthly sales reports")
            .with_requirements(["REQ-1"]);
        let set = ArtifactSet::new()
            .with_requirements(vec![Requirement::new("REQ-1", "Misc", "Do stuff")]);
        (epic, set)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TraceConfig::default().with_quality_threshold(1.5);
        assert!(matches!(
            TraceWalker::new(config, None),
            Err(TraceError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn programmatic_walk_refines_and_drafts() {
        let walker = TraceWalker::new(TraceConfig::default(), None).unwrap();
        let (epic, set) = weak_epic();
        let walk = walker.walk_epic(epic, set).await.unwrap();

        let tree = &walk.tree;
        let req = tree.node(tree.root()).children()[0];
        let req_node = tree.node(req);
        assert!(req_node.was_refined());
        assert!(req_node.iteration_count() <= req_node.max_iterations() + 1);
        let req_artifact = req_node.artifact().as_requirement().unwrap();
        assert!(!req_artifact.acceptance_criteria.is_empty());

        // requirement -> drafted story -> drafted test case
        let story = req_node.children()[0];
        assert_eq!(tree.node(story).node_type(), NodeType::UserStory);
        let test = tree.node(story).children()[0];
        assert_eq!(tree.node(test).node_type(), NodeType::TestCase);
        assert!(tree.node(test).is_leaf());

        assert_eq!(walk.result.nodes_total, 3);
        assert_eq!(walk.result.llm_calls_used, 0);
    }

    #[tokio::test]
    async fn budget_caps_llm_calls() {
        let mut mock = MockLlm::new();
        mock.expect_call()
            .returning(|_| Err(LlmError::EmptyResponse));
        let config = TraceConfig::default().with_max_llm_calls(2);
        let walker = TraceWalker::new(config, Some(Arc::new(mock))).unwrap();
        let (epic, set) = weak_epic();
        let walk = walker.walk_epic(epic, set).await.unwrap();
        assert!(walk.result.llm_calls_used <= 2);
        assert_eq!(
            walk.result.llm_calls_used,
            walker.evaluator().llm_calls() + walker.expander().llm_calls()
        );
    }

    #[tokio::test]
    async fn zero_budget_never_calls() {
        let mut mock = MockLlm::new();
        mock.expect_call().times(0);
        let config = TraceConfig::default().with_max_llm_calls(0);
        let walker = TraceWalker::new(config, Some(Arc::new(mock))).unwrap();
        let (epic, set) = weak_epic();
        let walk = walker.walk_epic(epic, set).await.unwrap();
        assert_eq!(walk.result.llm_calls_used, 0);
    }

    #[tokio::test]
    async fn empty_epic_walks_cleanly() {
        let walker = TraceWalker::new(TraceConfig::default(), None).unwrap();
        let walk = walker
            .walk_epic(Epic::new("EP-9", "Nothing", ""), ArtifactSet::new())
            .await
            .unwrap();
        assert_eq!(walk.result.nodes_total, 0);
        assert_eq!(walk.tree.len(), 1);
    }

    #[tokio::test]
    async fn existing_children_are_not_redrafted() {
        let epic = Epic::new("EP-1", "t", "d").with_requirements(["REQ-1"]);
        let set = ArtifactSet::new()
            .with_requirements(vec![Requirement::new("REQ-1", "a", "b")])
            .with_user_stories(vec![UserStory::new("US-1", "s", "REQ-1")])
            .with_test_cases(vec![TestCase::new("TC-1", "t", "US-1")]);
        let walker = TraceWalker::new(TraceConfig::default(), None).unwrap();
        let walk = walker.walk_epic(epic, set).await.unwrap();
        assert_eq!(walk.tree.len(), 4);
    }

    fn two_story_tree(walker: &TraceWalker) -> (TraceTree, NodeId) {
        let epic = Epic::new("EP-1", "Reporting", "Analysts export monthly sales reports")
            .with_requirements(["REQ-1"]);
        let set = ArtifactSet::new()
            .with_requirements(vec![Requirement::new("REQ-1", "Export", "Export monthly sales reports")])
            .with_user_stories(vec![
                UserStory::new("US-1", "Export csv", "REQ-1"),
                UserStory::new("US-2", "Export pdf", "REQ-1"),
            ]);
        let tree = TraceTree::build(epic, set, walker.config());
        let req = tree.node(tree.root()).children()[0];
        (tree, req)
    }

    fn no_escalation() -> TraceConfig {
        let mut config = TraceConfig::default();
        config.llm_escalation_threshold = 0.0;
        config
    }

    #[tokio::test]
    async fn coverage_gap_runs_exactly_one_improve() {
        let mut mock = MockLlm::new();
        mock.expect_call()
            .withf(|prompt| prompt.contains("children coverage gap: overall 0.00 is below 0.90"))
            .times(1)
            .returning(|_| Err(LlmError::EmptyResponse));
        let walker = TraceWalker::new(no_escalation(), Some(Arc::new(mock))).unwrap();
        let (mut tree, req) = two_story_tree(&walker);
        tree.get_mut(req).unwrap().set_quality_score(0.9);

        let mut ctx = WalkContext::new(10);
        walker.feedback_pass(&mut tree, req, &mut ctx).await.unwrap();

        let node = tree.node(req);
        assert_eq!(node.versions().len(), 2);
        assert_eq!(node.versions().current().stage(), reqtrace_artifact::Stage::Improve);
        assert_eq!(ctx.usage().expander_calls, 1);
        assert_eq!(ctx.usage().evaluator_calls, 0);
    }

    #[tokio::test]
    async fn gap_within_tolerance_skips_improve() {
        let mut mock = MockLlm::new();
        mock.expect_call().times(0);
        let walker = TraceWalker::new(no_escalation(), Some(Arc::new(mock))).unwrap();
        let (mut tree, req) = two_story_tree(&walker);
        let first_story = tree.node(req).children()[0];
        tree.get_mut(first_story).unwrap().mark_complete();
        // overall is 0.5 from children coverage alone; 0.54 is within 0.05
        tree.get_mut(req).unwrap().set_quality_score(0.54);

        let mut ctx = WalkContext::new(10);
        walker.feedback_pass(&mut tree, req, &mut ctx).await.unwrap();

        assert_eq!(tree.node(req).versions().len(), 1);
        assert_eq!(ctx.usage().total(), 0);
        assert_eq!(tree.node(req).dimension_scores()[&crate::dimension::Dimension::Overall], 0.5);
    }
}
