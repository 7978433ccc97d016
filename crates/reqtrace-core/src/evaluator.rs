//! Two-tier node evaluation
//!
//! Tier 1 scores a node against its trace parent with deterministic
//! lexical and structural rules. Tier 2 asks the injected LLM for a
//! semantic score, but only when the tier-1 aggregate falls below
//! [`TraceConfig::llm_escalation_threshold`] and the caller allows a call.
//! A tier-2 response that does not cover every dimension, or any call
//! failure, leaves the tier-1 scores in place.

use crate::config::TraceConfig;
use crate::contract::{decode_scores, score_schema};
use crate::dimension::{clamp_unit, Dimension, DimensionScores};
use crate::error::{LlmError, TraceError};
use crate::lexical::{capped_overlap, keyword_hits, word_count};
use crate::llm::LlmClient;
use crate::tree::{NodeId, ParentContext, TraceTree};
use reqtrace_artifact::{NodeType, Requirement, TestCase, TraceArtifact, UserStory};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Final per-dimension scores
    pub scores: DimensionScores,
    /// Domain issues plus any absorbed `[llm]` failures
    pub issues: Vec<String>,
    /// Weighted aggregate of `scores`
    pub aggregate: f64,
    /// Whether an LLM call was attempted
    pub llm_attempted: bool,
    /// Whether the tier-2 scores replaced tier 1
    pub llm_scored: bool,
}

/// Scores nodes relative to their trace parent
pub struct TraceEvaluator {
    config: Arc<TraceConfig>,
    llm: Option<Arc<dyn LlmClient>>,
    llm_calls: AtomicU32,
}

impl fmt::Debug for TraceEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceEvaluator")
            .field("has_llm", &self.llm.is_some())
            .field("llm_calls", &self.llm_calls())
            .finish_non_exhaustive()
    }
}

impl TraceEvaluator {
    /// Create evaluator
    #[must_use]
    pub fn new(config: Arc<TraceConfig>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            config,
            llm,
            llm_calls: AtomicU32::new(0),
        }
    }

    /// Tier-2 attempts made by this evaluator over its lifetime
    #[inline]
    #[must_use]
    pub fn llm_calls(&self) -> u32 {
        self.llm_calls.load(Ordering::Relaxed)
    }

    /// Weighted mean over the dimensions present in `scores`
    ///
    /// Weights whose dimension is absent are excluded from both sides of the
    /// ratio. Returns 0 for empty input or when no weight applies.
    #[must_use]
    pub fn aggregate_score(&self, scores: &DimensionScores, node_type: NodeType) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (dimension, weight) in self.config.weights.get(node_type) {
            if let Some(value) = scores.get(dimension) {
                weighted += weight * clamp_unit(*value);
                total += weight;
            }
        }
        if total <= 0.0 {
            0.0
        } else {
            clamp_unit(weighted / total)
        }
    }

    /// Evaluate a node and store its scores, issues and aggregate
    ///
    /// `allow_llm` gates tier 2; the walker clears it once the LLM budget is
    /// spent. LLM failures never surface as errors.
    ///
    /// # Errors
    /// [`TraceError::UnknownNode`] when `id` is not in `tree`
    pub async fn evaluate(
        &self,
        tree: &mut TraceTree,
        id: NodeId,
        allow_llm: bool,
    ) -> Result<Evaluation, TraceError> {
        let artifact = tree.get(id)?.artifact().clone();
        let evaluation = self.evaluate_candidate(tree, id, &artifact, allow_llm).await?;

        let node = tree.get_mut(id)?;
        node.set_evaluation(evaluation.scores.clone(), evaluation.issues.clone());
        node.set_quality_score(evaluation.aggregate);
        Ok(evaluation)
    }

    /// Evaluate a candidate artifact in the position of node `id`
    ///
    /// The node itself is left untouched; the walker uses this to score a
    /// refinement before recording it as a version.
    ///
    /// # Errors
    /// [`TraceError::UnknownNode`] when `id` is not in `tree`
    pub async fn evaluate_candidate(
        &self,
        tree: &TraceTree,
        id: NodeId,
        candidate: &TraceArtifact,
        allow_llm: bool,
    ) -> Result<Evaluation, TraceError> {
        tree.get(id)?;
        let parent = tree.parent_of(id).map(|p| p.artifact());
        let context = tree.parent_context(id);

        let evaluation = self.assess(candidate, parent, &context, allow_llm).await;
        tracing::debug!(
            "Evaluated {} {}: {:.3} (llm: {})",
            candidate.node_type(),
            candidate.id(),
            evaluation.aggregate,
            evaluation.llm_scored
        );
        Ok(evaluation)
    }

    /// Evaluate a detached artifact against an optional parent
    pub async fn assess(
        &self,
        artifact: &TraceArtifact,
        parent: Option<&TraceArtifact>,
        context: &ParentContext,
        allow_llm: bool,
    ) -> Evaluation {
        let node_type = artifact.node_type();
        if node_type == NodeType::Epic {
            return Evaluation {
                scores: DimensionScores::new(),
                issues: Vec::new(),
                aggregate: 1.0,
                llm_attempted: false,
                llm_scored: false,
            };
        }

        let scores = self.score_programmatic(artifact, parent);
        let mut issues = self.programmatic_issues(&scores);
        let aggregate = self.aggregate_score(&scores, node_type);

        let escalate = aggregate < self.config.llm_escalation_threshold;
        let llm = match &self.llm {
            Some(llm) if allow_llm && escalate => llm,
            _ => {
                return Evaluation {
                    scores,
                    issues,
                    aggregate,
                    llm_attempted: false,
                    llm_scored: false,
                }
            }
        };

        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        let prompt = scoring_prompt(artifact, context);
        let outcome = match llm.call(&prompt).await {
            Ok(text) => decode_scores(node_type, &text).map_err(LlmError::from),
            Err(err) => Err(err),
        };

        match outcome {
            Ok((llm_scores, llm_issues)) => {
                let aggregate = self.aggregate_score(&llm_scores, node_type);
                issues.extend(llm_issues);
                Evaluation {
                    scores: llm_scores,
                    issues,
                    aggregate,
                    llm_attempted: true,
                    llm_scored: true,
                }
            }
            Err(err) => {
                tracing::warn!("LLM scoring failed for {}: {}", artifact.id(), err);
                issues.push(err.as_issue("scoring"));
                Evaluation {
                    scores,
                    issues,
                    aggregate,
                    llm_attempted: true,
                    llm_scored: false,
                }
            }
        }
    }

    /// Tier-1 scores of an artifact relative to its parent
    ///
    /// A missing or mismatched parent is scored as if it offered nothing to
    /// compare against. Epics yield no dimensions.
    #[must_use]
    pub fn score_programmatic(
        &self,
        artifact: &TraceArtifact,
        parent: Option<&TraceArtifact>,
    ) -> DimensionScores {
        let scores = match artifact {
            TraceArtifact::Epic(_) => DimensionScores::new(),
            TraceArtifact::Requirement(req) => self.score_requirement(req, parent),
            TraceArtifact::UserStory(story) => {
                self.score_user_story(story, parent.and_then(TraceArtifact::as_requirement))
            }
            TraceArtifact::TestCase(test) => {
                self.score_test_case(test, parent.and_then(TraceArtifact::as_user_story))
            }
        };
        scores.into_iter().map(|(d, v)| (d, clamp_unit(v))).collect()
    }

    /// One domain issue per dimension below the issue floor
    #[must_use]
    pub fn programmatic_issues(&self, scores: &DimensionScores) -> Vec<String> {
        scores
            .iter()
            .filter(|(_, v)| **v < self.config.scoring.issue_floor)
            .filter_map(|(d, v)| issue_text(*d).map(|text| format!("{d} {v:.2}: {text}")))
            .collect()
    }

    /// Add bottom-up dimensions from the node's direct children
    ///
    /// Inserts `children_coverage` (fraction of complete children, only when
    /// children exist) and `overall` (mean of every other present dimension)
    /// into the node's existing scores and returns `overall`.
    ///
    /// # Errors
    /// [`TraceError::UnknownNode`] when `id` is not in `tree`
    pub fn evaluate_with_children(&self, tree: &mut TraceTree, id: NodeId) -> Result<f64, TraceError> {
        let node = tree.get(id)?;
        let children = node.children().to_vec();
        let mut scores = node.dimension_scores().clone();
        let issues = node.quality_issues().to_vec();

        if !children.is_empty() {
            let complete = children
                .iter()
                .filter(|c| tree.node(**c).is_complete())
                .count();
            #[allow(clippy::cast_precision_loss)]
            let coverage = complete as f64 / children.len() as f64;
            scores.insert(Dimension::ChildrenCoverage, coverage);
        }

        scores.remove(&Dimension::Overall);
        #[allow(clippy::cast_precision_loss)]
        let overall = if scores.is_empty() {
            0.0
        } else {
            scores.values().sum::<f64>() / scores.len() as f64
        };
        let overall = clamp_unit(overall);
        scores.insert(Dimension::Overall, overall);

        tracing::debug!(
            "Bottom-up evaluation of {}: overall {:.3} over {} children",
            tree.node(id).node_id(),
            overall,
            children.len()
        );
        tree.get_mut(id)?.set_evaluation(scores, issues);
        Ok(overall)
    }

    fn overlap_or_neutral(&self, reference: &str, candidate: &str, divisor: f64) -> f64 {
        let tuning = &self.config.scoring;
        capped_overlap(reference, candidate, divisor, tuning.min_token_len)
            .unwrap_or(tuning.neutral_score)
    }

    fn score_requirement(&self, req: &Requirement, parent: Option<&TraceArtifact>) -> DimensionScores {
        let tuning = &self.config.scoring;
        let req_text = TraceArtifact::Requirement(req.clone()).text();

        let epic_text = parent.map(TraceArtifact::text).unwrap_or_default();
        // no neutral fallback: an epic without vocabulary gives nothing to cover
        let scope = capped_overlap(&epic_text, &req_text, tuning.scope_overlap_divisor, tuning.min_token_len)
            .unwrap_or(0.0);

        let words = word_count(&req.description);
        let mut clarity = tuning
            .clarity_bands
            .iter()
            .find(|(min_words, _)| words >= *min_words)
            .map_or(0.0, |(_, score)| *score);
        if !req.acceptance_criteria.is_empty() {
            clarity += tuning.clarity_criteria_bonus;
        }

        let hits = keyword_hits(&req_text, &tuning.subjective_terms);
        #[allow(clippy::cast_precision_loss)]
        let feasibility = (1.0 - tuning.subjective_penalty * hits as f64).max(0.0);

        let count = req.acceptance_criteria.len();
        #[allow(clippy::cast_precision_loss)]
        let acceptance = if count >= tuning.acceptance_full_count {
            1.0
        } else if count > 0 {
            tuning.acceptance_base + tuning.acceptance_per_criterion * count as f64
        } else {
            0.0
        };

        DimensionScores::from([
            (Dimension::ScopeCoverage, scope),
            (Dimension::Clarity, clarity),
            (Dimension::Feasibility, feasibility),
            (Dimension::AcceptanceQuality, acceptance),
        ])
    }

    fn score_user_story(&self, story: &UserStory, parent: Option<&Requirement>) -> DimensionScores {
        let tuning = &self.config.scoring;

        let reference = parent
            .map(|r| r.acceptance_criteria.join(" "))
            .unwrap_or_default();
        let coverage = self.overlap_or_neutral(
            &reference,
            &story.criteria_text(),
            tuning.criteria_overlap_divisor,
        );

        let persona = story.persona.trim();
        let persona_fit = if persona.chars().count() >= tuning.persona_min_chars {
            1.0
        } else if persona.is_empty() {
            0.0
        } else {
            0.5
        };

        let action = graded_half(&story.action, tuning.action_min_words)
            + graded_half(&story.benefit, tuning.benefit_min_words);

        let testability = fraction(
            story.acceptance_criteria.iter().filter(|c| c.is_complete()).count(),
            story.acceptance_criteria.len(),
        );

        DimensionScores::from([
            (Dimension::CriteriaCoverage, coverage),
            (Dimension::PersonaFit, persona_fit),
            (Dimension::ActionCompleteness, action),
            (Dimension::Testability, testability),
        ])
    }

    fn score_test_case(&self, test: &TestCase, parent: Option<&UserStory>) -> DimensionScores {
        let tuning = &self.config.scoring;

        let reference = parent.map(UserStory::criteria_text).unwrap_or_default();
        let verification = self.overlap_or_neutral(
            &reference,
            &test.steps_text(),
            tuning.verification_overlap_divisor,
        );

        let steps = fraction(
            test.steps.iter().filter(|s| s.is_complete()).count(),
            test.steps.len(),
        );

        let text = TraceArtifact::TestCase(test.clone()).text();
        #[allow(clippy::cast_precision_loss)]
        let boundary = (keyword_hits(&text, &tuning.boundary_terms) as f64
            / tuning.boundary_hit_cap as f64)
            .min(1.0);
        #[allow(clippy::cast_precision_loss)]
        let negative = (keyword_hits(&text, &tuning.negative_terms) as f64
            / tuning.negative_hit_cap as f64)
            .min(1.0);

        DimensionScores::from([
            (Dimension::CriteriaVerification, verification),
            (Dimension::StepCompleteness, steps),
            (Dimension::BoundaryCoverage, boundary),
            (Dimension::NegativePaths, negative),
        ])
    }
}

/// 0.5 at `min_words` or more, 0.25 when merely non-empty
fn graded_half(text: &str, min_words: usize) -> f64 {
    let words = word_count(text);
    if words >= min_words && words > 0 {
        0.5
    } else if words > 0 {
        0.25
    } else {
        0.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn issue_text(dimension: Dimension) -> Option<&'static str> {
    let text = match dimension {
        Dimension::ScopeCoverage => "requirement drifts from the epic's scope",
        Dimension::Clarity => "description is too short or lacks acceptance criteria",
        Dimension::Feasibility => "wording relies on subjective terms that cannot be verified",
        Dimension::AcceptanceQuality => "needs at least three acceptance criteria",
        Dimension::CriteriaCoverage => "Given/When/Then criteria do not cover the requirement's criteria",
        Dimension::PersonaFit => "persona is missing or too vague",
        Dimension::ActionCompleteness => "action or benefit is missing or too short",
        Dimension::Testability => "acceptance criteria are missing Given/When/Then clauses",
        Dimension::CriteriaVerification => "steps do not verify the story's acceptance criteria",
        Dimension::StepCompleteness => "steps are missing or lack expected results",
        Dimension::BoundaryCoverage => "no boundary or edge conditions are exercised",
        Dimension::NegativePaths => "no negative or error paths are exercised",
        Dimension::ChildrenCoverage | Dimension::Overall => return None,
    };
    Some(text)
}

fn scoring_prompt(artifact: &TraceArtifact, context: &ParentContext) -> String {
    let node_type = artifact.node_type();
    let dimensions = Dimension::for_node_type(node_type)
        .iter()
        .map(Dimension::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Score this {node_type} against its parent on each dimension from 0.0 to 1.0.\n\
         Dimensions: {dimensions}\n\n\
         Parent context:\n{}\n\n\
         Artifact:\n{}\n\n\
         Respond with a single JSON object matching this schema:\n{}\n",
        serde_json::to_string_pretty(context).unwrap_or_default(),
        serde_json::to_string_pretty(artifact).unwrap_or_default(),
        score_schema(node_type),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;
    use pretty_assertions::assert_eq;
    use reqtrace_artifact::{Epic, StoryCriterion, TestStep};

    fn evaluator(llm: Option<Arc<dyn LlmClient>>) -> TraceEvaluator {
        TraceEvaluator::new(Arc::new(TraceConfig::default()), llm)
    }

    fn epic() -> TraceArtifact {
        Epic::new(
            "EP-1",
            "Account login",
            "Customers sign in to their account with email and password",
        )
        .into()
    }

    fn weak_requirement() -> TraceArtifact {
        Requirement::new("REQ-1", "Misc", "Do some stuff later").into()
    }

    #[test]
    fn requirement_dimensions() {
        let eval = evaluator(None);
        let req: TraceArtifact = Requirement::new(
            "REQ-1",
            "Account login",
            "Customers sign in with email and password",
        )
        .with_criteria(["Valid password signs in"])
        .into();
        let scores = eval.score_programmatic(&req, Some(&epic()));
        assert_eq!(scores[&Dimension::ScopeCoverage], 1.0);
        // 7 words -> 0.1 band, plus criteria bonus
        assert!((scores[&Dimension::Clarity] - 0.6).abs() < 1e-9);
        assert_eq!(scores[&Dimension::Feasibility], 1.0);
        assert!((scores[&Dimension::AcceptanceQuality] - 0.65).abs() < 1e-9);
    }

    #[test]
    fn empty_epic_gives_no_scope_coverage() {
        let eval = evaluator(None);
        let blank: TraceArtifact = Epic::new("EP-0", "", "").into();
        let req: TraceArtifact = Requirement::new("REQ-1", "Account login", "Customers sign in").into();
        let scores = eval.score_programmatic(&req, Some(&blank));
        assert_eq!(scores[&Dimension::ScopeCoverage], 0.0);
        let scores = eval.score_programmatic(&req, None);
        assert_eq!(scores[&Dimension::ScopeCoverage], 0.0);
    }

    #[test]
    fn keywords_inside_longer_words_score_nothing() {
        let eval = evaluator(None);
        let test: TraceArtifact = TestCase::new("TC", "Administrator knowledge page", "US").into();
        let scores = eval.score_programmatic(&test, None);
        assert_eq!(scores[&Dimension::BoundaryCoverage], 0.0);
        assert_eq!(scores[&Dimension::NegativePaths], 0.0);

        let req: TraceArtifact =
            Requirement::new("REQ-1", "Goods intake", "Bestow knowledge on the administrator").into();
        let scores = eval.score_programmatic(&req, Some(&epic()));
        assert_eq!(scores[&Dimension::Feasibility], 1.0);
    }

    #[test]
    fn subjective_terms_reduce_feasibility() {
        let eval = evaluator(None);
        let req: TraceArtifact =
            Requirement::new("REQ-1", "Login", "A fast and intuitive login").into();
        let scores = eval.score_programmatic(&req, Some(&epic()));
        assert!((scores[&Dimension::Feasibility] - 0.6).abs() < 1e-9);
    }

    #[test]
    fn story_dimensions_for_empty_story() {
        let eval = evaluator(None);
        let parent: TraceArtifact = Requirement::new("REQ-1", "Login", "d").into();
        let story: TraceArtifact = UserStory::new("US-1", "Login", "REQ-1").into();
        let scores = eval.score_programmatic(&story, Some(&parent));
        // parent has no criteria -> neutral
        assert_eq!(scores[&Dimension::CriteriaCoverage], 0.5);
        assert_eq!(scores[&Dimension::PersonaFit], 0.0);
        assert_eq!(scores[&Dimension::ActionCompleteness], 0.0);
        assert_eq!(scores[&Dimension::Testability], 0.0);
    }

    #[test]
    fn story_partial_statement() {
        let eval = evaluator(None);
        let story: TraceArtifact = UserStory::new("US-1", "Login", "REQ-1")
            .with_statement("me", "sign in", "access my account")
            .with_criteria(vec![
                StoryCriterion::new("a user", "they sign in", "they see home"),
                StoryCriterion::new("a user", "", "nothing"),
            ])
            .into();
        let scores = eval.score_programmatic(&story, None);
        assert_eq!(scores[&Dimension::PersonaFit], 0.5);
        assert!((scores[&Dimension::ActionCompleteness] - 0.75).abs() < 1e-9);
        assert_eq!(scores[&Dimension::Testability], 0.5);
    }

    #[test]
    fn test_case_keyword_dimensions() {
        let eval = evaluator(None);
        let test: TraceArtifact = TestCase::new("TC-1", "Invalid password", "US-1")
            .with_description("Reject an empty password at the max length limit")
            .with_steps(vec![TestStep::new("submit", "error shown")])
            .into();
        let scores = eval.score_programmatic(&test, None);
        // empty, max, limit
        assert_eq!(scores[&Dimension::BoundaryCoverage], 1.0);
        // invalid, reject, error
        assert_eq!(scores[&Dimension::NegativePaths], 1.0);
        assert_eq!(scores[&Dimension::StepCompleteness], 1.0);
        assert_eq!(scores[&Dimension::CriteriaVerification], 0.5);
    }

    #[test]
    fn aggregate_ignores_absent_dimensions() {
        let eval = evaluator(None);
        assert_eq!(eval.aggregate_score(&DimensionScores::new(), NodeType::Requirement), 0.0);
        let scores = DimensionScores::from([(Dimension::Clarity, 0.4)]);
        assert!((eval.aggregate_score(&scores, NodeType::Requirement) - 0.4).abs() < 1e-9);
        let scores = DimensionScores::from([
            (Dimension::ScopeCoverage, 1.0),
            (Dimension::Clarity, 0.0),
            (Dimension::Feasibility, 1.0),
            (Dimension::AcceptanceQuality, 0.0),
        ]);
        assert!((eval.aggregate_score(&scores, NodeType::Requirement) - 0.45).abs() < 1e-9);
    }

    #[test]
    fn low_dimensions_become_issues() {
        let eval = evaluator(None);
        let scores = DimensionScores::from([
            (Dimension::Clarity, 0.1),
            (Dimension::Feasibility, 1.0),
        ]);
        let issues = eval.programmatic_issues(&scores);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].starts_with("clarity 0.10"));
    }

    #[tokio::test]
    async fn epic_is_trivially_complete() {
        let eval = evaluator(None);
        let result = eval.assess(&epic(), None, &ParentContext::new(), true).await;
        assert_eq!(result.aggregate, 1.0);
        assert!(result.scores.is_empty());
    }

    #[tokio::test]
    async fn no_escalation_without_llm() {
        let eval = evaluator(None);
        let result = eval
            .assess(&weak_requirement(), Some(&epic()), &ParentContext::new(), true)
            .await;
        assert!(!result.llm_attempted);
        assert!(result.aggregate < 0.6);
        assert_eq!(eval.llm_calls(), 0);
    }

    #[tokio::test]
    async fn complete_llm_scores_replace_tier_one() {
        let mut mock = MockLlm::new();
        mock.expect_call().times(1).returning(|_| {
            Ok(r#"{"scores": {"scope_coverage": 0.9, "clarity": 0.8, "feasibility": 1.2,
                "acceptance_quality": 0.7}, "issues": ["needs metrics"]}"#
                .to_string())
        });
        let eval = evaluator(Some(Arc::new(mock)));
        let result = eval
            .assess(&weak_requirement(), Some(&epic()), &ParentContext::new(), true)
            .await;
        assert!(result.llm_scored);
        assert_eq!(result.scores[&Dimension::Feasibility], 1.0);
        assert!(result.issues.iter().any(|i| i == "needs metrics"));
        assert_eq!(eval.llm_calls(), 1);
    }

    #[tokio::test]
    async fn partial_llm_scores_are_discarded() {
        let mut mock = MockLlm::new();
        mock.expect_call()
            .times(1)
            .returning(|_| Ok(r#"{"scores": {"clarity": 0.9}}"#.to_string()));
        let eval = evaluator(Some(Arc::new(mock)));
        let tier_one = eval.score_programmatic(&weak_requirement(), Some(&epic()));
        let result = eval
            .assess(&weak_requirement(), Some(&epic()), &ParentContext::new(), true)
            .await;
        assert!(result.llm_attempted);
        assert!(!result.llm_scored);
        assert_eq!(result.scores, tier_one);
        assert!(result.issues.iter().any(|i| i.starts_with("[llm]")));
        assert_eq!(eval.llm_calls(), 1);
    }

    #[tokio::test]
    async fn llm_failure_is_absorbed() {
        let mut mock = MockLlm::new();
        mock.expect_call()
            .times(1)
            .returning(|_| Err(LlmError::EmptyResponse));
        let eval = evaluator(Some(Arc::new(mock)));
        let result = eval
            .assess(&weak_requirement(), Some(&epic()), &ParentContext::new(), true)
            .await;
        assert!(!result.llm_scored);
        assert!(result.issues.last().unwrap().starts_with("[llm] scoring unavailable"));
    }

    #[tokio::test]
    async fn disallowed_llm_is_not_called() {
        let mut mock = MockLlm::new();
        mock.expect_call().times(0);
        let eval = evaluator(Some(Arc::new(mock)));
        let result = eval
            .assess(&weak_requirement(), Some(&epic()), &ParentContext::new(), false)
            .await;
        assert!(!result.llm_attempted);
    }

    #[tokio::test]
    async fn evaluate_is_idempotent() {
        let epic = Epic::new("EP-1", "Login", "Sign in").with_requirements(["REQ-1"]);
        let set = crate::tree::ArtifactSet::new()
            .with_requirements(vec![Requirement::new("REQ-1", "Login", "Sign in")]);
        let mut tree = TraceTree::build(epic, set, &TraceConfig::default());
        let id = tree.node(tree.root()).children()[0];
        let eval = evaluator(None);
        let first = eval.evaluate(&mut tree, id, true).await.unwrap();
        let second = eval.evaluate(&mut tree, id, true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.node(id).dimension_scores(), &second.scores);
        assert_eq!(tree.node(id).quality_score(), second.aggregate);
    }

    #[tokio::test]
    async fn children_coverage_and_overall() {
        let epic = Epic::new("EP-1", "Login", "Sign in").with_requirements(["REQ-1"]);
        let set = crate::tree::ArtifactSet::new()
            .with_requirements(vec![Requirement::new("REQ-1", "Login", "Sign in")])
            .with_user_stories(vec![
                UserStory::new("US-1", "a", "REQ-1"),
                UserStory::new("US-2", "b", "REQ-1"),
            ]);
        let mut tree = TraceTree::build(epic, set, &TraceConfig::default());
        let req = tree.node(tree.root()).children()[0];
        let first_story = tree.node(req).children()[0];
        tree.get_mut(first_story).unwrap().mark_complete();

        let eval = evaluator(None);
        eval.evaluate(&mut tree, req, false).await.unwrap();
        let before = tree.node(req).dimension_scores().clone();
        let overall = eval.evaluate_with_children(&mut tree, req).unwrap();

        let scores = tree.node(req).dimension_scores();
        assert_eq!(scores[&Dimension::ChildrenCoverage], 0.5);
        for (dimension, value) in &before {
            assert_eq!(scores[dimension], *value);
        }
        let expected = (before.values().sum::<f64>() + 0.5) / 5.0;
        assert!((overall - expected).abs() < 1e-9);
        assert_eq!(scores[&Dimension::Overall], overall);
    }

    proptest::proptest! {
        #[test]
        fn aggregate_stays_between_min_and_max(
            values in proptest::collection::vec(-0.5f64..1.5, 4),
            keep in proptest::collection::vec(proptest::bool::ANY, 4),
        ) {
            let eval = evaluator(None);
            let scores: DimensionScores = Dimension::for_node_type(NodeType::Requirement)
                .iter()
                .zip(values.iter().zip(&keep))
                .filter(|(_, (_, keep))| **keep)
                .map(|(d, (v, _))| (*d, *v))
                .collect();
            let aggregate = eval.aggregate_score(&scores, NodeType::Requirement);
            if scores.is_empty() {
                proptest::prop_assert_eq!(aggregate, 0.0);
            } else {
                let clamped = scores.values().map(|v| clamp_unit(*v));
                let min = clamped.clone().fold(f64::INFINITY, f64::min);
                let max = clamped.fold(f64::NEG_INFINITY, f64::max);
                proptest::prop_assert!(aggregate >= min - 1e-9 && aggregate <= max + 1e-9);
            }
        }
    }
}
