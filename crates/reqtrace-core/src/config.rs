//! Engine configuration
//!
//! [`TraceConfig`] holds the quality gate, iteration limits, LLM budget,
//! aggregation weights and every tuned scoring constant. All fields have
//! defaults, so callers may deserialize partial documents from any serde
//! format.

use crate::dimension::Dimension;
use crate::error::TraceError;
use reqtrace_artifact::NodeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Aggregate score at which a node is complete
    pub quality_threshold: f64,
    /// Below this score refinement uses `debug` instead of `improve`
    pub debug_threshold: f64,
    /// Tier-1 aggregate below which the LLM scorer is consulted
    pub llm_escalation_threshold: f64,
    /// Refinement passes allowed per node
    pub max_iterations_per_node: u32,
    /// Hard ceiling on LLM calls during one epic walk
    pub max_total_llm_calls: u32,
    /// Minimum score change between passes before refinement is abandoned
    pub stagnation_epsilon: f64,
    /// Bottom-up gap that triggers one extra improve pass on a parent
    pub feedback_gap: f64,
    /// Per-type threshold and iteration overrides
    pub overrides: TypeOverrides,
    /// Per-type aggregation weights
    pub weights: WeightTable,
    /// Tuned constants for programmatic scoring
    pub scoring: ScoringTuning,
}

impl TraceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With global quality threshold
    #[inline]
    #[must_use]
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// With debug threshold
    #[inline]
    #[must_use]
    pub fn with_debug_threshold(mut self, threshold: f64) -> Self {
        self.debug_threshold = threshold;
        self
    }

    /// With LLM escalation threshold
    #[inline]
    #[must_use]
    pub fn with_llm_escalation_threshold(mut self, threshold: f64) -> Self {
        self.llm_escalation_threshold = threshold;
        self
    }

    /// With max refinement passes per node
    #[inline]
    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations_per_node = max;
        self
    }

    /// With LLM call budget
    #[inline]
    #[must_use]
    pub fn with_max_llm_calls(mut self, max: u32) -> Self {
        self.max_total_llm_calls = max;
        self
    }

    /// With a per-type override
    #[inline]
    #[must_use]
    pub fn with_override(mut self, node_type: NodeType, value: TypeOverride) -> Self {
        if let Some(slot) = self.overrides.get_mut(node_type) {
            *slot = value;
        }
        self
    }

    /// With aggregation weights for one node type
    #[inline]
    #[must_use]
    pub fn with_weights(mut self, node_type: NodeType, weights: BTreeMap<Dimension, f64>) -> Self {
        self.weights.set(node_type, weights);
        self
    }

    /// Quality threshold after applying any per-type override
    #[must_use]
    pub fn effective_threshold(&self, node_type: NodeType) -> f64 {
        self.overrides
            .get(node_type)
            .and_then(|o| o.quality_threshold)
            .unwrap_or(self.quality_threshold)
    }

    /// Iteration limit after applying any per-type override
    #[must_use]
    pub fn effective_max_iterations(&self, node_type: NodeType) -> u32 {
        self.overrides
            .get(node_type)
            .and_then(|o| o.max_iterations)
            .unwrap_or(self.max_iterations_per_node)
    }

    /// Check ranges
    ///
    /// # Errors
    /// Returns [`TraceError::ConfigError`] naming the first offending field
    pub fn validate(&self) -> Result<(), TraceError> {
        let unit_fields = [
            ("quality_threshold", self.quality_threshold),
            ("debug_threshold", self.debug_threshold),
            ("llm_escalation_threshold", self.llm_escalation_threshold),
            ("stagnation_epsilon", self.stagnation_epsilon),
            ("feedback_gap", self.feedback_gap),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(TraceError::config(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        for node_type in [NodeType::Requirement, NodeType::UserStory, NodeType::TestCase] {
            if let Some(t) = self.overrides.get(node_type).and_then(|o| o.quality_threshold) {
                if !(0.0..=1.0).contains(&t) {
                    return Err(TraceError::config(format!(
                        "{node_type} quality_threshold must be in [0, 1], got {t}"
                    )));
                }
            }
            let weights = self.weights.get(node_type);
            if weights.values().any(|w| *w < 0.0 || w.is_nan()) {
                return Err(TraceError::config(format!("{node_type} weights must be non-negative")));
            }
            if weights.values().sum::<f64>() <= 0.0 {
                return Err(TraceError::config(format!("{node_type} weights must not all be zero")));
            }
        }
        self.scoring.validate()
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.70,
            debug_threshold: 0.40,
            llm_escalation_threshold: 0.60,
            max_iterations_per_node: 3,
            max_total_llm_calls: 50,
            stagnation_epsilon: 0.01,
            feedback_gap: 0.05,
            overrides: TypeOverrides::default(),
            weights: WeightTable::default(),
            scoring: ScoringTuning::default(),
        }
    }
}

/// Threshold and iteration override for one node type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeOverride {
    pub quality_threshold: Option<f64>,
    pub max_iterations: Option<u32>,
}

impl TypeOverride {
    /// Override only the threshold
    #[inline]
    #[must_use]
    pub fn threshold(value: f64) -> Self {
        Self {
            quality_threshold: Some(value),
            max_iterations: None,
        }
    }

    /// Override only the iteration limit
    #[inline]
    #[must_use]
    pub fn iterations(value: u32) -> Self {
        Self {
            quality_threshold: None,
            max_iterations: Some(value),
        }
    }
}

/// Overrides for the three refinable node types
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeOverrides {
    pub requirement: TypeOverride,
    pub user_story: TypeOverride,
    pub test_case: TypeOverride,
}

impl TypeOverrides {
    /// Override slot for a node type; epics have none
    #[must_use]
    pub fn get(&self, node_type: NodeType) -> Option<&TypeOverride> {
        match node_type {
            NodeType::Epic => None,
            NodeType::Requirement => Some(&self.requirement),
            NodeType::UserStory => Some(&self.user_story),
            NodeType::TestCase => Some(&self.test_case),
        }
    }

    fn get_mut(&mut self, node_type: NodeType) -> Option<&mut TypeOverride> {
        match node_type {
            NodeType::Epic => None,
            NodeType::Requirement => Some(&mut self.requirement),
            NodeType::UserStory => Some(&mut self.user_story),
            NodeType::TestCase => Some(&mut self.test_case),
        }
    }
}

/// Aggregation weights per node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightTable {
    pub requirement: BTreeMap<Dimension, f64>,
    pub user_story: BTreeMap<Dimension, f64>,
    pub test_case: BTreeMap<Dimension, f64>,
    #[serde(skip)]
    empty: BTreeMap<Dimension, f64>,
}

impl WeightTable {
    /// Weights for a node type; empty for epics
    #[must_use]
    pub fn get(&self, node_type: NodeType) -> &BTreeMap<Dimension, f64> {
        match node_type {
            NodeType::Epic => &self.empty,
            NodeType::Requirement => &self.requirement,
            NodeType::UserStory => &self.user_story,
            NodeType::TestCase => &self.test_case,
        }
    }

    /// Replace the weights for a node type; ignored for epics
    pub fn set(&mut self, node_type: NodeType, weights: BTreeMap<Dimension, f64>) {
        match node_type {
            NodeType::Epic => {}
            NodeType::Requirement => self.requirement = weights,
            NodeType::UserStory => self.user_story = weights,
            NodeType::TestCase => self.test_case = weights,
        }
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            requirement: BTreeMap::from([
                (Dimension::ScopeCoverage, 0.30),
                (Dimension::Clarity, 0.25),
                (Dimension::Feasibility, 0.15),
                (Dimension::AcceptanceQuality, 0.30),
            ]),
            user_story: BTreeMap::from([
                (Dimension::CriteriaCoverage, 0.30),
                (Dimension::PersonaFit, 0.15),
                (Dimension::ActionCompleteness, 0.25),
                (Dimension::Testability, 0.30),
            ]),
            test_case: BTreeMap::from([
                (Dimension::CriteriaVerification, 0.30),
                (Dimension::StepCompleteness, 0.35),
                (Dimension::BoundaryCoverage, 0.15),
                (Dimension::NegativePaths, 0.20),
            ]),
            empty: BTreeMap::new(),
        }
    }
}

/// Empirically tuned constants for programmatic scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTuning {
    /// Fraction of epic vocabulary a requirement must share for full scope coverage
    pub scope_overlap_divisor: f64,
    /// Fraction of requirement-criteria vocabulary a story must share
    pub criteria_overlap_divisor: f64,
    /// Fraction of story-criteria vocabulary a test case must share
    pub verification_overlap_divisor: f64,
    /// Score used when the parent offers nothing to compare against
    pub neutral_score: f64,
    /// Tokens shorter than this are ignored by lexical overlap
    pub min_token_len: usize,
    /// Description word-count bands for clarity: (min words, score)
    pub clarity_bands: Vec<(usize, f64)>,
    /// Clarity bonus when any acceptance criterion exists
    pub clarity_criteria_bonus: f64,
    /// Feasibility penalty per subjective term
    pub subjective_penalty: f64,
    /// Criteria count at which acceptance quality saturates
    pub acceptance_full_count: usize,
    /// Acceptance quality base for a partial set of criteria
    pub acceptance_base: f64,
    /// Acceptance quality added per criterion in a partial set
    pub acceptance_per_criterion: f64,
    /// Persona length (characters) for a full persona fit
    pub persona_min_chars: usize,
    /// Action word count for full action credit
    pub action_min_words: usize,
    /// Benefit word count for full benefit credit
    pub benefit_min_words: usize,
    /// Boundary keyword hits for full boundary coverage
    pub boundary_hit_cap: usize,
    /// Negative-path keyword hits for full negative-path coverage
    pub negative_hit_cap: usize,
    /// Dimensions below this produce a programmatic issue
    pub issue_floor: f64,
    /// Characters of requirement description used for a drafted story action
    pub draft_action_chars: usize,
    pub subjective_terms: Vec<String>,
    pub boundary_terms: Vec<String>,
    pub negative_terms: Vec<String>,
}

impl ScoringTuning {
    fn validate(&self) -> Result<(), TraceError> {
        let divisors = [
            ("scope_overlap_divisor", self.scope_overlap_divisor),
            ("criteria_overlap_divisor", self.criteria_overlap_divisor),
            ("verification_overlap_divisor", self.verification_overlap_divisor),
        ];
        for (name, value) in divisors {
            if value <= 0.0 || value > 1.0 || value.is_nan() {
                return Err(TraceError::config(format!("{name} must be in (0, 1], got {value}")));
            }
        }
        if self.boundary_hit_cap == 0 || self.negative_hit_cap == 0 {
            return Err(TraceError::config("keyword hit caps must be positive"));
        }
        if self.acceptance_full_count == 0 {
            return Err(TraceError::config("acceptance_full_count must be positive"));
        }
        Ok(())
    }
}

fn terms(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

impl Default for ScoringTuning {
    fn default() -> Self {
        Self {
            scope_overlap_divisor: 0.3,
            criteria_overlap_divisor: 0.4,
            verification_overlap_divisor: 0.3,
            neutral_score: 0.5,
            min_token_len: 3,
            clarity_bands: vec![(20, 0.5), (10, 0.3), (1, 0.1)],
            clarity_criteria_bonus: 0.5,
            subjective_penalty: 0.2,
            acceptance_full_count: 3,
            acceptance_base: 0.5,
            acceptance_per_criterion: 0.15,
            persona_min_chars: 3,
            action_min_words: 5,
            benefit_min_words: 3,
            boundary_hit_cap: 3,
            negative_hit_cap: 2,
            issue_floor: 0.5,
            draft_action_chars: 100,
            subjective_terms: terms(&[
                "fast",
                "easy",
                "simple",
                "user-friendly",
                "intuitive",
                "nice",
                "good",
                "best",
            ]),
            boundary_terms: terms(&[
                "boundary", "limit", "max", "min", "edge", "zero", "empty", "null", "overflow",
                "negative",
            ]),
            negative_terms: terms(&[
                "error",
                "invalid",
                "fail",
                "reject",
                "unauthorized",
                "forbidden",
                "wrong",
                "incorrect",
                "missing",
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(TraceConfig::default().validate().is_ok());
    }

    #[test]
    fn override_wins_over_global() {
        let config = TraceConfig::new()
            .with_quality_threshold(0.7)
            .with_override(NodeType::TestCase, TypeOverride::threshold(0.5))
            .with_override(NodeType::UserStory, TypeOverride::iterations(1));
        assert_eq!(config.effective_threshold(NodeType::TestCase), 0.5);
        assert_eq!(config.effective_threshold(NodeType::Requirement), 0.7);
        assert_eq!(config.effective_max_iterations(NodeType::UserStory), 1);
        assert_eq!(config.effective_max_iterations(NodeType::TestCase), 3);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let err = TraceConfig::new().with_quality_threshold(1.5).validate().unwrap_err();
        assert!(err.to_string().contains("quality_threshold"));
    }

    #[test]
    fn zero_weights_rejected() {
        let config = TraceConfig::new().with_weights(
            NodeType::Requirement,
            BTreeMap::from([(Dimension::Clarity, 0.0)]),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: TraceConfig =
            serde_json::from_str(r#"{"max_total_llm_calls": 5, "overrides": {"test_case": {"max_iterations": 1}}}"#)
                .unwrap();
        assert_eq!(config.max_total_llm_calls, 5);
        assert_eq!(config.quality_threshold, 0.70);
        assert_eq!(config.effective_max_iterations(NodeType::TestCase), 1);
        assert_eq!(config.scoring.boundary_hit_cap, 3);
    }

    #[test]
    fn epic_has_no_weights_or_override() {
        let config = TraceConfig::default();
        assert!(config.weights.get(NodeType::Epic).is_empty());
        assert!(config.overrides.get(NodeType::Epic).is_none());
    }
}
