//! Walk results

use crate::tree::{NodeSummary, TraceTree};
use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

/// LLM usage split by component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LlmUsage {
    pub evaluator_calls: u32,
    pub expander_calls: u32,
}

impl LlmUsage {
    /// Total calls charged against the budget
    #[inline]
    #[must_use]
    pub fn total(&self) -> u32 {
        self.evaluator_calls + self.expander_calls
    }
}

/// Report of one epic walk
///
/// Node counts and quality statistics cover every node below the epic root;
/// the root is context only and never scored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceWalkResult {
    pub walk_id: Ulid,
    pub epic_id: String,
    pub epic_title: String,
    pub nodes_total: usize,
    pub nodes_refined: usize,
    pub nodes_complete: usize,
    pub avg_quality: f64,
    pub min_quality: f64,
    pub max_quality: f64,
    pub llm_calls_used: u32,
    pub evaluator_calls: u32,
    pub expander_calls: u32,
    pub node_summaries: Vec<NodeSummary>,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
}

impl TraceWalkResult {
    /// Summarize a walked tree
    #[must_use]
    pub fn from_tree(
        tree: &TraceTree,
        walk_id: Ulid,
        started_at: DateTime<Utc>,
        duration_seconds: f64,
        usage: LlmUsage,
    ) -> Self {
        let ids = tree.descendants(tree.root());
        let node_summaries: Vec<NodeSummary> = ids.iter().map(|id| tree.summary(*id)).collect();
        let nodes = ids.iter().map(|id| tree.node(*id));

        let mut nodes_refined = 0;
        let mut nodes_complete = 0;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for node in nodes {
            if node.was_refined() {
                nodes_refined += 1;
            }
            if node.is_complete() {
                nodes_complete += 1;
            }
            let score = node.quality_score();
            sum += score;
            min = min.min(score);
            max = max.max(score);
        }

        let nodes_total = ids.len();
        let (avg_quality, min_quality, max_quality) = if nodes_total == 0 {
            (0.0, 0.0, 0.0)
        } else {
            #[allow(clippy::cast_precision_loss)]
            let avg = sum / nodes_total as f64;
            (round3(avg), round3(min), round3(max))
        };

        let (epic_id, epic_title) = tree
            .epic()
            .map(|e| (e.id.clone(), e.title.clone()))
            .unwrap_or_default();
        Self {
            walk_id,
            epic_id,
            epic_title,
            nodes_total,
            nodes_refined,
            nodes_complete,
            avg_quality,
            min_quality,
            max_quality,
            llm_calls_used: usage.total(),
            evaluator_calls: usage.evaluator_calls,
            expander_calls: usage.expander_calls,
            node_summaries,
            duration_seconds,
            started_at,
        }
    }

    /// Every node met its quality gate
    #[inline]
    #[must_use]
    pub fn all_complete(&self) -> bool {
        self.nodes_complete == self.nodes_total
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Report plus the walked tree, for callers merging refined artifacts back
#[derive(Debug, Clone)]
pub struct EpicWalk {
    pub result: TraceWalkResult,
    pub tree: TraceTree,
}
