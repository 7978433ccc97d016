//! Trace tree
//!
//! A [`TraceTree`] is an arena of [`TraceNode`]s addressed by [`NodeId`].
//! Each node owns its artifact's version log and scoring state and links to
//! its trace parent and ordered children by id. The epic is always the
//! root at [`TraceTree::root`].
//!
//! # Invariants
//! - Every non-root node appears exactly once in its parent's children
//! - A child's node type is its parent's [`NodeType::child_type`]
//! - Versions are never empty and only grow

use crate::config::TraceConfig;
use crate::dimension::{clamp_unit, Dimension, DimensionScores};
use crate::error::TraceError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use reqtrace_artifact::{
    ArtifactVersion, Epic, NodeType, Requirement, Stage, TestCase, TraceArtifact, UserStory,
    VersionLog,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Index of a node within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw arena index
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stage-appropriate summary of a parent artifact, in prompt order
pub type ParentContext = IndexMap<String, Value>;

/// Flat artifact lists supplied alongside an epic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSet {
    pub requirements: Vec<Requirement>,
    pub user_stories: Vec<UserStory>,
    pub test_cases: Vec<TestCase>,
}

impl ArtifactSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With requirements
    #[inline]
    #[must_use]
    pub fn with_requirements(mut self, requirements: Vec<Requirement>) -> Self {
        self.requirements = requirements;
        self
    }

    /// With user stories
    #[inline]
    #[must_use]
    pub fn with_user_stories(mut self, stories: Vec<UserStory>) -> Self {
        self.user_stories = stories;
        self
    }

    /// With test cases
    #[inline]
    #[must_use]
    pub fn with_test_cases(mut self, test_cases: Vec<TestCase>) -> Self {
        self.test_cases = test_cases;
        self
    }
}

/// Uniform wrapper around one artifact in the trace tree
#[derive(Debug, Clone)]
pub struct TraceNode {
    node_id: String,
    node_type: NodeType,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    versions: VersionLog,
    quality_score: f64,
    dimension_scores: DimensionScores,
    is_complete: bool,
    quality_issues: Vec<String>,
    max_iterations: u32,
    stage: Stage,
    refinement_log: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TraceNode {
    /// Wrap an artifact as a detached node
    ///
    /// # Errors
    /// [`TraceError::Artifact`] when the artifact kind does not match `node_type`
    pub fn new(
        node_type: NodeType,
        artifact: TraceArtifact,
        max_iterations: u32,
    ) -> Result<Self, TraceError> {
        artifact.expect_type(node_type)?;
        Ok(Self {
            node_id: artifact.id().to_string(),
            node_type,
            parent: None,
            children: Vec::new(),
            versions: VersionLog::new(artifact),
            quality_score: 0.0,
            dimension_scores: DimensionScores::new(),
            is_complete: false,
            quality_issues: Vec::new(),
            max_iterations,
            stage: Stage::Draft,
            refinement_log: Vec::new(),
            created_at: Utc::now(),
        })
    }

    /// Wrap an artifact using string names for node type and stage
    ///
    /// # Errors
    /// [`TraceError::InvalidVariant`] for unknown names, or the errors of [`TraceNode::new`]
    pub fn from_names(
        node_type: &str,
        stage: &str,
        artifact: TraceArtifact,
        max_iterations: u32,
    ) -> Result<Self, TraceError> {
        let node_type: NodeType = node_type.parse()?;
        let stage: Stage = stage.parse()?;
        let mut node = Self::new(node_type, artifact, max_iterations)?;
        node.stage = stage;
        Ok(node)
    }

    #[inline]
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    #[inline]
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Current artifact
    #[inline]
    #[must_use]
    pub fn artifact(&self) -> &TraceArtifact {
        self.versions.current().artifact()
    }

    #[inline]
    #[must_use]
    pub fn versions(&self) -> &VersionLog {
        &self.versions
    }

    /// Index of the current version
    #[inline]
    #[must_use]
    pub fn current_version(&self) -> usize {
        self.versions.current_index()
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    #[inline]
    #[must_use]
    pub fn dimension_scores(&self) -> &DimensionScores {
        &self.dimension_scores
    }

    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    #[inline]
    #[must_use]
    pub fn quality_issues(&self) -> &[String] {
        &self.quality_issues
    }

    /// Refinements recorded so far; always `versions().len() - 1`
    #[inline]
    #[must_use]
    pub fn iteration_count(&self) -> u32 {
        u32::try_from(self.versions.current_index()).unwrap_or(u32::MAX)
    }

    #[inline]
    #[must_use]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn refinement_log(&self) -> &[String] {
        &self.refinement_log
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether any refinement has been recorded
    #[inline]
    #[must_use]
    pub fn was_refined(&self) -> bool {
        self.versions.len() > 1
    }

    /// Record a refined artifact as the next version
    ///
    /// Prior versions are left untouched; the new artifact becomes current,
    /// the iteration count grows by one and the score is set to `score_after`.
    ///
    /// # Errors
    /// [`TraceError::Artifact`] when the new artifact is of a different kind
    pub fn record_refinement(
        &mut self,
        new_artifact: TraceArtifact,
        stage: Stage,
        score_before: f64,
        score_after: f64,
    ) -> Result<&ArtifactVersion, TraceError> {
        new_artifact.expect_type(self.node_type)?;
        let score_before = clamp_unit(score_before);
        let score_after = clamp_unit(score_after);
        self.stage = stage;
        self.quality_score = score_after;
        self.versions.append(new_artifact, stage, score_before, score_after);
        let unchanged = if self.versions.latest_changed() {
            ""
        } else {
            " (no content change)"
        };
        self.refinement_log.push(format!(
            "v{} {}: {:.3} -> {:.3}{}",
            self.versions.current_index(),
            stage,
            score_before,
            score_after,
            unchanged
        ));
        Ok(self.versions.current())
    }

    /// Append a free-form audit line
    pub(crate) fn log(&mut self, line: impl Into<String>) {
        self.refinement_log.push(line.into());
    }

    pub(crate) fn set_evaluation(&mut self, scores: DimensionScores, issues: Vec<String>) {
        self.dimension_scores = scores
            .into_iter()
            .map(|(d, v)| (d, clamp_unit(v)))
            .collect();
        self.quality_issues = issues;
    }

    pub(crate) fn set_quality_score(&mut self, score: f64) {
        self.quality_score = clamp_unit(score);
    }

    pub(crate) fn mark_complete(&mut self) {
        self.is_complete = true;
    }
}

/// Rounded, read-only projection of a node for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    pub node_id: String,
    pub node_type: NodeType,
    pub depth: usize,
    pub trace_path: Vec<String>,
    pub quality_score: f64,
    pub dimension_scores: BTreeMap<Dimension, f64>,
    pub is_complete: bool,
    pub iteration_count: u32,
    pub version_count: usize,
    pub stage: Stage,
    pub quality_issues: Vec<String>,
    pub refinement_log: Vec<String>,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Arena-backed trace tree rooted at an epic
#[derive(Debug, Clone)]
pub struct TraceTree {
    nodes: Vec<TraceNode>,
}

impl TraceTree {
    /// Create a tree holding only the epic root
    #[must_use]
    pub fn new(epic: Epic) -> Self {
        let root = TraceNode {
            node_id: epic.id.clone(),
            node_type: NodeType::Epic,
            parent: None,
            children: Vec::new(),
            versions: VersionLog::new(TraceArtifact::Epic(epic)),
            quality_score: 1.0,
            dimension_scores: DimensionScores::new(),
            is_complete: true,
            quality_issues: Vec::new(),
            max_iterations: 0,
            stage: Stage::Draft,
            refinement_log: Vec::new(),
            created_at: Utc::now(),
        };
        Self { nodes: vec![root] }
    }

    /// Build a tree from an epic and flat artifact lists
    ///
    /// Links follow the explicit foreign keys: `epic.parent_requirements`,
    /// `story.parent_requirement_id` and `test_case.parent_user_story_id`.
    /// Requirement ids listed more than once are attached once; ids with no
    /// matching artifact produce no branch.
    #[must_use]
    pub fn build(epic: Epic, artifacts: ArtifactSet, config: &TraceConfig) -> Self {
        let requirement_ids = epic.parent_requirements.clone();
        let mut tree = Self::new(epic);
        let root = tree.root();
        let mut seen = HashSet::new();
        let mut seen_stories = HashSet::new();
        let mut seen_tests = HashSet::new();

        for req_id in requirement_ids {
            if !seen.insert(req_id.clone()) {
                tracing::debug!("Skipping duplicate requirement id {}", req_id);
                continue;
            }
            let Some(requirement) = artifacts
                .requirements
                .iter()
                .find(|r| r.requirement_id == req_id)
            else {
                tracing::debug!("Epic lists {} but no such requirement was supplied", req_id);
                continue;
            };
            let req_node = tree.attach(root, requirement.clone().into(), config);

            for story in artifacts
                .user_stories
                .iter()
                .filter(|s| s.parent_requirement_id.as_deref() == Some(req_id.as_str()))
            {
                if !seen_stories.insert(story.id.as_str()) {
                    tracing::debug!("Skipping duplicate user story id {}", story.id);
                    continue;
                }
                let story_node = tree.attach(req_node, story.clone().into(), config);
                for test in artifacts
                    .test_cases
                    .iter()
                    .filter(|t| t.parent_user_story_id.as_deref() == Some(story.id.as_str()))
                {
                    if !seen_tests.insert(test.id.as_str()) {
                        tracing::debug!("Skipping duplicate test case id {}", test.id);
                        continue;
                    }
                    tree.attach(story_node, test.clone().into(), config);
                }
            }
        }

        tracing::debug!("Built trace tree with {} nodes", tree.len());
        tree
    }

    // Kinds are guaranteed by the caller in `build`, so attachment cannot fail.
    fn attach(&mut self, parent: NodeId, artifact: TraceArtifact, config: &TraceConfig) -> NodeId {
        let node_type = artifact.node_type();
        let max_iterations = config.effective_max_iterations(node_type);
        let id = NodeId(self.nodes.len());
        let node = TraceNode {
            node_id: artifact.id().to_string(),
            node_type,
            parent: Some(parent),
            children: Vec::new(),
            versions: VersionLog::new(artifact),
            quality_score: 0.0,
            dimension_scores: DimensionScores::new(),
            is_complete: false,
            quality_issues: Vec::new(),
            max_iterations,
            stage: Stage::Draft,
            refinement_log: Vec::new(),
            created_at: Utc::now(),
        };
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Attach a detached node under `parent`
    ///
    /// # Errors
    /// [`TraceError::UnknownNode`] for a foreign parent id, or
    /// [`TraceError::InvalidChild`] when the node type does not follow the
    /// trace mapping for the parent
    pub fn add_child(&mut self, parent: NodeId, mut node: TraceNode) -> Result<NodeId, TraceError> {
        let parent_type = self.get(parent)?.node_type;
        if parent_type.child_type() != Some(node.node_type) {
            return Err(TraceError::InvalidChild {
                parent: parent_type,
                child: node.node_type,
            });
        }
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// The epic root
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The epic artifact at the root
    #[must_use]
    pub fn epic(&self) -> Option<&Epic> {
        self.nodes.first().and_then(|root| root.artifact().as_epic())
    }

    /// Node by id
    ///
    /// # Errors
    /// [`TraceError::UnknownNode`] for ids outside this tree
    pub fn get(&self, id: NodeId) -> Result<&TraceNode, TraceError> {
        self.nodes.get(id.0).ok_or(TraceError::UnknownNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut TraceNode, TraceError> {
        self.nodes.get_mut(id.0).ok_or(TraceError::UnknownNode(id))
    }

    /// Node by id, panicking on foreign ids
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> &TraceNode {
        &self.nodes[id.0]
    }

    /// Total node count, root included
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists from construction
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in creation order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TraceNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Trace parent of a node
    #[must_use]
    pub fn parent_of(&self, id: NodeId) -> Option<&TraceNode> {
        self.nodes.get(id.0)?.parent.map(|p| &self.nodes[p.0])
    }

    /// Hop count to the epic root
    #[must_use]
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.nodes.get(id.0).and_then(|n| n.parent);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.nodes[parent.0].parent;
        }
        depth
    }

    /// Node ids from the root down to `id`
    #[must_use]
    pub fn trace_path(&self, id: NodeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut cursor = self.nodes.get(id.0).map(|_| id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            path.push(node.node_id.clone());
            cursor = node.parent;
        }
        path.reverse();
        path
    }

    /// Depth-first pre-order ids below `id`, excluding `id`
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(id.0)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    /// Summary of the parent artifact, shaped for the child being worked on
    ///
    /// Empty for the root.
    #[must_use]
    pub fn parent_context(&self, id: NodeId) -> ParentContext {
        let mut context = ParentContext::new();
        let Some(parent) = self.parent_of(id) else {
            return context;
        };
        match parent.artifact() {
            TraceArtifact::Epic(epic) => {
                context.insert("epic_title".into(), json!(epic.title));
                context.insert("epic_description".into(), json!(epic.description));
            }
            TraceArtifact::Requirement(req) => {
                context.insert("requirement_id".into(), json!(req.requirement_id));
                context.insert("requirement_title".into(), json!(req.title));
                context.insert("requirement_description".into(), json!(req.description));
                context.insert("acceptance_criteria".into(), json!(req.acceptance_criteria));
            }
            TraceArtifact::UserStory(story) => {
                context.insert("story_id".into(), json!(story.id));
                context.insert("story_title".into(), json!(story.title));
                context.insert("persona".into(), json!(story.persona));
                context.insert("action".into(), json!(story.action));
                context.insert("benefit".into(), json!(story.benefit));
                context.insert(
                    "acceptance_criteria".into(),
                    serde_json::to_value(&story.acceptance_criteria).unwrap_or(Value::Null),
                );
            }
            TraceArtifact::TestCase(_) => {}
        }
        context
    }

    /// Rounded report row for a node
    #[must_use]
    pub fn summary(&self, id: NodeId) -> NodeSummary {
        let node = &self.nodes[id.0];
        NodeSummary {
            node_id: node.node_id.clone(),
            node_type: node.node_type,
            depth: self.depth(id),
            trace_path: self.trace_path(id),
            quality_score: round3(node.quality_score),
            dimension_scores: node
                .dimension_scores
                .iter()
                .map(|(d, v)| (*d, round3(*v)))
                .collect(),
            is_complete: node.is_complete,
            iteration_count: node.iteration_count(),
            version_count: node.versions.len(),
            stage: node.stage,
            quality_issues: node.quality_issues.clone(),
            refinement_log: node.refinement_log.clone(),
        }
    }

    /// Current artifacts of every node refined at least once
    #[must_use]
    pub fn refined_artifacts(&self) -> Vec<&TraceArtifact> {
        self.nodes
            .iter()
            .filter(|n| n.was_refined())
            .map(TraceNode::artifact)
            .collect()
    }

    /// Current artifacts of every node below the root, depth-first
    #[must_use]
    pub fn current_artifacts(&self) -> Vec<&TraceArtifact> {
        self.descendants(self.root())
            .into_iter()
            .map(|id| self.nodes[id.0].artifact())
            .collect()
    }
}
