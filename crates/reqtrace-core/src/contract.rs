//! Typed LLM response contracts
//!
//! Scoring responses decode into per-type structs whose fields are exactly
//! the dimension keys for that node type, so a response that omits any
//! dimension fails to decode and the programmatic scores stand. Refinement
//! responses decode into patch structs whose fields are all optional; only
//! the fields present are applied, onto a copy of the current artifact.
//!
//! The JSON schema of each contract is rendered into prompts.

use crate::dimension::{clamp_unit, Dimension, DimensionScores};
use crate::error::ResponseError;
use reqtrace_artifact::{
    NodeType, Requirement, StoryCriterion, TestCase, TestStep, TraceArtifact, UserStory,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Locate the outermost JSON object in free-form model output
///
/// Models often wrap JSON in prose or code fences; everything outside the
/// first `{` and the last `}` is discarded.
pub fn extract_json_object(text: &str) -> Result<&str, ResponseError> {
    let start = text.find('{').ok_or(ResponseError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ResponseError::NoJsonObject)?;
    if end < start {
        return Err(ResponseError::NoJsonObject);
    }
    Ok(&text[start..=end])
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ResponseError> {
    let json = extract_json_object(text)?;
    Ok(serde_json::from_str(json)?)
}

fn schema_of<T: JsonSchema>() -> String {
    serde_json::to_string_pretty(&schemars::schema_for!(T)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Scoring response envelope
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScoreResponse<S> {
    /// Scores in [0, 1], one per dimension
    pub scores: S,
    /// Problems the reviewer found
    #[serde(default)]
    pub issues: Vec<String>,
}

trait ScoreSet {
    fn into_scores(self) -> DimensionScores;
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RequirementScores {
    scope_coverage: f64,
    clarity: f64,
    feasibility: f64,
    acceptance_quality: f64,
}

impl ScoreSet for RequirementScores {
    fn into_scores(self) -> DimensionScores {
        DimensionScores::from([
            (Dimension::ScopeCoverage, clamp_unit(self.scope_coverage)),
            (Dimension::Clarity, clamp_unit(self.clarity)),
            (Dimension::Feasibility, clamp_unit(self.feasibility)),
            (Dimension::AcceptanceQuality, clamp_unit(self.acceptance_quality)),
        ])
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UserStoryScores {
    criteria_coverage: f64,
    persona_fit: f64,
    action_completeness: f64,
    testability: f64,
}

impl ScoreSet for UserStoryScores {
    fn into_scores(self) -> DimensionScores {
        DimensionScores::from([
            (Dimension::CriteriaCoverage, clamp_unit(self.criteria_coverage)),
            (Dimension::PersonaFit, clamp_unit(self.persona_fit)),
            (Dimension::ActionCompleteness, clamp_unit(self.action_completeness)),
            (Dimension::Testability, clamp_unit(self.testability)),
        ])
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TestCaseScores {
    criteria_verification: f64,
    step_completeness: f64,
    boundary_coverage: f64,
    negative_paths: f64,
}

impl ScoreSet for TestCaseScores {
    fn into_scores(self) -> DimensionScores {
        DimensionScores::from([
            (Dimension::CriteriaVerification, clamp_unit(self.criteria_verification)),
            (Dimension::StepCompleteness, clamp_unit(self.step_completeness)),
            (Dimension::BoundaryCoverage, clamp_unit(self.boundary_coverage)),
            (Dimension::NegativePaths, clamp_unit(self.negative_paths)),
        ])
    }
}

fn decode_score_set<S: ScoreSet + DeserializeOwned>(
    text: &str,
) -> Result<(DimensionScores, Vec<String>), ResponseError> {
    let response: ScoreResponse<S> = decode(text)?;
    Ok((response.scores.into_scores(), response.issues))
}

/// Decode a scoring response for a node type
///
/// # Errors
/// [`ResponseError`] when no object is found, a dimension is missing or a
/// value is not a number. Epics are never scored and always error.
pub fn decode_scores(
    node_type: NodeType,
    text: &str,
) -> Result<(DimensionScores, Vec<String>), ResponseError> {
    match node_type {
        NodeType::Epic => Err(ResponseError::NoApplicableFields),
        NodeType::Requirement => decode_score_set::<RequirementScores>(text),
        NodeType::UserStory => decode_score_set::<UserStoryScores>(text),
        NodeType::TestCase => decode_score_set::<TestCaseScores>(text),
    }
}

/// JSON schema of the scoring response for a node type
#[must_use]
pub fn score_schema(node_type: NodeType) -> String {
    match node_type {
        NodeType::Epic => String::new(),
        NodeType::Requirement => schema_of::<ScoreResponse<RequirementScores>>(),
        NodeType::UserStory => schema_of::<ScoreResponse<UserStoryScores>>(),
        NodeType::TestCase => schema_of::<ScoreResponse<TestCaseScores>>(),
    }
}

// ---------------------------------------------------------------------------
// Refinement
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct RequirementPatch {
    title: Option<String>,
    description: Option<String>,
    acceptance_criteria: Option<Vec<String>>,
}

impl RequirementPatch {
    fn apply(self, base: &Requirement) -> Result<Requirement, ResponseError> {
        if self.title.is_none() && self.description.is_none() && self.acceptance_criteria.is_none() {
            return Err(ResponseError::NoApplicableFields);
        }
        let mut next = base.clone();
        if let Some(title) = self.title {
            next.title = title;
        }
        if let Some(description) = self.description {
            next.description = description;
        }
        if let Some(criteria) = self.acceptance_criteria {
            next.acceptance_criteria = criteria;
        }
        Ok(next)
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
struct CriterionPatch {
    given: String,
    when: String,
    then: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct UserStoryPatch {
    title: Option<String>,
    persona: Option<String>,
    action: Option<String>,
    benefit: Option<String>,
    acceptance_criteria: Option<Vec<CriterionPatch>>,
}

impl UserStoryPatch {
    fn apply(self, base: &UserStory) -> Result<UserStory, ResponseError> {
        if self.title.is_none()
            && self.persona.is_none()
            && self.action.is_none()
            && self.benefit.is_none()
            && self.acceptance_criteria.is_none()
        {
            return Err(ResponseError::NoApplicableFields);
        }
        let mut next = base.clone();
        if let Some(title) = self.title {
            next.title = title;
        }
        if let Some(persona) = self.persona {
            next.persona = persona;
        }
        if let Some(action) = self.action {
            next.action = action;
        }
        if let Some(benefit) = self.benefit {
            next.benefit = benefit;
        }
        if let Some(criteria) = self.acceptance_criteria {
            next.acceptance_criteria = criteria
                .into_iter()
                .map(|c| StoryCriterion::new(c.given, c.when, c.then))
                .collect();
        }
        Ok(next)
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
struct StepPatch {
    action: String,
    description: String,
    expected_result: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct TestCasePatch {
    title: Option<String>,
    description: Option<String>,
    steps: Option<Vec<StepPatch>>,
    expected_result: Option<String>,
    test_type: Option<String>,
}

impl TestCasePatch {
    fn apply(self, base: &TestCase) -> Result<TestCase, ResponseError> {
        if self.title.is_none()
            && self.description.is_none()
            && self.steps.is_none()
            && self.expected_result.is_none()
            && self.test_type.is_none()
        {
            return Err(ResponseError::NoApplicableFields);
        }
        let mut next = base.clone();
        if let Some(title) = self.title {
            next.title = title;
        }
        if let Some(description) = self.description {
            next.description = description;
        }
        if let Some(steps) = self.steps {
            next.steps = steps
                .into_iter()
                .map(|s| TestStep {
                    action: s.action,
                    description: s.description,
                    expected_result: s.expected_result,
                })
                .collect();
        }
        if let Some(expected) = self.expected_result {
            next.expected_result = expected;
        }
        if let Some(test_type) = self.test_type {
            next.test_type = test_type;
        }
        Ok(next)
    }
}

/// Decode a refinement response and apply it onto a copy of `base`
///
/// # Errors
/// [`ResponseError`] when the response cannot be decoded or carries none of
/// the fields relevant to the artifact kind. Epics are never refined.
pub fn apply_patch(base: &TraceArtifact, text: &str) -> Result<TraceArtifact, ResponseError> {
    match base {
        TraceArtifact::Epic(_) => Err(ResponseError::NoApplicableFields),
        TraceArtifact::Requirement(r) => Ok(decode::<RequirementPatch>(text)?.apply(r)?.into()),
        TraceArtifact::UserStory(s) => Ok(decode::<UserStoryPatch>(text)?.apply(s)?.into()),
        TraceArtifact::TestCase(t) => Ok(decode::<TestCasePatch>(text)?.apply(t)?.into()),
    }
}

/// JSON schema of the refinement response for a node type
#[must_use]
pub fn patch_schema(node_type: NodeType) -> String {
    match node_type {
        NodeType::Epic => String::new(),
        NodeType::Requirement => schema_of::<RequirementPatch>(),
        NodeType::UserStory => schema_of::<UserStoryPatch>(),
        NodeType::TestCase => schema_of::<TestCasePatch>(),
    }
}
