use reqtrace_core::{Dimension, NodeType, TraceConfig, TraceError, TraceWalker};

#[test]
fn toml_document_overrides_selected_fields() {
    let config: TraceConfig = toml::from_str(
        r#"
        quality_threshold = 0.8
        max_total_llm_calls = 10

        [overrides.test_case]
        quality_threshold = 0.6
        max_iterations = 5

        [scoring]
        boundary_hit_cap = 4
        negative_terms = ["error", "denied"]
        "#,
    )
    .unwrap();

    assert_eq!(config.quality_threshold, 0.8);
    assert_eq!(config.max_total_llm_calls, 10);
    assert_eq!(config.effective_threshold(NodeType::TestCase), 0.6);
    assert_eq!(config.effective_threshold(NodeType::UserStory), 0.8);
    assert_eq!(config.effective_max_iterations(NodeType::TestCase), 5);
    assert_eq!(config.effective_max_iterations(NodeType::Requirement), 3);
    assert_eq!(config.scoring.boundary_hit_cap, 4);
    assert_eq!(config.scoring.negative_terms, vec!["error", "denied"]);
    assert_eq!(config.scoring.scope_overlap_divisor, 0.3);
    assert!(config.validate().is_ok());
}

#[test]
fn json_weights_replace_one_table() {
    let config: TraceConfig = serde_json::from_str(
        r#"{"weights": {"requirement": {"clarity": 1.0, "acceptance_quality": 1.0}}}"#,
    )
    .unwrap();
    let weights = config.weights.get(NodeType::Requirement);
    assert_eq!(weights.len(), 2);
    assert_eq!(weights[&Dimension::Clarity], 1.0);
    // untouched tables keep their defaults
    assert_eq!(config.weights.get(NodeType::TestCase)[&Dimension::StepCompleteness], 0.35);
}

#[test]
fn walker_rejects_invalid_configuration() {
    let config: TraceConfig = serde_json::from_str(r#"{"debug_threshold": -0.1}"#).unwrap();
    let err = TraceWalker::new(config, None).unwrap_err();
    assert!(matches!(err, TraceError::ConfigError(_)));
    assert!(err.to_string().contains("debug_threshold"));
}

#[test]
fn zero_keyword_cap_is_rejected() {
    let mut config = TraceConfig::default();
    config.scoring.negative_hit_cap = 0;
    assert!(config.validate().is_err());
}
