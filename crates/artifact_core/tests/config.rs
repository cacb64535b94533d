use std::fs;

use artifact_core::{
    load_pipeline_configs, parse_pipeline_configs, ConfigError, Identifier, PipelineConfig,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn parses_numeric_and_textual_identifiers() {
    let content = r#"[
        {"project_id": 42, "pipeline_id": 1001, "pdf_prefix": "nightly_", "job_names": ["lint", "test"]},
        {"project_id": "group/app", "pipeline_id": "7", "pdf_prefix": "", "job_names": []}
    ]"#;

    let configs = parse_pipeline_configs(content).unwrap();

    assert_eq!(
        configs,
        vec![
            PipelineConfig {
                project_id: Identifier::Number(42),
                pipeline_id: Identifier::Number(1001),
                pdf_prefix: "nightly_".to_string(),
                job_names: vec!["lint".to_string(), "test".to_string()],
            },
            PipelineConfig {
                project_id: Identifier::Text("group/app".to_string()),
                pipeline_id: Identifier::Text("7".to_string()),
                pdf_prefix: String::new(),
                job_names: Vec::new(),
            },
        ]
    );
}

#[test]
fn missing_prefix_defaults_to_empty() {
    let configs =
        parse_pipeline_configs(r#"[{"project_id": 1, "pipeline_id": 2, "job_names": ["a"]}]"#)
            .unwrap();
    assert_eq!(configs[0].pdf_prefix, "");
}

#[test]
fn missing_job_names_is_invalid_json() {
    let err = parse_pipeline_configs(r#"[{"project_id": 1, "pipeline_id": 2}]"#).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidJson(_)));
}

#[test]
fn malformed_json_is_rejected() {
    let err = parse_pipeline_configs("[{").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidJson(_)));
    assert!(err.to_string().starts_with("invalid JSON in config file"));
}

#[test]
fn load_reports_missing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.json");

    let err = load_pipeline_configs(&path).unwrap_err();

    assert!(matches!(err, ConfigError::NotFound(ref p) if p == &path));
    assert!(err.to_string().contains("not found"));
}

#[test]
fn load_reads_file_from_disk() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    fs::write(
        &path,
        r#"[{"project_id": 3, "pipeline_id": 4, "pdf_prefix": "p_", "job_names": ["build"]}]"#,
    )
    .unwrap();

    let configs = load_pipeline_configs(&path).unwrap();

    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].project_id.to_string(), "3");
    assert_eq!(configs[0].job_names, vec!["build".to_string()]);
}
