use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use artifact_core::{Identifier, PipelineConfig};
use artifact_engine::{
    ChannelProgressSink, Driver, EngineEvent, FetchSettings, GitLabClient, JobPool, JobStatus,
    Stage,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

/// Pipeline 10 of project 1 has jobs `build` (id 101, good artifacts) and
/// `broken` (id 102, artifact download fails). `missing` does not exist.
async fn mock_gitlab() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/1/pipelines/10/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 101, "name": "build"},
            {"id": 102, "name": "broken"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/1/jobs/101/artifacts"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::zip_bytes(&[
            ("report.json", common::REPORT_JSON.as_bytes()),
            ("junit.xml", common::JUNIT_XML.as_bytes()),
            ("notes.txt", b"not structured"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/1/jobs/102/artifacts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

fn config() -> PipelineConfig {
    PipelineConfig {
        project_id: Identifier::Number(1),
        pipeline_id: Identifier::Number(10),
        pdf_prefix: "rel_".to_string(),
        job_names: vec![
            "build".to_string(),
            "missing".to_string(),
            "broken".to_string(),
        ],
    }
}

fn driver(server: &MockServer, root: PathBuf) -> Driver {
    let client = GitLabClient::new(&server.uri(), "token", FetchSettings::default()).unwrap();
    Driver::new(Arc::new(client), JobPool::new(2), root)
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_jobs_do_not_stop_bundling_of_successful_ones() {
    artifact_logging::initialize_for_tests();
    let server = mock_gitlab().await;
    let temp = TempDir::new().unwrap();

    let summary = driver(&server, temp.path().to_path_buf())
        .run(&[config()])
        .await;

    assert_eq!(summary.succeeded_jobs(), 1);
    assert_eq!(summary.failed_jobs(), 2);
    assert_eq!(summary.bundles(), 1);

    let pipeline = &summary.pipelines[0];
    let output_dir = temp.path().join("project_1_pipeline_10");
    assert_eq!(pipeline.output_dir, output_dir);
    assert_eq!(pipeline.error, None);

    let names: Vec<_> = pipeline.jobs.iter().map(|j| j.job_name.as_str()).collect();
    assert_eq!(names, vec!["build", "missing", "broken"]);
    assert_eq!(pipeline.jobs[0].job_id, Some(101));
    assert_eq!(pipeline.jobs[1].job_id, None);
    assert_eq!(pipeline.jobs[2].job_id, Some(102));
    assert!(matches!(
        &pipeline.jobs[1].status,
        JobStatus::Failed { reason } if reason.contains("not found")
    ));
    assert!(matches!(
        &pipeline.jobs[2].status,
        JobStatus::Failed { reason } if reason.contains("500")
    ));

    let bundle = pipeline.bundle.as_ref().unwrap();
    assert_eq!(bundle.path, output_dir.join("rel_reports.zip"));
    assert_eq!(bundle.entries, vec!["rel_junit.pdf", "rel_report.pdf"]);
    assert_eq!(
        common::zip_entry_names(&bundle.path),
        vec!["rel_junit.pdf", "rel_report.pdf"]
    );

    assert_eq!(
        common::relative_files(&output_dir),
        vec![
            PathBuf::from("job_101/junit.pdf"),
            PathBuf::from("job_101/junit.xml"),
            PathBuf::from("job_101/notes.txt"),
            PathBuf::from("job_101/report.json"),
            PathBuf::from("job_101/report.pdf"),
            PathBuf::from("rel_reports.zip"),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn second_run_wipes_leftovers_and_reproduces_every_byte() {
    let server = mock_gitlab().await;
    let temp = TempDir::new().unwrap();
    let driver = driver(&server, temp.path().to_path_buf());
    let output_dir = temp.path().join("project_1_pipeline_10");

    driver.run(&[config()]).await;
    let first = contents(&output_dir);

    fs::write(output_dir.join("job_101").join("stale.pdf"), b"old").unwrap();
    fs::create_dir_all(output_dir.join("job_999")).unwrap();
    fs::write(output_dir.join("job_999").join("orphan.pdf"), b"old").unwrap();

    let summary = driver.run(&[config()]).await;

    let second = contents(&output_dir);
    let names: Vec<_> = second.iter().map(|(name, _)| name.clone()).collect();
    assert_eq!(names, first.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>());
    for ((name, before), (_, after)) in first.iter().zip(&second) {
        assert!(before == after, "{name:?} differs between runs");
    }
    assert_eq!(
        summary.pipelines[0].bundle.as_ref().unwrap().entries,
        vec!["rel_junit.pdf", "rel_report.pdf"]
    );
}

fn contents(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    common::relative_files(root)
        .into_iter()
        .map(|name| {
            let bytes = fs::read(root.join(&name)).unwrap();
            (name, bytes)
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn pipeline_without_documents_has_no_bundle() {
    artifact_logging::initialize_for_tests();
    let server = mock_gitlab().await;
    let temp = TempDir::new().unwrap();
    let config = PipelineConfig {
        job_names: vec!["missing".to_string()],
        ..config()
    };

    let summary = driver(&server, temp.path().to_path_buf())
        .run(&[config])
        .await;

    assert_eq!(summary.bundles(), 0);
    assert_eq!(summary.pipelines[0].error, None);
    assert!(!temp
        .path()
        .join("project_1_pipeline_10")
        .join("rel_reports.zip")
        .exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn pipelines_are_processed_in_config_order() {
    let server = mock_gitlab().await;
    let temp = TempDir::new().unwrap();
    let other = PipelineConfig {
        project_id: Identifier::Number(2),
        job_names: vec!["build".to_string()],
        ..config()
    };

    let summary = driver(&server, temp.path().to_path_buf())
        .run(&[config(), other])
        .await;

    let projects: Vec<_> = summary.pipelines.iter().map(|p| p.project_id.clone()).collect();
    assert_eq!(projects, vec![Identifier::Number(1), Identifier::Number(2)]);
    // Project 2 is unknown to the mock server, so its listing fails.
    assert_eq!(summary.pipelines[1].jobs.len(), 1);
    assert!(!summary.pipelines[1].jobs[0].succeeded());
    assert_eq!(summary.pipelines[1].bundle, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn progress_events_cover_every_stage_of_a_successful_job() {
    let server = mock_gitlab().await;
    let temp = TempDir::new().unwrap();
    let (tx, rx) = mpsc::channel();
    let driver = driver(&server, temp.path().to_path_buf())
        .with_sink(Arc::new(ChannelProgressSink::new(tx)));

    driver.run(&[config()]).await;
    drop(driver);

    let events: Vec<EngineEvent> = rx.try_iter().collect();
    let build_stages: Vec<Stage> = events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::Progress(p) if p.job_name == "build" => Some(p.stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        build_stages,
        vec![
            Stage::Queued,
            Stage::Resolving,
            Stage::Downloading,
            Stage::Expanding,
            Stage::Rendering,
            Stage::Done,
        ]
    );
    let completed = events
        .iter()
        .filter(|event| matches!(event, EngineEvent::JobCompleted(_)))
        .count();
    assert_eq!(completed, 3);
}

#[test]
fn pool_size_is_at_least_one() {
    assert_eq!(JobPool::new(0).size(), 1);
    let default = JobPool::default_size();
    assert!((1..=32).contains(&default));
}
