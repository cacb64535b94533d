use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use artifact_core::{job_dir, Identifier, JobId};
use artifact_logging::{artifact_error, artifact_info};
use thiserror::Error;

use crate::expand::{expand, ExpandError};
use crate::fetch::ArtifactSource;
use crate::progress::ProgressSink;
use crate::render::{render_json, render_xml, RenderError, SourceKind};
use crate::{EngineEvent, FetchError, JobProgress, JobReport, JobStatus, Stage};

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Expand(#[from] ExpandError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Everything one job needs to know about where it belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub project_id: Identifier,
    pub pipeline_id: Identifier,
    pub job_name: String,
    /// The pipeline's output directory; the job writes below `job_<id>/`.
    pub output_dir: PathBuf,
}

/// Run one job to completion and turn any failure into a report. Never panics
/// or propagates errors, so sibling jobs are unaffected.
pub async fn run_job(
    source: Arc<dyn ArtifactSource>,
    ctx: JobContext,
    sink: Arc<dyn ProgressSink>,
) -> JobReport {
    emit(sink.as_ref(), &ctx, None, Stage::Resolving, None);
    let resolved = source
        .resolve_job_id(&ctx.project_id, &ctx.pipeline_id, &ctx.job_name)
        .await;
    let (job_id, result) = match resolved {
        Ok(job_id) => (
            Some(job_id),
            process_resolved(source.as_ref(), &ctx, job_id, sink.as_ref()).await,
        ),
        Err(err) => (None, Err(JobError::from(err))),
    };

    let status = match result {
        Ok(documents) => JobStatus::Succeeded { documents },
        Err(err) => {
            artifact_error!("Failed to process {}: {}", ctx.job_name, err);
            JobStatus::Failed {
                reason: err.to_string(),
            }
        }
    };
    let report = JobReport {
        job_name: ctx.job_name.clone(),
        job_id,
        status,
    };
    sink.emit(EngineEvent::JobCompleted(report.clone()));
    report
}

async fn process_resolved(
    source: &dyn ArtifactSource,
    ctx: &JobContext,
    job_id: JobId,
    sink: &dyn ProgressSink,
) -> Result<Vec<PathBuf>, JobError> {
    emit(sink, ctx, Some(job_id), Stage::Downloading, None);
    let archive = source
        .download(&ctx.project_id, job_id, &ctx.output_dir)
        .await?;
    artifact_info!(
        "Downloaded artifacts for {} to {:?} ({} bytes)",
        ctx.job_name,
        archive.path,
        archive.bytes
    );

    emit(sink, ctx, Some(job_id), Stage::Expanding, Some(archive.bytes));
    let extract_dir = job_dir(&ctx.output_dir, job_id);
    let dest = extract_dir.clone();
    tokio::task::spawn_blocking(move || expand(&archive.path, &dest))
        .await
        .map_err(|err| JobError::Worker(err.to_string()))??;

    emit(sink, ctx, Some(job_id), Stage::Rendering, None);
    let documents = tokio::task::spawn_blocking(move || render_extracted(&extract_dir))
        .await
        .map_err(|err| JobError::Worker(err.to_string()))??;

    emit(sink, ctx, Some(job_id), Stage::Done, None);
    Ok(documents)
}

/// Render every top-level JSON and XML file in `dir`, in name order.
///
/// A JSON failure aborts the job; XML failures only skip the file.
pub fn render_extracted(dir: &Path) -> Result<Vec<PathBuf>, JobError> {
    let mut sources: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    sources.sort();

    let mut documents = Vec::new();
    for source in sources {
        match SourceKind::detect(&source) {
            Some(SourceKind::Json) => documents.push(render_json(&source)?),
            Some(SourceKind::Xml) => documents.extend(render_xml(&source)),
            None => {}
        }
    }
    Ok(documents)
}

fn emit(
    sink: &dyn ProgressSink,
    ctx: &JobContext,
    job_id: Option<JobId>,
    stage: Stage,
    bytes: Option<u64>,
) {
    sink.emit(EngineEvent::Progress(JobProgress {
        job_name: ctx.job_name.clone(),
        job_id,
        stage,
        bytes,
    }));
}
