use std::fmt;
use std::path::PathBuf;

use artifact_core::{Identifier, JobId};

use crate::bundle::BundleSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Resolving,
    Downloading,
    Expanding,
    Rendering,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job_name: String,
    pub job_id: Option<JobId>,
    pub stage: Stage,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(JobProgress),
    JobCompleted(JobReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded { documents: Vec<PathBuf> },
    Failed { reason: String },
}

/// Outcome of one job. Failures carry the rendered reason only; the job's
/// error never leaves the worker that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_name: String,
    pub job_id: Option<JobId>,
    pub status: JobStatus,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub project_id: Identifier,
    pub pipeline_id: Identifier,
    pub output_dir: PathBuf,
    pub jobs: Vec<JobReport>,
    pub bundle: Option<BundleSummary>,
    /// Set when the pipeline could not be prepared or packaged.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pipelines: Vec<PipelineReport>,
}

impl RunSummary {
    pub fn succeeded_jobs(&self) -> usize {
        self.jobs().filter(|job| job.succeeded()).count()
    }

    pub fn failed_jobs(&self) -> usize {
        self.jobs().filter(|job| !job.succeeded()).count()
    }

    pub fn bundles(&self) -> usize {
        self.pipelines.iter().filter(|p| p.bundle.is_some()).count()
    }

    fn jobs(&self) -> impl Iterator<Item = &JobReport> {
        self.pipelines.iter().flat_map(|p| p.jobs.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidToken,
    HttpStatus(u16),
    Timeout,
    Network,
    InvalidResponse,
    JobNotFound { name: String },
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidToken => write!(f, "invalid token"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
            FailureKind::JobNotFound { name } => write!(f, "job '{name}' not found"),
            FailureKind::Io => write!(f, "io error"),
        }
    }
}
