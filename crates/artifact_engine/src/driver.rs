use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use artifact_core::{pipeline_dir, PipelineConfig};
use artifact_logging::{artifact_error, artifact_info};
use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::bundle::bundle;
use crate::fetch::ArtifactSource;
use crate::job::{run_job, JobContext};
use crate::persist::{clear_output_dir, ensure_output_dir};
use crate::progress::{LogProgressSink, ProgressSink};
use crate::{EngineEvent, JobProgress, JobReport, JobStatus, PipelineReport, RunSummary, Stage};

/// Bounded set of concurrently running jobs.
///
/// Tasks are spawned on the ambient tokio runtime; the pool only limits how
/// many of them make progress at once.
#[derive(Debug, Clone)]
pub struct JobPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl JobPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// `min(32, cpus + 4)`.
    pub fn default_size() -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .saturating_add(4)
            .min(32)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run every task and wait for all of them. Results keep submission order.
    pub async fn run_all<F, T>(&self, tasks: Vec<F>) -> Vec<Result<T, JoinError>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let permits = self.permits.clone();
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    task.await
                })
            })
            .collect();
        join_all(handles).await
    }
}

impl Default for JobPool {
    fn default() -> Self {
        Self::new(Self::default_size())
    }
}

/// Processes pipeline configs one after another, fanning each config's jobs
/// out to the pool and bundling whatever they rendered.
pub struct Driver {
    source: Arc<dyn ArtifactSource>,
    pool: JobPool,
    output_root: PathBuf,
    sink: Arc<dyn ProgressSink>,
}

impl Driver {
    pub fn new(source: Arc<dyn ArtifactSource>, pool: JobPool, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            pool,
            output_root: output_root.into(),
            sink: Arc::new(LogProgressSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub async fn run(&self, configs: &[PipelineConfig]) -> RunSummary {
        let mut summary = RunSummary::default();
        for config in configs {
            summary.pipelines.push(self.run_pipeline(config).await);
        }
        artifact_info!(
            "Run finished: {} job(s) succeeded, {} failed, {} bundle(s) written",
            summary.succeeded_jobs(),
            summary.failed_jobs(),
            summary.bundles()
        );
        summary
    }

    pub async fn run_pipeline(&self, config: &PipelineConfig) -> PipelineReport {
        let output_dir = pipeline_dir(&self.output_root, config);
        let mut report = PipelineReport {
            project_id: config.project_id.clone(),
            pipeline_id: config.pipeline_id.clone(),
            output_dir: output_dir.clone(),
            jobs: Vec::new(),
            bundle: None,
            error: None,
        };
        artifact_info!(
            "Processing pipeline {} of project {} ({} job(s)) into {:?}",
            config.pipeline_id,
            config.project_id,
            config.job_names.len(),
            output_dir
        );

        let prepared = clear_output_dir(&output_dir).and_then(|()| ensure_output_dir(&output_dir));
        if let Err(err) = prepared {
            artifact_error!("Cannot prepare output directory {:?}: {}", output_dir, err);
            report.error = Some(err.to_string());
            return report;
        }

        let tasks: Vec<_> = config
            .job_names
            .iter()
            .map(|job_name| {
                let ctx = JobContext {
                    project_id: config.project_id.clone(),
                    pipeline_id: config.pipeline_id.clone(),
                    job_name: job_name.clone(),
                    output_dir: output_dir.clone(),
                };
                self.sink.emit(EngineEvent::Progress(JobProgress {
                    job_name: job_name.clone(),
                    job_id: None,
                    stage: Stage::Queued,
                    bytes: None,
                }));
                run_job(self.source.clone(), ctx, self.sink.clone())
            })
            .collect();

        let results = self.pool.run_all(tasks).await;
        report.jobs = results
            .into_iter()
            .zip(&config.job_names)
            .map(|(result, job_name)| {
                result.unwrap_or_else(|err| {
                    artifact_error!("Worker for {} did not finish: {}", job_name, err);
                    JobReport {
                        job_name: job_name.clone(),
                        job_id: None,
                        status: JobStatus::Failed {
                            reason: err.to_string(),
                        },
                    }
                })
            })
            .collect();

        let dir = output_dir.clone();
        let prefix = config.pdf_prefix.clone();
        match tokio::task::spawn_blocking(move || bundle(&dir, &prefix)).await {
            Ok(Ok(summary)) => report.bundle = summary,
            Ok(Err(err)) => {
                artifact_error!("Failed to bundle reports in {:?}: {}", output_dir, err);
                report.error = Some(err.to_string());
            }
            Err(err) => {
                artifact_error!("Bundling task for {:?} did not finish: {}", output_dir, err);
                report.error = Some(err.to_string());
            }
        }
        report
    }
}
