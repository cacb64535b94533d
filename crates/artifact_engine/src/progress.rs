use std::sync::mpsc;

use artifact_logging::{artifact_debug, artifact_info};

use crate::{EngineEvent, JobStatus};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Forwards events to a channel; a dropped receiver is ignored.
pub struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Writes stage changes at debug level and successful jobs at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::Progress(progress) => {
                artifact_debug!(
                    "job={} id={:?} stage={:?} bytes={:?}",
                    progress.job_name,
                    progress.job_id,
                    progress.stage,
                    progress.bytes
                );
            }
            EngineEvent::JobCompleted(report) => {
                // Failures are already logged with their cause by the job runner.
                if let JobStatus::Succeeded { documents } = &report.status {
                    artifact_info!(
                        "Job {} done: {} document(s)",
                        report.job_name,
                        documents.len()
                    );
                }
            }
        }
    }
}
