mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use artifact_core::{load_pipeline_configs, ApiSettings};
use artifact_engine::{Driver, GitLabClient, JobPool, RunSummary};
use artifact_logging::{artifact_error, artifact_info, LogDestination};
use clap::Parser;

use crate::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let destination = match &cli.log_file {
        Some(path) => LogDestination::TerminalAndFile(path.clone()),
        None => LogDestination::Terminal,
    };
    artifact_logging::initialize(destination, cli.verbose);

    // Per-job failures are logged by the engine and do not affect the exit code.
    match run(&cli) {
        Ok(_summary) => ExitCode::SUCCESS,
        Err(err) => {
            artifact_error!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<RunSummary> {
    // Everything that can make the run pointless is checked before any request.
    let settings = ApiSettings::from_lookup(|key| std::env::var(key).ok())?;
    let configs = load_pipeline_configs(&cli.config)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let client = GitLabClient::from_settings(&settings).context("failed to build HTTP client")?;
    let pool = JobPool::new(cli.workers.unwrap_or_else(JobPool::default_size));
    artifact_info!(
        "Loaded {} pipeline config(s) from {:?}; api={} workers={}",
        configs.len(),
        cli.config,
        settings.base_url,
        pool.size()
    );

    let driver = Driver::new(Arc::new(client), pool, cli.output_dir.clone());
    Ok(runtime.block_on(driver.run(&configs)))
}
