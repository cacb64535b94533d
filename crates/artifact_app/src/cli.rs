use std::path::PathBuf;

use clap::Parser;

/// Fetch CI job artifacts and turn their JSON/XML payloads into PDF reports
#[derive(Debug, Parser, Clone)]
#[command(name = "artifact-reports")]
#[command(version)]
#[command(about = "Fetch and process CI/CD artifacts", long_about = None)]
pub struct Cli {
    /// Output directory
    #[arg(long, default_value = "artifacts")]
    pub output_dir: PathBuf,

    /// Path to config file (JSON)
    #[arg(long)]
    pub config: PathBuf,

    /// Maximum number of jobs processed at once (default: min(32, cpus + 4))
    #[arg(long)]
    pub workers: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
