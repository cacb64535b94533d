//! Artifact core: pure data model for pipeline configs, API settings and the
//! output layout. No network or filesystem writes happen here.
mod config;
mod layout;
mod settings;

pub use config::{load_pipeline_configs, parse_pipeline_configs, ConfigError, Identifier, PipelineConfig};
pub use layout::{
    archive_filename, bundle_entry_name, bundle_filename, document_path, job_dir, pipeline_dir,
    sanitize_component, JobId, DOCUMENT_EXTENSION,
};
pub use settings::{ApiSettings, ENV_BASE_URL, ENV_TOKEN, ENV_VERIFY_TLS};
