use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal setup errors. All of them abort the run before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),
    #[error("invalid base url {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("config file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("error reading config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in config file: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// A project or pipeline identifier: GitLab accepts numeric ids as well as
/// URL-encoded paths such as `group/project`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(u64),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(id) => write!(f, "{id}"),
            Identifier::Text(text) => f.write_str(text),
        }
    }
}

impl From<u64> for Identifier {
    fn from(id: u64) -> Self {
        Identifier::Number(id)
    }
}

impl From<&str> for Identifier {
    fn from(text: &str) -> Self {
        Identifier::Text(text.to_string())
    }
}

/// One entry of the config file: which jobs of which pipeline to harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub project_id: Identifier,
    pub pipeline_id: Identifier,
    #[serde(default)]
    pub pdf_prefix: String,
    pub job_names: Vec<String>,
}

/// Parse the config file contents: a JSON list of pipeline configs.
pub fn parse_pipeline_configs(content: &str) -> Result<Vec<PipelineConfig>, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

/// Read and parse the config file at `path`.
pub fn load_pipeline_configs(path: &Path) -> Result<Vec<PipelineConfig>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pipeline_configs(&content)
}
