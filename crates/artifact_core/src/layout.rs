//! Naming of everything the tool writes below the output root.
//!
//! ```text
//! <root>/project_<P>_pipeline_<PL>/
//!     job_<J>_artifacts.zip        (transient download)
//!     job_<J>/...                  (extracted files + rendered documents)
//!     <prefix>reports.zip          (bundle)
//! ```
use std::path::{Path, PathBuf};

use crate::PipelineConfig;

pub type JobId = u64;

pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Output directory of one pipeline config.
pub fn pipeline_dir(root: &Path, config: &PipelineConfig) -> PathBuf {
    root.join(format!(
        "project_{}_pipeline_{}",
        sanitize_component(&config.project_id.to_string()),
        sanitize_component(&config.pipeline_id.to_string())
    ))
}

pub fn job_dir(pipeline_dir: &Path, job_id: JobId) -> PathBuf {
    pipeline_dir.join(format!("job_{job_id}"))
}

pub fn archive_filename(job_id: JobId) -> String {
    format!("job_{job_id}_artifacts.zip")
}

pub fn bundle_filename(prefix: &str) -> String {
    format!("{prefix}reports.zip")
}

/// Bundle entries are flattened to the archive root and carry the prefix.
pub fn bundle_entry_name(prefix: &str, document_file_name: &str) -> String {
    format!("{prefix}{document_file_name}")
}

/// Rendered document path for a structured source file: same stem, `.pdf`.
pub fn document_path(source: &Path) -> PathBuf {
    source.with_extension(DOCUMENT_EXTENSION)
}

/// Make an identifier safe to use as a single path component.
///
/// Path separators and other characters that are forbidden on common
/// filesystems become `_`; runs of `_` are collapsed.
pub fn sanitize_component(input: &str) -> String {
    let mapped: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();

    let mut compacted = String::with_capacity(mapped.len());
    let mut prev_underscore = false;
    for c in mapped.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = compacted.trim_matches(&[' ', '.'][..]);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}
