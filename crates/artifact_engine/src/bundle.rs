use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use artifact_core::{bundle_entry_name, bundle_filename, DOCUMENT_EXTENSION};
use artifact_logging::{artifact_info, artifact_warn};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub path: PathBuf,
    /// Entries in the archive, one per distinct flattened name.
    pub entries: Vec<String>,
    /// Documents dropped because a later one flattened to the same name.
    pub collisions: usize,
}

/// Every rendered document below `dir`, sorted by path.
pub fn find_documents(dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    let mut documents = Vec::new();
    if !dir.exists() {
        return Ok(documents);
    }
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() && is_document(entry.path()) {
            documents.push(entry.into_path());
        }
    }
    documents.sort();
    Ok(documents)
}

/// Zip every rendered document below `output_dir` into
/// `output_dir/<prefix>reports.zip`, flattened to the archive root.
///
/// Returns `None` without writing anything when there is nothing to bundle.
pub fn bundle(output_dir: &Path, prefix: &str) -> Result<Option<BundleSummary>, BundleError> {
    let documents = find_documents(output_dir)?;
    if documents.is_empty() {
        artifact_warn!("No PDF files found to zip in {:?}", output_dir);
        return Ok(None);
    }

    // Flattening can map documents from different jobs onto one name; the
    // last one in path order is kept.
    let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut collisions = 0;
    for document in documents {
        let Some(file_name) = document.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };
        let name = bundle_entry_name(prefix, &file_name);
        if let Some(previous) = by_name.insert(name.clone(), document) {
            artifact_warn!(
                "Bundle entry {} from {:?} is replaced by a later document",
                name,
                previous
            );
            collisions += 1;
        }
    }

    let writer = AtomicFileWriter::new(output_dir.to_path_buf());
    let mut zip = ZipWriter::new(writer.temp_file()?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, path) in &by_name {
        zip.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
    }
    let tmp = zip.finish()?;
    let path = writer.commit(tmp, &bundle_filename(prefix))?;

    artifact_info!("Zipped {} PDFs to {:?}", by_name.len(), path);
    Ok(Some(BundleSummary {
        path,
        entries: by_name.into_keys().collect(),
        collisions,
    }))
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
        .unwrap_or(false)
}
