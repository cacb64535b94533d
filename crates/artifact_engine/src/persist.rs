use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Remove a previous run's output directory. Missing directories are fine.
pub fn clear_output_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(PersistError::Io(err)),
    }
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        let mut tmp = self.temp_file()?;
        tmp.write_all(content.as_ref())?;
        self.commit(tmp, filename)
    }

    /// A temp file in the target directory, for callers that stream their content.
    pub fn temp_file(&self) -> Result<NamedTempFile, PersistError> {
        ensure_output_dir(&self.dir)?;
        Ok(NamedTempFile::new_in(&self.dir)?)
    }

    /// Flush `tmp` and rename it to `{dir}/{filename}`, replacing any existing file.
    pub fn commit(&self, mut tmp: NamedTempFile, filename: &str) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
