use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use artifact_logging::{artifact_debug, artifact_warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("corrupt archive {}: {reason}", archive.display())]
    CorruptArchive { archive: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandSummary {
    pub dest_dir: PathBuf,
    pub files: usize,
    pub skipped: usize,
}

/// Extract every entry of the zip at `archive_path` into `dest_dir`, then
/// delete the archive. The archive is left in place when extraction fails.
pub fn expand(archive_path: &Path, dest_dir: &Path) -> Result<ExpandSummary, ExpandError> {
    fs::create_dir_all(dest_dir)?;

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| corrupt(archive_path, err))?;

    let mut files = 0;
    let mut skipped = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| corrupt(archive_path, err))?;

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            artifact_warn!(
                "Skipping entry with unsafe path {:?} in {:?}",
                entry.name(),
                archive_path
            );
            skipped += 1;
            continue;
        };
        let target = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        // A truncated or garbled entry surfaces as an io error while copying.
        io::copy(&mut entry, &mut out).map_err(|err| ExpandError::CorruptArchive {
            archive: archive_path.to_path_buf(),
            reason: format!("{}: {err}", target.display()),
        })?;
        files += 1;
    }

    fs::remove_file(archive_path)?;
    artifact_debug!(
        "Expanded {:?} into {:?} ({} files)",
        archive_path,
        dest_dir,
        files
    );

    Ok(ExpandSummary {
        dest_dir: dest_dir.to_path_buf(),
        files,
        skipped,
    })
}

fn corrupt(archive: &Path, err: zip::result::ZipError) -> ExpandError {
    ExpandError::CorruptArchive {
        archive: archive.to_path_buf(),
        reason: err.to_string(),
    }
}
