#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Zip archive bytes holding the given `(name, content)` entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Entry names of the zip archive at `path`, in archive order.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Every file below `root`, relative to it, sorted.
pub fn relative_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

pub const REPORT_JSON: &str = r#"{"zeta": 1, "alpha": {"nested": [1, 2, {"b": true, "a": null}]}, "mid": "x < y & z"}"#;

pub const JUNIT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- generated -->
<testsuite name="unit" tests="2">
  <testcase name="adds &amp; subtracts"/>
  <testcase name="fails"><failure>expected 1 &lt; 2</failure></testcase>
</testsuite>
"#;
