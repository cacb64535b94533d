use std::fs;

use artifact_engine::{clear_output_dir, ensure_output_dir, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out").join("nested");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn clear_removes_tree_and_tolerates_missing_dir() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("project_1_pipeline_2");
    fs::create_dir_all(dir.join("job_3")).unwrap();
    fs::write(dir.join("job_3").join("old.pdf"), "stale").unwrap();

    clear_output_dir(&dir).unwrap();
    assert!(!dir.exists());
    clear_output_dir(&dir).unwrap();
}

#[test]
fn atomic_write_replaces_existing_bytes() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("doc.pdf", b"%PDF-first").unwrap();
    assert_eq!(first.file_name().unwrap(), "doc.pdf");
    assert_eq!(fs::read(&first).unwrap(), b"%PDF-first");

    let second = writer.write("doc.pdf", "second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "second");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("doc.pdf", "data");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("doc.pdf").exists());
}
