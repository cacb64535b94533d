//! Artifact engine: fetch, expand, render and bundle CI job artifacts.
mod bundle;
mod document;
mod driver;
mod expand;
mod fetch;
mod job;
mod persist;
mod progress;
mod render;
mod types;

pub use bundle::{bundle, find_documents, BundleError, BundleSummary};
pub use document::{
    decode_markup, escape_markup, indent_preserving, wrap_line, Document, DocumentError, FontFace,
    PageLayout, PlacedLine, TextStyle,
};
pub use driver::{Driver, JobPool};
pub use expand::{expand, ExpandError, ExpandSummary};
pub use fetch::{ArtifactSource, DownloadedArchive, FetchSettings, GitLabClient};
pub use job::{render_extracted, run_job, JobContext, JobError};
pub use persist::{clear_output_dir, ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{ChannelProgressSink, LogProgressSink, ProgressSink};
pub use render::{
    canonicalize_xml, json_document, render_json, render_xml, to_ascii_pretty, xml_document,
    RenderError, SourceKind,
};
pub use types::{
    EngineEvent, FailureKind, FetchError, JobProgress, JobReport, JobStatus, PipelineReport,
    RunSummary, Stage,
};
