use std::path::{Path, PathBuf};
use std::time::Duration;

use artifact_core::{archive_filename, ApiSettings, Identifier, JobId};
use artifact_logging::{artifact_debug, artifact_warn};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::{FailureKind, FetchError};

const PRIVATE_TOKEN: &str = "private-token";
const NEXT_PAGE: &str = "x-next-page";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub page_size: u32,
    /// `None` leaves the client default in place.
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub verify_tls: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            connect_timeout: None,
            request_timeout: None,
            verify_tls: false,
        }
    }
}

/// A downloaded artifact bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArchive {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Where job artifacts come from.
#[async_trait::async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Find the id of the job called `job_name` in a pipeline.
    async fn resolve_job_id(
        &self,
        project: &Identifier,
        pipeline: &Identifier,
        job_name: &str,
    ) -> Result<JobId, FetchError>;

    /// Download the job's artifact bundle into `dest_dir`.
    async fn download(
        &self,
        project: &Identifier,
        job_id: JobId,
        dest_dir: &Path,
    ) -> Result<DownloadedArchive, FetchError>;
}

#[derive(Debug, Deserialize)]
struct JobSummary {
    id: JobId,
    name: String,
}

/// [`ArtifactSource`] backed by the GitLab REST API (v4 layout).
#[derive(Debug, Clone)]
pub struct GitLabClient {
    base_url: String,
    client: reqwest::Client,
    settings: FetchSettings,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: &str, settings: FetchSettings) -> Result<Self, FetchError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = build_client(token, &settings)?;
        if !settings.verify_tls {
            artifact_warn!("TLS certificate verification is disabled for {}", base_url);
        }
        Ok(Self {
            base_url,
            client,
            settings,
        })
    }

    pub fn from_settings(api: &ApiSettings) -> Result<Self, FetchError> {
        let settings = FetchSettings {
            verify_tls: api.verify_tls,
            ..FetchSettings::default()
        };
        Self::new(&api.base_url, &api.token, settings)
    }

    fn jobs_url(&self, project: &Identifier, pipeline: &Identifier, page: u32) -> String {
        format!(
            "{}/projects/{}/pipelines/{}/jobs?per_page={}&page={}",
            self.base_url,
            path_segment(project),
            path_segment(pipeline),
            self.settings.page_size,
            page
        )
    }

    fn artifacts_url(&self, project: &Identifier, job_id: JobId) -> String {
        format!(
            "{}/projects/{}/jobs/{}/artifacts",
            self.base_url,
            path_segment(project),
            job_id
        )
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("GET {url}: {status}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ArtifactSource for GitLabClient {
    async fn resolve_job_id(
        &self,
        project: &Identifier,
        pipeline: &Identifier,
        job_name: &str,
    ) -> Result<JobId, FetchError> {
        let mut page: u32 = 1;
        loop {
            let url = self.jobs_url(project, pipeline, page);
            artifact_debug!("Listing jobs page={} url={}", page, url);
            let response = self.get(&url).await?;
            let next = next_page(response.headers())?;
            let body = response.bytes().await.map_err(map_reqwest_error)?;
            let jobs: Vec<JobSummary> = serde_json::from_slice(&body).map_err(|err| {
                FetchError::new(FailureKind::InvalidResponse, format!("job listing: {err}"))
            })?;

            if let Some(job) = jobs.iter().find(|job| job.name == job_name) {
                return Ok(job.id);
            }

            match next {
                Some(next) if next > page => page = next,
                Some(next) => {
                    return Err(FetchError::new(
                        FailureKind::InvalidResponse,
                        format!("next page {next} does not advance past page {page}"),
                    ));
                }
                None => break,
            }
        }

        Err(FetchError::new(
            FailureKind::JobNotFound {
                name: job_name.to_string(),
            },
            format!("no job named '{job_name}' in pipeline {pipeline} of project {project}"),
        ))
    }

    async fn download(
        &self,
        project: &Identifier,
        job_id: JobId,
        dest_dir: &Path,
    ) -> Result<DownloadedArchive, FetchError> {
        let response = self.get(&self.artifacts_url(project, job_id)).await?;

        tokio::fs::create_dir_all(dest_dir).await.map_err(io_error)?;
        let path = dest_dir.join(archive_filename(job_id));
        match stream_to_file(response, &path).await {
            Ok(bytes) => Ok(DownloadedArchive { path, bytes }),
            Err(err) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(err)
            }
        }
    }
}

fn build_client(token: &str, settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
    let mut token_value = HeaderValue::from_str(token)
        .map_err(|err| FetchError::new(FailureKind::InvalidToken, err.to_string()))?;
    token_value.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(PRIVATE_TOKEN, token_value);

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .danger_accept_invalid_certs(!settings.verify_tls);
    if let Some(timeout) = settings.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }
    if let Some(timeout) = settings.request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
}

fn next_page(headers: &HeaderMap) -> Result<Option<u32>, FetchError> {
    let Some(value) = headers.get(NEXT_PAGE) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|err| FetchError::new(FailureKind::InvalidResponse, err.to_string()))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<u32>().map(Some).map_err(|err| {
        FetchError::new(
            FailureKind::InvalidResponse,
            format!("bad {NEXT_PAGE} header {text:?}: {err}"),
        )
    })
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64, FetchError> {
    let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        file.write_all(&chunk).await.map_err(io_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_error)?;
    Ok(written)
}

fn path_segment(id: &Identifier) -> String {
    urlencoding::encode(&id.to_string()).into_owned()
}

fn io_error(err: std::io::Error) -> FetchError {
    FetchError::new(FailureKind::Io, err.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
