//! Retrieval of GRIB2 payloads from the NOMADS filter service.
//!
//! Key features:
//! - Streaming download through a `.partial` file renamed on completion
//! - Exponential backoff retry on transient failures
//! - Persistent absence (404) reported separately from transient errors
//! - Payload sanity check: the body must start with `GRIB`

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use overlay_common::{ForecastCycle, VariableSpec};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::config::SourceConfig;
use crate::error::PipelineError;

const GRIB_MAGIC: &[u8; 4] = b"GRIB";

/// Why a payload could not be retrieved. `Io` aborts the run, the rest skip the step.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Not published upstream (404): {url}")]
    NotPublished { url: String },

    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Payload from {url} is not GRIB2 (starts with {prefix:?})")]
    InvalidPayload { url: String, prefix: String },

    #[error("Filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Worth retrying after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Http { .. } | FetchError::Transport { .. })
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Source of GRIB2 payloads for one (cycle, step, variable).
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Retrieve the payload into `scratch_dir` and return its path.
    async fn fetch(
        &self,
        cycle: &ForecastCycle,
        step: u32,
        variable: &VariableSpec,
        scratch_dir: &Path,
    ) -> Result<PathBuf, FetchError>;
}

/// Scratch file name for one payload; the variable name keeps the three
/// filtered downloads of a step apart.
pub fn scratch_file_name(cycle: &ForecastCycle, step: u32, variable: &VariableSpec) -> String {
    format!(
        "hrrr.t{}z.wrfsfcf{:02}.{}.grib2",
        cycle.hour_str(),
        step,
        variable.name
    )
}

/// Fetches from the NOMADS filter CGI over HTTP.
pub struct HttpFetcher {
    client: Client,
    source: SourceConfig,
}

impl HttpFetcher {
    pub fn new(source: SourceConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(source.request_timeout())
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .user_agent(concat!("hrrr-overlays/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::HttpClient(e.to_string()))?;

        Ok(Self { client, source })
    }

    /// One GET, streamed to `partial` and renamed to `dest` once complete.
    async fn attempt(&self, url: &str, partial: &Path, dest: &Path) -> Result<u64, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(FetchError::NotPublished {
                    url: url.to_string(),
                })
            }
            status => {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                })
            }
        }

        let mut file = File::create(partial)
            .await
            .map_err(|e| FetchError::io(partial, e))?;
        let mut stream = response.bytes_stream();
        let mut head: Vec<u8> = Vec::with_capacity(GRIB_MAGIC.len());
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    fs::remove_file(partial).await.ok();
                    return Err(transport(e));
                }
            };

            if head.len() < GRIB_MAGIC.len() {
                let take = (GRIB_MAGIC.len() - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
                if head.len() == GRIB_MAGIC.len() && head != GRIB_MAGIC {
                    drop(file);
                    fs::remove_file(partial).await.ok();
                    return Err(invalid_payload(url, &head));
                }
            }

            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(partial, e))?;
            written += chunk.len() as u64;
        }

        if head.len() < GRIB_MAGIC.len() {
            drop(file);
            fs::remove_file(partial).await.ok();
            return Err(invalid_payload(url, &head));
        }

        file.flush().await.map_err(|e| FetchError::io(partial, e))?;
        drop(file);
        fs::rename(partial, dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;
        Ok(written)
    }
}

fn invalid_payload(url: &str, head: &[u8]) -> FetchError {
    FetchError::InvalidPayload {
        url: url.to_string(),
        prefix: String::from_utf8_lossy(head).into_owned(),
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(skip(self, cycle, variable, scratch_dir), fields(cycle = %cycle, variable = %variable.name))]
    async fn fetch(
        &self,
        cycle: &ForecastCycle,
        step: u32,
        variable: &VariableSpec,
        scratch_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let url = self.source.url_for(cycle, step, variable);
        let file_name = scratch_file_name(cycle, step, variable);
        let dest = scratch_dir.join(&file_name);
        let partial = scratch_dir.join(format!("{}.partial", file_name));

        let retry = self.source.retry;
        let mut attempt = 0u32;
        loop {
            debug!(url = %url, attempt, "Requesting payload");
            match self.attempt(&url, &partial, &dest).await {
                Ok(bytes) => {
                    info!(path = %dest.display(), bytes, "Downloaded payload");
                    return Ok(dest);
                }
                Err(e) if e.is_transient() && attempt < retry.max_retries => {
                    attempt += 1;
                    let delay = retry.delay_for(attempt);
                    warn!(
                        error = %e,
                        retry = attempt,
                        max_retries = retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
