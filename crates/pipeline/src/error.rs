//! Error types for the pipeline crate.

use std::path::{Path, PathBuf};

use overlay_common::ConfigError;
use thiserror::Error;

/// Errors that abort a run or prevent the pipeline from starting.
///
/// Per-step fetch and decode failures are not errors at this level; they are
/// recorded in the run report and the run carries on.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer setup failed: {0}")]
    Renderer(#[from] renderer::RenderError),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),

    #[error("Render task failed: {0}")]
    Task(String),
}

impl PipelineError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
