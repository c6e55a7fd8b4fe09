//! The pipeline driver: one run over every (step, variable) pair of a cycle.
//!
//! Steps run sequentially. Each pair is fetched then rendered into a
//! per-variable staging directory; a failure at either stage is recorded and
//! the loop moves on. Only filesystem errors abort the run. Once the loop is
//! done, every variable with at least one rendered step replaces its
//! published files with the staged ones.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use overlay_common::{ForecastCycle, VariableSpec};
use renderer::OverlayRenderer;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::fetch::{Fetch, FetchError};
use crate::render::{render_payload, RenderStageError};

/// Filesystem layout of one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineContext {
    /// Downloaded payloads and the staging area; wiped at the start of every run
    pub scratch_dir: PathBuf,
    /// Parent of every variable's output directory
    pub static_root: PathBuf,
}

impl PipelineContext {
    pub fn new(scratch_dir: impl Into<PathBuf>, static_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            static_root: static_root.into(),
        }
    }

    /// `<data_dir>/grib_files` for scratch, `<data_dir>/static` for outputs.
    pub fn from_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self::new(data_dir.join("grib_files"), data_dir.join("static"))
    }

    pub fn staging_root(&self) -> PathBuf {
        self.scratch_dir.join("staging")
    }

    pub fn staging_dir(&self, variable: &VariableSpec) -> PathBuf {
        self.staging_root().join(&variable.key)
    }

    pub fn output_dir(&self, variable: &VariableSpec) -> PathBuf {
        self.static_root.join(&variable.output_dir)
    }
}

/// Stage at which a step was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Render,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Render => "render",
        }
    }
}

/// A (variable, step) pair that produced no overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStep {
    pub variable: String,
    pub step: u32,
    pub stage: Stage,
    pub reason: String,
}

/// What one run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// `YYYYMMDD/HHz`
    pub cycle: String,
    pub reference_time: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Steps rendered per variable name
    pub rendered: BTreeMap<String, usize>,
    /// Variables whose output directory was replaced
    pub published: Vec<String>,
    pub skipped: Vec<SkippedStep>,
}

impl RunReport {
    pub fn total_rendered(&self) -> usize {
        self.rendered.values().sum()
    }
}

/// Fetches, renders and publishes overlays for one cycle at a time.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    context: PipelineContext,
    fetcher: Arc<dyn Fetch>,
    renderer: Arc<OverlayRenderer>,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        context: PipelineContext,
        fetcher: Arc<dyn Fetch>,
    ) -> Result<Self> {
        config.validate()?;
        let renderer =
            OverlayRenderer::new(config.extent, config.image.width, config.image.height)?;

        Ok(Self {
            config,
            context,
            fetcher,
            renderer: Arc::new(renderer),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Cycle a run started at `now` targets.
    pub fn cycle_at(&self, now: DateTime<Utc>) -> ForecastCycle {
        self.config.cycle.latest(now)
    }

    /// Process every configured step and variable of `cycle`.
    #[instrument(skip(self, cycle), fields(cycle = %cycle))]
    pub async fn run(&self, run_id: Uuid, cycle: ForecastCycle) -> Result<RunReport> {
        let started_at = Utc::now();
        info!(
            %run_id,
            first_step = self.config.steps.first,
            last_step = self.config.steps.last,
            variables = self.config.variables.len(),
            "Starting overlay run"
        );

        self.prepare_scratch().await?;

        let mut rendered: BTreeMap<String, usize> = self
            .config
            .variables
            .iter()
            .map(|v| (v.name.clone(), 0))
            .collect();
        let mut skipped = Vec::new();

        for step in self.config.steps.iter() {
            for variable in &self.config.variables {
                match self.process(&cycle, step, variable).await? {
                    Ok(()) => {
                        *rendered.entry(variable.name.clone()).or_default() += 1;
                        metrics::counter!(
                            "overlay_steps_rendered_total",
                            "variable" => variable.name.clone()
                        )
                        .increment(1);
                    }
                    Err(skip) => {
                        metrics::counter!(
                            "overlay_steps_skipped_total",
                            "variable" => variable.name.clone(),
                            "stage" => skip.stage.as_str()
                        )
                        .increment(1);
                        skipped.push(skip);
                    }
                }
            }
        }

        let mut published = Vec::new();
        for variable in &self.config.variables {
            let count = rendered.get(&variable.name).copied().unwrap_or(0);
            if count == 0 {
                warn!(
                    variable = %variable.name,
                    "No steps rendered, keeping previously published overlays"
                );
                continue;
            }
            self.publish(variable).await?;
            published.push(variable.name.clone());
        }

        let report = RunReport {
            run_id,
            cycle: cycle.to_string(),
            reference_time: cycle.reference_time,
            started_at,
            finished_at: Utc::now(),
            rendered,
            published,
            skipped,
        };

        info!(
            %run_id,
            rendered = report.total_rendered(),
            skipped = report.skipped.len(),
            duration_secs = (report.finished_at - report.started_at).num_seconds(),
            "Overlay run complete"
        );
        Ok(report)
    }

    /// Fetch and render one pair. The outer error is fatal, the inner one a skip.
    async fn process(
        &self,
        cycle: &ForecastCycle,
        step: u32,
        variable: &VariableSpec,
    ) -> Result<std::result::Result<(), SkippedStep>> {
        let skip = |stage: Stage, reason: String| SkippedStep {
            variable: variable.name.clone(),
            step,
            stage,
            reason,
        };

        let payload = match self
            .fetcher
            .fetch(cycle, step, variable, &self.context.scratch_dir)
            .await
        {
            Ok(path) => path,
            Err(FetchError::Io { path, source }) => {
                error!(step, variable = %variable.name, path = %path.display(), error = %source, "Fetch hit a filesystem error");
                return Err(PipelineError::Io { path, source });
            }
            Err(e) => {
                warn!(step, variable = %variable.name, error = %e, "Fetch failed, skipping step");
                return Ok(Err(skip(Stage::Fetch, e.to_string())));
            }
        };

        let png_path = self
            .context
            .staging_dir(variable)
            .join(variable.filename(step));
        let result = render_payload(
            self.renderer.clone(),
            payload.clone(),
            variable.clone(),
            png_path,
        )
        .await;

        // Each payload is consumed exactly once
        if let Err(e) = fs::remove_file(&payload).await {
            warn!(path = %payload.display(), error = %e, "Failed to remove payload");
        }

        match result {
            Ok(step_info) => {
                info!(
                    step,
                    variable = %variable.name,
                    path = %step_info.png_path.display(),
                    bytes = step_info.bytes,
                    coverage = format!("{:.1}%", step_info.coverage * 100.0),
                    range = ?step_info.value_range,
                    "Rendered overlay"
                );
                Ok(Ok(()))
            }
            Err(RenderStageError::Io { path, source }) => {
                error!(step, variable = %variable.name, path = %path.display(), error = %source, "Render hit a filesystem error");
                Err(PipelineError::Io { path, source })
            }
            Err(e) => {
                warn!(step, variable = %variable.name, error = %e, "Render failed, skipping step");
                Ok(Err(skip(Stage::Render, e.to_string())))
            }
        }
    }

    /// Wipe the scratch directory and recreate the staging and output directories.
    async fn prepare_scratch(&self) -> Result<()> {
        let scratch = &self.context.scratch_dir;
        match fs::remove_dir_all(scratch).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io(scratch, e)),
        }

        for variable in &self.config.variables {
            for dir in [
                self.context.staging_dir(variable),
                self.context.output_dir(variable),
            ] {
                fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| PipelineError::io(&dir, e))?;
            }
        }
        Ok(())
    }

    /// Replace `variable`'s published files with the staged ones.
    async fn publish(&self, variable: &VariableSpec) -> Result<()> {
        let staging = self.context.staging_dir(variable);
        let output = self.context.output_dir(variable);

        let removed = remove_files_in(&output).await?;

        let mut moved = 0usize;
        let mut entries = fs::read_dir(&staging)
            .await
            .map_err(|e| PipelineError::io(&staging, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(&staging, e))?
        {
            let target = output.join(entry.file_name());
            fs::rename(entry.path(), &target)
                .await
                .map_err(|e| PipelineError::io(&target, e))?;
            moved += 1;
        }

        info!(
            variable = %variable.name,
            dir = %output.display(),
            removed,
            published = moved,
            "Published overlays"
        );
        Ok(())
    }
}

/// Delete every regular file directly inside `dir`.
async fn remove_files_in(dir: &Path) -> Result<usize> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;
    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| PipelineError::io(&path, e))?
            .is_file();
        if is_file {
            fs::remove_file(&path)
                .await
                .map_err(|e| PipelineError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}
