//! Run controller: at most one pipeline run at a time, with a status snapshot.
//!
//! A run is started either from the HTTP trigger (spawned, returns at once),
//! from `--once`, or from the periodic refresh loop. All three go through the
//! same lock, so a second request while a run is active is rejected instead
//! of racing the first one over the scratch directory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use overlay_common::ForecastCycle;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::driver::{Pipeline, RunReport};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerError {
    #[error("A run is already in progress")]
    AlreadyRunning,
}

/// How a finished run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step of every variable rendered
    Succeeded,
    /// The run completed but some steps were skipped
    PartiallyFailed { skipped: usize },
    /// A filesystem error aborted the run
    Failed { error: String },
}

impl RunOutcome {
    fn from_report(report: &RunReport) -> Self {
        if report.skipped.is_empty() {
            RunOutcome::Succeeded
        } else {
            RunOutcome::PartiallyFailed {
                skipped: report.skipped.len(),
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::PartiallyFailed { .. } => "partially_failed",
            RunOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

/// Snapshot served by `/run-status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running {
        run_id: Uuid,
        cycle: String,
        started_at: DateTime<Utc>,
    },
    Finished {
        run_id: Uuid,
        finished_at: DateTime<Utc>,
        outcome: RunOutcome,
        report: Option<RunReport>,
    },
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running { .. })
    }
}

/// Serializes pipeline runs and tracks the latest one.
#[derive(Clone)]
pub struct RunController {
    pipeline: Arc<Pipeline>,
    lock: Arc<Mutex<()>>,
    status: Arc<RwLock<RunStatus>>,
}

impl RunController {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            lock: Arc::new(Mutex::new(())),
            status: Arc::new(RwLock::new(RunStatus::Idle)),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Start a run in the background and return its id.
    pub async fn trigger(&self) -> Result<Uuid, TriggerError> {
        let guard = self.acquire()?;
        let run_id = Uuid::new_v4();
        let cycle = self.pipeline.cycle_at(Utc::now());

        // Status flips before the task is spawned so a poll right after the
        // trigger never observes the previous run
        self.mark_running(run_id, &cycle).await;

        let this = self.clone();
        tokio::spawn(async move {
            this.execute(run_id, cycle, guard).await;
        });

        Ok(run_id)
    }

    /// Run to completion on the caller's task.
    pub async fn run_now(&self) -> Result<RunOutcome, TriggerError> {
        let guard = self.acquire()?;
        let run_id = Uuid::new_v4();
        let cycle = self.pipeline.cycle_at(Utc::now());

        self.mark_running(run_id, &cycle).await;
        Ok(self.execute(run_id, cycle, guard).await)
    }

    pub async fn status(&self) -> RunStatus {
        self.status.read().await.clone()
    }

    /// Run now and then every `interval` until `shutdown` fires.
    pub async fn run_forever(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_secs = interval.as_secs(), "Starting periodic refresh");

        loop {
            match self.run_now().await {
                Ok(outcome) if outcome.is_failed() => {
                    error!(outcome = outcome.as_str(), "Scheduled run failed");
                }
                Ok(outcome) => {
                    info!(outcome = outcome.as_str(), "Scheduled run finished");
                }
                Err(TriggerError::AlreadyRunning) => {
                    info!("Run already in progress, skipping scheduled refresh");
                }
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down periodic refresh");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    fn acquire(&self) -> Result<OwnedMutexGuard<()>, TriggerError> {
        self.lock
            .clone()
            .try_lock_owned()
            .map_err(|_| TriggerError::AlreadyRunning)
    }

    async fn mark_running(&self, run_id: Uuid, cycle: &ForecastCycle) {
        info!(%run_id, cycle = %cycle, "Run started");
        *self.status.write().await = RunStatus::Running {
            run_id,
            cycle: cycle.to_string(),
            started_at: Utc::now(),
        };
    }

    /// Holds `_guard` until the final status is written.
    async fn execute(
        &self,
        run_id: Uuid,
        cycle: ForecastCycle,
        _guard: OwnedMutexGuard<()>,
    ) -> RunOutcome {
        let (outcome, report) = match self.pipeline.run(run_id, cycle).await {
            Ok(report) => (RunOutcome::from_report(&report), Some(report)),
            Err(e) => {
                error!(%run_id, error = %e, "Run aborted");
                (
                    RunOutcome::Failed {
                        error: e.to_string(),
                    },
                    None,
                )
            }
        };

        if let RunOutcome::PartiallyFailed { skipped } = &outcome {
            warn!(%run_id, skipped, "Run finished with skipped steps");
        }
        metrics::counter!("overlay_runs_total", "outcome" => outcome.as_str()).increment(1);

        *self.status.write().await = RunStatus::Finished {
            run_id,
            finished_at: Utc::now(),
            outcome: outcome.clone(),
            report,
        };
        outcome
    }
}
