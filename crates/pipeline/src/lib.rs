//! HRRR overlay pipeline.
//!
//! Fetches GRIB2 payloads for the latest model cycle from NOMADS, renders
//! each configured variable into PNG overlays, publishes them per variable
//! and builds the hour index the web map reads.

pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod index;
pub mod render;
pub mod runner;

pub use config::{PipelineConfig, RetryPolicy, SourceConfig, StepRange};
pub use driver::{Pipeline, PipelineContext, RunReport, SkippedStep, Stage};
pub use error::{PipelineError, Result};
pub use fetch::{Fetch, FetchError, HttpFetcher};
pub use index::{build_index, HourEntry, HourIndex, IndexLayout, Pairing};
pub use runner::{RunController, RunOutcome, RunStatus, TriggerError};
