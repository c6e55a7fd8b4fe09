//! Shared state for the HTTP handlers.

use std::path::PathBuf;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use pipeline::{PipelineConfig, RunController};

/// Map page served at `/`.
pub const MAP_PAGE: &str = "usa_leaflet.html";

pub struct AppState {
    pub controller: RunController,
    pub config: Arc<PipelineConfig>,
    /// Parent of every variable's output directory
    pub static_root: PathBuf,
    /// Map page and its assets
    pub web_root: PathBuf,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    pub fn new(
        controller: RunController,
        web_root: impl Into<PathBuf>,
        prometheus: PrometheusHandle,
    ) -> Self {
        let pipeline = controller.pipeline();
        let config = Arc::new(pipeline.config().clone());
        let static_root = pipeline.context().static_root.clone();

        Self {
            controller,
            config,
            static_root,
            web_root: web_root.into(),
            prometheus,
        }
    }

    pub fn map_page(&self) -> PathBuf {
        self.web_root.join(MAP_PAGE)
    }
}
