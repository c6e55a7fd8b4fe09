//! HTTP surface of the HRRR overlay service.
//!
//! Endpoints:
//! - `/` map page
//! - `/reflectivity_images` hour index
//! - one static directory per variable under its URL prefix
//! - `/run-task` and `/run-status` to start and watch pipeline runs
//! - `/health` and `/metrics`
//! - anything else from the web root

pub mod state;

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use pipeline::{build_index, TriggerError};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info};

pub use state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route_service("/", ServeFile::new(state.map_page()))
        .route("/reflectivity_images", get(index_handler))
        .route("/run-task", get(run_task_handler))
        .route("/run-status", get(run_status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    for variable in &state.config.variables {
        let prefix = variable.url_prefix.trim_end_matches('/');
        router = router.nest_service(
            prefix,
            ServeDir::new(state.static_root.join(&variable.output_dir)),
        );
    }

    router
        .fallback_service(ServeDir::new(&state.web_root))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// GET /reflectivity_images - Hour index of the published overlays
async fn index_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match build_index(&state.config, &state.static_root).await {
        Ok(index) => Json(index).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to build hour index");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// GET /run-task - Start a pipeline run in the background
async fn run_task_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.controller.trigger().await {
        Ok(run_id) => {
            info!(%run_id, "Run triggered over HTTP");
            (StatusCode::OK, format!("Task started (run {})", run_id)).into_response()
        }
        Err(e @ TriggerError::AlreadyRunning) => {
            info!("Rejected trigger, run already in progress");
            (StatusCode::CONFLICT, e.to_string()).into_response()
        }
    }
}

/// GET /run-status - Latest run state
async fn run_status_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.controller.status().await)
}

/// GET /health
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "overlay-server".to_string(),
    })
}

/// GET /metrics - Prometheus text exposition
async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    )
}
