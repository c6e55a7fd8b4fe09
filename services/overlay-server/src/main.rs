//! HRRR overlay service.
//!
//! Serves the map page, the hour index and the rendered overlays, and runs the
//! fetch/render pipeline on demand (`/run-task`), on a schedule
//! (`--refresh-interval-secs`) or once from the command line (`--once`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use overlay_server::{create_router, AppState};
use pipeline::{HttpFetcher, Pipeline, PipelineConfig, PipelineContext, RunController};
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "overlay-server")]
#[command(about = "HRRR weather overlay pipeline and file server")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:5000")]
    listen: String,

    /// Pipeline configuration file (built-in defaults when absent)
    #[arg(long, env = "OVERLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding `grib_files/` and `static/`
    #[arg(long, env = "DATA_DIR", default_value = "Hrrr")]
    data_dir: PathBuf,

    /// Directory with the map page and its assets
    #[arg(long, env = "WEB_ROOT", default_value = "web")]
    web_root: PathBuf,

    /// Run the pipeline once and exit without serving
    #[arg(long)]
    once: bool,

    /// Re-run the pipeline every N seconds while serving
    #[arg(long, env = "REFRESH_INTERVAL_SECS")]
    refresh_interval_secs: Option<u64>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => {
            info!("No configuration file given, using built-in defaults");
            PipelineConfig::default()
        }
    };

    let fetcher =
        HttpFetcher::new(config.source.clone()).context("failed to create upstream client")?;
    let context = PipelineContext::from_data_dir(&args.data_dir);
    let pipeline = Pipeline::new(Arc::new(config), context, Arc::new(fetcher))
        .context("invalid pipeline configuration")?;
    let controller = RunController::new(Arc::new(pipeline));

    info!(
        data_dir = %args.data_dir.display(),
        web_root = %args.web_root.display(),
        "Starting HRRR overlay service"
    );

    if args.once {
        info!("Running single pipeline pass");
        let outcome = controller
            .run_now()
            .await
            .context("failed to start pipeline run")?;
        if outcome.is_failed() {
            bail!("pipeline run failed: {:?}", outcome);
        }
        info!(outcome = outcome.as_str(), "Pipeline pass complete");
        return Ok(());
    }

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_signal.send(()).ok();
    });

    if let Some(secs) = args.refresh_interval_secs {
        let scheduler = controller.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            scheduler
                .run_forever(Duration::from_secs(secs.max(1)), shutdown)
                .await;
        });
    }

    let state = Arc::new(AppState::new(controller, &args.web_root, prometheus));
    let app = create_router(state);

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", args.listen))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(address = %addr, "Listening");

    let mut shutdown = shutdown_tx.subscribe();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
        })
        .await
    {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}
