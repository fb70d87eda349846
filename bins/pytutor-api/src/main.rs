mod handlers;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use pytutor_common::config::TutorConfig;
use pytutor_common::curriculum::CurriculumStore;
use pytutor_engine::{Executor, Validator};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct AppState {
    pub config: TutorConfig,
    pub validator: Validator,
    /// None when the curriculum directory is missing; topic routes answer 503
    pub curriculum: Option<CurriculumStore>,
}

impl AppState {
    pub fn from_config(config: TutorConfig) -> Self {
        let curriculum = match CurriculumStore::open(&config.curriculum_dir) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "Curriculum unavailable, topic routes disabled");
                None
            }
        };
        let validator = Validator::new(Executor::from_config(&config));

        Self {
            config,
            validator,
            curriculum,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes())
        .with_state(Arc::new(state))
}

fn load_config() -> Result<TutorConfig> {
    match std::env::var("PYTUTOR_CONFIG") {
        Ok(path) => TutorConfig::load(Path::new(&path))?.with_env_overrides(),
        Err(_) => TutorConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("PYTUTOR_LOG_JSON").map(|v| v == "1").unwrap_or(false) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }

    info!("PyTutor API booting...");

    let config = load_config().context("Failed to load tutor configuration")?;
    info!(
        python = %config.python_path,
        timeout_seconds = config.timeout_seconds,
        max_output_bytes = config.max_output_bytes,
        isolated = config.isolated_mode,
        "Configuration loaded"
    );

    metrics::init();
    let app = build_router(AppState::from_config(config));

    let addr = std::env::var("PYTUTOR_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
