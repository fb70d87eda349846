use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/api/topics", get(handlers::list_topics))
        .route("/api/topics/:topic_id", get(handlers::get_topic))
        .route("/api/check", post(handlers::check_code))
        .route("/api/execute", post(handlers::execute_code))
        .route("/api/validate", post(handlers::validate_challenge))
        .route("/api/predict", post(handlers::predict_output))
}
