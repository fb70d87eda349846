// HTTP route handlers for the PyTutor API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use pytutor_common::config::ExecutionLimits;
use pytutor_common::curriculum::CurriculumStore;
use pytutor_common::types::{ChallengeSpec, ExecutionOutcome, ValidationVerdict};
use pytutor_engine::feedback::friendly_error;
use pytutor_engine::hints::{hint_for_attempt, should_reveal_solution};
use pytutor_engine::prediction::evaluate_prediction;
use pytutor_engine::check_safety;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{metrics, AppState};

/// Upper bounds on per-request limit overrides
const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 30;
const MAX_REQUEST_OUTPUT_BYTES: usize = 64 * 1024;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn curriculum(state: &AppState) -> Result<&CurriculumStore, Response> {
    state
        .curriculum
        .as_ref()
        .ok_or_else(|| error_response(StatusCode::SERVICE_UNAVAILABLE, "Curriculum is not configured"))
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub timeout_seconds: Option<u64>,
    pub max_output_bytes: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
    /// Limits actually applied after clamping
    pub limits: ExecutionLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_error: Option<String>,
}

/// Either an inline challenge or a reference into the curriculum
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub challenge: Option<ChallengeSpec>,
    pub topic_id: Option<String>,
    pub challenge_number: Option<usize>,
    #[serde(default = "default_attempt")]
    pub attempt_number: u32,
}

fn default_attempt() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub challenge_id: String,
    #[serde(flatten)]
    pub verdict: ValidationVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub code: String,
    pub prediction: String,
}

#[derive(Debug, Serialize)]
pub struct TopicSummary {
    pub topic_id: String,
    pub title: String,
    pub difficulty: u8,
    pub estimated_time: u32,
    pub prerequisites: Vec<String>,
    pub challenges: usize,
}

/// GET /health - Liveness probe
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "python": state.config.python_path,
            "curriculum": state.curriculum.is_some(),
        })),
    )
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_endpoint() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}

/// GET /api/topics - Topic summaries
pub async fn list_topics(State(state): State<Arc<AppState>>) -> Response {
    let store = match curriculum(&state) {
        Ok(store) => store,
        Err(response) => return response,
    };

    let ids = match store.list_topics() {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Failed to list topics");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to list topics: {}", e));
        }
    };

    let mut summaries = Vec::with_capacity(ids.len());
    for id in ids {
        match store.load_topic(&id) {
            Ok(topic) => summaries.push(TopicSummary {
                challenges: topic.challenges.len(),
                topic_id: topic.id,
                title: topic.title,
                difficulty: topic.difficulty,
                estimated_time: topic.estimated_time,
                prerequisites: topic.prerequisites,
            }),
            Err(e) => warn!(topic = %id, error = %e, "Skipping unreadable topic"),
        }
    }

    (StatusCode::OK, Json(summaries)).into_response()
}

/// GET /api/topics/:topic_id - Full topic with levels and challenges
pub async fn get_topic(State(state): State<Arc<AppState>>, Path(topic_id): Path<String>) -> Response {
    let store = match curriculum(&state) {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.load_topic(&topic_id) {
        Ok(topic) => (StatusCode::OK, Json(topic)).into_response(),
        Err(e) => {
            info!(topic = %topic_id, error = %e, "Topic not found");
            error_response(StatusCode::NOT_FOUND, format!("Topic '{}' not found", topic_id))
        }
    }
}

/// POST /api/check - Static safety check, nothing runs
pub async fn check_code(Json(payload): Json<CodeRequest>) -> impl IntoResponse {
    (StatusCode::OK, Json(check_safety(&payload.code)))
}

/// POST /api/execute - Run code and return the structured outcome
pub async fn execute_code(State(state): State<Arc<AppState>>, Json(payload): Json<ExecuteRequest>) -> Response {
    if payload.timeout_seconds == Some(0) || payload.max_output_bytes == Some(0) {
        return error_response(StatusCode::BAD_REQUEST, "Limits must be greater than zero");
    }
    let executor = state.validator.executor();
    let limits = executor.limits().with_overrides(
        payload.timeout_seconds.map(|t| t.min(MAX_REQUEST_TIMEOUT_SECONDS)),
        payload.max_output_bytes.map(|b| b.min(MAX_REQUEST_OUTPUT_BYTES)),
    );

    let outcome = executor.execute_with(&payload.code, limits).await;
    metrics::record_execution(&outcome);

    let friendly = (!outcome.succeeded).then(|| friendly_error(&outcome));
    (
        StatusCode::OK,
        Json(ExecuteResponse {
            outcome,
            limits,
            friendly_error: friendly,
        }),
    )
        .into_response()
}

/// POST /api/validate - Judge a submission against a challenge
pub async fn validate_challenge(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidateRequest>,
) -> Response {
    let challenge = match (payload.challenge, payload.topic_id, payload.challenge_number) {
        (Some(challenge), _, _) => challenge,
        (None, Some(topic_id), Some(number)) => {
            let store = match curriculum(&state) {
                Ok(store) => store,
                Err(response) => return response,
            };
            match store.load_challenge(&topic_id, number) {
                Ok(challenge) => challenge,
                Err(e) => return error_response(StatusCode::NOT_FOUND, e.to_string()),
            }
        }
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Provide either 'challenge' or both 'topic_id' and 'challenge_number'",
            )
        }
    };

    let verdict = state.validator.validate(&payload.code, &challenge).await;
    metrics::record_validation(verdict.is_correct);

    let (hint, solution) = if verdict.is_correct {
        (None, None)
    } else {
        let attempt = payload.attempt_number.max(1);
        (
            Some(hint_for_attempt(&challenge, attempt).render()),
            should_reveal_solution(attempt, state.config.max_attempts).then(|| challenge.solution.clone()),
        )
    };

    (
        StatusCode::OK,
        Json(ValidateResponse {
            challenge_id: challenge.id,
            verdict,
            hint,
            solution,
        }),
    )
        .into_response()
}

/// POST /api/predict - Score an output prediction
pub async fn predict_output(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PredictRequest>,
) -> impl IntoResponse {
    let outcome = state.validator.executor().execute(&payload.code).await;
    metrics::record_execution(&outcome);
    (StatusCode::OK, Json(evaluate_prediction(&payload.prediction, &outcome)))
}
