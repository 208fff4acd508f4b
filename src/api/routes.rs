use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::domain::patient::PatientFacts;
use crate::domain::RuleDefinition;
use crate::kb::{EngineSource, PublishError, Publisher, SharedEngine};
use crate::observability::MetricsRegistry;
use crate::session::InferenceSession;
use crate::storage::Storage;

use super::request::{AddSymptomRequest, DeleteRuleRequest, UpdateRuleRequest};
use super::response::{
    AckResponse, ErrorResponse, HealthResponse, PublishResponse, ReadyResponse, TriageResponse,
};

/// Shared application state.
pub struct AppState {
    /// Storage backend for the symptom catalog and authored rules
    pub storage: Arc<dyn Storage>,

    /// The long-lived shared engine (clone source for sessions)
    pub shared: Arc<SharedEngine>,

    /// Publisher bound to the shared engine
    pub publisher: Publisher,

    /// Application metrics
    pub metrics: MetricsRegistry,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/triage", post(handle_triage))
        .route(
            "/api/rules",
            get(handle_list_rules)
                .post(handle_create_rule)
                .put(handle_update_rule)
                .delete(handle_delete_rule),
        )
        .route(
            "/api/symptoms",
            get(handle_list_symptoms).post(handle_add_symptom),
        )
        .route("/api/publish-rules", post(handle_publish))
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run one isolated inference session for a triage request.
async fn handle_triage(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let start = Instant::now();

    let patient = match PatientFacts::from_value(&body) {
        Ok(patient) => patient,
        Err(err) => {
            state.metrics.triage_rejected.fetch_add(1, Ordering::Relaxed);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(err.to_string(), "SCHEMA_ERROR")),
            )
                .into_response();
        }
    };

    let mut session = match InferenceSession::open(&state.shared) {
        Ok(session) => session,
        Err(err) => {
            warn!(error = %err, "failed to open inference session");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(err.to_string(), "ENGINE_UNAVAILABLE")),
            )
                .into_response();
        }
    };

    if session.engine_source() == EngineSource::Rebuilt {
        state
            .metrics
            .session_fallbacks
            .fetch_add(1, Ordering::Relaxed);
    }

    if let Err(err) = session.assert_facts(&patient, state.storage.as_ref()).await {
        warn!(session = %session.id(), error = %err, "failed to assert patient facts");
        session.close();
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(err.to_string(), "ASSERT_FAILED")),
        )
            .into_response();
    }

    if let Err(err) = session.execute() {
        state
            .metrics
            .inference_failures
            .fetch_add(1, Ordering::Relaxed);
        warn!(session = %session.id(), error = %err, "inference run failed");
        session.close();
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(err.to_string(), "INFERENCE_FAILURE")),
        )
            .into_response();
    }

    let verdict = match session.extract() {
        Ok(verdict) => verdict,
        Err(err) => {
            session.close();
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(err.to_string(), "EXTRACT_FAILED")),
            )
                .into_response();
        }
    };
    session.close();

    state.metrics.record_verdict(&verdict);
    info!(
        level = verdict.level.as_ref().map(|l| l.as_str()).unwrap_or("none"),
        transport = %verdict.transport,
        latency_ms = start.elapsed().as_millis() as u64,
        "triage completed"
    );

    (StatusCode::OK, Json(TriageResponse::from(verdict))).into_response()
}

/// Compile and publish the stored rule set into the live knowledge base.
async fn handle_publish(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.publishes_total.fetch_add(1, Ordering::Relaxed);

    let stored = match state.storage.list_rules().await {
        Ok(stored) => stored,
        Err(err) => return internal_error(err.to_string()),
    };
    let rules: Vec<_> = stored.into_iter().map(|r| r.rule).collect();

    match state.publisher.publish(&rules) {
        Ok(report) => (
            StatusCode::OK,
            Json(PublishResponse {
                status: "ok".to_string(),
                rules: report.rules,
                reloaded: report.reloaded,
            }),
        )
            .into_response(),
        Err(err) => {
            state
                .metrics
                .publish_failures
                .fetch_add(1, Ordering::Relaxed);
            match err {
                PublishError::EmptyRuleSet => (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new("no rules to publish", "NO_RULES")),
                )
                    .into_response(),
                PublishError::Validation { details } => (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::with_details(
                        "validation failed",
                        "VALIDATION_FAILED",
                        details,
                    )),
                )
                    .into_response(),
                PublishError::Io(err) => internal_error(err.to_string()),
            }
        }
    }
}

async fn handle_list_rules(State(state): State<Arc<AppState>>) -> Response {
    match state.storage.list_rules().await {
        Ok(rules) => (StatusCode::OK, Json(rules)).into_response(),
        Err(err) => internal_error(err.to_string()),
    }
}

async fn handle_create_rule(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<RuleDefinition>,
) -> Response {
    match state.storage.add_rule(&rule).await {
        Ok(id) => (StatusCode::OK, Json(AckResponse::with_id(id))).into_response(),
        Err(err) => internal_error(err.to_string()),
    }
}

async fn handle_update_rule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateRuleRequest>,
) -> Response {
    match state.storage.update_rule(req.id, &req.rule).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse::ok())).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(err.to_string(), "UNKNOWN_RULE")),
        )
            .into_response(),
    }
}

async fn handle_delete_rule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteRuleRequest>,
) -> Response {
    match state.storage.delete_rule(req.id).await {
        Ok(()) => (StatusCode::OK, Json(AckResponse::ok())).into_response(),
        Err(err) => internal_error(err.to_string()),
    }
}

async fn handle_list_symptoms(State(state): State<Arc<AppState>>) -> Response {
    match state.storage.list_symptoms().await {
        Ok(symptoms) => {
            (StatusCode::OK, Json(serde_json::json!({ "symptoms": symptoms }))).into_response()
        }
        Err(err) => internal_error(err.to_string()),
    }
}

async fn handle_add_symptom(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddSymptomRequest>,
) -> Response {
    match state
        .storage
        .add_symptom(&req.name, req.synonyms.into_vec())
        .await
    {
        Ok(()) => (StatusCode::OK, Json(AckResponse::ok())).into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(err.to_string(), "BAD_SYMPTOM")),
        )
            .into_response(),
    }
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "OK".to_string(),
        version: state.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check endpoint: ready once the shared engine serves rules.
async fn handle_ready(State(state): State<Arc<AppState>>) -> Response {
    let rules = state.shared.rule_count();
    if !state.shared.is_loaded() || rules == 0 {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("no rules loaded", "NOT_READY")),
        )
            .into_response();
    }

    (StatusCode::OK, Json(ReadyResponse { ready: true, rules })).into_response()
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        state.metrics.render(),
    )
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message, "INTERNAL_ERROR")),
    )
        .into_response()
}
