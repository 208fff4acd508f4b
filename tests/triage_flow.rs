//! End-to-end tests of the authoring → publish → triage flow over the
//! HTTP surface.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use triagr::api::routes::{create_router, AppState};
use triagr::engine::DEFAULT_FIRING_LIMIT;
use triagr::kb::{KbPaths, Publisher, SharedEngine};
use triagr::observability::MetricsRegistry;
use triagr::storage::MemoryStorage;

fn setup() -> (tempfile::TempDir, Arc<AppState>) {
    let tmp = tempfile::tempdir().unwrap();
    let paths = KbPaths::new(tmp.path());
    paths.ensure_provisioned().unwrap();

    let shared = Arc::new(SharedEngine::new(paths, DEFAULT_FIRING_LIMIT));
    let publisher = Publisher::new(shared.clone());

    let state = Arc::new(AppState {
        storage: Arc::new(MemoryStorage::with_seed_catalog()),
        shared,
        publisher,
        metrics: MetricsRegistry::new(),
        start_time: Instant::now(),
        version: "test".to_string(),
    });
    (tmp, state)
}

async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let response = create_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// The rule from the triage protocol's canonical example: elderly patient
/// with chest pain.
fn cardiac_rule() -> Value {
    json!({
        "name": "Cardiac alert",
        "salience": 100,
        "conditions": [
            {"field": "age", "operator": ">", "value": 50},
            {"field": "symptom", "operator": "contains", "value": "chest-pain"}
        ],
        "actions": [
            {"set_triage_level": "RED"},
            {"set_transport": "ambulance"},
            {"set_rationale": "urgent"}
        ]
    })
}

async fn author_and_publish(state: &Arc<AppState>, rules: &[Value]) {
    for rule in rules {
        let (status, _) = call(state, "POST", "/api/rules", rule.clone()).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = call(state, "POST", "/api/publish-rules", json!({})).await;
    assert_eq!(status, StatusCode::OK, "publish failed: {body}");
}

#[tokio::test]
async fn authored_rule_matches_patient() {
    let (_tmp, state) = setup();
    author_and_publish(&state, &[cardiac_rule()]).await;

    let (status, body) = call(
        &state,
        "POST",
        "/triage",
        json!({"age": 70, "symptoms": ["chest pain"]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["triage_level"], "RED");
    assert_eq!(body["transport"], "ambulance");
    assert_eq!(body["rationale"], "urgent");
}

#[tokio::test]
async fn unmatched_patient_gets_default_verdict() {
    let (_tmp, state) = setup();
    author_and_publish(&state, &[cardiac_rule()]).await;

    let (status, body) = call(&state, "POST", "/triage", json!({"age": 25})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["triage_level"], "GREEN");
    assert_eq!(body["score"], 5);
    assert_eq!(body["transport"], "none");
    assert_eq!(
        body["rationale"],
        "Default non-urgent triage. No high-priority rules matched."
    );
}

#[tokio::test]
async fn registered_synonym_resolves_before_matching() {
    let (_tmp, state) = setup();
    author_and_publish(&state, &[cardiac_rule()]).await;

    // "ticker trouble" is not in the stock catalog
    let (status, _) = call(
        &state,
        "POST",
        "/api/symptoms",
        json!({"name": "chest-pain", "synonyms": "ticker trouble"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(
        &state,
        "POST",
        "/triage",
        json!({"age": 80, "symptoms": "ticker trouble"}),
    )
    .await;

    assert_eq!(body["triage_level"], "RED");
}

#[tokio::test]
async fn failed_publish_leaves_serving_behavior_unchanged() {
    let (tmp, state) = setup();
    author_and_publish(&state, &[cardiac_rule()]).await;

    let live_before =
        std::fs::read_to_string(tmp.path().join("rules.clp")).unwrap();

    // Corrupt the templates file so the next publish cannot validate
    std::fs::write(tmp.path().join("templates.clp"), "(deftemplate broken").unwrap();

    let (status, body) = call(&state, "POST", "/api/publish-rules", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["details"].as_str().unwrap().contains("line"));

    // Live source is bit-for-bit unchanged and triage still serves the
    // previously published rules
    let live_after = std::fs::read_to_string(tmp.path().join("rules.clp")).unwrap();
    assert_eq!(live_before, live_after);

    let (_, verdict) = call(
        &state,
        "POST",
        "/triage",
        json!({"age": 70, "symptoms": ["chest pain"]}),
    )
    .await;
    assert_eq!(verdict["triage_level"], "RED");
}

#[tokio::test]
async fn unsupported_conditions_compile_to_always_firing_rule() {
    let (_tmp, state) = setup();

    author_and_publish(
        &state,
        &[json!({
            "name": "Vitals rule",
            "salience": 50,
            "conditions": [
                {"field": "blood_pressure", "operator": ">", "value": 140}
            ],
            "actions": [
                {"set_triage_level": "YELLOW"},
                {"set_rationale": "check vitals"}
            ]
        })],
    )
    .await;

    // The condition was dropped, so the rule fires for any patient
    let (status, body) = call(&state, "POST", "/triage", json!({"age": 30})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["triage_level"], "YELLOW");
    assert_eq!(body["rationale"], "check vitals");
}

#[tokio::test]
async fn concurrent_requests_are_isolated() {
    let (_tmp, state) = setup();
    author_and_publish(&state, &[cardiac_rule()]).await;

    let red = call(
        &state,
        "POST",
        "/triage",
        json!({"age": 80, "symptoms": ["chest pain"]}),
    );
    let green = call(&state, "POST", "/triage", json!({"age": 20}));
    let ((_, red_body), (_, green_body)) = tokio::join!(red, green);

    assert_eq!(red_body["triage_level"], "RED");
    assert_eq!(green_body["triage_level"], "GREEN");
}

#[tokio::test]
async fn republish_changes_serving_behavior() {
    let (_tmp, state) = setup();
    author_and_publish(&state, &[cardiac_rule()]).await;

    let (_, body) = call(
        &state,
        "POST",
        "/triage",
        json!({"age": 70, "symptoms": ["chest pain"]}),
    )
    .await;
    assert_eq!(body["triage_level"], "RED");

    // Demote the cardiac rule and republish
    let (_, rules) = call(&state, "GET", "/api/rules", json!({})).await;
    let id = rules[0]["id"].as_i64().unwrap();
    let demoted = json!({
        "id": id,
        "rule": {
            "name": "Cardiac alert",
            "salience": 100,
            "conditions": [
                {"field": "age", "operator": ">", "value": 90},
                {"field": "symptom", "operator": "contains", "value": "chest-pain"}
            ],
            "actions": [{"set_triage_level": "YELLOW"}]
        }
    });
    let (status, _) = call(&state, "PUT", "/api/rules", demoted).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&state, "POST", "/api/publish-rules", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // Same patient, new verdict: the age guard no longer matches
    let (_, body) = call(
        &state,
        "POST",
        "/triage",
        json!({"age": 70, "symptoms": ["chest pain"]}),
    )
    .await;
    assert_eq!(body["triage_level"], "GREEN");
}
