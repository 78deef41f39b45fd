//! Integration tests for the onboarding REST + WebSocket surface.
//!
//! Each test starts a stub of the REST backend and the onboarding service on
//! random ports, then drives the service over real HTTP and WebSocket
//! connections.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use consult_onboarding::api::{Backend, HttpBackend};
use consult_onboarding::app::build_router;
use consult_onboarding::config::OnboardingConfig;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const ISO: &str = "ISO_27001_INFORMATION_SECURITY_MANAGEMENT_SYSTEM";
const TOKEN: &str = "test-token";

// ── Stub backend ─────────────────────────────────────────────────────

/// What the stub backend has seen and what it will answer.
#[derive(Default)]
struct BackendLog {
    status: String,
    requests: Vec<String>,
    unauthorized: usize,
    signature: Option<String>,
}

type SharedLog = Arc<Mutex<BackendLog>>;

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data, "message": null }))
}

fn record(log: &SharedLog, headers: &HeaderMap, request: String) {
    let mut log = log.lock().unwrap();
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"));
    if !authorized {
        log.unauthorized += 1;
    }
    log.requests.push(request);
}

async fn stub_profile(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Json<Value> {
    record(&log, &headers, format!("GET profile {user_id}"));
    let status = log.lock().unwrap().status.clone();
    ok(json!({
        "id": "client-1",
        "fullName": "Ada Lovelace",
        "email": "ada@example.com",
        "onboardingStatus": status,
        "requestedServices": [ISO],
    }))
}

async fn stub_update_status(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let status = body["status"].as_str().unwrap_or_default().to_string();
    record(&log, &headers, format!("POST status {client_id} {status}"));
    log.lock().unwrap().status = status;
    ok(Value::Null)
}

async fn stub_sign_nda(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&log, &headers, format!("POST sign-nda {client_id}"));
    log.lock().unwrap().signature = body["signatureData"].as_str().map(String::from);
    ok(Value::Null)
}

async fn stub_nda_status(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Json<Value> {
    record(&log, &headers, format!("POST nda-status {client_id}"));
    let signed = log.lock().unwrap().signature.is_some();
    ok(json!({ "signed": signed }))
}

async fn stub_scoping_answers(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path((client_id, service_type)): Path<(String, String)>,
) -> Json<Value> {
    record(&log, &headers, format!("GET scoping {client_id} {service_type}"));
    ok(json!({
        "clientId": client_id,
        "serviceType": service_type,
        "answers": [{ "questionId": "headcount", "value": 42 }],
    }))
}

async fn stub_proposal(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(service_type): Path<String>,
) -> Json<Value> {
    record(&log, &headers, format!("GET proposal {service_type}"));
    ok(json!({
        "id": "p-1",
        "serviceType": service_type,
        "title": "ISO 27001 readiness",
        "content": "Gap analysis, ISMS build, internal audit.",
    }))
}

async fn stub_form_for_service(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(service_type): Path<String>,
) -> Json<Value> {
    record(&log, &headers, format!("GET form {service_type}"));
    ok(json!({
        "id": "form-1",
        "serviceType": service_type,
        "title": "ISO 27001 scoping",
        "questions": [
            { "id": "headcount", "prompt": "How many staff?", "kind": { "type": "number" }, "required": true },
            { "id": "cloud", "prompt": "Cloud hosted?", "kind": { "type": "yes_no" } },
        ],
    }))
}

async fn stub_save_form(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Json(mut form): Json<Value>,
) -> Json<Value> {
    record(&log, &headers, "POST form".to_string());
    form["id"] = json!("form-2");
    ok(form)
}

async fn stub_form(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    record(&log, &headers, format!("GET form-by-id {id}"));
    ok(json!({
        "id": id,
        "serviceType": "SOC_2",
        "title": "SOC 2 scoping",
        "questions": [
            { "id": "q1", "prompt": "Auditor?", "kind": { "type": "text" } },
            { "id": "q2", "prompt": "Headcount?", "kind": { "type": "number" } },
        ],
    }))
}

async fn stub_update_form(
    State(log): State<SharedLog>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(form): Json<Value>,
) -> Json<Value> {
    record(&log, &headers, format!("PUT form {id}"));
    ok(form)
}

fn stub_backend(log: SharedLog) -> Router {
    Router::new()
        .route("/clients/user/{user_id}", get(stub_profile))
        .route("/clients/{id}/status", post(stub_update_status))
        .route("/clients/{id}/sign-nda", post(stub_sign_nda))
        .route("/clients/{id}/nda-status", post(stub_nda_status))
        .route(
            "/scoping-forms/client/{client_id}/service/{service_type}",
            get(stub_scoping_answers),
        )
        .route("/proposals/getProposal/{service_type}", get(stub_proposal))
        .route("/scoping-forms/service/{service_type}", get(stub_form_for_service))
        .route("/scoping-forms", post(stub_save_form))
        .route("/scoping-forms/{id}", get(stub_form).put(stub_update_form))
        .with_state(log)
}

async fn serve(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    port
}

/// Start the stub backend and the onboarding service. Returns the service
/// port and the backend's log.
async fn start_server(status: &str) -> (u16, SharedLog) {
    let log: SharedLog = Arc::new(Mutex::new(BackendLog {
        status: status.to_string(),
        ..Default::default()
    }));
    let backend_port = serve(stub_backend(Arc::clone(&log))).await;

    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(&format!("http://127.0.0.1:{backend_port}")).unwrap());
    let config = OnboardingConfig {
        celebration_delay: Duration::from_millis(10),
        ..Default::default()
    };
    let port = serve(build_router(backend, config, "*")).await;

    // Give the servers a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, log)
}

// ── Helpers ──────────────────────────────────────────────────────────

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn authed(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    request
        .header("x-user-id", "user-1")
        .header("x-user-email", "ada@example.com")
        .bearer_auth(TOKEN)
}

async fn post_json(port: u16, path: &str, body: Value) -> (u16, Value) {
    let resp = authed(client().post(format!("http://127.0.0.1:{port}{path}")))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap();
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}

async fn patch_json(port: u16, path: &str, body: Value) -> (u16, Value) {
    let resp = authed(client().patch(format!("http://127.0.0.1:{port}{path}")))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

async fn get_json(port: u16, path: &str) -> (u16, Value) {
    let resp = authed(client().get(format!("http://127.0.0.1:{port}{path}")))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

/// Poll `GET /api/onboarding` until `pred` holds.
async fn wait_for_view(port: u16, pred: impl Fn(&Value) -> bool) -> Value {
    loop {
        let (_, view) = get_json(port, "/api/onboarding").await;
        if pred(&view) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

// ── REST Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint_responds() {
    timeout(TEST_TIMEOUT, async {
        let (port, _log) = start_server("NOT_STARTED").await;
        let json: Value = client()
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    timeout(TEST_TIMEOUT, async {
        let (port, log) = start_server("TERMS_PENDING").await;
        let resp = client()
            .get(format!("http://127.0.0.1:{port}/api/onboarding"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 401);
        assert!(log.lock().unwrap().requests.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn view_reflects_backend_status() {
    timeout(TEST_TIMEOUT, async {
        let (port, log) = start_server("TERMS_PENDING").await;

        let (status, view) = get_json(port, "/api/onboarding").await;
        assert_eq!(status, 200);
        assert_eq!(view["step"], 2);
        assert_eq!(view["stepName"], "terms_acceptance");
        assert_eq!(view["panel"]["panel"], "terms_acceptance");
        assert_eq!(view["canGoBack"], true);
        assert_eq!(view["statusRecognized"], true);

        let log = log.lock().unwrap();
        assert_eq!(log.requests, vec!["GET profile user-1"]);
        assert_eq!(log.unauthorized, 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn full_onboarding_flow_over_rest() {
    timeout(TEST_TIMEOUT, async {
        let (port, log) = start_server("SCOPING_REVIEW").await;

        let view = wait_for_view(port, |v| v["panel"]["answers"].is_object()).await;
        assert_eq!(view["stepName"], "scoping_review");
        assert_eq!(view["canGoBack"], false);
        assert_eq!(view["panel"]["serviceType"], ISO);

        let (status, outcome) = post_json(port, "/api/onboarding/scoping/continue", json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(outcome["view"]["stepName"], "terms_acceptance");

        let (status, outcome) =
            post_json(port, "/api/onboarding/terms", json!({ "accepted": true })).await;
        assert_eq!(status, 200);
        assert_eq!(outcome["view"]["stepName"], "nda_signing");
        assert_eq!(outcome["view"]["panel"]["fullName"], "Ada Lovelace");

        let (status, outcome) = post_json(
            port,
            "/api/onboarding/nda",
            json!({ "signatureData": "data:image/png;base64,AAAA" }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(outcome["view"]["stepName"], "proposal_review");
        assert_eq!(outcome["view"]["status"], "COMPLETED");

        let view = wait_for_view(port, |v| {
            v["panel"]["proposal"].is_object() && v["celebrate"] == true
        })
        .await;
        assert_eq!(view["panel"]["proposal"]["title"], "ISO 27001 readiness");

        let (_, nda) = get_json(port, "/api/onboarding/nda").await;
        assert_eq!(nda["signed"], true);

        let (status, outcome) =
            post_json(port, "/api/onboarding/proposal/accept", json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(outcome["view"]["panel"]["panel"], "completed");

        let (status, outcome) = post_json(port, "/api/onboarding/dashboard", json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(outcome["redirect"], "/dashboard");

        let log = log.lock().unwrap();
        assert_eq!(log.status, "COMPLETED");
        assert_eq!(log.signature.as_deref(), Some("data:image/png;base64,AAAA"));
        assert_eq!(log.unauthorized, 0);
        let scoping_fetches = log
            .requests
            .iter()
            .filter(|r| r.starts_with("GET scoping"))
            .count();
        assert_eq!(scoping_fetches, 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn declining_terms_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (port, log) = start_server("TERMS_PENDING").await;

        let (status, body) =
            post_json(port, "/api/onboarding/terms", json!({ "accepted": false })).await;
        assert_eq!(status, 422);
        assert!(body["error"].as_str().is_some());

        let (_, view) = get_json(port, "/api/onboarding").await;
        assert_eq!(view["stepName"], "terms_acceptance");
        assert!(view["inlineError"].is_string());
        assert_eq!(log.lock().unwrap().status, "TERMS_PENDING");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn out_of_order_action_conflicts() {
    timeout(TEST_TIMEOUT, async {
        let (port, _log) = start_server("TERMS_PENDING").await;
        let (status, _) = post_json(port, "/api/onboarding/proposal/accept", json!({})).await;
        assert_eq!(status, 409);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn logout_redirects_from_discovery() {
    timeout(TEST_TIMEOUT, async {
        let (port, _log) = start_server("DISCOVERY_SCHEDULED").await;

        let (_, view) = get_json(port, "/api/onboarding").await;
        assert_eq!(view["panel"]["panel"], "discovery_pending");
        assert_eq!(view["panel"]["fullName"], "Ada Lovelace");

        let (status, outcome) = post_json(port, "/api/onboarding/logout", json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(outcome["redirect"], "/login");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn scoping_answers_are_validated_against_form() {
    timeout(TEST_TIMEOUT, async {
        let (port, _log) = start_server("NOT_STARTED").await;
        let path = format!("/api/scoping-forms/service/{ISO}/validate");

        let (status, body) = post_json(
            port,
            &path,
            json!({
                "clientId": "client-1",
                "serviceType": ISO,
                "answers": [{ "questionId": "cloud", "value": "maybe" }],
            }),
        )
        .await;
        assert_eq!(status, 422);
        let issues = body["issues"].as_array().unwrap();
        assert!(issues.iter().any(|i| i["issue"] == "missing_required"));
        assert!(issues.iter().any(|i| i["issue"] == "wrong_type"));

        let (status, _) = post_json(
            port,
            &path,
            json!({
                "clientId": "client-1",
                "serviceType": ISO,
                "answers": [{ "questionId": "headcount", "value": 12 }],
            }),
        )
        .await;
        assert_eq!(status, 204);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_form_is_not_saved() {
    timeout(TEST_TIMEOUT, async {
        let (port, log) = start_server("NOT_STARTED").await;

        let (status, _) = post_json(
            port,
            "/api/scoping-forms",
            json!({ "serviceType": "not a service", "title": "Bad", "questions": [] }),
        )
        .await;
        assert_eq!(status, 422);
        assert!(log.lock().unwrap().requests.is_empty());

        let (status, saved) = post_json(
            port,
            "/api/scoping-forms",
            json!({
                "serviceType": "SOC_2",
                "title": "SOC 2 scoping",
                "questions": [{ "id": "q1", "prompt": "Auditor?", "kind": { "type": "text" } }],
            }),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(saved["id"], "form-2");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn answers_for_another_service_are_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (port, _log) = start_server("NOT_STARTED").await;
        let (status, body) = post_json(
            port,
            &format!("/api/scoping-forms/service/{ISO}/validate"),
            json!({
                "clientId": "client-1",
                "serviceType": "SOC_2",
                "answers": [{ "questionId": "headcount", "value": 12 }],
            }),
        )
        .await;
        assert_eq!(status, 422);
        assert!(body["error"].as_str().unwrap().contains("SOC_2"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn question_edits_are_saved() {
    timeout(TEST_TIMEOUT, async {
        let (port, log) = start_server("NOT_STARTED").await;

        let (status, form) = patch_json(
            port,
            "/api/scoping-forms/form-9/questions",
            json!([
                { "op": "remove", "questionId": "q1" },
                { "op": "add", "question": { "id": "q3", "prompt": "Cloud?", "kind": { "type": "yes_no" } } },
                { "op": "move", "from": 1, "to": 0 },
            ]),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(form["id"], "form-9");
        let ids: Vec<&str> = form["questions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["q3", "q2"]);
        assert_eq!(
            log.lock().unwrap().requests,
            vec!["GET form-by-id form-9", "PUT form form-9"]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_question_edit_saves_nothing() {
    timeout(TEST_TIMEOUT, async {
        let (port, log) = start_server("NOT_STARTED").await;

        let (status, _) = patch_json(
            port,
            "/api/scoping-forms/form-9/questions",
            json!([{ "op": "remove", "questionId": "nope" }]),
        )
        .await;
        assert_eq!(status, 422);
        assert!(
            !log.lock()
                .unwrap()
                .requests
                .iter()
                .any(|r| r.starts_with("PUT"))
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dismissing_without_session_does_not_create_one() {
    timeout(TEST_TIMEOUT, async {
        let (port, log) = start_server("TERMS_PENDING").await;

        let resp = authed(client().delete(format!(
            "http://127.0.0.1:{port}/api/onboarding/notices/00000000-0000-0000-0000-000000000000"
        )))
        .send()
        .await
        .unwrap();
        assert_eq!(resp.status().as_u16(), 409);
        assert!(log.lock().unwrap().requests.is_empty());
    })
    .await
    .expect("test timed out");
}

// ── WebSocket Tests ──────────────────────────────────────────────────

#[tokio::test]
async fn ws_pushes_view_updates() {
    timeout(TEST_TIMEOUT, async {
        let (port, _log) = start_server("TERMS_PENDING").await;

        let mut request = format!("ws://127.0.0.1:{port}/ws/onboarding")
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("x-user-id", "user-1".parse().unwrap());
        request
            .headers_mut()
            .insert("authorization", format!("Bearer {TOKEN}").parse().unwrap());

        let (mut ws, _) = connect_async(request).await.expect("WS connect failed");

        // First message is the current view.
        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "view_sync");
        assert_eq!(json["view"]["stepName"], "terms_acceptance");

        // An action over REST is pushed to the socket.
        let (status, _) =
            post_json(port, "/api/onboarding/terms", json!({ "accepted": true })).await;
        assert_eq!(status, 200);

        loop {
            let msg = ws.next().await.unwrap().unwrap();
            let json = parse_ws_json(&msg);
            assert_eq!(json["type"], "view_sync");
            if json["view"]["stepName"] == "nda_signing" {
                break;
            }
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_without_identity_is_refused() {
    timeout(TEST_TIMEOUT, async {
        let (port, _log) = start_server("TERMS_PENDING").await;
        let result = connect_async(format!("ws://127.0.0.1:{port}/ws/onboarding")).await;
        assert!(result.is_err());
    })
    .await
    .expect("test timed out");
}
