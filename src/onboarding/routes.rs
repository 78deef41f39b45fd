//! REST + WebSocket endpoints for the onboarding wizard.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::controller::{ActionOutcome, OnboardingController};
use super::registry::SessionRegistry;
use super::view::PanelView;
use crate::api::NdaStatus;
use crate::error::{Error, TransitionError};
use crate::session::SessionContext;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub registry: Arc<SessionRegistry>,
}

/// Messages pushed over `/ws/onboarding`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    ViewSync { view: PanelView },
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct TermsBody {
    #[serde(default)]
    accepted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NdaBody {
    #[serde(default)]
    signature_data: String,
}

/// Build the onboarding routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding", get(get_view))
        .route("/api/onboarding/reload", post(reload))
        .route("/api/onboarding/back", post(go_back))
        .route("/api/onboarding/forward", post(go_forward))
        .route("/api/onboarding/scoping/continue", post(continue_from_scoping))
        .route("/api/onboarding/terms", post(accept_terms))
        .route("/api/onboarding/nda", get(nda_status).post(sign_nda))
        .route("/api/onboarding/proposal/accept", post(accept_proposal))
        .route("/api/onboarding/dashboard", post(continue_to_dashboard))
        .route("/api/onboarding/logout", post(logout))
        .route("/api/onboarding/notices/{id}", delete(dismiss_notice))
        .route("/ws/onboarding", get(ws_handler))
        .with_state(state)
}

/// Resolve the caller's session and controller, loading the profile if this
/// is the first request for the user.
async fn loaded_controller(
    state: &OnboardingRouteState,
    headers: &HeaderMap,
) -> Result<(SessionContext, Arc<OnboardingController>), Error> {
    let session = SessionContext::from_headers(headers).ok_or(Error::Unauthorized)?;
    let controller = state.registry.controller(&session.user_id).await;
    controller.ensure_loaded(&session).await?;
    Ok((session, controller))
}

/// GET /api/onboarding
async fn get_view(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<PanelView>, Error> {
    let (_, controller) = loaded_controller(&state, &headers).await?;
    Ok(Json(controller.view().await))
}

/// POST /api/onboarding/reload
///
/// Re-fetches the profile and re-derives the step from its status.
async fn reload(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<ActionOutcome>, Error> {
    let session = SessionContext::from_headers(&headers).ok_or(Error::Unauthorized)?;
    let controller = state.registry.controller(&session.user_id).await;
    Ok(Json(controller.load(&session).await?))
}

async fn go_back(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<ActionOutcome>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    Ok(Json(controller.go_back(&session).await?))
}

async fn go_forward(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<ActionOutcome>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    Ok(Json(controller.go_forward(&session).await?))
}

async fn continue_from_scoping(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<ActionOutcome>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    Ok(Json(controller.continue_from_scoping(&session).await?))
}

/// POST /api/onboarding/terms `{"accepted": true}`
async fn accept_terms(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Json(body): Json<TermsBody>,
) -> Result<Json<ActionOutcome>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    Ok(Json(controller.accept_terms(&session, body.accepted).await?))
}

/// POST /api/onboarding/nda `{"signatureData": "data:image/png;base64,..."}`
async fn sign_nda(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Json(body): Json<NdaBody>,
) -> Result<Json<ActionOutcome>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    Ok(Json(controller.sign_nda(&session, &body.signature_data).await?))
}

/// GET /api/onboarding/nda
async fn nda_status(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<NdaStatus>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    Ok(Json(controller.nda_status(&session).await?))
}

async fn accept_proposal(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<ActionOutcome>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    Ok(Json(controller.accept_proposal(&session).await?))
}

async fn continue_to_dashboard(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<ActionOutcome>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    let outcome = controller.continue_to_dashboard(&session).await?;
    // The shell reloads from scratch; this session's wizard is done.
    state.registry.remove(&session.user_id).await;
    Ok(Json(outcome))
}

async fn logout(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Result<Json<ActionOutcome>, Error> {
    let (session, controller) = loaded_controller(&state, &headers).await?;
    let outcome = controller.logout(&session).await?;
    state.registry.remove(&session.user_id).await;
    info!(user_id = %session.user_id, "User logged out of onboarding");
    Ok(Json(outcome))
}

/// DELETE /api/onboarding/notices/{id}
async fn dismiss_notice(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PanelView>, Error> {
    let session = SessionContext::from_headers(&headers).ok_or(Error::Unauthorized)?;
    let controller = state
        .registry
        .existing(&session.user_id)
        .await
        .ok_or(TransitionError::ProfileNotLoaded)?;
    Ok(Json(controller.dismiss_notice(id).await))
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> Response {
    let Some(session) = SessionContext::from_headers(&headers) else {
        return Error::Unauthorized.into_response();
    };
    let registry = Arc::clone(&state.registry);
    let controller = registry.controller(&session.user_id).await;
    info!(user_id = %session.user_id, "Onboarding WebSocket client connecting");
    ws.on_upgrade(move |socket| handle_socket(socket, session, controller, registry))
}

async fn handle_socket(
    mut socket: WebSocket,
    session: SessionContext,
    controller: Arc<OnboardingController>,
    registry: Arc<SessionRegistry>,
) {
    // Subscribe before loading so no update is missed.
    let mut rx = controller.subscribe();

    let initial = match controller.ensure_loaded(&session).await {
        Ok(view) => WsMessage::ViewSync { view },
        Err(e) => WsMessage::Error {
            message: e.to_string(),
        },
    };
    if send_json(&mut socket, &initial).await.is_err() {
        warn!("Failed to send initial view, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(view) => {
                        if send_json(&mut socket, &WsMessage::ViewSync { view }).await.is_err() {
                            debug!("Onboarding WS client disconnected during send");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Onboarding WS client lagged behind broadcast");
                        let view = controller.view().await;
                        if send_json(&mut socket, &WsMessage::ViewSync { view }).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Onboarding broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Onboarding WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Onboarding WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    // Idle time counts from the last disconnect.
    drop(rx);
    registry.touch(&session.user_id).await;
}

async fn send_json(socket: &mut WebSocket, msg: &WsMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize WS message");
            Ok(())
        }
    }
}
