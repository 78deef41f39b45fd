//! Form builder endpoints. Forms are validated here before they reach the
//! backend.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use tracing::info;

use super::form::{QuestionEdit, ScopingAnswers, ScopingForm};
use crate::api::Backend;
use crate::error::Error;
use crate::session::SessionContext;

/// Shared state for scoping form routes.
#[derive(Clone)]
pub struct ScopingRouteState {
    pub backend: Arc<dyn Backend>,
}

pub fn scoping_routes(state: ScopingRouteState) -> Router {
    Router::new()
        .route("/api/scoping-forms", get(list_forms).post(create_form))
        .route("/api/scoping-forms/service/{service_type}", get(form_for_service))
        .route("/api/scoping-forms/{id}", put(update_form).delete(delete_form))
        .route("/api/scoping-forms/{id}/questions", patch(edit_questions))
        .route("/api/scoping-forms/service/{service_type}/validate", post(validate_answers))
        .with_state(state)
}

fn session(headers: &HeaderMap) -> Result<SessionContext, Error> {
    SessionContext::from_headers(headers).ok_or(Error::Unauthorized)
}

async fn list_forms(
    State(state): State<ScopingRouteState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ScopingForm>>, Error> {
    let session = session(&headers)?;
    Ok(Json(state.backend.list_scoping_forms(&session).await?))
}

async fn form_for_service(
    State(state): State<ScopingRouteState>,
    headers: HeaderMap,
    Path(service_type): Path<String>,
) -> Result<Json<ScopingForm>, Error> {
    let session = session(&headers)?;
    Ok(Json(
        state
            .backend
            .scoping_form_for_service(&session, &service_type)
            .await?,
    ))
}

/// POST /api/scoping-forms
///
/// Creates a new form (any `id` in the body is ignored).
async fn create_form(
    State(state): State<ScopingRouteState>,
    headers: HeaderMap,
    Json(mut form): Json<ScopingForm>,
) -> Result<(StatusCode, Json<ScopingForm>), Error> {
    let session = session(&headers)?;
    form.id = None;
    form.validate()?;
    let saved = state.backend.save_scoping_form(&session, &form).await?;
    info!(service_type = %saved.service_type, questions = saved.questions.len(), "Scoping form created");
    Ok((StatusCode::CREATED, Json(saved)))
}

/// PUT /api/scoping-forms/{id}
async fn update_form(
    State(state): State<ScopingRouteState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut form): Json<ScopingForm>,
) -> Result<Json<ScopingForm>, Error> {
    let session = session(&headers)?;
    form.id = Some(id);
    form.validate()?;
    let saved = state.backend.save_scoping_form(&session, &form).await?;
    info!(form_id = ?saved.id, "Scoping form updated");
    Ok(Json(saved))
}

/// PATCH /api/scoping-forms/{id}/questions
///
/// Applies a list of question edits (`add`, `update`, `remove`, `move`) to the
/// stored form. Nothing is saved unless every edit applies and the result is
/// a valid form.
async fn edit_questions(
    State(state): State<ScopingRouteState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(edits): Json<Vec<QuestionEdit>>,
) -> Result<Json<ScopingForm>, Error> {
    let session = session(&headers)?;
    let mut form = state.backend.scoping_form(&session, &id).await?;
    let edit_count = edits.len();
    form.apply_edits(edits)?;
    form.id = Some(id);
    form.validate()?;
    let saved = state.backend.save_scoping_form(&session, &form).await?;
    info!(form_id = ?saved.id, edits = edit_count, "Scoping form questions edited");
    Ok(Json(saved))
}

async fn delete_form(
    State(state): State<ScopingRouteState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    let session = session(&headers)?;
    state.backend.delete_scoping_form(&session, &id).await?;
    info!(form_id = %id, "Scoping form deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/scoping-forms/service/{service_type}/validate
///
/// Checks a set of answers against the service's current form.
async fn validate_answers(
    State(state): State<ScopingRouteState>,
    headers: HeaderMap,
    Path(service_type): Path<String>,
    Json(answers): Json<ScopingAnswers>,
) -> Result<StatusCode, Error> {
    let session = session(&headers)?;
    let form = state
        .backend
        .scoping_form_for_service(&session, &service_type)
        .await?;
    form.validate_answers(&answers)?;
    Ok(StatusCode::NO_CONTENT)
}
