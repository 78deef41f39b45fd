//! `Backend` trait: the single async seam to the authoritative REST service.

use async_trait::async_trait;

use super::types::{ClientProfile, NdaStatus, Proposal};
use crate::error::ApiError;
use crate::onboarding::OnboardingStatus;
use crate::scoping::{ScopingAnswers, ScopingForm};
use crate::session::SessionContext;

/// Every call the onboarding flow and the form builder make to the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    // ── Profile & status ────────────────────────────────────────────

    /// Fetch the client profile owned by the signed-in user.
    async fn fetch_profile(&self, session: &SessionContext) -> Result<ClientProfile, ApiError>;

    /// `POST /clients/{id}/status`.
    async fn update_status(
        &self,
        session: &SessionContext,
        client_id: &str,
        status: OnboardingStatus,
    ) -> Result<(), ApiError>;

    /// `POST /clients/{id}/sign-nda` with the captured signature image.
    async fn sign_nda(
        &self,
        session: &SessionContext,
        client_id: &str,
        signature_data: &str,
    ) -> Result<(), ApiError>;

    /// `POST /clients/{id}/nda-status` (read-only despite the verb).
    async fn nda_status(
        &self,
        session: &SessionContext,
        client_id: &str,
    ) -> Result<NdaStatus, ApiError>;

    // ── Supplementary step data ─────────────────────────────────────

    async fn scoping_answers(
        &self,
        session: &SessionContext,
        client_id: &str,
        service_type: &str,
    ) -> Result<ScopingAnswers, ApiError>;

    async fn proposal(
        &self,
        session: &SessionContext,
        service_type: &str,
    ) -> Result<Proposal, ApiError>;

    // ── Scoping form builder ────────────────────────────────────────

    async fn list_scoping_forms(&self, session: &SessionContext)
    -> Result<Vec<ScopingForm>, ApiError>;

    async fn scoping_form(
        &self,
        session: &SessionContext,
        form_id: &str,
    ) -> Result<ScopingForm, ApiError>;

    async fn scoping_form_for_service(
        &self,
        session: &SessionContext,
        service_type: &str,
    ) -> Result<ScopingForm, ApiError>;

    /// Create (no id) or update (with id) a form. Returns the stored form.
    async fn save_scoping_form(
        &self,
        session: &SessionContext,
        form: &ScopingForm,
    ) -> Result<ScopingForm, ApiError>;

    async fn delete_scoping_form(
        &self,
        session: &SessionContext,
        form_id: &str,
    ) -> Result<(), ApiError>;
}
