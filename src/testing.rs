//! In-memory `Backend` for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::{Backend, ClientProfile, NdaStatus, Proposal};
use crate::error::ApiError;
use crate::onboarding::OnboardingStatus;
use crate::scoping::{Answer, ScopingAnswers, ScopingForm};
use crate::session::SessionContext;

pub const ISO: &str = "ISO_27001_INFORMATION_SECURITY_MANAGEMENT_SYSTEM";

pub fn session() -> SessionContext {
    SessionContext::new("user-1", "ada@example.com", "token")
}

pub fn profile(status: &str, services: &[&str]) -> ClientProfile {
    ClientProfile {
        id: "client-1".to_string(),
        full_name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        onboarding_status: status.to_string(),
        requested_services: services.iter().map(|s| s.to_string()).collect(),
    }
}

/// Records every call by name; calls whose name is in `failing` return an error.
pub struct FakeBackend {
    pub profile: Mutex<ClientProfile>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    hang_fetches: AtomicBool,
    slow_profile: AtomicBool,
    hold_status_updates: AtomicBool,
    status_update_started: Notify,
    status_update_release: Notify,
}

impl FakeBackend {
    pub fn new(profile: ClientProfile) -> Self {
        Self {
            profile: Mutex::new(profile),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            hang_fetches: AtomicBool::new(false),
            slow_profile: AtomicBool::new(false),
            hold_status_updates: AtomicBool::new(false),
            status_update_started: Notify::new(),
            status_update_release: Notify::new(),
        }
    }

    pub fn fail(&self, call: &'static str) {
        self.failing.lock().unwrap().insert(call);
    }

    /// Make scoping/proposal fetches never complete.
    pub fn hang_fetches(&self) {
        self.hang_fetches.store(true, Ordering::SeqCst);
    }

    /// Make profile fetches take a little while.
    pub fn slow_profile(&self) {
        self.slow_profile.store(true, Ordering::SeqCst);
    }

    /// Park every status update until [`release_status_update`](Self::release_status_update).
    pub fn hold_status_updates(&self) {
        self.hold_status_updates.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held status update has reached the backend.
    pub async fn status_update_started(&self) {
        self.status_update_started.notified().await;
    }

    pub fn release_status_update(&self) {
        self.status_update_release.notify_one();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &'static str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.failing.lock().unwrap().contains(call) {
            return Err(ApiError::Rejected {
                endpoint: call.to_string(),
                message: format!("{call} failed"),
            });
        }
        Ok(())
    }

    async fn maybe_hang(&self) {
        if self.hang_fetches.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_profile(&self, _session: &SessionContext) -> Result<ClientProfile, ApiError> {
        self.record("fetch_profile")?;
        if self.slow_profile.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Ok(self.profile.lock().unwrap().clone())
    }

    async fn update_status(
        &self,
        _session: &SessionContext,
        _client_id: &str,
        status: OnboardingStatus,
    ) -> Result<(), ApiError> {
        self.record(match status {
            OnboardingStatus::NdaPending => "update_status:NDA_PENDING",
            OnboardingStatus::Completed => "update_status:COMPLETED",
            _ => "update_status",
        })?;
        if self.hold_status_updates.load(Ordering::SeqCst) {
            self.status_update_started.notify_one();
            self.status_update_release.notified().await;
        }
        self.profile.lock().unwrap().onboarding_status = status.to_string();
        Ok(())
    }

    async fn sign_nda(
        &self,
        _session: &SessionContext,
        _client_id: &str,
        _signature_data: &str,
    ) -> Result<(), ApiError> {
        self.record("sign_nda")
    }

    async fn nda_status(
        &self,
        _session: &SessionContext,
        _client_id: &str,
    ) -> Result<NdaStatus, ApiError> {
        self.record("nda_status")?;
        Ok(NdaStatus {
            signed: true,
            signed_at: None,
        })
    }

    async fn scoping_answers(
        &self,
        _session: &SessionContext,
        client_id: &str,
        service_type: &str,
    ) -> Result<ScopingAnswers, ApiError> {
        self.record("scoping_answers")?;
        self.maybe_hang().await;
        Ok(ScopingAnswers {
            id: None,
            client_id: client_id.to_string(),
            service_type: service_type.to_string(),
            answers: vec![Answer {
                question_id: "headcount".to_string(),
                value: serde_json::json!(42),
            }],
            submitted_at: None,
        })
    }

    async fn proposal(
        &self,
        _session: &SessionContext,
        service_type: &str,
    ) -> Result<Proposal, ApiError> {
        self.record("proposal")?;
        self.maybe_hang().await;
        Ok(Proposal {
            id: Some("p-1".to_string()),
            service_type: service_type.to_string(),
            title: "ISO 27001 readiness".to_string(),
            content: "Gap analysis, ISMS build, internal audit.".to_string(),
            details: Default::default(),
        })
    }

    async fn list_scoping_forms(
        &self,
        _session: &SessionContext,
    ) -> Result<Vec<ScopingForm>, ApiError> {
        self.record("list_scoping_forms")?;
        Ok(Vec::new())
    }

    async fn scoping_form(
        &self,
        _session: &SessionContext,
        form_id: &str,
    ) -> Result<ScopingForm, ApiError> {
        self.record("scoping_form")?;
        let mut form = ScopingForm::new(ISO, "Form");
        form.id = Some(form_id.to_string());
        Ok(form)
    }

    async fn scoping_form_for_service(
        &self,
        _session: &SessionContext,
        service_type: &str,
    ) -> Result<ScopingForm, ApiError> {
        self.record("scoping_form_for_service")?;
        Ok(ScopingForm::new(service_type, "Form"))
    }

    async fn save_scoping_form(
        &self,
        _session: &SessionContext,
        form: &ScopingForm,
    ) -> Result<ScopingForm, ApiError> {
        self.record("save_scoping_form")?;
        Ok(form.clone())
    }

    async fn delete_scoping_form(
        &self,
        _session: &SessionContext,
        _form_id: &str,
    ) -> Result<(), ApiError> {
        self.record("delete_scoping_form")
    }
}
