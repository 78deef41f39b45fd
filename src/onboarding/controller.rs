//! OnboardingController: coordinates the backend, the transition table and
//! the effect dispatcher for one client.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};
use uuid::Uuid;

use super::effects::{EffectDispatcher, SessionCell};
use super::machine::{self, Event, RedirectTarget};
use super::state::WizardStep;
use super::status::OnboardingStatus;
use super::view::{NoticeLevel, PanelView};
use crate::api::{Backend, NdaStatus};
use crate::config::OnboardingConfig;
use crate::error::{ApiError, Error, TransitionError};
use crate::session::SessionContext;

/// Result of a user action: the view to show and, for terminal actions,
/// where to send the browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub view: PanelView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Drives the onboarding wizard for a single client.
///
/// User actions and profile loads run one at a time: each holds `actions`
/// from its step check through the backend call to the transition, so a
/// navigation or reload cannot land between a confirmed server write and the
/// step it implies. Background fetches do not take this lock.
pub struct OnboardingController {
    backend: Arc<dyn Backend>,
    cell: Arc<SessionCell>,
    dispatcher: EffectDispatcher,
    config: OnboardingConfig,
    actions: Mutex<()>,
}

impl OnboardingController {
    pub fn new(backend: Arc<dyn Backend>, config: OnboardingConfig) -> Self {
        let cell = SessionCell::new(config.notice_capacity);
        let dispatcher =
            EffectDispatcher::new(Arc::clone(&backend), Arc::clone(&cell), config.celebration_delay);
        Self {
            backend,
            cell,
            dispatcher,
            config,
            actions: Mutex::new(()),
        }
    }

    /// Subscribe to view updates (actions and background fetches).
    pub fn subscribe(&self) -> broadcast::Receiver<PanelView> {
        self.cell.subscribe()
    }

    pub async fn view(&self) -> PanelView {
        self.cell.read().await.view()
    }

    pub async fn is_loaded(&self) -> bool {
        self.cell.read().await.wizard.loaded
    }

    pub async fn current_step(&self) -> WizardStep {
        self.cell.read().await.wizard.current
    }

    /// Number of live view subscribers (open WebSockets).
    pub fn subscriber_count(&self) -> usize {
        self.cell.subscriber_count()
    }

    /// Fetch the profile and re-derive the step from its status.
    pub async fn load(&self, session: &SessionContext) -> Result<ActionOutcome, Error> {
        let _action = self.actions.lock().await;
        self.load_profile(session).await
    }

    /// Load the profile unless it already is. Concurrent first calls share a
    /// single profile fetch.
    pub async fn ensure_loaded(&self, session: &SessionContext) -> Result<PanelView, Error> {
        let _action = self.actions.lock().await;
        if self.is_loaded().await {
            return Ok(self.view().await);
        }
        Ok(self.load_profile(session).await?.view)
    }

    async fn load_profile(&self, session: &SessionContext) -> Result<ActionOutcome, Error> {
        let profile = match self.backend.fetch_profile(session).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "Failed to load client profile");
                let mut inner = self.cell.write().await;
                inner.data.notices.push(NoticeLevel::Error, e.user_message());
                self.cell.publish(&inner);
                return Err(e.into());
            }
        };

        info!(
            client_id = %profile.id,
            status = %profile.onboarding_status,
            "Loaded client profile"
        );

        let event = Event::ProfileLoaded {
            client_id: profile.id.clone(),
            raw_status: profile.onboarding_status.clone(),
            requested_service: profile.primary_service().map(String::from),
        };

        let mut inner = self.cell.write().await;
        let transition = machine::apply(&mut inner.wizard, event)?;
        inner.data.profile = Some(profile);
        inner.data.inline_error = None;
        let redirect = self.dispatcher.run(&mut inner, session, &transition.effects);
        let view = self.cell.publish(&inner);
        Ok(self.outcome(view, redirect))
    }

    /// Continue from the scoping summary to the terms.
    pub async fn continue_from_scoping(
        &self,
        session: &SessionContext,
    ) -> Result<ActionOutcome, Error> {
        self.act(session, Event::ScopingAcknowledged).await
    }

    /// Accept the terms and move the client to `NDA_PENDING`.
    pub async fn accept_terms(
        &self,
        session: &SessionContext,
        accepted: bool,
    ) -> Result<ActionOutcome, Error> {
        let _action = self.actions.lock().await;
        let client_id = self
            .client_on(WizardStep::TermsAcceptance, "terms_confirmed")
            .await?;
        if !accepted {
            return Err(self.reject(TransitionError::TermsNotAccepted).await);
        }

        if let Err(e) = self
            .backend
            .update_status(session, &client_id, OnboardingStatus::NdaPending)
            .await
        {
            return Err(self.fail_inline(e).await);
        }

        info!(client_id = %client_id, "Terms accepted");
        self.set_profile_status(OnboardingStatus::NdaPending).await;
        self.apply(session, Event::TermsConfirmed).await
    }

    /// Submit the NDA signature, then mark onboarding `COMPLETED`.
    pub async fn sign_nda(
        &self,
        session: &SessionContext,
        signature_data: &str,
    ) -> Result<ActionOutcome, Error> {
        let _action = self.actions.lock().await;
        let client_id = self.client_on(WizardStep::NdaSigning, "nda_signed").await?;
        let signature_data = signature_data.trim();
        if signature_data.is_empty() {
            return Err(self.reject(TransitionError::EmptySignature).await);
        }

        if let Err(e) = self
            .backend
            .sign_nda(session, &client_id, signature_data)
            .await
        {
            return Err(self.fail_inline(e).await);
        }
        if let Err(e) = self
            .backend
            .update_status(session, &client_id, OnboardingStatus::Completed)
            .await
        {
            return Err(self.fail_inline(e).await);
        }

        info!(client_id = %client_id, "NDA signed");
        self.set_profile_status(OnboardingStatus::Completed).await;
        self.apply(session, Event::NdaSigned).await
    }

    /// Read whether the NDA has been signed.
    pub async fn nda_status(&self, session: &SessionContext) -> Result<NdaStatus, Error> {
        let client_id = self
            .cell
            .read()
            .await
            .wizard
            .client_id
            .clone()
            .ok_or(TransitionError::ProfileNotLoaded)?;
        Ok(self.backend.nda_status(session, &client_id).await?)
    }

    pub async fn accept_proposal(&self, session: &SessionContext) -> Result<ActionOutcome, Error> {
        self.act(session, Event::ProposalAccepted).await
    }

    pub async fn go_back(&self, session: &SessionContext) -> Result<ActionOutcome, Error> {
        self.act(session, Event::Back).await
    }

    pub async fn go_forward(&self, session: &SessionContext) -> Result<ActionOutcome, Error> {
        self.act(session, Event::Forward).await
    }

    pub async fn continue_to_dashboard(
        &self,
        session: &SessionContext,
    ) -> Result<ActionOutcome, Error> {
        self.act(session, Event::ContinueToDashboard).await
    }

    pub async fn logout(&self, session: &SessionContext) -> Result<ActionOutcome, Error> {
        self.act(session, Event::Logout).await
    }

    pub async fn dismiss_notice(&self, id: Uuid) -> PanelView {
        let mut inner = self.cell.write().await;
        inner.data.notices.dismiss(id);
        self.cell.publish(&inner)
    }

    /// Abort any in-flight work. Called when the session is dropped.
    pub async fn shutdown(&self) {
        let mut inner = self.cell.write().await;
        self.dispatcher.abort_all(&mut inner);
    }

    /// Apply a user event that needs no backend call.
    async fn act(&self, session: &SessionContext, event: Event) -> Result<ActionOutcome, Error> {
        let _action = self.actions.lock().await;
        self.apply(session, event).await
    }

    /// Apply `event`; callers hold `actions`.
    async fn apply(&self, session: &SessionContext, event: Event) -> Result<ActionOutcome, Error> {
        let mut inner = self.cell.write().await;
        let transition = match machine::apply(&mut inner.wizard, event) {
            Ok(t) => t,
            Err(e) => {
                inner.data.inline_error = Some(e.to_string());
                self.cell.publish(&inner);
                return Err(e.into());
            }
        };
        if transition.changed_step() {
            inner.data.inline_error = None;
            info!(from = %transition.from, to = %transition.to, "Onboarding step changed");
        }
        let redirect = self.dispatcher.run(&mut inner, session, &transition.effects);
        let view = self.cell.publish(&inner);
        Ok(self.outcome(view, redirect))
    }

    /// Client id, provided the wizard is currently showing `step`.
    async fn client_on(&self, step: WizardStep, event: &str) -> Result<String, Error> {
        let inner = self.cell.read().await;
        let wizard = &inner.wizard;
        if !wizard.loaded {
            return Err(TransitionError::ProfileNotLoaded.into());
        }
        if wizard.current != step {
            return Err(TransitionError::InvalidTransition {
                step: wizard.current.to_string(),
                event: event.to_string(),
            }
            .into());
        }
        wizard
            .client_id
            .clone()
            .ok_or_else(|| TransitionError::ProfileNotLoaded.into())
    }

    async fn reject(&self, error: TransitionError) -> Error {
        let mut inner = self.cell.write().await;
        inner.data.inline_error = Some(error.to_string());
        self.cell.publish(&inner);
        error.into()
    }

    async fn fail_inline(&self, error: ApiError) -> Error {
        warn!(error = %error, "Onboarding action failed");
        let mut inner = self.cell.write().await;
        inner.data.inline_error = Some(error.user_message());
        self.cell.publish(&inner);
        error.into()
    }

    async fn set_profile_status(&self, status: OnboardingStatus) {
        let mut inner = self.cell.write().await;
        if let Some(profile) = inner.data.profile.as_mut() {
            profile.onboarding_status = status.to_string();
        }
    }

    fn outcome(&self, view: PanelView, redirect: Option<RedirectTarget>) -> ActionOutcome {
        let redirect = redirect.map(|target| match target {
            RedirectTarget::Dashboard => self.config.dashboard_path.clone(),
            RedirectTarget::Login => self.config.login_path.clone(),
        });
        ActionOutcome { view, redirect }
    }
}
