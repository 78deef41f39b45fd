//! Transition table for the onboarding wizard.
//!
//! `apply` maps `(state, event)` to a new state plus the effects the caller
//! must run. It performs no I/O; server calls that gate an event (accepting
//! terms, signing the NDA) happen before the event is applied.

use serde::Serialize;

use super::mapper::map_status_to_step;
use super::state::{WizardState, WizardStep};
use super::status::OnboardingStatus;
use crate::error::TransitionError;

/// Something that happened to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A profile was fetched from the backend.
    ProfileLoaded {
        client_id: String,
        raw_status: String,
        requested_service: Option<String>,
    },
    /// A supplementary fetch finished.
    FetchSucceeded(FetchKind),
    FetchFailed(FetchKind),
    /// User continued past the scoping summary.
    ScopingAcknowledged,
    /// Terms were accepted and the backend moved the client to `NDA_PENDING`.
    TermsConfirmed,
    /// NDA was signed and the backend moved the client to `COMPLETED`.
    NdaSigned,
    ProposalAccepted,
    Back,
    Forward,
    ContinueToDashboard,
    Logout,
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Self::ProfileLoaded { .. } => "profile_loaded",
            Self::FetchSucceeded(_) => "fetch_succeeded",
            Self::FetchFailed(_) => "fetch_failed",
            Self::ScopingAcknowledged => "scoping_acknowledged",
            Self::TermsConfirmed => "terms_confirmed",
            Self::NdaSigned => "nda_signed",
            Self::ProposalAccepted => "proposal_accepted",
            Self::Back => "back",
            Self::Forward => "forward",
            Self::ContinueToDashboard => "continue_to_dashboard",
            Self::Logout => "logout",
        }
    }
}

/// Supplementary data fetched on step entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    Scoping,
    Proposal,
}

/// Where the browser should be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Dashboard,
    Login,
}

/// Work the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchScoping {
        client_id: String,
        service_type: String,
    },
    FetchProposal {
        service_type: String,
    },
    /// Abort an in-flight fetch whose step is no longer shown.
    Cancel(FetchKind),
    /// Show the completion celebration (once).
    Celebrate,
    Redirect(RedirectTarget),
}

/// Outcome of a successful `apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: WizardStep,
    pub to: WizardStep,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn changed_step(&self) -> bool {
        self.from != self.to
    }
}

/// Apply `event` to `state`. On error `state` is left untouched.
pub fn apply(state: &mut WizardState, event: Event) -> Result<Transition, TransitionError> {
    let from = state.current;
    let mut next = state.clone();
    let mut effects = Vec::new();

    if !next.loaded && !matches!(event, Event::ProfileLoaded { .. }) {
        return Err(TransitionError::ProfileNotLoaded);
    }

    match event {
        Event::ProfileLoaded {
            client_id,
            raw_status,
            requested_service,
        } => {
            let same_subject = next.client_id.as_deref() == Some(client_id.as_str())
                && next.requested_service == requested_service;
            if !same_subject {
                next.scoping_loaded = false;
                next.proposal_loaded = false;
            }
            // A fresh load supersedes anything still in flight.
            if next.scoping_requested && !next.scoping_loaded {
                effects.push(Effect::Cancel(FetchKind::Scoping));
            }
            if next.proposal_requested && !next.proposal_loaded {
                effects.push(Effect::Cancel(FetchKind::Proposal));
            }
            next.scoping_requested = next.scoping_loaded;
            next.proposal_requested = next.proposal_loaded;

            next.reposition(map_status_to_step(&raw_status));
            next.status = OnboardingStatus::parse(&raw_status);
            next.raw_status = Some(raw_status);
            next.client_id = Some(client_id);
            next.requested_service = requested_service;
            next.loaded = true;
        }
        Event::FetchSucceeded(kind) => match kind {
            FetchKind::Scoping => next.scoping_loaded = true,
            FetchKind::Proposal => next.proposal_loaded = true,
        },
        // The one-shot flag stays set: no automatic retry until the next load.
        Event::FetchFailed(_) => {}
        Event::ScopingAcknowledged => {
            expect_step(&next, WizardStep::ScopingReview, "scoping_acknowledged")?;
            if next.requested_service.is_some() && !next.scoping_loaded {
                return Err(TransitionError::ScopingNotLoaded);
            }
            next.advance_to(WizardStep::TermsAcceptance);
        }
        Event::TermsConfirmed => {
            expect_step(&next, WizardStep::TermsAcceptance, "terms_confirmed")?;
            next.status = Some(OnboardingStatus::NdaPending);
            next.raw_status = Some(OnboardingStatus::NdaPending.to_string());
            next.advance_to(WizardStep::NdaSigning);
        }
        Event::NdaSigned => {
            expect_step(&next, WizardStep::NdaSigning, "nda_signed")?;
            next.status = Some(OnboardingStatus::Completed);
            next.raw_status = Some(OnboardingStatus::Completed.to_string());
            next.advance_to(WizardStep::ProposalReview);
        }
        Event::ProposalAccepted => {
            expect_step(&next, WizardStep::ProposalReview, "proposal_accepted")?;
            next.advance_to(WizardStep::Completed);
        }
        Event::Back => {
            next.go_back();
        }
        Event::Forward => {
            next.go_forward();
        }
        Event::ContinueToDashboard => {
            expect_step(&next, WizardStep::Completed, "continue_to_dashboard")?;
            effects.push(Effect::Redirect(RedirectTarget::Dashboard));
        }
        Event::Logout => {
            expect_step(&next, WizardStep::DiscoveryPending, "logout")?;
            effects.push(Effect::Redirect(RedirectTarget::Login));
        }
    }

    effects.extend(step_effects(&mut next, from));

    let to = next.current;
    *state = next;
    Ok(Transition { from, to, effects })
}

fn expect_step(
    state: &WizardState,
    step: WizardStep,
    event: &'static str,
) -> Result<(), TransitionError> {
    if state.current == step {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            step: state.current.to_string(),
            event: event.to_string(),
        })
    }
}

/// Effects implied by the state after an event: leaving a step cancels its
/// pending fetch, entering one starts it, and the first `COMPLETED` celebrates.
fn step_effects(state: &mut WizardState, from: WizardStep) -> Vec<Effect> {
    let mut effects = Vec::new();

    if from != state.current {
        if from == WizardStep::ScopingReview && state.scoping_requested && !state.scoping_loaded {
            state.scoping_requested = false;
            effects.push(Effect::Cancel(FetchKind::Scoping));
        }
        if from == WizardStep::ProposalReview && state.proposal_requested && !state.proposal_loaded
        {
            state.proposal_requested = false;
            effects.push(Effect::Cancel(FetchKind::Proposal));
        }
    }

    match state.current {
        WizardStep::ScopingReview if !state.scoping_requested && !state.scoping_loaded => {
            if let (Some(client_id), Some(service_type)) =
                (state.client_id.clone(), state.requested_service.clone())
            {
                state.scoping_requested = true;
                effects.push(Effect::FetchScoping {
                    client_id,
                    service_type,
                });
            }
        }
        WizardStep::ProposalReview if !state.proposal_requested && !state.proposal_loaded => {
            if let Some(service_type) = state.requested_service.clone() {
                state.proposal_requested = true;
                effects.push(Effect::FetchProposal { service_type });
            }
        }
        _ => {}
    }

    if state.status == Some(OnboardingStatus::Completed) && !state.celebrated {
        state.celebrated = true;
        effects.push(Effect::Celebrate);
    }

    effects
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
