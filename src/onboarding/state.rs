//! Wizard steps and per-client progression state.

use serde::{Deserialize, Serialize};

use super::mapper::StepPosition;
use super::status::OnboardingStatus;

/// The panels of the onboarding wizard.
///
/// Progresses linearly: DiscoveryPending → ScopingReview → TermsAcceptance →
/// NdaSigning → ProposalReview → Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    DiscoveryPending,
    ScopingReview,
    TermsAcceptance,
    NdaSigning,
    ProposalReview,
    Completed,
}

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        Self::DiscoveryPending,
        Self::ScopingReview,
        Self::TermsAcceptance,
        Self::NdaSigning,
        Self::ProposalReview,
        Self::Completed,
    ];

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn next(&self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(&self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl Default for WizardStep {
    fn default() -> Self {
        Self::DiscoveryPending
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DiscoveryPending => "discovery_pending",
            Self::ScopingReview => "scoping_review",
            Self::TermsAcceptance => "terms_acceptance",
            Self::NdaSigning => "nda_signing",
            Self::ProposalReview => "proposal_review",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Progression state for one client. Presentation-only: rebuilt from the
/// server status every time a profile is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    /// Last known status; `None` when the server sent something unrecognized.
    pub status: Option<OnboardingStatus>,
    pub raw_status: Option<String>,
    pub client_id: Option<String>,
    /// First requested service; drives the scoping and proposal fetches.
    pub requested_service: Option<String>,
    pub current: WizardStep,
    /// Furthest step achieved in this session.
    pub original: WizardStep,
    pub can_go_back: bool,
    pub scoping_requested: bool,
    pub scoping_loaded: bool,
    pub proposal_requested: bool,
    pub proposal_loaded: bool,
    pub celebrated: bool,
    pub loaded: bool,
}

impl WizardState {
    /// Reset current and original step from a freshly mapped position.
    pub fn reposition(&mut self, position: StepPosition) {
        let step = WizardStep::from_index(position.step).unwrap_or_default();
        self.current = step;
        self.original = step;
        self.can_go_back = position.can_go_back;
    }

    pub fn back_allowed(&self) -> bool {
        self.can_go_back
            && self.current > WizardStep::DiscoveryPending
            && self.current <= self.original
    }

    pub fn forward_allowed(&self) -> bool {
        self.current < self.original
    }

    /// Step back one panel. Returns whether the step changed.
    pub fn go_back(&mut self) -> bool {
        if !self.back_allowed() {
            return false;
        }
        match self.current.prev() {
            Some(prev) => {
                self.current = prev;
                true
            }
            None => false,
        }
    }

    /// Step forward one panel, never past `original`. Returns whether the
    /// step changed.
    pub fn go_forward(&mut self) -> bool {
        if !self.forward_allowed() {
            return false;
        }
        match self.current.next() {
            Some(next) => {
                self.current = next;
                true
            }
            None => false,
        }
    }

    /// Move to `step` after a successful action, widening the achieved range.
    pub fn advance_to(&mut self, step: WizardStep) {
        self.current = step;
        if step > self.original {
            self.original = step;
        }
        self.can_go_back = true;
    }
}
