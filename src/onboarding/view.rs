//! Step renderer: turns wizard state plus fetched data into the panel the
//! front end shows.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::{WizardState, WizardStep};
use crate::api::{ClientProfile, Proposal};
use crate::scoping::ScopingAnswers;

/// Lifecycle of a supplementary fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchSlot<T> {
    Idle,
    Loading,
    Ready(T),
    /// Failed or cancelled: not loading, no data.
    Failed,
}

impl<T> Default for FetchSlot<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> FetchSlot<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Ready(data) => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient toast message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Bounded notice queue; the oldest notice is dropped when full.
#[derive(Debug, Clone)]
pub struct Notices {
    items: VecDeque<Notice>,
    capacity: usize,
}

impl Notices {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, level: NoticeLevel, message: impl Into<String>) -> Uuid {
        let notice = Notice {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            created_at: Utc::now(),
        };
        let id = notice.id;
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(notice);
        id
    }

    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Celebration {
    #[default]
    Idle,
    Scheduled,
    Showing,
}

/// Data backing the panels of one client session.
#[derive(Debug, Clone)]
pub struct PanelData {
    pub profile: Option<ClientProfile>,
    pub scoping: FetchSlot<ScopingAnswers>,
    pub proposal: FetchSlot<Proposal>,
    pub notices: Notices,
    /// Error shown on the current panel after a failed action.
    pub inline_error: Option<String>,
    pub celebration: Celebration,
}

impl PanelData {
    pub fn new(notice_capacity: usize) -> Self {
        Self {
            profile: None,
            scoping: FetchSlot::Idle,
            proposal: FetchSlot::Idle,
            notices: Notices::new(notice_capacity),
            inline_error: None,
            celebration: Celebration::Idle,
        }
    }
}

/// The six mutually exclusive panels, plus the pre-load placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Panel {
    NotLoaded,
    DiscoveryPending {
        full_name: String,
    },
    ScopingReview {
        loading: bool,
        service_type: Option<String>,
        answers: Option<ScopingAnswers>,
    },
    TermsAcceptance,
    NdaSigning {
        full_name: String,
        email: String,
    },
    ProposalReview {
        loading: bool,
        proposal: Option<Proposal>,
    },
    Completed,
}

/// Everything the front end needs to draw the wizard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelView {
    pub step: u8,
    pub step_name: WizardStep,
    pub status: Option<String>,
    pub status_recognized: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub panel: Panel,
    pub inline_error: Option<String>,
    pub notices: Vec<Notice>,
    pub celebrate: bool,
}

pub fn render(state: &WizardState, data: &PanelData) -> PanelView {
    let profile = data.profile.as_ref();
    let full_name = profile.map(|p| p.full_name.clone()).unwrap_or_default();

    let panel = if !state.loaded {
        Panel::NotLoaded
    } else {
        match state.current {
            WizardStep::DiscoveryPending => Panel::DiscoveryPending { full_name },
            WizardStep::ScopingReview => Panel::ScopingReview {
                loading: data.scoping.is_loading(),
                service_type: state.requested_service.clone(),
                answers: data.scoping.data().cloned(),
            },
            WizardStep::TermsAcceptance => Panel::TermsAcceptance,
            WizardStep::NdaSigning => Panel::NdaSigning {
                full_name,
                email: profile.map(|p| p.email.clone()).unwrap_or_default(),
            },
            WizardStep::ProposalReview => Panel::ProposalReview {
                loading: data.proposal.is_loading(),
                proposal: data.proposal.data().cloned(),
            },
            WizardStep::Completed => Panel::Completed,
        }
    };

    PanelView {
        step: state.current.index(),
        step_name: state.current,
        status: state.raw_status.clone(),
        status_recognized: state.status.is_some(),
        can_go_back: state.loaded && state.back_allowed(),
        can_go_forward: state.loaded && state.forward_allowed(),
        panel,
        inline_error: data.inline_error.clone(),
        notices: data.notices.snapshot(),
        celebrate: data.celebration == Celebration::Showing,
    }
}
