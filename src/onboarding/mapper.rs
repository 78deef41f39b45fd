//! Status-to-step mapping.

use serde::Serialize;

use super::status::OnboardingStatus;

/// Step index and back-navigation flag derived from a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPosition {
    /// 0..=4.
    pub step: u8,
    pub can_go_back: bool,
}

impl StepPosition {
    const EARLIEST: StepPosition = StepPosition {
        step: 0,
        can_go_back: false,
    };
}

/// Table step for a known status. `SCOPING_REVIEW` is not in the table.
fn table_step(status: OnboardingStatus) -> Option<u8> {
    use OnboardingStatus::*;
    match status {
        NotStarted | PendingDiscovery | DiscoveryScheduled => Some(0),
        DiscoveryCompleted => Some(1),
        TermsPending => Some(2),
        NdaPending => Some(3),
        Completed => Some(4),
        ScopingReview => None,
    }
}

/// Map a known status to its step position.
pub fn position_for(status: OnboardingStatus) -> StepPosition {
    if status == OnboardingStatus::ScopingReview {
        return StepPosition {
            step: 1,
            can_go_back: false,
        };
    }
    match table_step(status) {
        Some(step) => StepPosition {
            step,
            can_go_back: step > 0,
        },
        None => StepPosition::EARLIEST,
    }
}

/// Map a raw server status string to its step position.
///
/// Unrecognized statuses fall back to the earliest step with back navigation
/// disabled.
pub fn map_status_to_step(status: &str) -> StepPosition {
    match OnboardingStatus::parse(status) {
        Some(known) => position_for(known),
        None => {
            tracing::warn!(status = %status, "Unrecognized onboarding status, defaulting to step 0");
            StepPosition::EARLIEST
        }
    }
}
