//! Server-owned onboarding status.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// Progress of a client through discovery, scoping, terms and NDA.
///
/// The backend owns this value; it is only assigned locally after an action
/// that changes it has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    NotStarted,
    PendingDiscovery,
    DiscoveryScheduled,
    DiscoveryCompleted,
    ScopingReview,
    TermsPending,
    NdaPending,
    Completed,
}

impl OnboardingStatus {
    pub const ALL: [OnboardingStatus; 8] = [
        Self::NotStarted,
        Self::PendingDiscovery,
        Self::DiscoveryScheduled,
        Self::DiscoveryCompleted,
        Self::ScopingReview,
        Self::TermsPending,
        Self::NdaPending,
        Self::Completed,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::PendingDiscovery => "PENDING_DISCOVERY",
            Self::DiscoveryScheduled => "DISCOVERY_SCHEDULED",
            Self::DiscoveryCompleted => "DISCOVERY_COMPLETED",
            Self::ScopingReview => "SCOPING_REVIEW",
            Self::TermsPending => "TERMS_PENDING",
            Self::NdaPending => "NDA_PENDING",
            Self::Completed => "COMPLETED",
        }
    }

    /// Lenient lookup: trims and upper-cases before matching.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|s| s.as_str() == normalized)
    }
}

impl FromStr for OnboardingStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| StatusError::Unknown(s.to_string()))
    }
}

impl std::fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
