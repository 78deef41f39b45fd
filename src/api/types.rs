//! Records exchanged with the REST backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard response wrapper used by every backend endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Client profile as returned by the profile service. Only the fields the
/// onboarding flow reads are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    /// Raw status string; may hold values this service does not recognize.
    pub onboarding_status: String,
    #[serde(default)]
    pub requested_services: Vec<String>,
}

impl ClientProfile {
    pub fn primary_service(&self) -> Option<&str> {
        self.requested_services
            .first()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdaStatus {
    #[serde(default)]
    pub signed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

/// Proposal content for a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub service_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Anything else the backend attaches (pricing tables, milestones, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub details: serde_json::Map<String, serde_json::Value>,
}
