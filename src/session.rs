//! Request-scoped session context.
//!
//! Every handler receives the caller's identity explicitly; nothing about the
//! signed-in user is held in process-wide state.

use axum::http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Identity of the signed-in user plus the bearer token forwarded to the backend.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: String,
    pub email: String,
    auth_token: SecretString,
}

impl SessionContext {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            auth_token: SecretString::from(auth_token.into()),
        }
    }

    /// Build a session from request headers.
    ///
    /// Requires `x-user-id` and `Authorization: Bearer <token>`; the email is
    /// optional.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let user_id = header_str(headers, USER_ID_HEADER)?;
        let token = header_str(headers, "authorization")?
            .strip_prefix("Bearer ")?
            .trim()
            .to_string();
        if user_id.is_empty() || token.is_empty() {
            return None;
        }
        let email = header_str(headers, USER_EMAIL_HEADER).unwrap_or_default();
        Some(Self::new(user_id, email, token))
    }

    /// Value for the `Authorization` header on backend requests.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.auth_token.expose_secret())
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}
