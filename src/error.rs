//! Error types for the onboarding service.

use axum::Json;
use axum::response::{IntoResponse, Response};
use reqwest::StatusCode;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Scoping form error: {0}")]
    Scoping(#[from] ScopingError),

    #[error("Status error: {0}")]
    Status(#[from] StatusError),

    #[error("Missing or invalid session headers")]
    Unauthorized,
}

impl Error {
    /// HTTP status returned to the browser for this error.
    ///
    /// - Missing session: 401
    /// - Action not valid on the current step: 409
    /// - Failed precondition (terms, signature, invalid form/answers): 422
    /// - Backend unreachable or failing: 502
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transition(
                TransitionError::InvalidTransition { .. }
                | TransitionError::ProfileNotLoaded
                | TransitionError::ScopingNotLoaded,
            ) => StatusCode::CONFLICT,
            Self::Transition(_) | Self::Scoping(_) | Self::Status(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Api(ApiError::Http { status, .. }) if *status == StatusCode::NOT_FOUND => {
                StatusCode::NOT_FOUND
            }
            Self::Api(ApiError::Rejected { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Api(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Transition(e) => e.to_string(),
            Self::Scoping(e) => e.to_string(),
            Self::Status(e) => e.to_string(),
            Self::Config(_) => "The service is misconfigured.".to_string(),
            Self::Unauthorized => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = serde_json::json!({ "error": self.user_message() });
        if let Self::Scoping(ScopingError::InvalidAnswers(issues)) = &self {
            body["issues"] = serde_json::to_value(issues).unwrap_or_default();
        }
        (status, Json(body)).into_response()
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors talking to the authoritative REST backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    Network { endpoint: String, reason: String },

    #[error("{endpoint} returned HTTP {status}: {message}")]
    Http {
        endpoint: String,
        status: StatusCode,
        message: String,
    },

    #[error("{endpoint} reported failure: {message}")]
    Rejected { endpoint: String, message: String },

    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("Invalid backend base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// Short human-readable message suitable for a toast or inline error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { .. } => "Could not reach the server. Please try again.".to_string(),
            Self::Http { message, .. } | Self::Rejected { message, .. } if !message.is_empty() => {
                message.clone()
            }
            Self::Http { status, .. } => format!("The server responded with {status}."),
            Self::Rejected { .. } => "The request was not accepted.".to_string(),
            Self::MalformedResponse { .. } => {
                "The server sent an unexpected response.".to_string()
            }
            Self::InvalidBaseUrl(_) => "The service is misconfigured.".to_string(),
        }
    }
}

/// Onboarding state machine errors. None of these mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Cannot apply {event} while on step {step}")]
    InvalidTransition { step: String, event: String },

    #[error("Terms must be accepted before continuing")]
    TermsNotAccepted,

    #[error("A signature is required to sign the NDA")]
    EmptySignature,

    #[error("Scoping details are still loading")]
    ScopingNotLoaded,

    #[error("No client profile has been loaded")]
    ProfileNotLoaded,
}

/// Scoping form builder and answer validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopingError {
    #[error("Question {0} already exists")]
    DuplicateQuestion(String),

    #[error("Question {0} not found")]
    QuestionNotFound(String),

    #[error("Position {index} is out of range for {len} questions")]
    OutOfRange { index: usize, len: usize },

    #[error("Invalid form: {0}")]
    InvalidForm(String),

    #[error("Answers are for service {found}, form is for {expected}")]
    ServiceMismatch { expected: String, found: String },

    #[error("Answers do not satisfy the form ({} issue(s))", .0.len())]
    InvalidAnswers(Vec<crate::scoping::AnswerIssue>),
}

/// Strict onboarding status parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("Unknown onboarding status: {0}")]
    Unknown(String),
}


/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
