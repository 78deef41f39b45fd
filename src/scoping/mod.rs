//! Scoping forms: per-service questionnaires and their builder.
//!
//! Admins build a form per service type; clients answer it during onboarding
//! and the answers are shown back to them on the scoping step.

pub mod form;
pub mod routes;

pub use form::{
    Answer, AnswerIssue, Question, QuestionEdit, QuestionKind, ScopingAnswers, ScopingForm,
};
pub use routes::{ScopingRouteState, scoping_routes};
