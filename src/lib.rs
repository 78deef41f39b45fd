//! Consultant onboarding service: drives the client onboarding wizard from
//! the backend's onboarding status.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod scoping;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
