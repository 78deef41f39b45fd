//! Onboarding progression controller.
//!
//! A client's server-side `onboardingStatus` decides which panel of the
//! five-step wizard (discovery → scoping → terms → NDA → proposal) is shown,
//! whether they may step back, and which supplementary data is fetched on the
//! way. Transitions live in a single table (`machine`); the controller performs
//! the backend calls that gate them and the dispatcher runs their effects.

pub mod controller;
pub mod effects;
pub mod machine;
pub mod mapper;
pub mod registry;
pub mod routes;
pub mod state;
pub mod status;
pub mod view;

pub use controller::{ActionOutcome, OnboardingController};
pub use machine::{Effect, Event, FetchKind, RedirectTarget, Transition};
pub use mapper::{StepPosition, map_status_to_step};
pub use registry::SessionRegistry;
pub use routes::{OnboardingRouteState, WsMessage, onboarding_routes};
pub use state::{WizardState, WizardStep};
pub use status::OnboardingStatus;
pub use view::{Notice, NoticeLevel, Panel, PanelView};
