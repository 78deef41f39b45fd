//! Client for the authoritative REST backend.

pub mod backend;
pub mod http;
pub mod types;

pub use backend::Backend;
pub use http::HttpBackend;
pub use types::{ClientProfile, Envelope, NdaStatus, Proposal};
