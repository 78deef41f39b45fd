//! Router assembly for the onboarding service.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api::Backend;
use crate::config::OnboardingConfig;
use crate::onboarding::{OnboardingRouteState, SessionRegistry, onboarding_routes};
use crate::scoping::{ScopingRouteState, scoping_routes};

/// Build the full router: health, onboarding wizard and scoping form builder.
///
/// `allowed_origin` of `*` permits any origin. Must be called inside a tokio
/// runtime: the idle-session sweeper is spawned here.
pub fn build_router(
    backend: Arc<dyn Backend>,
    config: OnboardingConfig,
    allowed_origin: &str,
) -> Router {
    let registry = SessionRegistry::new(Arc::clone(&backend), config);
    registry.spawn_sweeper();

    Router::new()
        .route("/health", get(health))
        .merge(onboarding_routes(OnboardingRouteState { registry }))
        .merge(scoping_routes(ScopingRouteState { backend }))
        .layer(ServiceBuilder::new().layer(cors_layer(allowed_origin)))
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(origin = allowed_origin, error = %e, "Invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "consult-onboarding"
    }))
}
