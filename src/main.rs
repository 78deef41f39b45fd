use std::sync::Arc;

use anyhow::Context;

use consult_onboarding::api::{Backend, HttpBackend};
use consult_onboarding::app::build_router;
use consult_onboarding::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("reading ONBOARDING_* configuration")?;

    let backend: Arc<dyn Backend> = Arc::new(
        HttpBackend::new(&config.api_base_url).context("creating backend client")?,
    );

    eprintln!("Consult onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_base_url);
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding", config.port);
    eprintln!("   WS: ws://0.0.0.0:{}/ws/onboarding", config.port);
    eprintln!(
        "   Celebration delay: {}ms",
        config.onboarding.celebration_delay.as_millis()
    );

    let app = build_router(backend, config.onboarding.clone(), &config.allowed_origin);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("serving HTTP")?;

    Ok(())
}
