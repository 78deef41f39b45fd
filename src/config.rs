//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Default delay before the completion celebration is shown.
pub const DEFAULT_CELEBRATION_DELAY: Duration = Duration::from_millis(500);

/// Default number of notices kept per client session.
pub const DEFAULT_NOTICE_CAPACITY: usize = 20;

/// Default idle time before an unwatched session is evicted.
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Behaviour knobs for a single onboarding controller.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Delay between first observing `COMPLETED` and showing the celebration.
    pub celebration_delay: Duration,
    /// Maximum number of toast notices retained (oldest dropped first).
    pub notice_capacity: usize,
    /// Where "Continue to Dashboard" sends the browser.
    pub dashboard_path: String,
    /// Where logging out sends the browser.
    pub login_path: String,
    /// How long a session with no requests and no open WebSocket is kept.
    pub session_idle_ttl: Duration,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            celebration_delay: DEFAULT_CELEBRATION_DELAY,
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
            dashboard_path: "/dashboard".to_string(),
            login_path: "/login".to_string(),
            session_idle_ttl: DEFAULT_SESSION_IDLE_TTL,
        }
    }
}

/// Service configuration, read from `ONBOARDING_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the authoritative REST backend, e.g. `http://localhost:5000/api`.
    pub api_base_url: String,
    /// Port the BFF listens on.
    pub port: u16,
    /// Allowed CORS origin for the browser front end (`*` allows any).
    pub allowed_origin: String,
    pub onboarding: OnboardingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("ONBOARDING_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("ONBOARDING_API_URL".to_string()))?;

        let port = parse_env("ONBOARDING_PORT", 8090u16)?;
        let delay_ms = parse_env(
            "ONBOARDING_CELEBRATION_DELAY_MS",
            DEFAULT_CELEBRATION_DELAY.as_millis() as u64,
        )?;
        let notice_capacity = parse_env("ONBOARDING_NOTICE_CAPACITY", DEFAULT_NOTICE_CAPACITY)?;
        if notice_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ONBOARDING_NOTICE_CAPACITY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let idle_secs = parse_env(
            "ONBOARDING_SESSION_IDLE_SECS",
            DEFAULT_SESSION_IDLE_TTL.as_secs(),
        )?;

        let defaults = OnboardingConfig::default();
        Ok(Self {
            api_base_url,
            port,
            allowed_origin: std::env::var("ONBOARDING_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "*".to_string()),
            onboarding: OnboardingConfig {
                celebration_delay: Duration::from_millis(delay_ms),
                notice_capacity,
                dashboard_path: std::env::var("ONBOARDING_DASHBOARD_PATH")
                    .unwrap_or(defaults.dashboard_path),
                login_path: std::env::var("ONBOARDING_LOGIN_PATH").unwrap_or(defaults.login_path),
                session_idle_ttl: Duration::from_secs(idle_secs),
            },
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
