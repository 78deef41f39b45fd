//! One controller per signed-in user.
//!
//! Entries are dropped on dashboard/logout, and otherwise by the idle sweeper
//! once nobody has touched them for `session_idle_ttl` and no WebSocket is
//! subscribed.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::controller::OnboardingController;
use crate::api::Backend;
use crate::config::OnboardingConfig;

struct Entry {
    controller: Arc<OnboardingController>,
    last_seen: Instant,
}

pub struct SessionRegistry {
    backend: Arc<dyn Backend>,
    config: OnboardingConfig,
    controllers: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn Backend>, config: OnboardingConfig) -> Arc<Self> {
        Arc::new(Self {
            backend,
            config,
            controllers: RwLock::new(HashMap::new()),
        })
    }

    /// Controller for `user_id`, created on first use.
    pub async fn controller(&self, user_id: &str) -> Arc<OnboardingController> {
        let mut controllers = self.controllers.write().await;
        let entry = controllers.entry(user_id.to_string()).or_insert_with(|| {
            debug!(user_id, "Creating onboarding controller");
            Entry {
                controller: Arc::new(OnboardingController::new(
                    Arc::clone(&self.backend),
                    self.config.clone(),
                )),
                last_seen: Instant::now(),
            }
        });
        entry.last_seen = Instant::now();
        Arc::clone(&entry.controller)
    }

    /// Controller for `user_id` if one exists; never creates.
    pub async fn existing(&self, user_id: &str) -> Option<Arc<OnboardingController>> {
        let mut controllers = self.controllers.write().await;
        controllers.get_mut(user_id).map(|entry| {
            entry.last_seen = Instant::now();
            Arc::clone(&entry.controller)
        })
    }

    /// Mark `user_id` as active now.
    pub async fn touch(&self, user_id: &str) {
        if let Some(entry) = self.controllers.write().await.get_mut(user_id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Drop the controller for `user_id`, aborting its in-flight work.
    pub async fn remove(&self, user_id: &str) -> bool {
        let removed = self.controllers.write().await.remove(user_id);
        match removed {
            Some(entry) => {
                entry.controller.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Evict sessions idle for at least `ttl` with no live subscribers.
    /// Returns how many were evicted.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let evicted: Vec<(String, Entry)> = {
            let mut controllers = self.controllers.write().await;
            let idle: Vec<String> = controllers
                .iter()
                .filter(|(_, entry)| {
                    entry.last_seen.elapsed() >= ttl && entry.controller.subscriber_count() == 0
                })
                .map(|(user_id, _)| user_id.clone())
                .collect();
            idle.into_iter()
                .filter_map(|user_id| controllers.remove_entry(&user_id))
                .collect()
        };

        for (user_id, entry) in &evicted {
            debug!(user_id = %user_id, "Evicting idle onboarding session");
            entry.controller.shutdown().await;
        }
        evicted.len()
    }

    /// Spawn the periodic idle sweep. Stops once the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        let ttl = self.config.session_idle_ttl;
        let period = (ttl / 2).max(Duration::from_secs(1));

        tokio::spawn(async move {
            info!("Onboarding session sweeper started (idle ttl: {}s)", ttl.as_secs());
            let mut tick = tokio::time::interval(period);
            // First tick fires immediately
            tick.tick().await;
            loop {
                tick.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.sweep_idle(ttl).await;
                if evicted > 0 {
                    let remaining = registry.len().await;
                    info!(evicted, remaining, "Swept idle onboarding sessions");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.controllers.read().await.len()
    }
}
