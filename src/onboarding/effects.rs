//! Side-effect dispatcher.
//!
//! Runs the effects produced by the transition table: supplementary fetches as
//! abortable tasks, the delayed celebration, and redirects. Every state change
//! is published to subscribers as a fresh [`PanelView`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, broadcast};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::machine::{self, Effect, Event, FetchKind, RedirectTarget};
use super::state::WizardState;
use super::view::{Celebration, FetchSlot, NoticeLevel, PanelData, PanelView, render};
use crate::api::Backend;
use crate::error::ApiError;
use crate::session::SessionContext;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

struct InFlight {
    ticket: u64,
    handle: AbortHandle,
}

/// Mutable state of one client session. Guarded by [`SessionCell`].
pub struct SessionInner {
    pub wizard: WizardState,
    pub data: PanelData,
    in_flight: HashMap<FetchKind, InFlight>,
    next_ticket: u64,
}

impl SessionInner {
    pub fn view(&self) -> PanelView {
        render(&self.wizard, &self.data)
    }

    pub fn in_flight(&self, kind: FetchKind) -> bool {
        self.in_flight.contains_key(&kind)
    }
}

/// Shared, lockable session state plus the view broadcast channel.
pub struct SessionCell {
    inner: RwLock<SessionInner>,
    updates: broadcast::Sender<PanelView>,
}

impl SessionCell {
    pub fn new(notice_capacity: usize) -> Arc<Self> {
        let (updates, _rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Arc::new(Self {
            inner: RwLock::new(SessionInner {
                wizard: WizardState::default(),
                data: PanelData::new(notice_capacity),
                in_flight: HashMap::new(),
                next_ticket: 0,
            }),
            updates,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelView> {
        self.updates.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.updates.receiver_count()
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, SessionInner> {
        self.inner.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().await
    }

    /// Send the current view to subscribers. Ok if nobody is listening.
    pub fn publish(&self, inner: &SessionInner) -> PanelView {
        let view = inner.view();
        let _ = self.updates.send(view.clone());
        view
    }
}

/// Executes transition effects against the backend.
#[derive(Clone)]
pub struct EffectDispatcher {
    backend: Arc<dyn Backend>,
    cell: Arc<SessionCell>,
    celebration_delay: Duration,
}

impl EffectDispatcher {
    pub fn new(
        backend: Arc<dyn Backend>,
        cell: Arc<SessionCell>,
        celebration_delay: Duration,
    ) -> Self {
        Self {
            backend,
            cell,
            celebration_delay,
        }
    }

    /// Run `effects` while the caller holds the write guard. Fetch and
    /// celebration work is spawned; the returned redirect (if any) is for the
    /// caller to hand to the browser.
    pub fn run(
        &self,
        inner: &mut SessionInner,
        session: &SessionContext,
        effects: &[Effect],
    ) -> Option<RedirectTarget> {
        let mut redirect = None;
        for effect in effects {
            match effect {
                Effect::FetchScoping {
                    client_id,
                    service_type,
                } => {
                    inner.data.scoping = FetchSlot::Loading;
                    let backend = Arc::clone(&self.backend);
                    let (session, client_id, service_type) =
                        (session.clone(), client_id.clone(), service_type.clone());
                    self.spawn_fetch(inner, session.clone(), FetchKind::Scoping, async move {
                        backend
                            .scoping_answers(&session, &client_id, &service_type)
                            .await
                            .map(Fetched::Scoping)
                    });
                }
                Effect::FetchProposal { service_type } => {
                    inner.data.proposal = FetchSlot::Loading;
                    let backend = Arc::clone(&self.backend);
                    let (session, service_type) = (session.clone(), service_type.clone());
                    self.spawn_fetch(inner, session.clone(), FetchKind::Proposal, async move {
                        backend
                            .proposal(&session, &service_type)
                            .await
                            .map(Fetched::Proposal)
                    });
                }
                Effect::Cancel(kind) => self.cancel(inner, *kind),
                Effect::Celebrate => self.schedule_celebration(inner),
                Effect::Redirect(target) => redirect = Some(*target),
            }
        }
        redirect
    }

    fn spawn_fetch<F>(
        &self,
        inner: &mut SessionInner,
        session: SessionContext,
        kind: FetchKind,
        fetch: F,
    ) where
        F: std::future::Future<Output = Result<Fetched, ApiError>> + Send + 'static,
    {
        // A newer request for the same kind supersedes the old one.
        if let Some(previous) = inner.in_flight.remove(&kind) {
            previous.handle.abort();
        }
        inner.next_ticket += 1;
        let ticket = inner.next_ticket;

        debug!(?kind, ticket, "Starting step fetch");
        let dispatcher = self.clone();
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            dispatcher.complete_fetch(&session, kind, ticket, result).await;
        });
        inner.in_flight.insert(
            kind,
            InFlight {
                ticket,
                handle: handle.abort_handle(),
            },
        );
    }

    async fn complete_fetch(
        &self,
        session: &SessionContext,
        kind: FetchKind,
        ticket: u64,
        result: Result<Fetched, ApiError>,
    ) {
        let mut inner = self.cell.write().await;
        match inner.in_flight.get(&kind) {
            Some(current) if current.ticket == ticket => {
                inner.in_flight.remove(&kind);
            }
            _ => {
                debug!(?kind, ticket, "Discarding stale fetch result");
                return;
            }
        }

        let event = match result {
            Ok(Fetched::Scoping(answers)) => {
                inner.data.scoping = FetchSlot::Ready(answers);
                Event::FetchSucceeded(kind)
            }
            Ok(Fetched::Proposal(proposal)) => {
                inner.data.proposal = FetchSlot::Ready(proposal);
                Event::FetchSucceeded(kind)
            }
            Err(e) => {
                warn!(?kind, error = %e, "Step fetch failed");
                match kind {
                    FetchKind::Scoping => inner.data.scoping = FetchSlot::Failed,
                    FetchKind::Proposal => inner.data.proposal = FetchSlot::Failed,
                }
                inner.data.notices.push(NoticeLevel::Error, e.user_message());
                Event::FetchFailed(kind)
            }
        };

        match machine::apply(&mut inner.wizard, event) {
            Ok(transition) => {
                self.run(&mut inner, session, &transition.effects);
            }
            Err(e) => warn!(?kind, error = %e, "Fetch result rejected by state machine"),
        }
        self.cell.publish(&inner);
    }

    fn cancel(&self, inner: &mut SessionInner, kind: FetchKind) {
        if let Some(in_flight) = inner.in_flight.remove(&kind) {
            in_flight.handle.abort();
            debug!(?kind, ticket = in_flight.ticket, "Cancelled step fetch");
        }
        let slot_loading = match kind {
            FetchKind::Scoping => inner.data.scoping.is_loading(),
            FetchKind::Proposal => inner.data.proposal.is_loading(),
        };
        if slot_loading {
            match kind {
                FetchKind::Scoping => inner.data.scoping = FetchSlot::Idle,
                FetchKind::Proposal => inner.data.proposal = FetchSlot::Idle,
            }
        }
    }

    fn schedule_celebration(&self, inner: &mut SessionInner) {
        if inner.data.celebration != Celebration::Idle {
            return;
        }
        inner.data.celebration = Celebration::Scheduled;
        let cell = Arc::clone(&self.cell);
        let delay = self.celebration_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = cell.write().await;
            if inner.data.celebration == Celebration::Scheduled {
                inner.data.celebration = Celebration::Showing;
                info!("Onboarding completed, showing celebration");
                cell.publish(&inner);
            }
        });
    }

    /// Abort every in-flight fetch (session teardown).
    pub fn abort_all(&self, inner: &mut SessionInner) {
        for (kind, in_flight) in inner.in_flight.drain() {
            in_flight.handle.abort();
            debug!(?kind, "Aborted fetch on shutdown");
        }
    }
}

enum Fetched {
    Scoping(crate::scoping::ScopingAnswers),
    Proposal(crate::api::Proposal),
}
