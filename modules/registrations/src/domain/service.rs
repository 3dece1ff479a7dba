use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::contract::identity::IdentityProvider;
use crate::contract::model::{
    AttendanceOutcome, Identity, IdentityKey, RefreshOutcome, RegisterOutcome, Registration,
    RegistrationsSnapshot, Resync,
};
use crate::domain::error::DomainError;
use crate::domain::events::RegistrationEvent;
use crate::domain::locks::{KeyGuard, KeyedLocks};
use crate::domain::policy::{Mutation, SyncPolicy};
use crate::domain::ports::EventPublisher;
use crate::domain::repo::RegistrationsRepository;
use crate::contract::views::{self, FetchScope};

/// Registration store: owns the working set for the current identity and
/// funnels every read and write through the repository port.
///
/// State lives in a `watch` channel so consumers can subscribe to changes;
/// only this service writes to it.
pub struct Service {
    repo: Arc<dyn RegistrationsRepository>,
    identity: Arc<dyn IdentityProvider>,
    events: Arc<dyn EventPublisher<RegistrationEvent>>,
    config: ServiceConfig,
    state: watch::Sender<RegistrationsSnapshot>,
    locks: KeyedLocks,
    cancel: CancellationToken,
    /// Last fetch issued / last fetch whose result was applied.
    fetch_seq: AtomicU64,
    applied_seq: AtomicU64,
}

/// Configuration for the domain service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upper bound for every repository call.
    pub request_timeout: Duration,
    /// Serialize mutations that target the same registration id.
    pub serialize_mutations: bool,
    pub sync_policy: SyncPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            serialize_mutations: true,
            sync_policy: SyncPolicy::default(),
        }
    }
}

/// Counts a fetch as in flight until dropped, whatever path the fetch exits by.
struct InFlight<'a> {
    state: &'a watch::Sender<RegistrationsSnapshot>,
}

impl<'a> InFlight<'a> {
    fn enter(state: &'a watch::Sender<RegistrationsSnapshot>) -> Self {
        state.send_modify(|s| s.pending_fetches += 1);
        Self { state }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.pending_fetches = s.pending_fetches.saturating_sub(1));
    }
}

impl Service {
    /// Create a service with dependencies.
    pub fn new(
        repo: Arc<dyn RegistrationsRepository>,
        identity: Arc<dyn IdentityProvider>,
        events: Arc<dyn EventPublisher<RegistrationEvent>>,
        config: ServiceConfig,
    ) -> Self {
        let (state, _) = watch::channel(RegistrationsSnapshot::default());
        Self {
            repo,
            identity,
            events,
            config,
            state,
            locks: KeyedLocks::new(),
            cancel: CancellationToken::new(),
            fetch_seq: AtomicU64::new(0),
            applied_seq: AtomicU64::new(0),
        }
    }

    /// Abort in-flight repository calls when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// State as seen by the current identity.
    pub fn snapshot(&self) -> RegistrationsSnapshot {
        self.observe_identity(&self.identity.current());
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrationsSnapshot> {
        self.state.subscribe()
    }

    /// Reconcile the published viewer with `identity`.
    /// A different principal must never see the previous one's records, so the
    /// working set is emptied before anything is refetched. A role change for the
    /// same principal keeps only what the new role may see.
    fn observe_identity(&self, identity: &Identity) {
        self.state.send_if_modified(|s| {
            if s.viewer == *identity {
                return false;
            }
            if s.viewer.user_id() != identity.user_id() {
                if !s.registrations.is_empty() {
                    debug!("principal changed; clearing working set");
                    s.registrations.clear();
                }
            } else {
                let before = s.registrations.len();
                s.registrations.retain(|r| views::is_visible(identity, r));
                if s.registrations.len() != before {
                    debug!(
                        dropped = before - s.registrations.len(),
                        "viewer scope narrowed; dropped records it may not see"
                    );
                }
            }
            s.viewer = identity.clone();
            true
        });
    }

    /// Run a repository call under the request timeout and the service's cancellation token.
    async fn guarded<T, F>(&self, op: &'static str, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let limit = self.config.request_timeout;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(anyhow!("{op} cancelled")),
            res = tokio::time::timeout(limit, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(anyhow!("{op} timed out after {limit:?}")),
            },
        }
    }

    async fn lock_mutation(&self, registration_id: &str) -> Option<KeyGuard<'_>> {
        if self.config.serialize_mutations {
            Some(self.locks.lock(registration_id).await)
        } else {
            None
        }
    }

    #[instrument(name = "registrations.service.refresh", skip(self))]
    pub async fn refresh(&self) -> Result<RefreshOutcome, DomainError> {
        let identity = self.identity.current();
        self.observe_identity(&identity);

        if !identity.is_resolved() {
            debug!("Identity not resolved yet; refresh skipped");
            return Ok(RefreshOutcome::Pending);
        }

        let scope = views::fetch_scope(&identity);
        if scope == FetchScope::Empty {
            debug!("Viewer has no visible scope; clearing working set");
            self.state.send_if_modified(|s| {
                let changed = !s.registrations.is_empty();
                s.registrations.clear();
                changed
            });
            return Ok(RefreshOutcome::Cleared);
        }

        let key = identity.key();
        let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight::enter(&self.state);

        let fetched = self
            .guarded("fetch", async {
                match &scope {
                    FetchScope::Owner(user_id) => self.repo.list_by_user(user_id).await,
                    _ => self.repo.list_all().await,
                }
            })
            .await;

        match fetched {
            Ok(mut registrations) => {
                if self.identity.current().key() != key {
                    info!("Identity changed while fetching; result discarded");
                    return Ok(RefreshOutcome::Discarded);
                }
                if let FetchScope::Owner(user_id) = &scope {
                    registrations.retain(|r| &r.user_id == user_id);
                }
                let count = registrations.len();
                // Results may arrive out of order; a newer fetch always wins.
                let applied = self.state.send_if_modified(|s| {
                    if self.applied_seq.load(Ordering::SeqCst) > seq {
                        return false;
                    }
                    self.applied_seq.store(seq, Ordering::SeqCst);
                    s.registrations = registrations;
                    true
                });
                if !applied {
                    debug!(seq, "Superseded by a newer fetch; result discarded");
                    return Ok(RefreshOutcome::Discarded);
                }
                debug!(count, "Working set replaced");
                Ok(RefreshOutcome::Loaded { count })
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to fetch registrations; keeping previous working set");
                Err(DomainError::fetch(format!("{e:#}")))
            }
        }
    }

    #[instrument(
        name = "registrations.service.register_for_event",
        skip_all,
        fields(event_id = %event_id)
    )]
    pub async fn register_for_event(&self, event_id: &str) -> Result<RegisterOutcome, DomainError> {
        if event_id.trim().is_empty() {
            return Err(DomainError::validation("event_id", "must not be empty"));
        }

        let identity = self.identity.current();
        let Some(principal) = identity.principal() else {
            warn!("Registration rejected: no signed-in user");
            return Err(DomainError::unauthenticated("register_for_event"));
        };

        let registration_id = Registration::id_for(&principal.id, event_id);
        let _guard = self.lock_mutation(&registration_id).await;

        let known = self
            .state
            .borrow()
            .registrations
            .iter()
            .any(|r| {
                r.id == registration_id && r.user_id == principal.id && r.event_id == event_id
            });
        if known {
            debug!(%registration_id, "Already registered; no write issued");
            return Ok(RegisterOutcome::AlreadyRegistered { registration_id });
        }

        info!(%registration_id, "Registering for event");
        let registration = Registration::new(&principal.id, event_id, Utc::now());
        self.guarded("write", self.repo.put(&registration))
            .await
            .map_err(|e| {
                error!(error = %format!("{e:#}"), %registration_id, "Failed to write registration");
                DomainError::write(format!("{e:#}"))
            })?;

        self.events.publish(&RegistrationEvent::Registered {
            registration_id: registration.id.clone(),
            user_id: registration.user_id.clone(),
            event_id: registration.event_id.clone(),
            at: registration.registration_date,
        });

        let resync = self
            .config
            .sync_policy
            .decide(Mutation::Register, principal.role.as_ref());
        self.resync_after_register(&identity, registration, resync)
            .await;

        info!(%registration_id, "Registration stored");
        Ok(RegisterOutcome::Registered { registration_id })
    }

    async fn resync_after_register(
        &self,
        identity: &Identity,
        registration: Registration,
        resync: Resync,
    ) {
        match resync {
            Resync::FullRefresh => {
                // The write is durable; a failed refetch only delays visibility.
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "Refresh after registration failed");
                }
            }
            Resync::LocalPatch => {
                if views::is_visible(identity, &registration) {
                    self.state.send_modify(|s| {
                        // The write replaced whatever was stored under this id.
                        match s
                            .registrations
                            .binary_search_by(|r| r.id.cmp(&registration.id))
                        {
                            Ok(pos) => s.registrations[pos] = registration,
                            Err(pos) => s.registrations.insert(pos, registration),
                        }
                    });
                }
            }
            Resync::Skip => {}
        }
    }

    #[instrument(
        name = "registrations.service.mark_attendance",
        skip_all,
        fields(registration_id = %registration_id)
    )]
    pub async fn mark_attendance(
        &self,
        registration_id: &str,
    ) -> Result<AttendanceOutcome, DomainError> {
        if registration_id.trim().is_empty() {
            return Err(DomainError::validation(
                "registration_id",
                "must not be empty",
            ));
        }

        let identity = self.identity.current();
        let Some(principal) = identity.principal() else {
            warn!("Check-in rejected: no signed-in user");
            return Err(DomainError::unauthenticated("mark_attendance"));
        };

        let _guard = self.lock_mutation(registration_id).await;

        info!("Marking attendance");
        let at = Utc::now();
        let found = self
            .guarded("write", self.repo.mark_checked_in(registration_id, at))
            .await
            .map_err(|e| {
                error!(error = %format!("{e:#}"), "Failed to mark attendance");
                DomainError::write(format!("{e:#}"))
            })?;
        if !found {
            warn!("Check-in target does not exist");
            return Err(DomainError::registration_not_found(registration_id));
        }

        self.events.publish(&RegistrationEvent::CheckedIn {
            registration_id: registration_id.to_string(),
            by: principal.id.clone(),
            at,
        });

        let resync = self
            .config
            .sync_policy
            .decide(Mutation::MarkAttendance, principal.role.as_ref());
        match resync {
            Resync::FullRefresh => {
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "Refresh after check-in failed");
                }
            }
            Resync::LocalPatch => {
                self.state.send_if_modified(|s| {
                    match s.registrations.iter_mut().find(|r| r.id == registration_id) {
                        Some(r) => {
                            r.mark_checked_in(at);
                            true
                        }
                        None => false,
                    }
                });
            }
            Resync::Skip => {}
        }

        info!(?resync, "Attendance recorded");
        Ok(AttendanceOutcome {
            registration_id: registration_id.to_string(),
            checked_in_at: at,
            resync,
        })
    }

    pub fn is_user_registered(&self, event_id: &str) -> bool {
        self.snapshot().is_user_registered(event_id)
    }

    /// Follow identity changes until `cancel` fires, refreshing whenever the
    /// `(id, role, resolved)` key changes.
    #[instrument(name = "registrations.service.identity_sync", skip_all)]
    pub async fn sync_with_identity(self: Arc<Self>, cancel: CancellationToken) {
        let mut rx = self.identity.watch();
        let mut last: Option<IdentityKey> = None;
        info!("Identity sync started");

        loop {
            let key = rx.borrow_and_update().key();
            if last.as_ref() != Some(&key) {
                last = Some(key);
                // failures are already logged by refresh
                let _ = self.refresh().await;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        debug!("Identity provider closed");
                        break;
                    }
                }
            }
        }
        info!("Identity sync stopped");
    }
}
