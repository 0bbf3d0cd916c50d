/// Match aggregate and roster rules.
pub mod matches;
/// Observer registration for match changes.
pub mod observer;
/// Passive records: players, zones, sports, notifications.
pub mod records;
/// Lifecycle phases and legal transitions.
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    config::AppConfig,
    dao::match_store::MatchStore,
    error::ServiceError,
    services::notification_service::NotificationDispatcher,
    state::{
        matches::Match,
        observer::MatchObserver,
        records::{MatchId, Player, PlayerId},
    },
};

pub use self::state_machine::{MatchPhase, Snapshot};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Per-match exclusion scope: every lifecycle operation runs under this lock.
pub type MatchHandle = Arc<Mutex<Match>>;

/// Central application state: match registry, player directory and collaborators.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn MatchStore>,
    dispatcher: Arc<NotificationDispatcher>,
    matches: DashMap<MatchId, MatchHandle>,
    players: DashMap<PlayerId, Player>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn MatchStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            store,
            dispatcher,
            matches: DashMap::new(),
            players: DashMap::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Persistence collaborator.
    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Notification dispatcher attached to every registered match.
    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    /// Player directory keyed by identifier.
    pub fn players(&self) -> &DashMap<PlayerId, Player> {
        &self.players
    }

    /// Look up a player by identifier.
    pub fn player(&self, id: PlayerId) -> Result<Player, ServiceError> {
        self.players
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("player `{id}` not found")))
    }

    /// Register a match, attaching the dispatcher, and return its handle.
    pub fn register_match(&self, mut fixture: Match) -> MatchHandle {
        let observer: Arc<dyn MatchObserver> = self.dispatcher.clone();
        fixture.attach(observer);
        let id = fixture.id();
        let handle = Arc::new(Mutex::new(fixture));
        self.matches.insert(id, handle.clone());
        handle
    }

    /// Handle of a registered match.
    ///
    /// The handle is cloned out of the map so no shard lock is held while the
    /// caller awaits the match lock.
    pub fn match_handle(&self, id: MatchId) -> Option<MatchHandle> {
        self.matches.get(&id).map(|entry| entry.value().clone())
    }

    /// Identifiers of every registered match.
    pub fn match_ids(&self) -> Vec<MatchId> {
        self.matches.iter().map(|entry| *entry.key()).collect()
    }

    /// Run `work` while holding the match's exclusion scope.
    pub async fn with_match_mut<F, T>(&self, id: MatchId, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Match) -> T,
    {
        let handle = self
            .match_handle(id)
            .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))?;
        let mut guard = handle.lock().await;
        Ok(work(&mut *guard))
    }

    /// Read a match while holding its exclusion scope.
    pub async fn read_match<F, T>(&self, id: MatchId, read: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Match) -> T,
    {
        self.with_match_mut(id, |fixture| read(fixture)).await
    }
}
