use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::{self, BoxFuture};

use super::MatchStore;
use crate::{
    dao::{
        models::MatchEntity,
        storage::{StorageError, StorageResult},
    },
    state::records::{MatchId, Player, PlayerId},
};

#[derive(Debug)]
struct Offline;

impl fmt::Display for Offline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("in-memory store switched offline")
    }
}

impl std::error::Error for Offline {}

/// Process-local store backed by concurrent maps.
///
/// Can be switched offline to exercise degraded paths.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    matches: Arc<DashMap<MatchId, MatchEntity>>,
    players: Arc<DashMap<PlayerId, Player>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle availability; while offline every operation fails.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self, operation: &str) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                format!("cannot {operation}"),
                Offline,
            ));
        }
        Ok(())
    }
}

impl MatchStore for InMemoryStore {
    fn save_match(&self, fixture: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online("save match").map(|()| {
            self.matches.insert(fixture.id, fixture);
        });
        Box::pin(future::ready(result))
    }

    fn find_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let result = self
            .ensure_online("find match")
            .map(|()| self.matches.get(&id).map(|entry| entry.value().clone()));
        Box::pin(future::ready(result))
    }

    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let result = self.ensure_online("list matches").map(|()| {
            self.matches
                .iter()
                .map(|entry| entry.value().clone())
                .collect()
        });
        Box::pin(future::ready(result))
    }

    fn save_player(&self, player: Player) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online("save player").map(|()| {
            self.players.insert(player.id, player);
        });
        Box::pin(future::ready(result))
    }

    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<Player>>> {
        let result = self
            .ensure_online("find player")
            .map(|()| self.players.get(&id).map(|entry| entry.value().clone()));
        Box::pin(future::ready(result))
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<Player>>> {
        let result = self.ensure_online("list players").map(|()| {
            self.players
                .iter()
                .map(|entry| entry.value().clone())
                .collect()
        });
        Box::pin(future::ready(result))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(self.ensure_online("reach storage")))
    }
}
