mod memory;

pub use memory::InMemoryStore;

use crate::dao::models::MatchEntity;
use crate::dao::storage::StorageResult;
use crate::state::records::{MatchId, Player, PlayerId};
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for matches and players.
pub trait MatchStore: Send + Sync {
    fn save_match(&self, fixture: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_match(&self, id: MatchId) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn list_matches(&self) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    fn save_player(&self, player: Player) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<Player>>>;
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<Player>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
