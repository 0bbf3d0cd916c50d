use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    state::{
        matches::Match,
        observer::Observers,
        records::{Player, PlayerId, SkillTier, Sport, Zone},
        state_machine::{MatchPhase, MatchStateMachine},
    },
};

/// Persisted snapshot of a match. Observers are runtime wiring and are not stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchEntity {
    /// Stable identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Scheduled kick-off.
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    /// Expected length in minutes.
    pub duration_minutes: u32,
    /// Where it is played.
    pub zone: Option<Zone>,
    /// Sport being played.
    pub sport: Sport,
    /// Minimum tier expected from candidates.
    pub required_tier: Option<SkillTier>,
    /// Organizer identifier; must appear in `roster`.
    pub organizer: PlayerId,
    /// Roster members in join order.
    pub roster: Vec<Player>,
    /// Players who confirmed attendance.
    pub confirmed: Vec<PlayerId>,
    /// Roster size under which a full roster reopens.
    pub min_players: usize,
    /// Absolute roster cap.
    pub max_players: usize,
    /// Lifecycle phase.
    pub phase: MatchPhase,
    /// Number of transitions applied so far.
    pub version: usize,
}

impl From<&Match> for MatchEntity {
    fn from(value: &Match) -> Self {
        let snapshot = value.snapshot();
        Self {
            id: value.id,
            title: value.title.clone(),
            scheduled_at: value.scheduled_at,
            duration_minutes: value.duration_minutes,
            zone: value.zone.clone(),
            sport: value.sport.clone(),
            required_tier: value.required_tier,
            organizer: value.organizer,
            roster: value.roster.values().cloned().collect(),
            confirmed: value.confirmed.iter().copied().collect(),
            min_players: value.min_players,
            max_players: value.max_players,
            phase: snapshot.phase,
            version: snapshot.version,
        }
    }
}

impl TryFrom<MatchEntity> for Match {
    type Error = StorageError;

    fn try_from(value: MatchEntity) -> Result<Self, Self::Error> {
        let corrupted = |reason: String| StorageError::Corrupted {
            id: value.id.to_string(),
            reason,
        };

        let roster: IndexMap<PlayerId, Player> = value
            .roster
            .iter()
            .cloned()
            .map(|player| (player.id, player))
            .collect();
        let confirmed: IndexSet<PlayerId> = value.confirmed.iter().copied().collect();

        if !roster.contains_key(&value.organizer) {
            return Err(corrupted("organizer missing from roster".into()));
        }
        if roster.len() > value.max_players {
            return Err(corrupted(format!(
                "roster holds {} players, maximum is {}",
                roster.len(),
                value.max_players
            )));
        }
        if let Some(outsider) = confirmed.iter().find(|id| !roster.contains_key(*id)) {
            return Err(corrupted(format!(
                "confirmed player {outsider} is not on the roster"
            )));
        }

        Ok(Match {
            id: value.id,
            title: value.title,
            scheduled_at: value.scheduled_at,
            duration_minutes: value.duration_minutes,
            zone: value.zone,
            sport: value.sport,
            required_tier: value.required_tier,
            organizer: value.organizer,
            roster,
            confirmed,
            min_players: value.min_players,
            max_players: value.max_players,
            machine: MatchStateMachine::restore(value.phase, value.version),
            observers: Observers::default(),
        })
    }
}
