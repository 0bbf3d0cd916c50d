//! The match aggregate: roster bookkeeping on top of [`MatchStateMachine`].
//!
//! Every operation validates first and mutates second, so a failed call leaves
//! the match untouched. Observers only hear about calls that changed the phase.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::state::{
    observer::{MatchObserver, Observers},
    records::{MatchId, MatchRecord, Player, PlayerId, SkillTier, Sport, Zone},
    state_machine::{InvalidTransition, MatchEvent, MatchPhase, MatchStateMachine, Snapshot},
};

/// Roster preconditions that a mutation violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterViolation {
    /// The player is already on the roster.
    #[error("player {0} is already on the roster")]
    AlreadyMember(PlayerId),
    /// The player is not on the roster.
    #[error("player {0} is not on the roster")]
    NotMember(PlayerId),
    /// The roster reached its absolute maximum.
    #[error("the roster is complete ({max} players)")]
    RosterComplete {
        /// Maximum roster size.
        max: usize,
    },
    /// The roster already holds the sport's required count while still recruiting.
    #[error("the roster already holds the {required} players the sport requires")]
    RosterOverflow {
        /// Required player count of the sport.
        required: usize,
    },
    /// The organizer cannot leave their own match.
    #[error("the organizer cannot leave the match")]
    OrganizerCannotLeave,
}

/// Errors raised by lifecycle operations on a [`Match`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The operation is not legal in the current phase.
    #[error(transparent)]
    IllegalTransition(#[from] InvalidTransition),
    /// A roster precondition does not hold.
    #[error(transparent)]
    Roster(#[from] RosterViolation),
}

/// Rejected match parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid match draft: {0}")]
pub struct InvalidDraft(pub String);

/// Parameters an organizer provides when creating a match.
#[derive(Debug, Clone)]
pub struct MatchDraft {
    /// Display title.
    pub title: String,
    /// Scheduled kick-off.
    pub scheduled_at: OffsetDateTime,
    /// Expected length in minutes.
    pub duration_minutes: u32,
    /// Where it is played, if known.
    pub zone: Option<Zone>,
    /// Sport being played.
    pub sport: Sport,
    /// Minimum tier candidates should hold.
    pub required_tier: Option<SkillTier>,
    /// Roster size under which a full roster reopens.
    pub min_players: usize,
    /// Absolute roster cap.
    pub max_players: usize,
}

impl MatchDraft {
    fn validate(&self) -> Result<(), InvalidDraft> {
        if self.title.trim().is_empty() {
            return Err(InvalidDraft("title must not be empty".into()));
        }
        if self.min_players == 0 {
            return Err(InvalidDraft("minimum roster size must be positive".into()));
        }
        if self.min_players > self.max_players {
            return Err(InvalidDraft(format!(
                "minimum roster size {} exceeds maximum {}",
                self.min_players, self.max_players
            )));
        }
        if self.sport.required_players == 0 || self.sport.required_players > self.max_players {
            return Err(InvalidDraft(format!(
                "{} requires {} players but the roster allows {}",
                self.sport.name, self.sport.required_players, self.max_players
            )));
        }
        // A roster reopened below `min` must be able to refill up to `required`.
        if self.min_players > self.sport.required_players {
            return Err(InvalidDraft(format!(
                "minimum roster size {} exceeds the {} players {} requires",
                self.min_players, self.sport.required_players, self.sport.name
            )));
        }
        if self.duration_minutes == 0 {
            return Err(InvalidDraft("duration must be strictly positive".into()));
        }
        Ok(())
    }
}

/// A scheduled sporting event and its roster.
#[derive(Debug, Clone)]
pub struct Match {
    pub(crate) id: MatchId,
    pub(crate) title: String,
    pub(crate) scheduled_at: OffsetDateTime,
    pub(crate) duration_minutes: u32,
    pub(crate) zone: Option<Zone>,
    pub(crate) sport: Sport,
    pub(crate) required_tier: Option<SkillTier>,
    pub(crate) organizer: PlayerId,
    pub(crate) roster: IndexMap<PlayerId, Player>,
    pub(crate) confirmed: IndexSet<PlayerId>,
    pub(crate) min_players: usize,
    pub(crate) max_players: usize,
    pub(crate) machine: MatchStateMachine,
    pub(crate) observers: Observers,
}

impl Match {
    /// Create a match in `NeedsPlayers` with the organizer as first roster member.
    ///
    /// No observer is attached yet, so creation itself is silent; call
    /// [`Match::announce`] once observers are in place.
    pub fn new(draft: MatchDraft, organizer: Player) -> Result<Self, InvalidDraft> {
        draft.validate()?;

        let MatchDraft {
            title,
            scheduled_at,
            duration_minutes,
            zone,
            sport,
            required_tier,
            min_players,
            max_players,
        } = draft;

        let mut fixture = Self {
            id: Uuid::new_v4(),
            title,
            scheduled_at,
            duration_minutes,
            zone,
            sport,
            required_tier,
            organizer: organizer.id,
            roster: IndexMap::new(),
            confirmed: IndexSet::new(),
            min_players,
            max_players,
            machine: MatchStateMachine::new(),
            observers: Observers::default(),
        };

        fixture
            .add_player(organizer)
            .map_err(|err| InvalidDraft(err.to_string()))?;
        Ok(fixture)
    }

    /// Identifier.
    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Scheduled kick-off.
    pub fn scheduled_at(&self) -> OffsetDateTime {
        self.scheduled_at
    }

    /// Expected length in minutes.
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Scheduled end: kick-off plus duration.
    pub fn ends_at(&self) -> OffsetDateTime {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Zone the match is played in.
    pub fn zone(&self) -> Option<&Zone> {
        self.zone.as_ref()
    }

    /// Sport being played.
    pub fn sport(&self) -> &Sport {
        &self.sport
    }

    /// Minimum tier expected from candidates.
    pub fn required_tier(&self) -> Option<SkillTier> {
        self.required_tier
    }

    /// Identifier of the organizer.
    pub fn organizer_id(&self) -> PlayerId {
        self.organizer
    }

    /// The organizer, as stored on the roster.
    pub fn organizer(&self) -> Option<&Player> {
        self.roster.get(&self.organizer)
    }

    /// Current roster in join order.
    pub fn roster(&self) -> impl Iterator<Item = &Player> {
        self.roster.values()
    }

    /// Number of players on the roster.
    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    /// Identifiers of players who confirmed attendance.
    pub fn confirmed(&self) -> &IndexSet<PlayerId> {
        &self.confirmed
    }

    /// Whether the player is on the roster.
    pub fn is_member(&self, player: PlayerId) -> bool {
        self.roster.contains_key(&player)
    }

    /// Roster size under which a full roster reopens.
    pub fn min_players(&self) -> usize {
        self.min_players
    }

    /// Absolute roster cap.
    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> MatchPhase {
        self.machine.phase()
    }

    /// Phase and version of the underlying state machine.
    pub fn snapshot(&self) -> Snapshot {
        self.machine.snapshot()
    }

    /// Subscribe to phase changes.
    pub fn attach(&mut self, observer: Arc<dyn MatchObserver>) {
        self.observers.attach(observer);
    }

    /// Unsubscribe exactly the given handle.
    pub fn detach(&mut self, observer: &Arc<dyn MatchObserver>) -> bool {
        self.observers.detach(observer)
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Tell every observer about the current phase without transitioning.
    pub fn announce(&self) {
        self.observers.notify(self);
    }

    /// Add a player to the roster, filling it when the sport's count is reached.
    pub fn add_player(&mut self, player: Player) -> Result<MatchPhase, LifecycleError> {
        let required = self.sport.required_players;

        match self.phase() {
            MatchPhase::NeedsPlayers => {
                if self.is_member(player.id) {
                    return Err(RosterViolation::AlreadyMember(player.id).into());
                }
                if self.roster.len() >= required {
                    return Err(RosterViolation::RosterOverflow { required }.into());
                }

                let fills = self.roster.len() + 1 == required;
                if fills {
                    self.machine.plan(MatchEvent::RosterFilled)?;
                }
                self.roster.insert(player.id, player);
                if fills {
                    self.transition(MatchEvent::RosterFilled)?;
                }
            }
            MatchPhase::RosterFull => {
                if self.is_member(player.id) {
                    return Err(RosterViolation::AlreadyMember(player.id).into());
                }
                if self.roster.len() >= self.max_players {
                    return Err(RosterViolation::RosterComplete {
                        max: self.max_players,
                    }
                    .into());
                }
                self.roster.insert(player.id, player);
            }
            phase => return Err(roster_locked(phase, "add player").into()),
        }

        Ok(self.phase())
    }

    /// Remove a player, reopening the roster when it drops below its threshold.
    pub fn remove_player(&mut self, player: PlayerId) -> Result<MatchPhase, LifecycleError> {
        let threshold = match self.phase() {
            MatchPhase::NeedsPlayers => None,
            MatchPhase::RosterFull => Some(self.min_players),
            MatchPhase::Confirmed => Some(self.sport.required_players),
            phase => return Err(roster_locked(phase, "remove player").into()),
        };

        if !self.is_member(player) {
            return Err(RosterViolation::NotMember(player).into());
        }
        if player == self.organizer {
            return Err(RosterViolation::OrganizerCannotLeave.into());
        }

        let reopens = threshold.is_some_and(|threshold| self.roster.len() - 1 < threshold);
        if reopens {
            self.machine.plan(MatchEvent::RosterOpened)?;
        }

        self.roster.shift_remove(&player);
        self.confirmed.shift_remove(&player);

        if reopens {
            self.transition(MatchEvent::RosterOpened)?;
        }

        Ok(self.phase())
    }

    /// Record a player's confirmation; the last one confirms the match.
    pub fn confirm_attendance(&mut self, player: PlayerId) -> Result<MatchPhase, LifecycleError> {
        let phase = self.phase();
        if matches!(
            phase,
            MatchPhase::InProgress | MatchPhase::Finished | MatchPhase::Cancelled
        ) {
            return Err(roster_locked(phase, "confirm attendance").into());
        }

        if !self.is_member(player) {
            return Err(RosterViolation::NotMember(player).into());
        }

        let newly_confirmed = !self.confirmed.contains(&player);
        let confirmed_after = self.confirmed.len() + usize::from(newly_confirmed);
        let everyone = confirmed_after == self.roster.len();

        if everyone {
            self.machine.plan(MatchEvent::ConfirmMatch)?;
        }

        self.confirmed.insert(player);

        if everyone {
            self.transition(MatchEvent::ConfirmMatch)?;
        }

        Ok(self.phase())
    }

    /// Kick off a confirmed match.
    pub fn start(&mut self) -> Result<MatchPhase, LifecycleError> {
        Ok(self.transition(MatchEvent::Start)?)
    }

    /// Close a match in progress and stamp it into every roster member's history.
    ///
    /// The returned record is what callers append to the player directory.
    pub fn finish(&mut self) -> Result<MatchRecord, LifecycleError> {
        self.machine.plan(MatchEvent::Finish)?;

        let record = self.record();
        for member in self.roster.values_mut() {
            member.record_participation(record.clone());
        }

        self.transition(MatchEvent::Finish)?;
        Ok(record)
    }

    /// Call off a match that has not started.
    pub fn cancel(&mut self) -> Result<MatchPhase, LifecycleError> {
        Ok(self.transition(MatchEvent::Cancel)?)
    }

    /// History entry describing this match as it stands.
    pub fn record(&self) -> MatchRecord {
        MatchRecord {
            match_id: self.id,
            title: self.title.clone(),
            sport: self.sport.name.clone(),
            organizer: self.organizer,
            participants: self.roster.keys().copied().collect(),
            scheduled_at: self.scheduled_at,
        }
    }

    fn transition(&mut self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        let from = self.phase();
        let next = self.machine.apply(event)?;
        debug!(match_id = %self.id, %from, to = %next, "match transitioned");
        self.observers.notify(self);
        Ok(next)
    }
}

fn roster_locked(phase: MatchPhase, attempted: &'static str) -> InvalidTransition {
    let reason = match phase {
        MatchPhase::Confirmed => "the roster is closed once the match is confirmed",
        MatchPhase::InProgress => "the roster is locked while the match is in progress",
        MatchPhase::Finished => "the match has already finished",
        MatchPhase::Cancelled => "the match has been cancelled",
        MatchPhase::NeedsPlayers | MatchPhase::RosterFull => {
            "operation not allowed in the current state"
        }
    };
    InvalidTransition::new(phase, attempted, reason)
}
