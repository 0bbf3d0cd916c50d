use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle phases a match moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Freshly created; the roster is still below the sport's required count.
    NeedsPlayers,
    /// Enough players joined; waiting for everyone to confirm attendance.
    RosterFull,
    /// Every roster member confirmed; waiting for the scheduled start.
    Confirmed,
    /// The match is being played.
    InProgress,
    /// The match is over. Terminal.
    Finished,
    /// The match was called off before it started. Terminal.
    Cancelled,
}

impl MatchPhase {
    /// Whether no further mutation is legal in this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchPhase::Finished | MatchPhase::Cancelled)
    }

    /// Human readable label used in notification titles and logs.
    pub fn label(self) -> &'static str {
        match self {
            MatchPhase::NeedsPlayers => "needs players",
            MatchPhase::RosterFull => "roster full",
            MatchPhase::Confirmed => "confirmed",
            MatchPhase::InProgress => "in progress",
            MatchPhase::Finished => "finished",
            MatchPhase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// The roster reached the sport's required count.
    RosterFilled,
    /// The roster dropped below the threshold that keeps it full or confirmed.
    RosterOpened,
    /// Every roster member confirmed attendance.
    ConfirmMatch,
    /// Kick-off.
    Start,
    /// Final whistle.
    Finish,
    /// The match is called off.
    Cancel,
}

impl fmt::Display for MatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchEvent::RosterFilled => "roster filled",
            MatchEvent::RosterOpened => "roster opened",
            MatchEvent::ConfirmMatch => "confirm",
            MatchEvent::Start => "start",
            MatchEvent::Finish => "finish",
            MatchEvent::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Error returned when an operation is not legal in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition: {reason} (attempted {attempted} while {from})")]
pub struct InvalidTransition {
    /// Phase the match was in when the operation was attempted.
    pub from: MatchPhase,
    /// Name of the attempted operation.
    pub attempted: &'static str,
    /// Phase-specific explanation.
    pub reason: &'static str,
}

impl InvalidTransition {
    pub(crate) fn new(from: MatchPhase, attempted: &'static str, reason: &'static str) -> Self {
        Self {
            from,
            attempted,
            reason,
        }
    }
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: MatchPhase,
    /// Number of transitions applied so far.
    pub version: usize,
}

/// Holds exactly one phase and replaces it wholesale on each transition.
#[derive(Debug, Clone)]
pub struct MatchStateMachine {
    phase: MatchPhase,
    version: usize,
}

impl Default for MatchStateMachine {
    fn default() -> Self {
        Self {
            phase: MatchPhase::NeedsPlayers,
            version: 0,
        }
    }
}

impl MatchStateMachine {
    /// Create a new state machine in the initial phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state machine from a persisted phase and version.
    pub fn restore(phase: MatchPhase, version: usize) -> Self {
        Self { phase, version }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
        }
    }

    /// Validate an event against the current phase without applying it.
    pub fn plan(&self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        compute_transition(self.phase, event)
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: MatchEvent) -> Result<MatchPhase, InvalidTransition> {
        let next = compute_transition(self.phase, event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }
}

/// Compute the next phase for an event if the transition is valid.
fn compute_transition(
    phase: MatchPhase,
    event: MatchEvent,
) -> Result<MatchPhase, InvalidTransition> {
    use MatchEvent as E;
    use MatchPhase as P;

    let next = match (phase, event) {
        (P::NeedsPlayers, E::RosterFilled) => P::RosterFull,
        (P::RosterFull | P::Confirmed, E::RosterOpened) => P::NeedsPlayers,
        (P::RosterFull, E::ConfirmMatch) => P::Confirmed,
        (P::Confirmed, E::Start) => P::InProgress,
        (P::InProgress, E::Finish) => P::Finished,
        (P::NeedsPlayers | P::RosterFull | P::Confirmed, E::Cancel) => P::Cancelled,
        (from, event) => {
            return Err(InvalidTransition::new(
                from,
                event_name(event),
                reason(from, event),
            ));
        }
    };

    Ok(next)
}

fn event_name(event: MatchEvent) -> &'static str {
    match event {
        MatchEvent::RosterFilled => "fill roster",
        MatchEvent::RosterOpened => "reopen roster",
        MatchEvent::ConfirmMatch => "confirm match",
        MatchEvent::Start => "start",
        MatchEvent::Finish => "finish",
        MatchEvent::Cancel => "cancel",
    }
}

fn reason(from: MatchPhase, event: MatchEvent) -> &'static str {
    use MatchEvent as E;
    use MatchPhase as P;

    match (from, event) {
        (P::Finished, _) => "the match has already finished",
        (P::Cancelled, _) => "the match has been cancelled",
        (P::NeedsPlayers, E::ConfirmMatch) => "the roster is not complete yet",
        (P::Confirmed, E::ConfirmMatch) => "the match is already confirmed",
        (P::InProgress, E::ConfirmMatch) => "the match has already started",
        (P::InProgress, E::Start) => "the match has already started",
        (_, E::Start) => "cannot start a match that is not confirmed",
        (_, E::Finish) => "cannot finish a match that is not in progress",
        (P::InProgress, E::Cancel) => "cannot cancel a match that is in progress",
        (P::InProgress, _) => "the roster is locked while the match is in progress",
        (_, E::RosterFilled) => "the roster is already full",
        (_, E::RosterOpened) => "the roster is not full",
        _ => "operation not allowed in the current state",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut MatchStateMachine, event: MatchEvent) -> MatchPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_needs_players() {
        let sm = MatchStateMachine::new();
        assert_eq!(sm.phase(), MatchPhase::NeedsPlayers);
        assert_eq!(sm.snapshot().version, 0);
    }

    #[test]
    fn full_happy_path_through_match() {
        let mut sm = MatchStateMachine::new();

        assert_eq!(apply(&mut sm, MatchEvent::RosterFilled), MatchPhase::RosterFull);
        assert_eq!(apply(&mut sm, MatchEvent::ConfirmMatch), MatchPhase::Confirmed);
        assert_eq!(apply(&mut sm, MatchEvent::Start), MatchPhase::InProgress);
        assert_eq!(apply(&mut sm, MatchEvent::Finish), MatchPhase::Finished);
        assert_eq!(sm.snapshot().version, 4);
    }

    #[test]
    fn roster_can_reopen_from_full_and_confirmed() {
        let mut sm = MatchStateMachine::new();
        apply(&mut sm, MatchEvent::RosterFilled);
        assert_eq!(apply(&mut sm, MatchEvent::RosterOpened), MatchPhase::NeedsPlayers);

        apply(&mut sm, MatchEvent::RosterFilled);
        apply(&mut sm, MatchEvent::ConfirmMatch);
        assert_eq!(apply(&mut sm, MatchEvent::RosterOpened), MatchPhase::NeedsPlayers);
    }

    #[test]
    fn start_requires_confirmed() {
        let mut sm = MatchStateMachine::new();
        let err = sm.apply(MatchEvent::Start).unwrap_err();
        assert_eq!(err.from, MatchPhase::NeedsPlayers);
        assert_eq!(err.reason, "cannot start a match that is not confirmed");

        apply(&mut sm, MatchEvent::RosterFilled);
        let err = sm.apply(MatchEvent::Start).unwrap_err();
        assert_eq!(err.from, MatchPhase::RosterFull);
        assert_eq!(sm.phase(), MatchPhase::RosterFull);
    }

    #[test]
    fn cancel_only_before_kick_off() {
        for path in [
            vec![],
            vec![MatchEvent::RosterFilled],
            vec![MatchEvent::RosterFilled, MatchEvent::ConfirmMatch],
        ] {
            let mut sm = MatchStateMachine::new();
            for event in path {
                apply(&mut sm, event);
            }
            assert_eq!(apply(&mut sm, MatchEvent::Cancel), MatchPhase::Cancelled);
            assert!(sm.apply(MatchEvent::Cancel).is_err());
        }

        let mut sm = MatchStateMachine::restore(MatchPhase::InProgress, 3);
        let err = sm.apply(MatchEvent::Cancel).unwrap_err();
        assert_eq!(err.reason, "cannot cancel a match that is in progress");
    }

    #[test]
    fn terminal_phases_reject_everything() {
        for phase in [MatchPhase::Finished, MatchPhase::Cancelled] {
            let sm = MatchStateMachine::restore(phase, 5);
            for event in [
                MatchEvent::RosterFilled,
                MatchEvent::RosterOpened,
                MatchEvent::ConfirmMatch,
                MatchEvent::Start,
                MatchEvent::Finish,
                MatchEvent::Cancel,
            ] {
                assert!(sm.plan(event).is_err(), "{event} accepted while {phase}");
            }
        }
    }

    #[test]
    fn confirm_reasons_distinguish_not_ready_and_already_confirmed() {
        let sm = MatchStateMachine::new();
        assert_eq!(
            sm.plan(MatchEvent::ConfirmMatch).unwrap_err().reason,
            "the roster is not complete yet"
        );

        let sm = MatchStateMachine::restore(MatchPhase::Confirmed, 2);
        assert_eq!(
            sm.plan(MatchEvent::ConfirmMatch).unwrap_err().reason,
            "the match is already confirmed"
        );
    }
}
