//! Time-driven transitions: confirmed matches kick off, running matches end.
//!
//! Each sweep takes the same per-match lock as caller-driven operations, so a
//! match can never be started or finished twice. A failure on one match is
//! logged and the sweep moves on. A transition that applied but could not be
//! saved still counts as done; only its snapshot is retried.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::{
    error::ServiceError,
    services::match_service::{close, persist},
    state::{SharedState, matches::Match, records::MatchId, state_machine::MatchPhase},
};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Matches moved to `InProgress`.
    pub started: Vec<MatchId>,
    /// Matches moved to `Finished`.
    pub finished: Vec<MatchId>,
    /// Matches that moved on but whose new snapshot could not be saved.
    pub unsaved: Vec<MatchId>,
    /// Matches whose transition was rejected.
    pub failed: Vec<MatchId>,
}

impl SweepReport {
    /// Whether the sweep changed nothing.
    pub fn is_idle(&self) -> bool {
        self.started.is_empty()
            && self.finished.is_empty()
            && self.unsaved.is_empty()
            && self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Due {
    Start,
    Finish,
}

fn due(fixture: &Match, now: OffsetDateTime, tolerance: Duration) -> Option<Due> {
    match fixture.phase() {
        MatchPhase::Confirmed if now >= fixture.scheduled_at() - tolerance => Some(Due::Start),
        MatchPhase::InProgress if now >= fixture.ends_at() => Some(Due::Finish),
        _ => None,
    }
}

/// Scan every registered match once against `now`.
pub async fn sweep(state: &SharedState, now: OffsetDateTime) -> SweepReport {
    let tolerance = state.config().start_tolerance;
    let mut report = SweepReport::default();

    for id in state.match_ids() {
        let Some(handle) = state.match_handle(id) else {
            continue;
        };
        let mut fixture = handle.lock().await;

        let Some(action) = due(&fixture, now, tolerance) else {
            continue;
        };

        let before = fixture.phase();
        let outcome = match action {
            Due::Start => start(state, &mut fixture).await,
            Due::Finish => close(state, &mut fixture).await.map(|_| ()),
        };
        let advanced = fixture.phase() != before;
        drop(fixture);

        if advanced {
            match action {
                Due::Start => report.started.push(id),
                Due::Finish => report.finished.push(id),
            }
        }
        match (outcome, advanced) {
            (Ok(()), _) => {}
            (Err(err), true) => {
                warn!(match_id = %id, ?action, error = %err, "transition applied but not saved");
                report.unsaved.push(id);
            }
            (Err(err), false) => {
                warn!(match_id = %id, ?action, error = %err, "scheduled transition failed");
                report.failed.push(id);
            }
        }
    }

    if !report.is_idle() {
        info!(
            started = report.started.len(),
            finished = report.finished.len(),
            unsaved = report.unsaved.len(),
            failed = report.failed.len(),
            "sweep completed"
        );
    }
    report
}

async fn start(state: &SharedState, fixture: &mut Match) -> Result<(), ServiceError> {
    fixture.start()?;
    persist(state, fixture).await
}

/// Save the current snapshot of each listed match again.
///
/// Returns the matches that still could not be saved.
pub async fn resave(state: &SharedState, ids: &[MatchId]) -> Vec<MatchId> {
    let mut pending = Vec::new();
    for &id in ids {
        let Some(handle) = state.match_handle(id) else {
            continue;
        };
        let fixture = handle.lock().await;
        match persist(state, &fixture).await {
            Ok(()) => debug!(match_id = %id, phase = %fixture.phase(), "snapshot saved on retry"),
            Err(_) => pending.push(id),
        }
    }
    pending
}

/// Sweep on a fixed interval until the task is dropped.
///
/// Snapshots left unsaved by one sweep are retried at the start of the next.
pub async fn run(state: SharedState) {
    let period = state.config().sweep_interval;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(?period, "sweeper running");

    let mut unsaved: Vec<MatchId> = Vec::new();
    loop {
        ticker.tick().await;
        unsaved = resave(&state, &unsaved).await;
        let report = sweep(&state, OffsetDateTime::now_utc()).await;
        for id in report.unsaved {
            if !unsaved.contains(&id) {
                unsaved.push(id);
            }
        }
    }
}
