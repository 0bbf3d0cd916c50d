//! Caller-facing lifecycle operations. Each one runs under the match's lock,
//! applies the change through [`Match`], then persists the new snapshot before
//! releasing the lock so saves for one match never overtake each other.

use tracing::{debug, info, warn};

use crate::{
    dao::models::MatchEntity,
    error::ServiceError,
    state::{
        SharedState,
        matches::{LifecycleError, Match, MatchDraft},
        records::{MatchId, MatchRecord, Player, PlayerId},
        state_machine::MatchPhase,
    },
};

/// Add a player to the directory and persist it.
pub async fn register_player(state: &SharedState, player: Player) -> Result<Player, ServiceError> {
    if player.name.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "player name must not be empty".into(),
        ));
    }
    if state.players().contains_key(&player.id) {
        return Err(ServiceError::InvalidInput(format!(
            "player `{}` is already registered",
            player.id
        )));
    }

    state.store().save_player(player.clone()).await?;
    state.players().insert(player.id, player.clone());
    debug!(player_id = %player.id, "player registered");
    Ok(player)
}

/// Create a match organized by a registered player and announce it to the roster.
pub async fn create_match(
    state: &SharedState,
    draft: MatchDraft,
    organizer: PlayerId,
) -> Result<MatchId, ServiceError> {
    let organizer = state.player(organizer)?;
    let fixture = Match::new(draft, organizer)?;
    let id = fixture.id();

    // Unsaved matches never enter the registry.
    persist(state, &fixture).await?;
    let handle = state.register_match(fixture);
    let fixture = handle.lock().await;
    fixture.announce();

    info!(
        match_id = %id,
        title = fixture.title(),
        sport = %fixture.sport().name,
        phase = %fixture.phase(),
        "match created"
    );
    Ok(id)
}

/// Add a registered player to the match roster.
pub async fn add_player(
    state: &SharedState,
    id: MatchId,
    player: PlayerId,
) -> Result<MatchPhase, ServiceError> {
    let player = state.player(player)?;
    run_operation(state, id, "add player", move |fixture| {
        fixture.add_player(player)
    })
    .await
}

/// Remove a player from the match roster.
pub async fn remove_player(
    state: &SharedState,
    id: MatchId,
    player: PlayerId,
) -> Result<MatchPhase, ServiceError> {
    run_operation(state, id, "remove player", move |fixture| {
        fixture.remove_player(player)
    })
    .await
}

/// Record a roster member's attendance confirmation.
pub async fn confirm_attendance(
    state: &SharedState,
    id: MatchId,
    player: PlayerId,
) -> Result<MatchPhase, ServiceError> {
    run_operation(state, id, "confirm attendance", move |fixture| {
        fixture.confirm_attendance(player)
    })
    .await
}

/// Kick off a confirmed match.
pub async fn start_match(state: &SharedState, id: MatchId) -> Result<MatchPhase, ServiceError> {
    run_operation(state, id, "start", Match::start).await
}

/// Finish a match in progress and append it to every participant's history.
///
/// The history is recorded even when saving the finished match fails, since a
/// finished match cannot be finished again.
pub async fn finish_match(state: &SharedState, id: MatchId) -> Result<MatchRecord, ServiceError> {
    let handle = state
        .match_handle(id)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))?;
    let mut fixture = handle.lock().await;

    let record = close(state, &mut fixture).await?;
    info!(match_id = %id, participants = record.participants.len(), "match finished");
    Ok(record)
}

/// Call off a match that has not started.
pub async fn cancel_match(state: &SharedState, id: MatchId) -> Result<MatchPhase, ServiceError> {
    run_operation(state, id, "cancel", Match::cancel).await
}

/// Current persisted view of a registered match.
pub async fn match_summary(state: &SharedState, id: MatchId) -> Result<MatchEntity, ServiceError> {
    state
        .read_match(id, |fixture| MatchEntity::from(fixture))
        .await
}

/// Bring a persisted match into the registry if it is not loaded yet.
pub async fn load_match(state: &SharedState, id: MatchId) -> Result<MatchPhase, ServiceError> {
    if let Some(handle) = state.match_handle(id) {
        let phase = handle.lock().await.phase();
        return Ok(phase);
    }

    let Some(entity) = state.store().find_match(id).await? else {
        return Err(ServiceError::NotFound(format!("match `{id}` not found")));
    };
    let fixture = Match::try_from(entity)?;
    let phase = fixture.phase();
    state.register_match(fixture);
    Ok(phase)
}

/// Load every persisted player and match into memory. Returns `(players, matches)`.
pub async fn restore(state: &SharedState) -> Result<(usize, usize), ServiceError> {
    let players = state.store().list_players().await?;
    let player_count = players.len();
    for player in players {
        state.players().insert(player.id, player);
    }

    let mut match_count = 0;
    for entity in state.store().list_matches().await? {
        let id = entity.id;
        match Match::try_from(entity) {
            Ok(fixture) => {
                state.register_match(fixture);
                match_count += 1;
            }
            Err(err) => warn!(match_id = %id, error = %err, "skipping unreadable match"),
        }
    }

    Ok((player_count, match_count))
}

/// Save the match snapshot. Callers hold the match lock.
pub(crate) async fn persist(state: &SharedState, fixture: &Match) -> Result<(), ServiceError> {
    state
        .store()
        .save_match(MatchEntity::from(fixture))
        .await
        .map_err(|err| {
            warn!(match_id = %fixture.id(), error = %err, "failed to persist match");
            ServiceError::from(err)
        })
}

/// Finish the locked match, record participation, then save the snapshot.
pub(crate) async fn close(
    state: &SharedState,
    fixture: &mut Match,
) -> Result<MatchRecord, ServiceError> {
    let record = fixture.finish()?;
    let saved = record_history(state, &record).await;
    debug!(
        match_id = %record.match_id,
        saved,
        participants = record.participants.len(),
        "participation history recorded"
    );
    persist(state, fixture).await?;
    Ok(record)
}

/// Append a finished match to each participant's history in the directory.
///
/// A participant whose save fails keeps the entry in memory and the rest are
/// still processed. Returns how many participants were saved.
pub(crate) async fn record_history(state: &SharedState, record: &MatchRecord) -> usize {
    let mut saved = 0;
    for participant in &record.participants {
        let updated = state.players().get_mut(participant).map(|mut entry| {
            entry.record_participation(record.clone());
            entry.value().clone()
        });

        let Some(player) = updated else {
            warn!(
                match_id = %record.match_id,
                player_id = %participant,
                "participant missing from directory; history not recorded"
            );
            continue;
        };

        match state.store().save_player(player).await {
            Ok(()) => saved += 1,
            Err(err) => warn!(
                match_id = %record.match_id,
                player_id = %participant,
                error = %err,
                "failed to persist participation history"
            ),
        }
    }
    saved
}

async fn run_operation<F, T>(
    state: &SharedState,
    id: MatchId,
    operation: &'static str,
    apply: F,
) -> Result<T, ServiceError>
where
    F: FnOnce(&mut Match) -> Result<T, LifecycleError>,
{
    let handle = state
        .match_handle(id)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))?;
    let mut fixture = handle.lock().await;

    let from = fixture.phase();
    let value = apply(&mut *fixture).map_err(|err| {
        debug!(match_id = %id, operation, error = %err, "operation rejected");
        err
    })?;
    persist(state, &fixture).await?;

    let to = fixture.phase();
    if from != to {
        info!(match_id = %id, operation, %from, %to, "match phase changed");
    }
    Ok(value)
}
