use tracing::info;

use crate::{
    error::ServiceError,
    services::{matching::StrategyKind, notification_service::invitation_notifications},
    state::{
        SharedState,
        records::{MatchId, Player},
    },
};

/// Rank the pool for a match without notifying anyone.
///
/// Falls back to the configured default strategy when `strategy` is `None`.
pub async fn find_candidates(
    state: &SharedState,
    id: MatchId,
    pool: &[Player],
    strategy: Option<StrategyKind>,
) -> Result<Vec<Player>, ServiceError> {
    let kind = strategy.unwrap_or(state.config().default_strategy);
    let limit = state.config().candidate_limit;
    let strategy = kind.build();

    state
        .read_match(id, |fixture| {
            let mut candidates = strategy.find_candidates(fixture, pool);
            candidates.truncate(limit);
            candidates
        })
        .await
}

/// Pick candidates for a match and send each one an invitation through the dispatcher.
pub async fn invite_candidates(
    state: &SharedState,
    id: MatchId,
    pool: &[Player],
    strategy: Option<StrategyKind>,
) -> Result<Vec<Player>, ServiceError> {
    let kind = strategy.unwrap_or(state.config().default_strategy);
    let limit = state.config().candidate_limit;
    let strategy = kind.build();

    let (candidates, notifications) = state
        .read_match(id, |fixture| {
            let mut candidates = strategy.find_candidates(fixture, pool);
            candidates.truncate(limit);
            let notifications = invitation_notifications(fixture, &candidates);
            (candidates, notifications)
        })
        .await?;

    info!(
        match_id = %id,
        strategy = strategy.description(),
        pool = pool.len(),
        invited = candidates.len(),
        "invitations dispatched"
    );
    state.dispatcher().dispatch(notifications);
    Ok(candidates)
}
