//! Candidate selection strategies used to build invitation lists.
//!
//! Every strategy shares the same base filter: the player practices the
//! match's sport, is not the organizer and is not already on the roster.
//! Results keep pool order and are truncated to [`MAX_CANDIDATES`].

use serde::{Deserialize, Serialize};

use crate::state::{matches::Match, records::Player};

/// Upper bound on the size of one invitation batch.
pub const MAX_CANDIDATES: usize = 20;

/// Pluggable algorithm ranking and filtering candidate players for a match.
pub trait MatchingStrategy: Send + Sync {
    /// Human readable description.
    fn description(&self) -> &'static str;

    /// Strategy-specific compatibility on top of the base filter.
    fn accepts(&self, fixture: &Match, player: &Player) -> bool;

    /// Whether the player could be invited to the match.
    fn is_compatible(&self, fixture: &Match, player: &Player) -> bool {
        base_compatible(fixture, player) && self.accepts(fixture, player)
    }

    /// Filter the pool into an ordered invitation list of at most [`MAX_CANDIDATES`].
    fn find_candidates(&self, fixture: &Match, pool: &[Player]) -> Vec<Player> {
        pool.iter()
            .filter(|player| self.is_compatible(fixture, player))
            .take(MAX_CANDIDATES)
            .cloned()
            .collect()
    }
}

/// Strategy kinds selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// [`ProximityStrategy`].
    #[default]
    Proximity,
    /// [`SkillTierStrategy`].
    SkillTier,
    /// [`HistoryStrategy`].
    History,
}

impl StrategyKind {
    /// Instantiate the strategy.
    pub fn build(self) -> Box<dyn MatchingStrategy> {
        match self {
            StrategyKind::Proximity => Box::new(ProximityStrategy),
            StrategyKind::SkillTier => Box::new(SkillTierStrategy),
            StrategyKind::History => Box::new(HistoryStrategy),
        }
    }
}

fn base_compatible(fixture: &Match, player: &Player) -> bool {
    player.practices(&fixture.sport().name)
        && player.id != fixture.organizer_id()
        && !fixture.is_member(player.id)
}

/// Players living in the same parent area as the match.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProximityStrategy;

impl MatchingStrategy for ProximityStrategy {
    fn description(&self) -> &'static str {
        "players from the same area as the match"
    }

    fn accepts(&self, fixture: &Match, player: &Player) -> bool {
        let Some(match_zone) = fixture.zone() else {
            return true;
        };
        player
            .zone
            .as_ref()
            .is_some_and(|zone| zone.shares_parent_area(match_zone))
    }
}

/// Players at or above the match's required tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkillTierStrategy;

impl MatchingStrategy for SkillTierStrategy {
    fn description(&self) -> &'static str {
        "players at or above the required skill tier"
    }

    fn accepts(&self, fixture: &Match, player: &Player) -> bool {
        let Some(required) = fixture.required_tier() else {
            return true;
        };
        player
            .tier_for(&fixture.sport().name)
            .is_some_and(|tier| tier >= required)
    }
}

/// Players who already shared a match with the organizer or organized this sport themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryStrategy;

impl MatchingStrategy for HistoryStrategy {
    fn description(&self) -> &'static str {
        "players who played with the organizer or organized this sport before"
    }

    fn accepts(&self, fixture: &Match, player: &Player) -> bool {
        let organizer = fixture.organizer_id();
        let sport = &fixture.sport().name;

        player.history.iter().any(|record| {
            record.involves(organizer) || (record.organizer == player.id && &record.sport == sport)
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::state::{
        matches::tests::{draft, player},
        records::{MatchRecord, SkillTier, Zone},
    };

    fn record(organizer: Uuid, participants: Vec<Uuid>, sport: &str) -> MatchRecord {
        MatchRecord {
            match_id: Uuid::new_v4(),
            title: "past match".into(),
            sport: sport.into(),
            organizer,
            participants,
            scheduled_at: datetime!(2026-01-10 18:00 UTC),
        }
    }

    #[test]
    fn proximity_keeps_same_parent_area() {
        let organizer = player("Ana");
        let fixture = Match::new(draft(4, 2, 6), organizer.clone()).unwrap();

        let near = player("Bruno").with_zone(Zone::new("Belgrano", "Buenos Aires"));
        let far = player("Carla").with_zone(Zone::new("Centro", "Córdoba"));
        let nowhere = player("Diego");

        let candidates =
            ProximityStrategy.find_candidates(&fixture, &[far, near.clone(), nowhere, organizer]);
        assert_eq!(candidates, vec![near]);
    }

    #[test]
    fn proximity_without_match_zone_accepts_everyone() {
        let mut setup = draft(4, 2, 6);
        setup.zone = None;
        let fixture = Match::new(setup, player("Ana")).unwrap();

        let pool = vec![
            player("Bruno").with_zone(Zone::new("Centro", "Córdoba")),
            player("Carla"),
        ];
        assert_eq!(ProximityStrategy.find_candidates(&fixture, &pool).len(), 2);
    }

    #[test]
    fn base_filter_excludes_roster_and_other_sports() {
        let mut fixture = Match::new(draft(4, 2, 6), player("Ana")).unwrap();
        let member = player("Bruno").with_zone(Zone::new("Belgrano", "Buenos Aires"));
        fixture.add_player(member.clone()).unwrap();

        let tennis_only = Player::new("Carla", "carla@example.com")
            .with_zone(Zone::new("Belgrano", "Buenos Aires"))
            .with_sport("tennis", Some(SkillTier::Advanced), true);

        assert!(!ProximityStrategy.is_compatible(&fixture, &member));
        assert!(!ProximityStrategy.is_compatible(&fixture, &tennis_only));
    }

    #[test]
    fn skill_tier_requires_at_least_the_match_tier() {
        let mut setup = draft(4, 2, 6);
        setup.required_tier = Some(SkillTier::Intermediate);
        let fixture = Match::new(setup, player("Ana")).unwrap();

        let beginner = Player::new("Bruno", "bruno@example.com").with_sport(
            "futsal",
            Some(SkillTier::Beginner),
            false,
        );
        let advanced = Player::new("Carla", "carla@example.com").with_sport(
            "futsal",
            Some(SkillTier::Advanced),
            false,
        );
        let undeclared = Player::new("Diego", "diego@example.com").with_sport("futsal", None, true);

        let candidates =
            SkillTierStrategy.find_candidates(&fixture, &[beginner, advanced.clone(), undeclared]);
        assert_eq!(candidates, vec![advanced]);
    }

    #[test]
    fn skill_tier_without_requirement_accepts_practitioners() {
        let fixture = Match::new(draft(4, 2, 6), player("Ana")).unwrap();
        let undeclared = Player::new("Diego", "diego@example.com").with_sport("futsal", None, true);
        assert!(SkillTierStrategy.is_compatible(&fixture, &undeclared));
    }

    #[test]
    fn history_requires_shared_past_or_own_organizing() {
        let organizer = player("Ana");
        let fixture = Match::new(draft(4, 2, 6), organizer.clone()).unwrap();

        let mut teammate = player("Bruno");
        teammate.record_participation(record(organizer.id, vec![organizer.id, teammate.id], "futsal"));

        let mut host = player("Carla");
        host.record_participation(record(host.id, vec![host.id], "futsal"));

        let mut other_sport_host = player("Diego");
        other_sport_host.record_participation(record(
            other_sport_host.id,
            vec![other_sport_host.id],
            "basketball",
        ));

        let stranger = player("Elena");

        let candidates = HistoryStrategy.find_candidates(
            &fixture,
            &[stranger, other_sport_host, host.clone(), teammate.clone()],
        );
        assert_eq!(candidates, vec![host, teammate]);
    }

    #[test]
    fn candidates_are_capped_in_pool_order() {
        let fixture = Match::new(draft(4, 2, 6), player("Ana")).unwrap();
        let pool: Vec<Player> = (0..30)
            .map(|i| player(&format!("P{i}")).with_zone(Zone::new("Palermo", "Buenos Aires")))
            .collect();

        let candidates = ProximityStrategy.find_candidates(&fixture, &pool);
        assert_eq!(candidates.len(), MAX_CANDIDATES);
        assert_eq!(candidates[0].id, pool[0].id);
        assert_eq!(candidates[19].id, pool[19].id);
    }

    #[test]
    fn kinds_build_matching_strategies() {
        assert_eq!(
            StrategyKind::SkillTier.build().description(),
            SkillTierStrategy.description()
        );
        let kind: StrategyKind = serde_json::from_str("\"history\"").unwrap();
        assert_eq!(kind, StrategyKind::History);
    }
}
