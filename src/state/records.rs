use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Identifier of a match.
pub type MatchId = Uuid;
/// Identifier of a registered player.
pub type PlayerId = Uuid;

/// Named geographic area used for proximity matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// District / barrio name.
    pub district: String,
    /// Name of the enclosing area (city, province...).
    pub parent_area: String,
    /// Optional `(latitude, longitude)` pair.
    pub coordinates: Option<(f64, f64)>,
}

impl Zone {
    /// Build a zone without coordinates.
    pub fn new(district: impl Into<String>, parent_area: impl Into<String>) -> Self {
        Self {
            district: district.into(),
            parent_area: parent_area.into(),
            coordinates: None,
        }
    }

    /// Whether both zones sit inside the same parent area.
    pub fn shares_parent_area(&self, other: &Zone) -> bool {
        self.parent_area == other.parent_area
    }
}

/// Sport reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sport {
    /// Unique sport name, also the key of [`Player::sports`].
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Number of players that make a full roster.
    pub required_players: usize,
}

impl Sport {
    /// Build a sport with an empty description.
    pub fn new(name: impl Into<String>, required_players: usize) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required_players,
        }
    }
}

/// Ordered proficiency level a player holds per sport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTier {
    /// Just getting started.
    Beginner,
    /// Plays regularly.
    Intermediate,
    /// Competitive level.
    Advanced,
}

/// What a player declared about one sport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportSkill {
    /// Declared tier, if any.
    pub tier: Option<SkillTier>,
    /// Whether the player marked the sport as a favorite.
    pub favorite: bool,
}

/// Snapshot of a finished match kept in a player's participation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Identifier of the finished match.
    pub match_id: MatchId,
    /// Title at the time it finished.
    pub title: String,
    /// Sport name.
    pub sport: String,
    /// Who organized it.
    pub organizer: PlayerId,
    /// Everyone on the roster when it finished, organizer included.
    pub participants: Vec<PlayerId>,
    /// Scheduled kick-off.
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
}

impl MatchRecord {
    /// Whether the given player organized or played in this match.
    pub fn involves(&self, player: PlayerId) -> bool {
        self.organizer == player || self.participants.contains(&player)
    }
}

/// Registered player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Device token for push notifications.
    pub push_token: Option<String>,
    /// Home zone, if the player set one.
    pub zone: Option<Zone>,
    /// Practiced sports keyed by sport name.
    pub sports: IndexMap<String, SportSkill>,
    /// Matches the player took part in. Append-only.
    pub history: Vec<MatchRecord>,
}

impl Player {
    /// Register a new player with a fresh identifier.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            push_token: None,
            zone: None,
            sports: IndexMap::new(),
            history: Vec::new(),
        }
    }

    /// Set the home zone.
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = Some(zone);
        self
    }

    /// Set the push notification token.
    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    /// Declare a practiced sport.
    pub fn with_sport(mut self, sport: &str, tier: Option<SkillTier>, favorite: bool) -> Self {
        self.set_sport(sport, tier, favorite);
        self
    }

    /// Insert or replace the skill entry for a sport.
    pub fn set_sport(&mut self, sport: &str, tier: Option<SkillTier>, favorite: bool) {
        self.sports
            .insert(sport.to_string(), SportSkill { tier, favorite });
    }

    /// Whether the player practices the given sport.
    pub fn practices(&self, sport: &str) -> bool {
        self.sports.contains_key(sport)
    }

    /// Tier declared for a sport.
    pub fn tier_for(&self, sport: &str) -> Option<SkillTier> {
        self.sports.get(sport).and_then(|skill| skill.tier)
    }

    /// Append a finished match unless it is already recorded.
    pub fn record_participation(&mut self, record: MatchRecord) {
        if self
            .history
            .iter()
            .any(|existing| existing.match_id == record.match_id)
        {
            return;
        }
        self.history.push(record);
    }
}

/// Addressing data a channel needs to reach a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Push device token.
    pub push_token: Option<String>,
}

impl From<&Player> for Recipient {
    fn from(player: &Player) -> Self {
        Self {
            player_id: player.id,
            name: player.name.clone(),
            email: player.email.clone(),
            push_token: player.push_token.clone(),
        }
    }
}

/// Outbound message for a single player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier.
    pub id: Uuid,
    /// Short headline.
    pub title: String,
    /// Message text.
    pub body: String,
    /// Who receives it.
    pub recipient: Recipient,
    /// When the dispatcher built it.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Set once the recipient has read it.
    pub read: bool,
}

impl Notification {
    /// Build an unread notification stamped with the current time.
    pub fn new(title: impl Into<String>, body: impl Into<String>, recipient: Recipient) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            recipient,
            created_at: OffsetDateTime::now_utc(),
            read: false,
        }
    }

    /// Flag the notification as read.
    pub fn mark_read(&mut self) {
        self.read = true;
    }
}
