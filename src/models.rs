use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One reserved hour of field time.
///
/// `date` and `time` serialize to the canonical `yyyy-MM-dd` / `HH:MM:SS`
/// encodings, so two bookings occupy the same slot exactly when both fields
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Booking {
    pub fn slot(&self) -> SlotKey {
        SlotKey {
            date: self.date,
            time: self.time,
        }
    }
}

/// Identity of a slot, used to key local caches and form drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::A => "A",
            Team::B => "B",
        }
    }

    pub fn parse(value: &str) -> Option<Team> {
        match value.trim() {
            "A" | "a" => Some(Team::A),
            "B" | "b" => Some(Team::B),
            _ => None,
        }
    }
}

/// A roster entry as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub booking_id: i64,
    pub name: String,
    pub team: Team,
}

/// A roster entry that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlayer {
    pub name: String,
    pub team: Team,
}

impl NewPlayer {
    pub fn new(name: impl Into<String>, team: Team) -> Self {
        Self {
            name: name.into(),
            team,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWithPlayers {
    #[serde(flatten)]
    pub booking: Booking,
    pub players: Vec<Player>,
}

impl BookingWithPlayers {
    pub fn team(&self, team: Team) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(move |p| p.team == team)
    }

    /// Team A first, original order kept within a team.
    pub fn sort_players_by_team(&mut self) {
        self.players.sort_by_key(|p| p.team != Team::A);
    }
}
