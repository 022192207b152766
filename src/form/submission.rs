use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{NewPlayer, SlotKey, Team};
use crate::schedule::{parse_date, parse_slot_time, slot_instant, Season};

/// Players allowed per team.
pub const TEAM_SIZE: usize = 5;

/// Booking request from the frontend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReservationRequest {
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub team_a: Vec<String>,
    #[serde(default)]
    pub team_b: Vec<String>,
}

/// A request that passed validation, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationSubmission {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub players: Vec<NewPlayer>,
}

impl ReservationSubmission {
    pub fn slot(&self) -> SlotKey {
        SlotKey {
            date: self.date,
            time: self.time,
        }
    }
}

/// Lowercased, trimmed form used for every name comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Returns the first name (normalized) that appears more than once.
/// Blank names are ignored.
pub fn check_duplicates<S: AsRef<str>>(names: &[S]) -> Option<String> {
    let normalized: Vec<String> = names
        .iter()
        .map(|n| normalize_name(n.as_ref()))
        .filter(|n| !n.is_empty())
        .collect();
    normalized
        .iter()
        .enumerate()
        .find(|(i, name)| normalized[..*i].contains(name))
        .map(|(_, name)| name.clone())
}

/// Checks a roster for duplicate names and oversized teams.
pub fn validate_roster(players: &[NewPlayer]) -> Result<(), AppError> {
    for team in [Team::A, Team::B] {
        let count = players.iter().filter(|p| p.team == team).count();
        if count > TEAM_SIZE {
            return Err(AppError::TooManyPlayers {
                team: team.as_str(),
                count,
                max: TEAM_SIZE,
            });
        }
    }
    let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
    match check_duplicates(&names) {
        Some(duplicate) => Err(AppError::DuplicatePlayer(duplicate)),
        None => Ok(()),
    }
}

/// Non-empty names tagged with their team, team A first. Names keep their
/// spelling apart from surrounding whitespace.
pub fn roster_players<S: AsRef<str>>(team_a: &[S], team_b: &[S]) -> Vec<NewPlayer> {
    let tagged = |names: &[S], team: Team| -> Vec<NewPlayer> {
        names
            .iter()
            .map(|n| n.as_ref().trim())
            .filter(|n| !n.is_empty())
            .map(|n| NewPlayer::new(n, team))
            .collect()
    };
    let mut players = tagged(team_a, Team::A);
    players.extend(tagged(team_b, Team::B));
    players
}

pub fn parse_slot(date: &str, time: &str) -> Result<SlotKey, AppError> {
    let date = parse_date(date).ok_or_else(|| AppError::BadRequest(format!("invalid date {date:?}")))?;
    let time = parse_slot_time(time).ok_or_else(|| AppError::InvalidTime(time.to_string()))?;
    Ok(SlotKey { date, time })
}

/// Validates a booking request
pub fn validate_submission(
    req: &ReservationRequest,
    season: &Season,
    now: NaiveDateTime,
) -> Result<ReservationSubmission, AppError> {
    let slot = parse_slot(&req.date, &req.time)?;

    if !season.contains(slot.date) {
        return Err(AppError::OutOfSeason(slot.date));
    }
    if slot_instant(slot.date, slot.time) <= now {
        return Err(AppError::SlotUnavailable);
    }

    let players = roster_players(&req.team_a, &req.team_b);
    validate_roster(&players)?;

    Ok(ReservationSubmission {
        date: slot.date,
        time: slot.time,
        players,
    })
}
