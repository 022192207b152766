use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::display::{format_week_range, pluralize_bookings};
use crate::form::normalize_name;
use crate::models::BookingWithPlayers;
use crate::schedule::{derive_weeks, is_live, week_number, Scheduled, Season};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedPlayer {
    pub name: String,
    pub matches_played: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekOverview {
    pub week_number: i64,
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
    pub label: String,
    pub bookings: usize,
    pub badge: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_bookings: usize,
    pub todays_bookings: usize,
    pub live_session: bool,
    pub total_players: usize,
    pub ranking: Vec<RankedPlayer>,
    pub weeks: Vec<WeekOverview>,
}

/// Players by matches played, most first.
///
/// Names are merged case-insensitively; equal counts keep the order in which
/// the names were first seen.
pub fn rank_players(bookings: &[BookingWithPlayers]) -> Vec<RankedPlayer> {
    let mut ranking: Vec<RankedPlayer> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for player in bookings.iter().flat_map(|b| &b.players) {
        let name = normalize_name(&player.name);
        match positions.get(&name) {
            Some(&i) => ranking[i].matches_played += 1,
            None => {
                positions.insert(name.clone(), ranking.len());
                ranking.push(RankedPlayer {
                    name,
                    matches_played: 1,
                });
            }
        }
    }

    // stable sort keeps encounter order for ties
    ranking.sort_by(|a, b| b.matches_played.cmp(&a.matches_played));
    ranking
}

pub fn todays_bookings<T: Scheduled>(bookings: &[T], now: NaiveDateTime) -> usize {
    let today = now.date();
    bookings.iter().filter(|b| b.date() == today).count()
}

pub fn live_session<T: Scheduled>(bookings: &[T], now: NaiveDateTime) -> bool {
    bookings.iter().any(|b| is_live(b, now))
}

pub fn booked_weeks(bookings: &[BookingWithPlayers], season: &Season) -> Vec<WeekOverview> {
    derive_weeks(bookings)
        .into_iter()
        .map(|week| WeekOverview {
            week_number: week_number(week.start, season),
            start: week.start,
            end: week.end,
            label: format_week_range(week.start, week.end),
            bookings: week.bookings.len(),
            badge: pluralize_bookings(week.bookings.len()),
        })
        .collect()
}

pub fn compute_stats(bookings: &[BookingWithPlayers], now: NaiveDateTime, season: &Season) -> DashboardStats {
    let ranking = rank_players(bookings);
    DashboardStats {
        total_bookings: bookings.len(),
        todays_bookings: todays_bookings(bookings, now),
        live_session: live_session(bookings, now),
        total_players: ranking.len(),
        ranking,
        weeks: booked_weeks(bookings, season),
    }
}
