use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::slot_utils::{session_length, slot_instant};
use super::types::Scheduled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Booked,
    Unavailable,
}

impl SlotStatus {
    pub fn is_bookable(&self) -> bool {
        matches!(self, SlotStatus::Available)
    }
}

/// Classifies a slot for booking purposes.
///
/// A slot that has already started is `Unavailable` even when booked.
pub fn slot_status<T: Scheduled>(
    date: NaiveDate,
    time: NaiveTime,
    bookings: &[T],
    now: NaiveDateTime,
) -> SlotStatus {
    if slot_instant(date, time) <= now {
        return SlotStatus::Unavailable;
    }
    let booked = bookings.iter().any(|b| {
        let key = b.slot_key();
        key.date == date && key.time == time
    });
    if booked {
        SlotStatus::Booked
    } else {
        SlotStatus::Available
    }
}

/// Admin-side view of a booking: still to be played, or done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Completed,
}

pub fn session_state<T: Scheduled>(booking: &T, now: NaiveDateTime) -> SessionState {
    let key = booking.slot_key();
    if slot_instant(key.date, key.time) > now {
        SessionState::Active
    } else {
        SessionState::Completed
    }
}

/// True while `now` falls inside the booking's one-hour window.
pub fn is_live<T: Scheduled>(booking: &T, now: NaiveDateTime) -> bool {
    let key = booking.slot_key();
    let start = slot_instant(key.date, key.time);
    start <= now && now < start + session_length()
}
