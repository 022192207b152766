use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{Booking, BookingWithPlayers, SlotKey};

use super::availability::SlotStatus;

/// Anything that occupies a slot on the calendar.
pub trait Scheduled {
    fn slot_key(&self) -> SlotKey;

    fn date(&self) -> NaiveDate {
        self.slot_key().date
    }
}

impl Scheduled for Booking {
    fn slot_key(&self) -> SlotKey {
        self.slot()
    }
}

impl Scheduled for BookingWithPlayers {
    fn slot_key(&self) -> SlotKey {
        self.booking.slot()
    }
}

impl Scheduled for SlotKey {
    fn slot_key(&self) -> SlotKey {
        *self
    }
}

/// The calendar range within which bookings may be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for Season {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 9, 16).expect("valid season start"),
            end: NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid season end"),
        }
    }
}

impl Season {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A booked week: Monday-start range plus the bookings inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Week<T> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub bookings: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: SlotStatus,
}

/// One column of the visitor grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Per-day booking count shown when drilling into a booked week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub booked: usize,
}

/// One row of a day's time listing, with the booking holding it if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeEntry<'a, T> {
    pub time: NaiveTime,
    pub booking: Option<&'a T>,
}
