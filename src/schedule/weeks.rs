use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::availability::{slot_status, SlotStatus};
use super::slot_utils::{slot_times, week_dates, week_end, week_start};
use super::types::{DaySlots, DaySummary, Scheduled, Season, Slot, TimeEntry, Week};

/// Groups bookings into Monday-start weeks, earliest first.
///
/// Weeks come only from bookings, so an empty week never shows up here.
pub fn derive_weeks<T: Scheduled + Clone>(bookings: &[T]) -> Vec<Week<T>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<T>> = BTreeMap::new();
    for booking in bookings {
        grouped
            .entry(week_start(booking.date()))
            .or_default()
            .push(booking.clone());
    }
    grouped
        .into_iter()
        .map(|(start, bookings)| Week {
            start,
            end: week_end(start),
            bookings,
        })
        .collect()
}

/// 1-based week number relative to the season start; weeks before it count as week 1.
pub fn week_number(date: NaiveDate, season: &Season) -> i64 {
    let days = (week_start(date) - season.start).num_days();
    // whole weeks, truncated toward zero
    (days / 7).max(0) + 1
}

/// Every slot of the week containing `week_of`, with its status.
///
/// Days outside the season are reported as unavailable.
pub fn slots_for_week<T: Scheduled>(
    week_of: NaiveDate,
    bookings: &[T],
    now: NaiveDateTime,
    season: &Season,
) -> Vec<DaySlots> {
    week_dates(week_of)
        .into_iter()
        .map(|date| DaySlots {
            date,
            slots: slot_times()
                .map(|time| Slot {
                    date,
                    time,
                    status: if season.contains(date) {
                        slot_status(date, time, bookings, now)
                    } else {
                        SlotStatus::Unavailable
                    },
                })
                .collect(),
        })
        .collect()
}

/// Booking counts for each day of the week starting at `week_of`'s Monday.
pub fn day_summaries<T: Scheduled>(week_of: NaiveDate, bookings: &[T]) -> Vec<DaySummary> {
    week_dates(week_of)
        .into_iter()
        .map(|date| DaySummary {
            date,
            booked: bookings.iter().filter(|b| b.date() == date).count(),
        })
        .collect()
}

/// All times of `date`, each paired with the booking holding it.
pub fn time_listing<T: Scheduled>(date: NaiveDate, bookings: &[T]) -> Vec<TimeEntry<'_, T>> {
    slot_times()
        .map(|time| TimeEntry {
            time,
            booking: bookings.iter().find(|b| {
                let key = b.slot_key();
                key.date == date && key.time == time
            }),
        })
        .collect()
}

/// Position of the visitor's week view.
///
/// The anchor is any day inside the shown week; moving keeps the weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekCursor {
    anchor: NaiveDate,
}

impl WeekCursor {
    /// The week the schedule opens on: today, or the season start if that's later.
    pub fn initial(today: NaiveDate, season: &Season) -> Self {
        Self {
            anchor: today.max(season.start),
        }
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn start(&self) -> NaiveDate {
        week_start(self.anchor)
    }

    pub fn end(&self) -> NaiveDate {
        week_end(self.start())
    }

    pub fn next(&self, season: &Season) -> Option<Self> {
        let anchor = self.anchor + Duration::days(7);
        (anchor < season.end).then_some(Self { anchor })
    }

    /// Going back stops at the current real week.
    pub fn previous(&self, today: NaiveDate) -> Option<Self> {
        let anchor = self.anchor - Duration::days(7);
        (anchor >= week_start(today)).then_some(Self { anchor })
    }

    /// Resolves a requested week, accepting it only if stepping from the
    /// initial week could reach it.
    pub fn seek(requested: NaiveDate, today: NaiveDate, season: &Season) -> Option<Self> {
        let initial = Self::initial(today, season);
        let weeks = (week_start(requested) - initial.start()).num_days() / 7;
        let cursor = Self {
            anchor: initial.anchor + Duration::days(weeks * 7),
        };
        let reachable = match weeks {
            0 => true,
            w if w > 0 => cursor.anchor < season.end,
            _ => cursor.anchor >= week_start(today),
        };
        reachable.then_some(cursor)
    }
}
