use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Hour of the first bookable slot.
pub const FIRST_HOUR: u32 = 8;
/// Number of hourly slots per day (08:00 through 21:00).
pub const SLOTS_PER_DAY: u8 = 14;
/// Every booking lasts one hour.
pub fn session_length() -> Duration {
    Duration::hours(1)
}

/// Converts a slot number (1-14) to its start time.
pub fn slot_to_time(slot: u8) -> Option<NaiveTime> {
    if slot < 1 || slot > SLOTS_PER_DAY {
        return None;
    }
    NaiveTime::from_hms_opt(FIRST_HOUR + slot as u32 - 1, 0, 0)
}

/// Inverse of [`slot_to_time`]; None for times off the hourly grid.
pub fn time_to_slot(time: NaiveTime) -> Option<u8> {
    if time.minute() != 0 || time.second() != 0 || time.nanosecond() != 0 {
        return None;
    }
    let hour = time.hour();
    if hour < FIRST_HOUR || hour >= FIRST_HOUR + SLOTS_PER_DAY as u32 {
        return None;
    }
    Some((hour - FIRST_HOUR + 1) as u8)
}

/// All slot start times of a day, in order.
pub fn slot_times() -> impl Iterator<Item = NaiveTime> {
    (1..=SLOTS_PER_DAY).filter_map(slot_to_time)
}

/// Parses "HH:MM" or "HH:MM:SS" and checks it lands on a slot.
pub fn parse_slot_time(time_str: &str) -> Option<NaiveTime> {
    let trimmed = time_str.trim();
    let time = NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()?;
    time_to_slot(time).map(|_| time)
}

pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").ok()
}

/// The instant a slot starts.
pub fn slot_instant(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Sunday of the week starting at `start`.
pub fn week_end(start: NaiveDate) -> NaiveDate {
    start + Duration::days(6)
}

/// The seven dates of the week containing `date`, Monday first.
pub fn week_dates(date: NaiveDate) -> [NaiveDate; 7] {
    let start = week_start(date);
    std::array::from_fn(|i| start + Duration::days(i as i64))
}
