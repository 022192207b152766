use chrono::{NaiveDate, NaiveTime};

use crate::schedule::SlotStatus;

/// "Sep 16 - Sep 22, 2024"
pub fn format_week_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", start.format("%b %-d"), end.format("%b %-d, %Y"))
}

/// "September 17, 2024"
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// "10:00 AM"
pub fn format_time_12h(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// "10:00"
pub fn format_time_short(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Title of the booking dialog for a slot.
pub fn dialog_title(date: NaiveDate, time: NaiveTime) -> String {
    format!(
        "Book Field - {} at {}",
        date.format("%A, %B %-d, %Y"),
        format_time_short(time)
    )
}

pub fn pluralize_bookings(count: usize) -> String {
    if count == 1 {
        "1 booking".to_string()
    } else {
        format!("{} bookings", count)
    }
}

/// Badge of a day in the admin drill-down.
pub fn day_badge(booked: usize) -> String {
    if booked > 0 {
        format!("{} Booked", booked)
    } else {
        "Unbooked".to_string()
    }
}

pub fn status_label(status: SlotStatus) -> &'static str {
    match status {
        SlotStatus::Available => "Available",
        SlotStatus::Booked => "Booked",
        SlotStatus::Unavailable => "Unavailable",
    }
}
