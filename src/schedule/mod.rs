pub mod availability;
pub mod slot_utils;
pub mod types;
pub mod weeks;

pub use availability::{is_live, session_state, slot_status, SessionState, SlotStatus};
pub use slot_utils::{parse_date, parse_slot_time, slot_instant, slot_times, week_start};
pub use types::{DaySlots, DaySummary, Scheduled, Season, Slot, TimeEntry, Week};
pub use weeks::{day_summaries, derive_weeks, slots_for_week, time_listing, week_number, WeekCursor};
