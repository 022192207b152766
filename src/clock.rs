use chrono::{Local, NaiveDate, NaiveDateTime};

/// Source of the wall-clock reference used to split past slots from future ones.
///
/// Slots are local field times, so the system clock is read in local time.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(at) => *at,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}
