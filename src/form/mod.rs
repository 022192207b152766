pub mod roster;
pub mod submission;

pub use roster::RosterForm;
pub use submission::{
    check_duplicates, normalize_name, parse_slot, roster_players, validate_roster, validate_submission,
    ReservationRequest, ReservationSubmission, TEAM_SIZE,
};
