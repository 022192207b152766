use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{NaiveDate, NaiveTime};

/// Failures reported by a [`BookingStore`](crate::store::BookingStore).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A write collided with the `(date, time)` uniqueness constraint.
    #[error("slot {date} {time} is already booked")]
    Conflict { date: NaiveDate, time: NaiveTime },

    #[error("booking {0} not found")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A row came back in a shape the model can't represent.
    #[error("malformed row: {0}")]
    Malformed(String),
}

/// Everything a request or a workflow step can fail with.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Duplicate player name: {0}")]
    DuplicatePlayer(String),

    #[error("Team {team} has {count} players, at most {max} are allowed")]
    TooManyPlayers {
        team: &'static str,
        count: usize,
        max: usize,
    },

    #[error("{0} is not a bookable time")]
    InvalidTime(String),

    #[error("{0} is outside the season")]
    OutOfSeason(NaiveDate),

    #[error("This session is no longer available")]
    SlotUnavailable,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Booking {0} not found")]
    BookingNotFound(i64),

    /// Another booking already holds the slot an edit tried to move to.
    #[error("Slot {date} {time} is already booked")]
    SlotTaken { date: NaiveDate, time: NaiveTime },

    /// One half of a two-step write went through and the other didn't.
    #[error("{message}")]
    PartialWrite {
        booking_id: Option<i64>,
        message: &'static str,
        source: StoreError,
    },

    #[error("{message}")]
    Store {
        message: &'static str,
        source: StoreError,
    },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Wraps a store failure with the message the user gets to see.
    pub fn store(message: &'static str) -> impl FnOnce(StoreError) -> AppError {
        move |source| AppError::Store { message, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::DuplicatePlayer(_)
                | AppError::TooManyPlayers { .. }
                | AppError::InvalidTime(_)
                | AppError::OutOfSeason(_)
                | AppError::SlotUnavailable
                | AppError::BadRequest(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            _ if self.is_validation() => StatusCode::BAD_REQUEST,
            AppError::BookingNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SlotTaken { .. } => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({"success": false, "error": self.to_string()}))
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
