//! Administrator-side booking mutations.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{AppError, StoreError};
use crate::form::validate_roster;
use crate::models::{BookingWithPlayers, NewPlayer};
use crate::schedule::{parse_date, parse_slot_time};
use crate::store::BookingStore;

pub const UPDATED_MESSAGE: &str = "Booking has been updated successfully.";
pub const UPDATE_FAILED: &str = "Failed to update booking. Please try again.";
pub const DELETED_MESSAGE: &str = "All bookings have been deleted successfully.";
pub const DELETE_FAILED: &str = "Failed to delete all bookings. Please try again.";

/// Edit request from the dashboard; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BookingEditRequest {
    pub date: Option<String>,
    pub time: Option<String>,
    pub players: Option<Vec<NewPlayer>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingEdit {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub players: Option<Vec<NewPlayer>>,
}

impl BookingEdit {
    pub fn parse(req: BookingEditRequest) -> Result<Self, AppError> {
        let date = req
            .date
            .as_deref()
            .map(|d| parse_date(d).ok_or_else(|| AppError::BadRequest(format!("invalid date {d:?}"))))
            .transpose()?;
        let time = req
            .time
            .as_deref()
            .map(|t| parse_slot_time(t).ok_or_else(|| AppError::InvalidTime(t.to_string())))
            .transpose()?;
        Ok(Self {
            date,
            time,
            players: req.players.map(trim_names),
        })
    }
}

fn trim_names(players: Vec<NewPlayer>) -> Vec<NewPlayer> {
    players
        .into_iter()
        .map(|p| NewPlayer::new(p.name.trim(), p.team))
        .filter(|p| !p.name.is_empty())
        .collect()
}

fn update_failed(booking_id: i64, halfway: bool) -> impl FnOnce(StoreError) -> AppError {
    move |source| {
        error!(booking_id, error = %source, halfway, "booking update failed");
        match source {
            StoreError::NotFound(id) => AppError::BookingNotFound(id),
            StoreError::Conflict { date, time } if !halfway => AppError::SlotTaken { date, time },
            source if halfway => AppError::PartialWrite {
                booking_id: Some(booking_id),
                message: UPDATE_FAILED,
                source,
            },
            source => AppError::Store {
                message: UPDATE_FAILED,
                source,
            },
        }
    }
}

/// Moves a booking and/or replaces its roster.
///
/// The date/time update and the roster replacement are separate writes; when a
/// later one fails the earlier ones stay applied and the whole edit is
/// reported as failed.
pub async fn edit_booking<S: BookingStore>(store: &S, booking_id: i64, edit: &BookingEdit) -> Result<(), AppError> {
    if let Some(players) = &edit.players {
        validate_roster(players)?;
    }

    let mut written = false;
    if edit.date.is_some() || edit.time.is_some() {
        store
            .update_booking(booking_id, edit.date, edit.time)
            .await
            .map_err(update_failed(booking_id, false))?;
        written = true;
    } else if store
        .booking_with_players(booking_id)
        .await
        .map_err(update_failed(booking_id, false))?
        .is_none()
    {
        return Err(AppError::BookingNotFound(booking_id));
    }

    if let Some(players) = &edit.players {
        store
            .delete_players_of(booking_id)
            .await
            .map_err(update_failed(booking_id, written))?;
        store
            .insert_players(booking_id, players)
            .await
            .map_err(update_failed(booking_id, true))?;
    }

    info!(booking_id, "booking updated");
    Ok(())
}

/// Removes every player, then every booking. A failure between the two steps
/// leaves bookings without players.
pub async fn delete_all_bookings<S: BookingStore>(store: &S) -> Result<u64, AppError> {
    let players = store.delete_all_players().await.map_err(|source| {
        error!(error = %source, "deleting players failed");
        AppError::Store {
            message: DELETE_FAILED,
            source,
        }
    })?;
    let bookings = store.delete_all_bookings().await.map_err(|source| {
        error!(error = %source, players_deleted = players, "deleting bookings failed after players were removed");
        AppError::PartialWrite {
            booking_id: None,
            message: DELETE_FAILED,
            source,
        }
    })?;
    info!(bookings, players, "all bookings deleted");
    Ok(bookings)
}

/// One booking with players ordered team A first.
pub async fn booking_details<S: BookingStore>(store: &S, booking_id: i64) -> Result<BookingWithPlayers, AppError> {
    let mut details = store
        .booking_with_players(booking_id)
        .await
        .map_err(AppError::store("Failed to load booking details."))?
        .ok_or(AppError::BookingNotFound(booking_id))?;
    details.sort_players_by_team();
    Ok(details)
}
