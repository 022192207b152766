use std::future::Future;

use chrono::{NaiveDate, NaiveTime};

use crate::error::StoreError;
use crate::models::{Booking, BookingWithPlayers, NewPlayer};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The relational store holding bookings and their players.
///
/// Implementations must enforce one booking per `(date, time)` and report a
/// collision as [`StoreError::Conflict`]; the reservation workflow relies on
/// that rather than on its own pre-check.
pub trait BookingStore: Send + Sync {
    /// Bookings with `start <= date <= end`.
    fn bookings_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Booking>, StoreError>> + Send;

    fn booking_at(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> impl Future<Output = Result<Option<Booking>, StoreError>> + Send;

    fn insert_booking(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> impl Future<Output = Result<Booking, StoreError>> + Send;

    fn insert_players(
        &self,
        booking_id: i64,
        players: &[NewPlayer],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every booking with its players, ordered by date then time.
    fn bookings_with_players(
        &self,
    ) -> impl Future<Output = Result<Vec<BookingWithPlayers>, StoreError>> + Send;

    fn booking_with_players(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<BookingWithPlayers>, StoreError>> + Send;

    /// Updates whichever of `date`/`time` is given. Fails with `NotFound` for
    /// an unknown id and `Conflict` when the target slot is taken.
    fn update_booking(
        &self,
        id: i64,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> impl Future<Output = Result<Booking, StoreError>> + Send;

    fn delete_players_of(&self, booking_id: i64) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn delete_all_players(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn delete_all_bookings(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
