use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveTime};

use crate::error::StoreError;
use crate::models::{Booking, BookingWithPlayers, NewPlayer, Player};

use super::BookingStore;

#[derive(Debug, Default)]
struct Tables {
    bookings: Vec<Booking>,
    players: Vec<Player>,
    next_booking_id: i64,
    next_player_id: i64,
}

impl Tables {
    fn slot_taken(&self, date: NaiveDate, time: NaiveTime, except: Option<i64>) -> bool {
        self.bookings
            .iter()
            .any(|b| b.date == date && b.time == time && Some(b.id) != except)
    }

    fn with_players(&self, booking: &Booking) -> BookingWithPlayers {
        BookingWithPlayers {
            booking: booking.clone(),
            players: self
                .players
                .iter()
                .filter(|p| p.booking_id == booking.id)
                .cloned()
                .collect(),
        }
    }
}

/// Process-local store with the same uniqueness and cascade rules as the
/// Postgres schema. Used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // a poisoned lock still holds consistent rows: every write is a single push or retain
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BookingStore for MemoryStore {
    async fn bookings_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .tables()
            .bookings
            .iter()
            .filter(|b| start <= b.date && b.date <= end)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.date, b.time));
        Ok(bookings)
    }

    async fn booking_at(&self, date: NaiveDate, time: NaiveTime) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .tables()
            .bookings
            .iter()
            .find(|b| b.date == date && b.time == time)
            .cloned())
    }

    async fn insert_booking(&self, date: NaiveDate, time: NaiveTime) -> Result<Booking, StoreError> {
        let mut tables = self.tables();
        if tables.slot_taken(date, time, None) {
            return Err(StoreError::Conflict { date, time });
        }
        tables.next_booking_id += 1;
        let booking = Booking {
            id: tables.next_booking_id,
            date,
            time,
        };
        tables.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn insert_players(&self, booking_id: i64, players: &[NewPlayer]) -> Result<(), StoreError> {
        let mut tables = self.tables();
        if !tables.bookings.iter().any(|b| b.id == booking_id) {
            return Err(StoreError::NotFound(booking_id));
        }
        for player in players {
            tables.next_player_id += 1;
            let id = tables.next_player_id;
            tables.players.push(Player {
                id,
                booking_id,
                name: player.name.clone(),
                team: player.team,
            });
        }
        Ok(())
    }

    async fn bookings_with_players(&self) -> Result<Vec<BookingWithPlayers>, StoreError> {
        let tables = self.tables();
        let mut bookings: Vec<&Booking> = tables.bookings.iter().collect();
        bookings.sort_by_key(|b| (b.date, b.time));
        Ok(bookings.into_iter().map(|b| tables.with_players(b)).collect())
    }

    async fn booking_with_players(&self, id: i64) -> Result<Option<BookingWithPlayers>, StoreError> {
        let tables = self.tables();
        Ok(tables
            .bookings
            .iter()
            .find(|b| b.id == id)
            .map(|b| tables.with_players(b)))
    }

    async fn update_booking(
        &self,
        id: i64,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> Result<Booking, StoreError> {
        let mut tables = self.tables();
        let current = tables
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;
        let date = date.unwrap_or(current.date);
        let time = time.unwrap_or(current.time);
        if tables.slot_taken(date, time, Some(id)) {
            return Err(StoreError::Conflict { date, time });
        }
        let booking = tables
            .bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(StoreError::NotFound(id))?;
        booking.date = date;
        booking.time = time;
        Ok(booking.clone())
    }

    async fn delete_players_of(&self, booking_id: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        let before = tables.players.len();
        tables.players.retain(|p| p.booking_id != booking_id);
        Ok((before - tables.players.len()) as u64)
    }

    async fn delete_all_players(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        let removed = tables.players.len() as u64;
        tables.players.clear();
        Ok(removed)
    }

    async fn delete_all_bookings(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        let removed = tables.bookings.len() as u64;
        tables.bookings.clear();
        // cascade, as the players foreign key does
        tables.players.clear();
        Ok(removed)
    }
}
