//! One visitor booking attempt, from validated roster to stored booking.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{AppError, StoreError};
use crate::form::{validate_roster, ReservationSubmission};
use crate::models::{Booking, BookingWithPlayers};
use crate::schedule::{slot_instant, Season};
use crate::store::BookingStore;

pub const BOOKED_MESSAGE: &str = "Your futsal session has been booked successfully!";
pub const ALREADY_BOOKED_MESSAGE: &str = "This session has already been booked. The schedule has been updated.";
const BOOKING_FAILED: &str = "There was an error while booking your session. Please try again.";

/// How a booking attempt ended when nothing went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReservationOutcome {
    Booked(BookingWithPlayers),
    /// Someone else got there first; carries their booking so the caller can
    /// show the slot as taken.
    AlreadyBooked(Booking),
}

impl ReservationOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            ReservationOutcome::Booked(b) => &b.booking,
            ReservationOutcome::AlreadyBooked(b) => b,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ReservationOutcome::Booked(_) => BOOKED_MESSAGE,
            ReservationOutcome::AlreadyBooked(_) => ALREADY_BOOKED_MESSAGE,
        }
    }
}

/// Books a slot for a roster.
///
/// The existence check only saves a write in the common case. Exclusivity comes
/// from the store's uniqueness constraint: a `Conflict` on insert is treated
/// exactly like finding the booking up front. A failed player insert leaves the
/// booking in place and is reported as a partial write.
pub async fn reserve_slot<S: BookingStore>(
    store: &S,
    submission: &ReservationSubmission,
    season: &Season,
    now: NaiveDateTime,
) -> Result<ReservationOutcome, AppError> {
    let (date, time) = (submission.date, submission.time);

    if !season.contains(date) {
        return Err(AppError::OutOfSeason(date));
    }
    if slot_instant(date, time) <= now {
        return Err(AppError::SlotUnavailable);
    }
    validate_roster(&submission.players)?;

    let existing = store
        .booking_at(date, time)
        .await
        .map_err(AppError::store(BOOKING_FAILED))?;
    if let Some(existing) = existing {
        info!(%date, %time, booking_id = existing.id, "slot already booked");
        return Ok(ReservationOutcome::AlreadyBooked(existing));
    }

    let booking = match store.insert_booking(date, time).await {
        Ok(booking) => booking,
        Err(StoreError::Conflict { .. }) => {
            warn!(%date, %time, "lost the race for a slot");
            return match store.booking_at(date, time).await {
                Ok(Some(winner)) => Ok(ReservationOutcome::AlreadyBooked(winner)),
                // the winner was deleted in between; still not ours
                Ok(None) => Err(AppError::SlotTaken { date, time }),
                Err(e) => Err(AppError::store(BOOKING_FAILED)(e)),
            };
        }
        Err(e) => return Err(AppError::store(BOOKING_FAILED)(e)),
    };

    if let Err(source) = store.insert_players(booking.id, &submission.players).await {
        error!(booking_id = booking.id, error = %source, "players not saved, booking left without roster");
        return Err(AppError::PartialWrite {
            booking_id: Some(booking.id),
            message: BOOKING_FAILED,
            source,
        });
    }

    let saved = store
        .booking_with_players(booking.id)
        .await
        .map_err(AppError::store(BOOKING_FAILED))?
        .unwrap_or_else(|| BookingWithPlayers {
            booking: booking.clone(),
            players: Vec::new(),
        });
    info!(%date, %time, booking_id = booking.id, players = saved.players.len(), "slot booked");
    Ok(ReservationOutcome::Booked(saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{validate_submission, ReservationRequest};
    use crate::models::{NewPlayer, Team};
    use crate::schedule::{slot_status, SlotStatus};
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, NaiveTime};
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 16)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn full_roster() -> ReservationSubmission {
        let req = ReservationRequest {
            date: "2024-09-17".to_string(),
            time: "10:00".to_string(),
            team_a: ["Ana", "Bea", "Cai", "Dov", "Eli"].map(String::from).to_vec(),
            team_b: ["Fay", "Gus", "Hal", "Ivy", "Jon"].map(String::from).to_vec(),
        };
        validate_submission(&req, &Season::default(), now()).unwrap()
    }

    #[tokio::test]
    async fn books_a_free_slot_with_its_roster() {
        let store = MemoryStore::new();
        let submission = full_roster();

        let outcome = reserve_slot(&store, &submission, &Season::default(), now()).await.unwrap();
        let ReservationOutcome::Booked(saved) = outcome else {
            panic!("expected a new booking");
        };
        assert_eq!(saved.players.len(), 10);
        assert_eq!(saved.team(Team::A).count(), 5);
        assert_eq!(saved.team(Team::B).count(), 5);

        let week = store
            .bookings_between(submission.date, submission.date)
            .await
            .unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(
            slot_status(submission.date, submission.time, &week, now()),
            SlotStatus::Booked
        );
    }

    #[tokio::test]
    async fn second_attempt_gets_the_existing_booking() {
        let store = MemoryStore::new();
        let submission = full_roster();
        let first = reserve_slot(&store, &submission, &Season::default(), now()).await.unwrap();
        let second = reserve_slot(&store, &submission, &Season::default(), now()).await.unwrap();

        assert_eq!(second, ReservationOutcome::AlreadyBooked(first.booking().clone()));
        assert_eq!(second.message(), ALREADY_BOOKED_MESSAGE);
        assert_eq!(store.bookings_with_players().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn simultaneous_attempts_yield_one_booking() {
        let store = Racing {
            inner: MemoryStore::new(),
            stale: AtomicBool::new(false),
            yield_after_check: true,
        };
        let submission = full_roster();
        let season = Season::default();
        let (a, b) = tokio::join!(
            reserve_slot(&store, &submission, &season, now()),
            reserve_slot(&store, &submission, &season, now()),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        // both passed the pre-check, so the loser learned of the winner on insert
        let (winner, loser) = match (&a, &b) {
            (ReservationOutcome::Booked(saved), other) | (other, ReservationOutcome::Booked(saved)) => (saved, other),
            _ => panic!("nobody booked: {a:?} {b:?}"),
        };
        assert_eq!(loser, &ReservationOutcome::AlreadyBooked(winner.booking.clone()));

        let all = store.bookings_with_players().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].players.len(), 10);
    }

    /// A store whose pre-check can lie or stall. `stale` answers "free" once,
    /// as if a rival wrote right after we looked. `yield_after_check` hands the
    /// runtime back between the check and its answer so joined attempts interleave.
    struct Racing {
        inner: MemoryStore,
        stale: AtomicBool,
        yield_after_check: bool,
    }

    impl BookingStore for Racing {
        fn bookings_between(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> impl Future<Output = Result<Vec<Booking>, StoreError>> + Send {
            self.inner.bookings_between(start, end)
        }

        async fn booking_at(&self, date: NaiveDate, time: NaiveTime) -> Result<Option<Booking>, StoreError> {
            let found = if self.stale.swap(false, Ordering::SeqCst) {
                None
            } else {
                self.inner.booking_at(date, time).await?
            };
            if self.yield_after_check {
                tokio::task::yield_now().await;
            }
            Ok(found)
        }

        fn insert_booking(
            &self,
            date: NaiveDate,
            time: NaiveTime,
        ) -> impl Future<Output = Result<Booking, StoreError>> + Send {
            self.inner.insert_booking(date, time)
        }

        fn insert_players(
            &self,
            booking_id: i64,
            players: &[NewPlayer],
        ) -> impl Future<Output = Result<(), StoreError>> + Send {
            self.inner.insert_players(booking_id, players)
        }

        fn bookings_with_players(
            &self,
        ) -> impl Future<Output = Result<Vec<BookingWithPlayers>, StoreError>> + Send {
            self.inner.bookings_with_players()
        }

        fn booking_with_players(
            &self,
            id: i64,
        ) -> impl Future<Output = Result<Option<BookingWithPlayers>, StoreError>> + Send {
            self.inner.booking_with_players(id)
        }

        fn update_booking(
            &self,
            id: i64,
            date: Option<NaiveDate>,
            time: Option<NaiveTime>,
        ) -> impl Future<Output = Result<Booking, StoreError>> + Send {
            self.inner.update_booking(id, date, time)
        }

        fn delete_players_of(&self, booking_id: i64) -> impl Future<Output = Result<u64, StoreError>> + Send {
            self.inner.delete_players_of(booking_id)
        }

        fn delete_all_players(&self) -> impl Future<Output = Result<u64, StoreError>> + Send {
            self.inner.delete_all_players()
        }

        fn delete_all_bookings(&self) -> impl Future<Output = Result<u64, StoreError>> + Send {
            self.inner.delete_all_bookings()
        }
    }

    #[tokio::test]
    async fn constraint_violation_means_already_booked() {
        let store = Racing {
            inner: MemoryStore::new(),
            stale: AtomicBool::new(true),
            yield_after_check: false,
        };
        let submission = full_roster();
        let rival = store
            .inner
            .insert_booking(submission.date, submission.time)
            .await
            .unwrap();

        let outcome = reserve_slot(&store, &submission, &Season::default(), now()).await.unwrap();
        assert_eq!(outcome, ReservationOutcome::AlreadyBooked(rival));
        let all = store.inner.bookings_with_players().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].players.is_empty());
    }

    #[tokio::test]
    async fn past_slots_cannot_be_booked() {
        let store = MemoryStore::new();
        let submission = full_roster();
        let later = submission.date.and_hms_opt(10, 0, 0).unwrap();
        let err = reserve_slot(&store, &submission, &Season::default(), later).await.unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable));
        assert!(store.bookings_with_players().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_roster_never_reaches_the_store() {
        let store = MemoryStore::new();
        let mut submission = full_roster();
        submission.players.push(NewPlayer::new("ana ", Team::B));
        submission.players.remove(5);
        let err = reserve_slot(&store, &submission, &Season::default(), now()).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicatePlayer(ref n) if n == "ana"));
        assert!(store.bookings_with_players().await.unwrap().is_empty());
    }
}
