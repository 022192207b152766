use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{Booking, BookingWithPlayers, NewPlayer, Player, Team};

use super::BookingStore;

/// The Postgres database holding bookings and players.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct PlayerRow {
    id: i64,
    booking_id: i64,
    name: String,
    team: String,
}

impl TryFrom<PlayerRow> for Player {
    type Error = StoreError;

    fn try_from(row: PlayerRow) -> Result<Self, Self::Error> {
        let team = Team::parse(&row.team)
            .ok_or_else(|| StoreError::Malformed(format!("player {} has team {:?}", row.id, row.team)))?;
        Ok(Player {
            id: row.id,
            booking_id: row.booking_id,
            name: row.name,
            team,
        })
    }
}

/// Turns a unique-constraint violation into `Conflict`, anything else into `Database`.
fn map_write_error(err: sqlx::Error, date: NaiveDate, time: NaiveTime) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict { date, time },
        _ => StoreError::Database(err),
    }
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        info!("Successfully connected to the database.");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations are up to date.");
        Ok(())
    }

    async fn players_for(&self, booking_ids: &[i64]) -> Result<Vec<Player>, StoreError> {
        let rows = sqlx::query_as::<_, PlayerRow>(
            r#"
            SELECT id, booking_id, name, team FROM players
            WHERE booking_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(booking_ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Player::try_from).collect()
    }
}

impl BookingStore for PgStore {
    async fn bookings_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Booking>, StoreError> {
        debug!(%start, %end, "fetching bookings");
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, date, time FROM bookings
            WHERE date >= $1 AND date <= $2
            ORDER BY date, time
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn booking_at(&self, date: NaiveDate, time: NaiveTime) -> Result<Option<Booking>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, date, time FROM bookings WHERE date = $1 AND time = $2
            LIMIT 1
            "#,
        )
        .bind(date)
        .bind(time)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn insert_booking(&self, date: NaiveDate, time: NaiveTime) -> Result<Booking, StoreError> {
        sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (date, time)
            VALUES ($1, $2)
            RETURNING id, date, time
            "#,
        )
        .bind(date)
        .bind(time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, date, time))
    }

    async fn insert_players(&self, booking_id: i64, players: &[NewPlayer]) -> Result<(), StoreError> {
        if players.is_empty() {
            return Ok(());
        }
        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO players (booking_id, name, team) ");
        builder.push_values(players, |mut row, player| {
            row.push_bind(booking_id)
                .push_bind(player.name.clone())
                .push_bind(player.team.as_str());
        });
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn bookings_with_players(&self) -> Result<Vec<BookingWithPlayers>, StoreError> {
        let bookings = sqlx::query_as::<_, Booking>("SELECT id, date, time FROM bookings ORDER BY date, time")
            .fetch_all(&self.pool)
            .await?;
        let ids: Vec<i64> = bookings.iter().map(|b| b.id).collect();

        let mut by_booking: HashMap<i64, Vec<Player>> = HashMap::new();
        for player in self.players_for(&ids).await? {
            by_booking.entry(player.booking_id).or_default().push(player);
        }

        Ok(bookings
            .into_iter()
            .map(|booking| BookingWithPlayers {
                players: by_booking.remove(&booking.id).unwrap_or_default(),
                booking,
            })
            .collect())
    }

    async fn booking_with_players(&self, id: i64) -> Result<Option<BookingWithPlayers>, StoreError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT id, date, time FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(booking) = booking else {
            return Ok(None);
        };
        let players = self.players_for(&[booking.id]).await?;
        Ok(Some(BookingWithPlayers { booking, players }))
    }

    async fn update_booking(
        &self,
        id: i64,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> Result<Booking, StoreError> {
        let current = sqlx::query_as::<_, Booking>("SELECT id, date, time FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let date = date.unwrap_or(current.date);
        let time = time.unwrap_or(current.time);
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings SET date = $2, time = $3
            WHERE id = $1
            RETURNING id, date, time
            "#,
        )
        .bind(id)
        .bind(date)
        .bind(time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, date, time))?
        .ok_or(StoreError::NotFound(id))
    }

    async fn delete_players_of(&self, booking_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM players WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_players(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM players").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_bookings(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM bookings").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
