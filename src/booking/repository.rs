//! Booking repository for labbook.
//!
//! Writes that claim a slot are single conditional statements run inside a
//! transaction: the overlap test and the write happen under SQLite's write
//! lock, so two overlapping bookings can never both be confirmed.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::DateTime;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::types::{normalize_attendees, Booking, BookingFilter, BookingStatus, Interval};
use crate::{LabbookError, Result};

const BOOKING_COLUMNS: &str = "id, resource, title, description, start_time, end_time, status, \
                               owner_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct BookingRow {
    id: i64,
    resource: String,
    title: String,
    description: Option<String>,
    start_time: i64,
    end_time: i64,
    status: String,
    owner_id: i64,
    created_at: String,
    updated_at: String,
}

impl BookingRow {
    fn into_booking(self, attendees: Vec<i64>) -> Result<Booking> {
        let status = BookingStatus::from_str(&self.status).map_err(LabbookError::Database)?;
        let start_time = DateTime::from_timestamp(self.start_time, 0)
            .ok_or_else(|| LabbookError::Database(format!("bad start_time on booking {}", self.id)))?;
        let end_time = DateTime::from_timestamp(self.end_time, 0)
            .ok_or_else(|| LabbookError::Database(format!("bad end_time on booking {}", self.id)))?;

        Ok(Booking {
            id: self.id,
            resource: self.resource,
            title: self.title,
            description: self.description,
            start_time,
            end_time,
            status,
            owner_id: self.owner_id,
            attendees,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Data for a booking about to be persisted.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub resource: String,
    pub title: String,
    pub description: Option<String>,
    pub interval: Interval,
    pub owner_id: i64,
    pub attendees: Vec<i64>,
}

/// Full replacement of a booking's editable fields.
#[derive(Debug, Clone)]
pub struct BookingRewrite {
    pub title: String,
    pub description: Option<String>,
    pub interval: Interval,
    /// `None` keeps the current attendees.
    pub attendees: Option<Vec<i64>>,
}

/// Outcome of a slot-claiming write.
#[derive(Debug)]
pub enum SlotWrite {
    /// The write went through.
    Written(Booking),
    /// Confirmed bookings overlap the interval; nothing was written.
    Conflict(Vec<Booking>),
    /// The target booking no longer exists or is not confirmed.
    Missing,
    /// The owner or an attendee does not name a user; nothing was written.
    UnknownUser,
}

fn is_unknown_user(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

async fn load_attendees(conn: &mut SqliteConnection, ids: &[i64]) -> Result<HashMap<i64, Vec<i64>>> {
    let mut by_booking: HashMap<i64, Vec<i64>> = HashMap::new();
    if ids.is_empty() {
        return Ok(by_booking);
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT booking_id, user_id FROM booking_attendees WHERE booking_id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY booking_id, user_id");

    let pairs: Vec<(i64, i64)> = query.build_query_as().fetch_all(&mut *conn).await?;
    for (booking_id, user_id) in pairs {
        by_booking.entry(booking_id).or_default().push(user_id);
    }
    Ok(by_booking)
}

async fn with_attendees(conn: &mut SqliteConnection, rows: Vec<BookingRow>) -> Result<Vec<Booking>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut attendees = load_attendees(conn, &ids).await?;

    rows.into_iter()
        .map(|row| {
            let list = attendees.remove(&row.id).unwrap_or_default();
            row.into_booking(list)
        })
        .collect()
}

async fn fetch_one(conn: &mut SqliteConnection, id: i64) -> Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?");
    let row = sqlx::query_as::<_, BookingRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(with_attendees(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn fetch_conflicts(
    conn: &mut SqliteConnection,
    resource: &str,
    interval: &Interval,
    exclude_id: Option<i64>,
) -> Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE resource = ?
           AND status = 'confirmed'
           AND start_time < ?
           AND ? < end_time
           AND (? IS NULL OR id != ?)
         ORDER BY start_time, id"
    );
    let rows = sqlx::query_as::<_, BookingRow>(&sql)
        .bind(resource)
        .bind(interval.end_secs())
        .bind(interval.start_secs())
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_all(&mut *conn)
        .await?;

    with_attendees(conn, rows).await
}

async fn insert_attendees(
    conn: &mut SqliteConnection,
    booking_id: i64,
    attendees: &[i64],
) -> std::result::Result<(), sqlx::Error> {
    for user_id in normalize_attendees(attendees) {
        sqlx::query("INSERT INTO booking_attendees (booking_id, user_id) VALUES (?, ?)")
            .bind(booking_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Repository for booking persistence.
pub struct BookingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BookingRepository<'a> {
    /// Create a new BookingRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a confirmed booking unless its interval is taken.
    pub async fn create_if_free(&self, booking: &NewBooking) -> Result<SlotWrite> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO bookings (resource, title, description, start_time, end_time, status, owner_id)
             SELECT ?, ?, ?, ?, ?, 'confirmed', ?
             WHERE NOT EXISTS (
                 SELECT 1 FROM bookings
                 WHERE resource = ?
                   AND status = 'confirmed'
                   AND start_time < ?
                   AND ? < end_time
             )",
        )
        .bind(&booking.resource)
        .bind(&booking.title)
        .bind(&booking.description)
        .bind(booking.interval.start_secs())
        .bind(booking.interval.end_secs())
        .bind(booking.owner_id)
        .bind(&booking.resource)
        .bind(booking.interval.end_secs())
        .bind(booking.interval.start_secs())
        .execute(&mut *tx)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) if is_unknown_user(&e) => {
                tx.rollback().await?;
                return Ok(SlotWrite::UnknownUser);
            }
            Err(e) => return Err(e.into()),
        };

        if result.rows_affected() == 0 {
            let conflicts = fetch_conflicts(&mut *tx, &booking.resource, &booking.interval, None).await?;
            tx.rollback().await?;
            return Ok(SlotWrite::Conflict(conflicts));
        }

        let id = result.last_insert_rowid();
        match insert_attendees(&mut *tx, id, &booking.attendees).await {
            Ok(()) => {}
            Err(e) if is_unknown_user(&e) => {
                tx.rollback().await?;
                return Ok(SlotWrite::UnknownUser);
            }
            Err(e) => return Err(e.into()),
        }

        let created = fetch_one(&mut *tx, id)
            .await?
            .ok_or_else(|| LabbookError::NotFound("booking".to_string()))?;
        tx.commit().await?;

        Ok(SlotWrite::Written(created))
    }

    /// Rewrite a confirmed booking unless its new interval collides with
    /// another confirmed booking of the same lab.
    pub async fn rewrite_if_free(&self, id: i64, rewrite: &BookingRewrite) -> Result<SlotWrite> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE bookings
             SET title = ?, description = ?, start_time = ?, end_time = ?,
                 updated_at = datetime('now')
             WHERE id = ?
               AND status = 'confirmed'
               AND NOT EXISTS (
                   SELECT 1 FROM bookings AS other
                   WHERE other.resource = bookings.resource
                     AND other.status = 'confirmed'
                     AND other.id != bookings.id
                     AND other.start_time < ?
                     AND ? < other.end_time
               )",
        )
        .bind(&rewrite.title)
        .bind(&rewrite.description)
        .bind(rewrite.interval.start_secs())
        .bind(rewrite.interval.end_secs())
        .bind(id)
        .bind(rewrite.interval.end_secs())
        .bind(rewrite.interval.start_secs())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let current = fetch_one(&mut *tx, id).await?;
            let outcome = match current {
                Some(booking) if booking.is_confirmed() => {
                    let conflicts =
                        fetch_conflicts(&mut *tx, &booking.resource, &rewrite.interval, Some(id)).await?;
                    SlotWrite::Conflict(conflicts)
                }
                _ => SlotWrite::Missing,
            };
            tx.rollback().await?;
            return Ok(outcome);
        }

        if let Some(ref attendees) = rewrite.attendees {
            sqlx::query("DELETE FROM booking_attendees WHERE booking_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            match insert_attendees(&mut *tx, id, attendees).await {
                Ok(()) => {}
                Err(e) if is_unknown_user(&e) => {
                    tx.rollback().await?;
                    return Ok(SlotWrite::UnknownUser);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let updated = fetch_one(&mut *tx, id)
            .await?
            .ok_or_else(|| LabbookError::NotFound("booking".to_string()))?;
        tx.commit().await?;

        Ok(SlotWrite::Written(updated))
    }

    /// Set the status of a booking. Returns false if not found.
    pub async fn set_status(&self, id: i64, status: BookingStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a booking by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        fetch_one(&mut conn, id).await
    }

    /// Confirmed bookings of `resource` overlapping `interval`, optionally
    /// ignoring one booking.
    pub async fn find_conflicts(
        &self,
        resource: &str,
        interval: &Interval,
        exclude_id: Option<i64>,
    ) -> Result<Vec<Booking>> {
        let mut conn = self.pool.acquire().await?;
        fetch_conflicts(&mut conn, resource, interval, exclude_id).await
    }

    /// List bookings matching a filter, ordered by start time then id.
    pub async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1 = 1"
        ));

        if !filter.include_cancelled {
            query.push(" AND status = 'confirmed'");
        }
        if let Some(from) = filter.from {
            query.push(" AND end_time > ");
            query.push_bind(from.timestamp());
        }
        if let Some(to) = filter.to {
            query.push(" AND start_time < ");
            query.push_bind(to.timestamp());
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND owner_id = ");
            query.push_bind(owner_id);
        }
        if let Some(ref resource) = filter.resource {
            query.push(" AND resource = ");
            query.push_bind(resource.clone());
        }
        query.push(" ORDER BY start_time, id");

        let mut conn = self.pool.acquire().await?;
        let rows: Vec<BookingRow> = query.build_query_as().fetch_all(&mut *conn).await?;
        with_attendees(&mut conn, rows).await
    }

    /// Return the ids in `ids` that do not name an existing user.
    pub async fn unknown_users(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let wanted = normalize_attendees(ids);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM users WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &wanted {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let found: Vec<i64> = query.build_query_scalar().fetch_all(self.pool).await?;
        Ok(wanted.into_iter().filter(|id| !found.contains(id)).collect())
    }
}
