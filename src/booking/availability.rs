//! Availability checks.
//!
//! [`find_conflicts`] is the overlap rule over any set of bookings; the
//! store applies the same rule in SQL when it claims a slot.

use sqlx::SqlitePool;

use super::error::BookingError;
use super::repository::BookingRepository;
use super::types::{Availability, Booking, Interval};

/// Confirmed bookings among `bookings` that overlap `interval`, skipping
/// `exclude_id`.
pub fn find_conflicts<'a, I>(bookings: I, interval: &Interval, exclude_id: Option<i64>) -> Vec<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings
        .into_iter()
        .filter(|b| b.is_confirmed())
        .filter(|b| Some(b.id) != exclude_id)
        .filter(|b| b.interval().overlaps(interval))
        .collect()
}

/// Check whether `interval` is free in `resource`.
///
/// Read only; a later write re-checks atomically.
pub async fn check_availability(
    pool: &SqlitePool,
    resource: &str,
    interval: &Interval,
    exclude_id: Option<i64>,
) -> Result<Availability, BookingError> {
    let conflicts = BookingRepository::new(pool)
        .find_conflicts(resource, interval, exclude_id)
        .await?;
    Ok(Availability::from_conflicts(conflicts))
}
