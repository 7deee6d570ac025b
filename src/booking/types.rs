//! Booking model for labbook.
//!
//! Defines bookings, their status and the half-open time interval they
//! occupy, plus the inputs of the booking use cases.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::BookingError;

/// A half-open time interval `[start, end)` at whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    #[serde(rename = "startTime")]
    pub start: DateTime<Utc>,
    #[serde(rename = "endTime")]
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Create an interval, truncating both ends to whole seconds.
    ///
    /// Fails with [`BookingError::InvalidInterval`] unless `start < end`
    /// after truncation.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, BookingError> {
        Self::from_secs(start.timestamp(), end.timestamp())
    }

    /// Create an interval from unix seconds.
    pub fn from_secs(start: i64, end: i64) -> Result<Self, BookingError> {
        if start >= end {
            return Err(BookingError::InvalidInterval);
        }
        let start = DateTime::from_timestamp(start, 0).ok_or(BookingError::InvalidInterval)?;
        let end = DateTime::from_timestamp(end, 0).ok_or(BookingError::InvalidInterval)?;
        Ok(Self { start, end })
    }

    /// Start as unix seconds.
    pub fn start_secs(&self) -> i64 {
        self.start.timestamp()
    }

    /// End as unix seconds.
    pub fn end_secs(&self) -> i64 {
        self.end.timestamp()
    }

    /// Whether two intervals share any instant. Touching ends do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Holds its slot.
    #[default]
    Confirmed,
    /// Soft-deleted; frees its slot. Terminal.
    Cancelled,
}

impl BookingStatus {
    /// Convert status to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            _ => Err(format!("unknown booking status: {s}")),
        }
    }
}

/// A reservation of a lab.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    /// Lab key.
    pub resource: String,
    pub title: String,
    pub description: Option<String>,
    /// Inclusive start.
    pub start_time: DateTime<Utc>,
    /// Exclusive end.
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    /// User who created the booking.
    pub owner_id: i64,
    /// Attendee user IDs, ascending.
    pub attendees: Vec<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Booking {
    /// The occupied interval.
    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Whether the booking still holds its slot.
    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// An unpersisted booking request.
#[derive(Debug, Clone)]
pub struct BookingInput {
    /// Lab key; the configured default lab when `None`.
    pub resource: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendees: Vec<i64>,
}

impl BookingInput {
    /// Create a booking request for the default lab.
    pub fn new(title: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            resource: None,
            title: title.into(),
            description: None,
            start_time,
            end_time,
            attendees: Vec::new(),
        }
    }

    /// Set the lab.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the attendees.
    pub fn with_attendees(mut self, attendees: Vec<i64>) -> Self {
        self.attendees = attendees;
        self
    }
}

/// Changes applied by a reschedule. Unset fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct BookingChanges {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub title: Option<String>,
    /// An empty string clears the description.
    pub description: Option<String>,
    pub attendees: Option<Vec<i64>>,
}

impl BookingChanges {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the booking to a new interval.
    pub fn interval(mut self, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the attendees.
    pub fn attendees(mut self, attendees: Vec<i64>) -> Self {
        self.attendees = Some(attendees);
        self
    }
}

/// Criteria for listing bookings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Keep bookings ending after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Keep bookings starting before this instant.
    pub to: Option<DateTime<Utc>>,
    pub owner_id: Option<i64>,
    pub resource: Option<String>,
    /// Also return cancelled bookings.
    pub include_cancelled: bool,
}

impl BookingFilter {
    /// Create a filter matching all confirmed bookings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep bookings overlapping `[from, to)`.
    pub fn range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Keep bookings owned by a user.
    pub fn owner(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Keep bookings of a lab.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Include cancelled bookings.
    pub fn include_cancelled(mut self) -> Self {
        self.include_cancelled = true;
        self
    }
}

/// Result of an availability check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub available: bool,
    /// Confirmed bookings overlapping the requested interval.
    pub conflicts: Vec<Booking>,
}

impl Availability {
    /// Build from the conflicting bookings.
    pub fn from_conflicts(conflicts: Vec<Booking>) -> Self {
        Self {
            available: conflicts.is_empty(),
            conflicts,
        }
    }
}

/// Sort attendee ids and drop duplicates.
pub fn normalize_attendees(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 14, h, m, 0).unwrap()
    }

    #[test]
    fn test_interval_rejects_empty_and_reversed() {
        assert!(matches!(
            Interval::new(at(10, 0), at(10, 0)),
            Err(BookingError::InvalidInterval)
        ));
        assert!(matches!(
            Interval::new(at(11, 0), at(10, 0)),
            Err(BookingError::InvalidInterval)
        ));
    }

    #[test]
    fn test_interval_truncates_subseconds() {
        let start = at(10, 0) + chrono::Duration::milliseconds(100);
        let end = at(10, 0) + chrono::Duration::milliseconds(900);
        assert!(Interval::new(start, end).is_err());

        let interval = Interval::new(start, at(11, 0)).unwrap();
        assert_eq!(interval.start, at(10, 0));
    }

    #[test]
    fn test_overlaps_half_open() {
        let existing = Interval::new(at(10, 0), at(11, 0)).unwrap();

        assert!(existing.overlaps(&Interval::new(at(10, 30), at(11, 30)).unwrap()));
        assert!(existing.overlaps(&Interval::new(at(9, 0), at(12, 0)).unwrap()));
        assert!(existing.overlaps(&Interval::new(at(10, 15), at(10, 45)).unwrap()));
        assert!(!existing.overlaps(&Interval::new(at(11, 0), at(12, 0)).unwrap()));
        assert!(!existing.overlaps(&Interval::new(at(9, 0), at(10, 0)).unwrap()));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert_eq!("Canceled".parse::<BookingStatus>().unwrap(), BookingStatus::Cancelled);
        assert!("draft".parse::<BookingStatus>().is_err());
        assert_eq!(BookingStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_normalize_attendees() {
        assert_eq!(normalize_attendees(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
        assert!(normalize_attendees(&[]).is_empty());
    }

    #[test]
    fn test_booking_serializes_camel_case() {
        let booking = Booking {
            id: 1,
            resource: "main-lab".to_string(),
            title: "Practical".to_string(),
            description: None,
            start_time: at(10, 0),
            end_time: at(11, 0),
            status: BookingStatus::Confirmed,
            owner_id: 4,
            attendees: vec![5],
            created_at: "2024-06-01 08:00:00".to_string(),
            updated_at: "2024-06-01 08:00:00".to_string(),
        };

        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["startTime"], "2024-06-14T10:00:00Z");
        assert_eq!(json["ownerId"], 4);
        assert_eq!(json["status"], "confirmed");
    }
}
