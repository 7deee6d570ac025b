//! Booking errors.

use thiserror::Error;

use super::types::Booking;
use crate::auth::PermissionError;
use crate::validation::ValidationErrors;
use crate::LabbookError;

/// Booking use-case errors.
#[derive(Error, Debug)]
pub enum BookingError {
    /// The interval is empty or reversed.
    #[error("start time must be before end time")]
    InvalidInterval,

    /// Field validation failed.
    #[error("validation error: {0}")]
    Validation(ValidationErrors),

    /// No booking with that id.
    #[error("booking not found")]
    NotFound,

    /// Requester is neither the owner nor an administrator.
    #[error(transparent)]
    Forbidden(#[from] PermissionError),

    /// Confirmed bookings already occupy part of the interval.
    #[error("time slot is already booked")]
    SlotConflict { conflicts: Vec<Booking> },

    /// The requester's account no longer exists.
    #[error("requesting user not found")]
    OwnerNotFound,

    /// Attendee ids that do not name a user.
    #[error("unknown attendees: {0:?}")]
    UnknownAttendee(Vec<i64>),

    /// The booking was cancelled and cannot be edited.
    #[error("booking is cancelled")]
    Cancelled,

    /// Database failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LabbookError> for BookingError {
    fn from(e: LabbookError) -> Self {
        BookingError::Internal(e.to_string())
    }
}

impl From<ValidationErrors> for BookingError {
    fn from(e: ValidationErrors) -> Self {
        BookingError::Validation(e)
    }
}
