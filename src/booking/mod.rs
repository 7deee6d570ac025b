//! Lab bookings for labbook.
//!
//! This module provides the booking model, availability checks, persistence
//! and the lifecycle service.

pub mod availability;
mod error;
mod repository;
mod service;
mod types;

pub use availability::{check_availability, find_conflicts};
pub use error::BookingError;
pub use repository::{BookingRepository, BookingRewrite, NewBooking, SlotWrite};
pub use service::BookingService;
pub use types::{
    normalize_attendees, Availability, Booking, BookingChanges, BookingFilter, BookingInput,
    BookingStatus, Interval,
};
