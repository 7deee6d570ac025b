//! labbook - Lab booking service
//!
//! Reservations of university labs with conflict-free scheduling and
//! token-based authentication, served over an HTTP API backed by SQLite.

pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod validation;
pub mod web;

pub use auth::{
    hash_password, validate_password, verify_password, AuthError, AuthGateway, Claims,
    LogNotifier, OtpNotifier, PasswordError, PermissionError, Requester, TokenError,
    TokenService,
};
pub use booking::{
    Availability, Booking, BookingChanges, BookingError, BookingFilter, BookingInput,
    BookingService, BookingStatus, Interval,
};
pub use config::Config;
pub use db::{Database, NewUser, Role, User, UserRepository, UserUpdate};
pub use error::{LabbookError, Result};
pub use web::WebServer;
