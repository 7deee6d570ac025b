//! Authentication module for labbook.
//!
//! This module provides password hashing, session tokens, one-time reset
//! codes, role checks and the gateway tying them to the user store.

pub mod gateway;
pub mod otp;
mod password;
pub mod permission;
pub mod token;

pub use gateway::{AuthError, AuthGateway, LoginOutcome, LoginState, RegistrationRequest};
pub use otp::{LogNotifier, NotifyError, OtpNotifier};
pub use password::{
    hash_password, validate_password, verify_dummy_password, verify_password, PasswordError,
};
pub use permission::{can_modify_booking, require_admin, PermissionError, Requester};
pub use token::{Claims, TokenError, TokenService};
