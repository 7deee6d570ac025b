//! API error handling for labbook.
//!
//! Every failure leaves the API as a flat JSON object whose `message` is
//! meant for display, e.g. `{"message": "Invalid email or password",
//! "code": "BAD_REQUEST"}`.

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::{AuthError, TokenError};
use crate::booking::{Booking, BookingError};
use crate::validation::ValidationErrors;

/// Message for requests to protected routes without a token.
pub const NO_TOKEN_MESSAGE: &str = "Access denied. No token provided.";

/// Message for requests carrying an unusable token.
pub const BAD_TOKEN_MESSAGE: &str = "Failed to authenticate token";

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Unauthorized (401).
    Unauthorized,
    /// Forbidden (403).
    Forbidden,
    /// Not found (404).
    NotFound,
    /// Conflict (409).
    Conflict,
    /// Validation error (422) - for field-level validation errors.
    ValidationError,
    /// Too many requests (429).
    TooManyRequests,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub message: String,
    /// Error code.
    pub code: ErrorCode,
    /// Field-level validation error details (only present for validation errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Vec<String>>>,
    /// Bookings blocking the requested slot (only present for slot conflicts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<Booking>>,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<HashMap<String, Vec<String>>>,
    conflicts: Option<Vec<Booking>>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            conflicts: None,
        }
    }

    /// Create a new API error with field-level details.
    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// Error code of this error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Display message of this error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Create a slot conflict error listing the blocking bookings.
    pub fn slot_conflict(message: impl Into<String>, conflicts: Vec<Booking>) -> Self {
        Self {
            conflicts: Some(conflicts),
            ..Self::new(ErrorCode::Conflict, message)
        }
    }

    /// Create a too many requests error.
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TooManyRequests, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a validation error with field-level details.
    pub fn validation(details: HashMap<String, Vec<String>>) -> Self {
        Self::with_details(ErrorCode::ValidationError, "Validation failed", details)
    }

    /// Create a validation error from validator::ValidationErrors.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let mut details: HashMap<String, Vec<String>> = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", field))
                })
                .collect();
            details.insert(field.to_string(), messages);
        }

        Self::validation(details)
    }

    /// Log and hide an infrastructure failure.
    fn internal_logged(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", err);
        ApiError::internal("An internal error occurred")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            message: self.message,
            code: self.code,
            details: self.details,
            conflicts: self.conflicts,
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::validation(errors.field_map())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingToken => ApiError::unauthorized(NO_TOKEN_MESSAGE),
            TokenError::MalformedToken => ApiError::bad_request(BAD_TOKEN_MESSAGE),
            TokenError::Issue(_) => ApiError::internal_logged(err),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidOtp => {
                ApiError::bad_request(err.to_string())
            }
            AuthError::UserNotFound => ApiError::not_found("User not found"),
            AuthError::EmailExists => ApiError::conflict("Email is already registered"),
            AuthError::UserInUse => {
                ApiError::conflict("User still owns or attends bookings")
            }
            AuthError::Validation(errors) => errors.into(),
            AuthError::Permission(e) => ApiError::forbidden(e.to_string()),
            AuthError::Token(e) => e.into(),
            AuthError::Password(_) | AuthError::Notification(_) | AuthError::Internal(_) => {
                ApiError::internal_logged(err)
            }
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InvalidInterval => ApiError::bad_request("Start time must be before end time"),
            BookingError::Validation(errors) => errors.into(),
            BookingError::NotFound => ApiError::not_found("Booking not found"),
            BookingError::Forbidden(e) => ApiError::forbidden(e.to_string()),
            BookingError::SlotConflict { conflicts } => {
                ApiError::slot_conflict("The requested time slot is already booked", conflicts)
            }
            BookingError::UnknownAttendee(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                ApiError::bad_request(format!("Unknown attendees: {}", ids.join(", ")))
            }
            BookingError::OwnerNotFound => ApiError::not_found("User not found"),
            BookingError::Cancelled => ApiError::conflict("Booking is cancelled"),
            BookingError::Internal(_) => ApiError::internal_logged(err),
        }
    }
}
