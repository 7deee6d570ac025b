//! API handlers.

use axum::extract::rejection::QueryRejection;

use crate::web::error::ApiError;

pub mod auth;
pub mod booking;
pub mod user;

pub use auth::*;
pub use booking::*;
pub use user::*;

/// Map a query string rejection to the API error body.
pub(crate) fn query_error(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid query: {}", rejection.body_text()))
}
