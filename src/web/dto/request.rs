//! Request DTOs for Web API.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::validation::no_control_chars;
use crate::auth::RegistrationRequest;
use crate::booking::{BookingChanges, BookingFilter, BookingInput};
use crate::db::Role;

/// Login request.
///
/// Missing fields deserialize as empty strings and fail like any other bad
/// credential.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Reset code request.
#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
}

/// Password change with a reset code.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub new_password: String,
}

/// Signup request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    #[validate(custom(function = "no_control_chars"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(custom(function = "no_control_chars"))]
    pub last_name: String,
}

impl From<RegisterRequest> for RegistrationRequest {
    fn from(req: RegisterRequest) -> Self {
        RegistrationRequest::new(req.email, req.password, req.first_name, req.last_name)
    }
}

/// Admin request creating an account with a role.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub account: RegisterRequest,
    #[serde(default)]
    pub role: Role,
}

/// Admin request changing a role.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// New booking.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "no_control_chars"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<i64>,
}

impl From<CreateBookingRequest> for BookingInput {
    fn from(req: CreateBookingRequest) -> Self {
        BookingInput {
            resource: req.resource,
            title: req.title,
            description: req.description,
            start_time: req.start_time,
            end_time: req.end_time,
            attendees: req.attendees,
        }
    }
}

/// Reschedule or edit of a booking. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attendees: Option<Vec<i64>>,
}

impl From<UpdateBookingRequest> for BookingChanges {
    fn from(req: UpdateBookingRequest) -> Self {
        BookingChanges {
            start_time: req.start_time,
            end_time: req.end_time,
            title: req.title,
            description: req.description,
            attendees: req.attendees,
        }
    }
}

/// Query of `GET /bookings/availability`.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub resource: Option<String>,
    /// Booking to ignore, typically the one being rescheduled.
    #[serde(default)]
    pub exclude: Option<i64>,
}

/// Query of `GET /bookings`.
#[derive(Debug, Default, Deserialize)]
pub struct ListBookingsQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner: Option<i64>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default, alias = "includeCancelled")]
    pub include_cancelled: bool,
}

impl From<ListBookingsQuery> for BookingFilter {
    fn from(query: ListBookingsQuery) -> Self {
        BookingFilter {
            from: query.from,
            to: query.to,
            owner_id: query.owner,
            resource: query.resource,
            include_cancelled: query.include_cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_password_uses_camel_case() {
        let req: ChangePasswordRequest = serde_json::from_value(serde_json::json!({
            "email": "ada@uni.example",
            "otp": "123456",
            "newPassword": "difference2"
        }))
        .unwrap();
        assert_eq!(req.new_password, "difference2");
    }

    #[test]
    fn test_login_missing_fields_default_empty() {
        let req: LoginRequest = serde_json::from_str("{}").unwrap();
        assert!(req.email.is_empty());
        assert!(req.password.is_empty());
    }

    #[test]
    fn test_create_user_flattens_account() {
        let req: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "email": "turing@uni.example",
            "password": "enigma-machine",
            "firstName": "Alan",
            "lastName": "Turing",
            "role": "instructor"
        }))
        .unwrap();
        assert_eq!(req.role, Role::Lecturer);
        assert_eq!(req.account.first_name, "Alan");
    }

    #[test]
    fn test_register_rejects_control_chars() {
        let req = RegisterRequest {
            email: "ada@uni.example".to_string(),
            password: "analytical1".to_string(),
            first_name: "Ada\u{7}".to_string(),
            last_name: "Lovelace".to_string(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("first_name"));
    }

    #[test]
    fn test_create_booking_request() {
        let req: CreateBookingRequest = serde_json::from_value(serde_json::json!({
            "title": "Practical",
            "startTime": "2024-06-14T10:00:00Z",
            "endTime": "2024-06-14T11:00:00Z",
            "attendees": [2, 3]
        }))
        .unwrap();

        let input = BookingInput::from(req);
        assert_eq!(input.start_time.to_rfc3339(), "2024-06-14T10:00:00+00:00");
        assert_eq!(input.attendees, vec![2, 3]);
        assert!(input.resource.is_none());
    }

    #[test]
    fn test_create_booking_requires_times() {
        let result: Result<CreateBookingRequest, _> =
            serde_json::from_value(serde_json::json!({ "title": "Practical" }));
        assert!(result.is_err());
    }
}
