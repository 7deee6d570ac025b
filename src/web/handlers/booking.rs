//! Booking handlers.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::booking::{Availability, Booking, BookingFilter, Interval};
use crate::web::dto::{
    ApiResponse, AvailabilityQuery, CreateBookingRequest, ListBookingsQuery,
    UpdateBookingRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::{query_error, AppState};

/// GET /bookings/availability - Check whether a slot is free.
pub async fn availability(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Availability>>, ApiError> {
    let Query(query) = query.map_err(query_error)?;
    let interval = Interval::new(query.start, query.end)?;

    let availability = state
        .bookings
        .check_availability(query.resource.as_deref(), &interval, query.exclude)
        .await?;

    Ok(Json(ApiResponse::new(availability)))
}

/// GET /bookings - List bookings.
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    query: Result<Query<ListBookingsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ApiError> {
    let Query(query) = query.map_err(query_error)?;
    let filter = BookingFilter::from(query);
    let bookings = state.bookings.list(&filter).await?;
    Ok(Json(ApiResponse::new(bookings)))
}

/// POST /bookings - Create a booking owned by the caller.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), ApiError> {
    let booking = state
        .bookings
        .create(req.into(), &auth_user.requester())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(booking))))
}

/// GET /bookings/:id - Get a booking.
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    _auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = state.bookings.get(id).await?;
    Ok(Json(ApiResponse::new(booking)))
}

/// PATCH /bookings/:id - Reschedule or edit a booking.
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = state
        .bookings
        .reschedule(id, req.into(), &auth_user.requester())
        .await?;
    Ok(Json(ApiResponse::new(booking)))
}

/// POST /bookings/:id/cancel and DELETE /bookings/:id - Cancel a booking.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = state.bookings.cancel(id, &auth_user.requester()).await?;
    Ok(Json(ApiResponse::new(booking)))
}
