//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::auth::AuthGateway;
use crate::booking::BookingService;
use crate::web::dto::{
    ApiResponse, ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    RegisterRequest, SendOtpRequest, UserInfo, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Credential and session use cases.
    pub auth: AuthGateway,
    /// Booking use cases.
    pub bookings: BookingService,
}

impl AppState {
    /// Create a new application state.
    pub fn new(auth: AuthGateway, bookings: BookingService) -> Self {
        Self { auth, bookings }
    }
}

/// POST /auth/login - Log in with email and password.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let outcome = state.auth.login(req.email.trim(), &req.password).await?;

    Ok(Json(LoginResponse {
        token: outcome.token,
        expires_in: outcome.expires_in,
        user: outcome.user.into(),
    }))
}

/// POST /auth/send-otp - Issue a password reset code.
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<SendOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.request_password_reset(req.email.trim()).await?;
    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

/// POST /auth/change-password - Set a new password with a reset code.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .confirm_password_reset(req.email.trim(), &req.otp, &req.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// POST /auth/register - Sign up a new account.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserInfo>>), ApiError> {
    let user = state.auth.register(req.into()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(user.into()))))
}

/// GET /auth/me - Get the current user.
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = state.auth.get_user(auth_user.0.sub).await?;
    Ok(Json(ApiResponse::new(user.into())))
}
