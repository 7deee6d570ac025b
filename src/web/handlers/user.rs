//! User administration handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::web::dto::{
    ApiResponse, CreateUserRequest, MessageResponse, UpdateRoleRequest, UserInfo, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

/// GET /users - List all users (admin only).
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<Vec<UserInfo>>>, ApiError> {
    let users = state.auth.list_users(&auth_user.requester()).await?;
    let users = users.into_iter().map(UserInfo::from).collect();
    Ok(Json(ApiResponse::new(users)))
}

/// POST /users - Create an account with a role (admin only).
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserInfo>>), ApiError> {
    let user = state
        .auth
        .admin_create_user(&auth_user.requester(), req.account.into(), req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(user.into()))))
}

/// PATCH /users/:id/role - Change a user's role (admin only).
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = state
        .auth
        .update_role(&auth_user.requester(), id, req.role)
        .await?;
    Ok(Json(ApiResponse::new(user.into())))
}

/// DELETE /users/:id - Delete a user (admin only).
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.delete_user(&auth_user.requester(), id).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}
