//! Router configuration for Web API.

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    availability, cancel_booking, change_password, create_booking, create_user, delete_user,
    get_booking, list_bookings, list_users, login, me, register, send_otp, update_booking,
    update_user_role, AppState,
};
use super::middleware::{
    auth_rate_limit, create_cors_layer, require_auth, security_headers, RateLimitState,
};

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    cors_origins: &[String],
    rate_limit: Arc<RateLimitState>,
) -> Router {
    // Credential routes (no authentication required, rate limited per IP)
    let auth_public_routes = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/send-otp", post(send_otp))
        .route("/auth/change-password", post(change_password))
        .route("/auth/register", post(register))
        .route_layer(middleware::from_fn(move |req, next| {
            let state = rate_limit.clone();
            auth_rate_limit(state, req, next)
        }));

    // Everything else requires a bearer token
    let protected_routes = Router::new()
        .route("/auth/me", get(me))
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/availability", get(availability))
        .route(
            "/bookings/:id",
            get(get_booking).patch(update_booking).delete(cancel_booking),
        )
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/role", patch(update_user_role))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(auth_public_routes)
        .merge(protected_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers)),
        )
        .with_state(app_state)
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
