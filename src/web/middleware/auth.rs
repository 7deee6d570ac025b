//! Bearer token authentication middleware.

use std::sync::Arc;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};

use crate::auth::{Claims, Requester};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Extract the token from an `Authorization` header value.
///
/// The `Bearer ` prefix is optional; a blank value counts as no token.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Middleware rejecting requests without a valid session token.
///
/// On success the verified [`Claims`] are stored in the request extensions
/// for the [`AuthUser`] extractor.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let claims = state.auth.verify_token(bearer_token(header))?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Extractor for authenticated users.
///
/// Only valid on routes behind [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// The identity behind the request.
    pub fn requester(&self) -> Requester {
        Requester::from(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                tracing::error!("AuthUser used on a route without require_auth");
                ApiError::internal("An internal error occurred")
            })
    }
}
