//! Session token issuing and verification.
//!
//! Tokens are HS256 JWTs carrying the user id and role. They are stateless:
//! verification never consults the user store, and a token stays valid
//! until its `exp` claim passes.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::Role;

/// Token-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No credential was presented.
    #[error("no token provided")]
    MissingToken,

    /// A credential was presented but is unparsable, wrongly signed or expired.
    #[error("malformed or invalid token")]
    MalformedToken,

    /// Signing failed.
    #[error("failed to issue token: {0}")]
    Issue(String),
}

/// Claims embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: i64,
    /// User role at issuance time.
    pub role: Role,
    /// Issued at (unix seconds).
    pub iat: u64,
    /// Expiration (unix seconds).
    pub exp: u64,
    /// Token ID.
    pub jti: String,
}

impl Claims {
    /// Build claims for `user_id` valid for `ttl_secs` from `now`.
    pub fn new(user_id: i64, role: Role, now: u64, ttl_secs: u64) -> Self {
        Self {
            sub: user_id,
            role,
            iat: now,
            exp: now + ttl_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Signs and verifies session tokens with one process-wide secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry_secs: u64,
}

impl TokenService {
    /// Create a token service from the signing secret and token lifetime.
    pub fn new(secret: &str, expiry_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry_secs,
        }
    }

    /// Lifetime of issued tokens in seconds.
    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }

    /// Issue a token for a user with the configured lifetime.
    pub fn issue(&self, user_id: i64, role: Role) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.issue_claims(&Claims::new(user_id, role, now, self.expiry_secs))
    }

    /// Sign explicit claims.
    pub fn issue_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Issue(e.to_string()))
    }

    /// Verify a presented token.
    ///
    /// `None` or a blank string is [`TokenError::MissingToken`]; anything that
    /// fails decoding, signature or expiry checks is
    /// [`TokenError::MalformedToken`].
    pub fn verify(&self, token: Option<&str>) -> Result<Claims, TokenError> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(TokenError::MissingToken),
        };

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {}", e);
                TokenError::MalformedToken
            })
    }
}
