//! Authentication gateway.
//!
//! Login, password reset by one-time code, signup and admin user
//! management. Every operation here is a complete use case; the HTTP
//! handlers only translate requests and responses.

use std::sync::Arc;

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::otp::{generate_otp, hash_otp, is_otp_fresh, verify_otp, NotifyError, OtpNotifier};
use super::password::{
    hash_password, validate_password, verify_dummy_password, verify_password, PasswordError,
};
use super::permission::{require_admin, PermissionError, Requester};
use super::token::{Claims, TokenError, TokenService};
use crate::db::{NewUser, Role, User, UserRepository, UserUpdate};
use crate::validation::{validate_new_user, ValidationError, ValidationErrors};
use crate::LabbookError;

/// Message returned for every failed login.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Message returned for every failed password reset confirmation.
pub const INVALID_OTP_MESSAGE: &str = "Invalid OTP or email";

/// Wrong guesses allowed against one reset code unless configured otherwise.
pub const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 5;

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Unknown email, or the code is missing, wrong or expired.
    #[error("Invalid OTP or email")]
    InvalidOtp,

    /// No account with that email or id.
    #[error("user not found")]
    UserNotFound,

    /// Email already registered.
    #[error("email already registered")]
    EmailExists,

    /// The user still owns or attends bookings.
    #[error("user is still referenced by bookings")]
    UserInUse,

    /// Input validation failed.
    #[error("validation error: {0}")]
    Validation(ValidationErrors),

    /// Caller lacks the required role.
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// Hashing failed.
    #[error("password error: {0}")]
    Password(PasswordError),

    /// Token signing failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The reset code could not be delivered.
    #[error(transparent)]
    Notification(#[from] NotifyError),

    /// Database or runtime failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LabbookError> for AuthError {
    fn from(e: LabbookError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl From<ValidationErrors> for AuthError {
    fn from(e: ValidationErrors) -> Self {
        AuthError::Validation(e)
    }
}

/// Progress of a single login attempt, used in log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    Verifying,
    Authenticated,
    Rejected,
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Signed session token.
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    /// The authenticated account.
    pub user: User,
}

/// Data for a new account.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub email: String,
    /// Plaintext password, hashed before storage.
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegistrationRequest {
    /// Create a registration request.
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

async fn hash_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(AuthError::Password)
}

/// Returns true when `password` matches `hash`. `None` burns a dummy
/// verification instead.
async fn verify_blocking(password: String, hash: Option<String>) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&password, &hash).is_ok(),
        None => {
            verify_dummy_password(&password);
            false
        }
    })
    .await
    .map_err(|e| AuthError::Internal(e.to_string()))
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Authentication use cases over the user store.
#[derive(Clone)]
pub struct AuthGateway {
    pool: SqlitePool,
    tokens: TokenService,
    notifier: Arc<dyn OtpNotifier>,
    otp_ttl_secs: u64,
    otp_max_attempts: u32,
}

impl AuthGateway {
    /// Create a gateway.
    pub fn new(
        pool: SqlitePool,
        tokens: TokenService,
        notifier: Arc<dyn OtpNotifier>,
        otp_ttl_secs: u64,
    ) -> Self {
        Self {
            pool,
            tokens,
            notifier,
            otp_ttl_secs,
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
        }
    }

    /// Discard a pending reset code after `attempts` wrong guesses.
    pub fn with_otp_max_attempts(mut self, attempts: u32) -> Self {
        self.otp_max_attempts = attempts.max(1);
        self
    }

    fn repo(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    /// The token service used for issuing and verifying sessions.
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Verify a presented bearer token.
    pub fn verify_token(&self, token: Option<&str>) -> Result<Claims, TokenError> {
        self.tokens.verify(token)
    }

    /// Authenticate with email and password and issue a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        debug!(state = ?LoginState::Unauthenticated, "Login attempt");
        let user = self.repo().get_by_email(email).await?;

        debug!(state = ?LoginState::Verifying, "Checking credentials");
        let hash = user.as_ref().map(|u| u.password.clone());
        let matched = verify_blocking(password.to_string(), hash).await?;

        let user = match user {
            Some(user) if matched => user,
            _ => {
                debug!(state = ?LoginState::Rejected, "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let token = self.tokens.issue(user.id, user.role)?;
        info!(
            state = ?LoginState::Authenticated,
            user_id = user.id,
            role = %user.role,
            "User logged in"
        );

        Ok(LoginOutcome {
            token,
            expires_in: self.tokens.expiry_secs(),
            user,
        })
    }

    /// Issue a reset code for `email` and deliver it.
    ///
    /// Any previous pending code for the account is replaced.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .repo()
            .get_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let code = generate_otp();
        self.repo()
            .set_otp(user.id, &hash_otp(&code), now_secs())
            .await?;
        self.notifier.send_otp(&user.email, &code).map_err(|e| {
            warn!(user_id = user.id, "Reset code delivery failed: {}", e);
            AuthError::from(e)
        })?;

        info!(user_id = user.id, "Password reset code issued");
        Ok(())
    }

    /// Set a new password using a pending reset code.
    ///
    /// The code is consumed in the same write as the password change.
    /// Sessions issued before the change remain valid until they expire.
    pub async fn confirm_password_reset(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = match self.repo().get_by_email(email).await? {
            Some(user) => user,
            None => {
                debug!("Reset confirmation for unknown email");
                return Err(AuthError::InvalidOtp);
            }
        };

        let (stored_hash, issued_at) = match (&user.otp_hash, user.otp_issued_at) {
            (Some(hash), Some(issued_at)) => (hash.clone(), issued_at),
            _ => {
                debug!(user_id = user.id, "Reset confirmation without pending code");
                return Err(AuthError::InvalidOtp);
            }
        };

        let now = now_secs();
        if !is_otp_fresh(issued_at, now, self.otp_ttl_secs) {
            debug!(user_id = user.id, "Reset code expired");
            self.repo().clear_otp(user.id).await?;
            return Err(AuthError::InvalidOtp);
        }

        if !verify_otp(otp, &stored_hash) {
            let discarded = self
                .repo()
                .record_otp_failure(user.id, &stored_hash, self.otp_max_attempts)
                .await?;
            if discarded {
                warn!(user_id = user.id, "Reset code discarded after repeated wrong guesses");
            } else {
                debug!(user_id = user.id, "Reset code mismatch");
            }
            return Err(AuthError::InvalidOtp);
        }

        validate_password(new_password)
            .map_err(|e| ValidationErrors::from(ValidationError::Password(e)))?;

        let new_hash = hash_blocking(new_password.to_string()).await?;
        let not_before = now - self.otp_ttl_secs as i64 + 1;
        let consumed = self
            .repo()
            .consume_otp(user.id, &stored_hash, not_before, &new_hash)
            .await?;
        if !consumed {
            debug!(user_id = user.id, "Reset code consumed concurrently");
            return Err(AuthError::InvalidOtp);
        }

        info!(user_id = user.id, "Password changed via reset code");
        Ok(())
    }

    /// Sign up a new account with the `user` role.
    pub async fn register(&self, request: RegistrationRequest) -> Result<User, AuthError> {
        self.create_user(request, Role::User).await
    }

    /// Create an account with any role (administrators only).
    pub async fn admin_create_user(
        &self,
        requester: &Requester,
        request: RegistrationRequest,
        role: Role,
    ) -> Result<User, AuthError> {
        require_admin(requester)?;
        let user = self.create_user(request, role).await?;
        info!(admin_id = requester.user_id, user_id = user.id, role = %role, "Admin created user");
        Ok(user)
    }

    async fn create_user(&self, request: RegistrationRequest, role: Role) -> Result<User, AuthError> {
        validate_new_user(
            &request.email,
            &request.password,
            &request.first_name,
            &request.last_name,
        )?;

        if self.repo().email_exists(&request.email).await? {
            return Err(AuthError::EmailExists);
        }

        let hash = hash_blocking(request.password).await?;
        let new_user = NewUser::new(request.email, hash, request.first_name, request.last_name)
            .with_role(role);

        let user = match self.repo().create(&new_user).await {
            Ok(user) => user,
            Err(LabbookError::Conflict(_)) => return Err(AuthError::EmailExists),
            Err(e) => return Err(e.into()),
        };

        info!(user_id = user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Fetch an account by id.
    pub async fn get_user(&self, id: i64) -> Result<User, AuthError> {
        self.repo()
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// List all accounts (administrators only).
    pub async fn list_users(&self, requester: &Requester) -> Result<Vec<User>, AuthError> {
        require_admin(requester)?;
        Ok(self.repo().list_all().await?)
    }

    /// Change the role of an account (administrators only).
    ///
    /// Tokens already issued keep the role they were issued with.
    pub async fn update_role(
        &self,
        requester: &Requester,
        id: i64,
        role: Role,
    ) -> Result<User, AuthError> {
        require_admin(requester)?;
        let user = self
            .repo()
            .update(id, &UserUpdate::new().role(role))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(admin_id = requester.user_id, user_id = id, role = %role, "User role changed");
        Ok(user)
    }

    /// Delete an account (administrators only).
    ///
    /// Fails with [`AuthError::UserInUse`] while bookings reference it.
    pub async fn delete_user(&self, requester: &Requester, id: i64) -> Result<(), AuthError> {
        require_admin(requester)?;
        match self.repo().delete(id).await {
            Ok(true) => {
                info!(admin_id = requester.user_id, user_id = id, "User deleted");
                Ok(())
            }
            Ok(false) => Err(AuthError::UserNotFound),
            Err(LabbookError::Conflict(_)) => Err(AuthError::UserInUse),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the configured administrator if no administrator exists yet.
    ///
    /// Returns the created account, or `None` when one already existed.
    pub async fn bootstrap_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AuthError> {
        if self.repo().count_by_role(Role::Admin).await? > 0 {
            debug!("Administrator already present, skipping bootstrap");
            return Ok(None);
        }

        let request = RegistrationRequest::new(email, password, "Lab", "Administrator");
        let user = self.create_user(request, Role::Admin).await?;
        info!(user_id = user.id, "Bootstrap administrator created");
        Ok(Some(user))
    }

    /// Clear reset codes whose lifetime has passed.
    pub async fn clear_expired_otps(&self) -> Result<u64, AuthError> {
        let not_before = now_secs() - self.otp_ttl_secs as i64;
        let cleared = self.repo().clear_expired_otps(not_before).await?;
        if cleared > 0 {
            info!("Cleared {} expired reset codes", cleared);
        }
        Ok(cleared)
    }
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway")
            .field("otp_ttl_secs", &self.otp_ttl_secs)
            .field("otp_max_attempts", &self.otp_max_attempts)
            .finish()
    }
}
