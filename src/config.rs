//! Configuration module for labbook.

use serde::Deserialize;
use std::path::Path;

use crate::{LabbookError, Result};

/// Minimum accepted length of the token signing secret in bytes.
pub const MIN_JWT_SECRET_LENGTH: usize = 16;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            trust_proxy: false,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/labbook.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token signing secret (must be set).
    #[serde(default)]
    pub jwt_secret: String,
    /// Session token lifetime in seconds.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,
    /// Lifetime of a password reset code in seconds.
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: u64,
    /// Requests per minute and client on the login/reset endpoints.
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
    /// Wrong guesses allowed against one reset code before it is discarded.
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: u32,
}

fn default_token_expiry() -> u64 {
    3600
}

fn default_otp_ttl() -> u64 {
    600
}

fn default_login_rate_limit() -> u32 {
    10
}

fn default_otp_max_attempts() -> u32 {
    5
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_secs: default_token_expiry(),
            otp_ttl_secs: default_otp_ttl(),
            login_rate_limit: default_login_rate_limit(),
            otp_max_attempts: default_otp_max_attempts(),
        }
    }
}

/// Booking configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Lab used when a request does not name one.
    #[serde(default = "default_resource")]
    pub default_resource: String,
}

fn default_resource() -> String {
    "main-lab".to_string()
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            default_resource: default_resource(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/labbook.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Initial administrator account, created on startup when no admin exists.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    /// Administrator email.
    #[serde(default)]
    pub email: Option<String>,
    /// Administrator password (plaintext, hashed before storage).
    #[serde(default)]
    pub password: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Booking configuration.
    #[serde(default)]
    pub booking: BookingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Bootstrap administrator.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(LabbookError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| LabbookError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `LABBOOK_JWT_SECRET`: token signing secret
    /// - `LABBOOK_DATABASE_PATH`: SQLite database path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("LABBOOK_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.auth.jwt_secret = jwt_secret;
            }
        }
        if let Ok(path) = std::env::var("LABBOOK_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the signing secret is missing or shorter than
    /// [`MIN_JWT_SECRET_LENGTH`], or if a lifetime is zero.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(LabbookError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via LABBOOK_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(LabbookError::Config(format!(
                "jwt_secret must be at least {MIN_JWT_SECRET_LENGTH} bytes"
            )));
        }
        if self.auth.token_expiry_secs == 0
            || self.auth.otp_ttl_secs == 0
            || self.auth.otp_max_attempts == 0
        {
            return Err(LabbookError::Config(
                "token_expiry_secs, otp_ttl_secs and otp_max_attempts must be positive".to_string(),
            ));
        }
        if self.booking.default_resource.trim().is_empty() {
            return Err(LabbookError::Config(
                "booking.default_resource must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
