//! Web server for labbook.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::auth::{AuthGateway, OtpNotifier, TokenService};
use crate::booking::BookingService;
use crate::config::Config;
use crate::{Database, LabbookError, Result};

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::create_router;

/// Reset code cleanup interval: 1 hour.
const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Per-IP limiter for the credential endpoints.
    rate_limit: Arc<RateLimitState>,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server sharing the pool of `db`.
    pub fn new(config: &Config, db: &Database, notifier: Arc<dyn OtpNotifier>) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse::<SocketAddr>()
            .map_err(|e| {
                LabbookError::Config(format!(
                    "invalid server address {}:{}: {}",
                    config.server.host, config.server.port, e
                ))
            })?;

        let tokens = TokenService::new(&config.auth.jwt_secret, config.auth.token_expiry_secs);
        let auth = AuthGateway::new(
            db.pool().clone(),
            tokens,
            notifier,
            config.auth.otp_ttl_secs,
        )
        .with_otp_max_attempts(config.auth.otp_max_attempts);
        let bookings = BookingService::new(db.pool().clone(), &config.booking.default_resource);

        Ok(Self {
            addr,
            app_state: Arc::new(AppState::new(auth, bookings)),
            rate_limit: Arc::new(
                RateLimitState::new(config.auth.login_rate_limit)
                    .trust_proxy(config.server.trust_proxy),
            ),
            cors_origins: config.server.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Credential use cases backing the server.
    pub fn auth(&self) -> &AuthGateway {
        &self.app_state.auth
    }

    /// Build the router without binding a socket.
    pub fn router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            &self.cors_origins,
            self.rate_limit.clone(),
        )
    }

    /// Start the reset code cleanup background task.
    ///
    /// Runs every hour and clears reset codes whose lifetime has passed.
    fn start_otp_cleanup_task(auth: AuthGateway) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                match auth.clear_expired_otps().await {
                    Ok(0) => tracing::debug!("No expired reset codes to clean up"),
                    Ok(count) => tracing::info!(cleared = count, "Cleaned up expired reset codes"),
                    Err(e) => tracing::warn!(error = %e, "Failed to clean up reset codes"),
                }
            }
        });
    }

    async fn bind(self) -> Result<(TcpListener, Router, SocketAddr)> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        // Background tasks start after a successful bind
        Self::start_otp_cleanup_task(self.app_state.auth.clone());
        self.rate_limit.clone().start_cleanup_task();
        tracing::info!("Reset code cleanup task started (runs every hour)");

        tracing::info!("Web server listening on http://{}", local_addr);
        Ok((listener, router, local_addr))
    }

    /// Run the web server.
    pub async fn run(self) -> Result<()> {
        let (listener, router, _) = self.bind().await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let (listener, router, local_addr) = self.bind().await?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
