//! Shared helpers for the HTTP API tests.
//!
//! Each test gets its own in-memory database behind an `axum_test::TestServer`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum_test::TestServer;
use serde_json::{json, Value};

use labbook::auth::NotifyError;
use labbook::{AuthGateway, Config, Database, OtpNotifier, WebServer};

/// Password used for every test account.
pub const PASSWORD: &str = "correct-horse-battery";

/// Administrator created by [`TestApp::admin_token`].
pub const ADMIN_EMAIL: &str = "admin@uni.example";

/// Notifier that keeps every delivered reset code in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// The most recent code sent to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to.eq_ignore_ascii_case(email))
            .map(|(_, code)| code.clone())
    }

    /// Number of codes delivered so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl OtpNotifier for RecordingNotifier {
    fn send_otp(&self, email: &str, code: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

/// A running API plus handles into its internals.
pub struct TestApp {
    pub server: TestServer,
    pub notifier: Arc<RecordingNotifier>,
    pub auth: AuthGateway,
}

/// Configuration for tests with a generous rate limit.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.auth.jwt_secret = "test-secret-key-for-testing-only".to_string();
    config.auth.login_rate_limit = 1000;
    config
}

/// Start an API over a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

/// Start an API with a custom configuration.
pub async fn spawn_app_with(config: Config) -> TestApp {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let notifier = Arc::new(RecordingNotifier::default());

    let web = WebServer::new(&config, &db, notifier.clone()).expect("Failed to build server");
    let auth = web.auth().clone();
    let server = TestServer::new(web.router()).expect("Failed to create test server");

    TestApp {
        server,
        notifier,
        auth,
    }
}

/// Format an `Authorization` header value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

impl TestApp {
    /// Sign up an account and return its id.
    pub async fn register(&self, email: &str, first_name: &str, last_name: &str) -> i64 {
        let response = self
            .server
            .post("/auth/register")
            .json(&json!({
                "email": email,
                "password": PASSWORD,
                "firstName": first_name,
                "lastName": last_name
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        body["data"]["id"].as_i64().expect("registered user has an id")
    }

    /// Log in and return the session token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .server
            .post("/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        body["token"].as_str().expect("login returns a token").to_string()
    }

    /// Sign up and log in, returning `(id, token)`.
    pub async fn user_token(&self, email: &str, first_name: &str, last_name: &str) -> (i64, String) {
        let id = self.register(email, first_name, last_name).await;
        let token = self.login(email, PASSWORD).await;
        (id, token)
    }

    /// Create the administrator if needed and return its token.
    pub async fn admin_token(&self) -> String {
        self.auth
            .bootstrap_admin(ADMIN_EMAIL, PASSWORD)
            .await
            .expect("Failed to bootstrap admin");
        self.login(ADMIN_EMAIL, PASSWORD).await
    }
}
