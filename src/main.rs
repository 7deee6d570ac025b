use std::sync::Arc;

use tracing::{error, info, warn};

use labbook::{Config, Database, LogNotifier, WebServer};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let (mut config, load_error) = match Config::load(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = labbook::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        labbook::logging::init_console_only(&config.logging.level);
    }

    if let Some(e) = load_error {
        warn!("Failed to load {}: {}. Using default configuration.", config_path, e);
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("labbook - lab booking service");

    if let Err(e) = run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> labbook::Result<()> {
    let db = Database::open(&config.database.path).await?;
    let server = WebServer::new(&config, &db, Arc::new(LogNotifier))?;

    if let (Some(email), Some(password)) = (&config.admin.email, &config.admin.password) {
        match server.auth().bootstrap_admin(email, password).await {
            Ok(Some(user)) => info!(user_id = user.id, "Administrator account created"),
            Ok(None) => {}
            Err(e) => warn!("Failed to create administrator account: {}", e),
        }
    }

    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );
    server.run().await
}
