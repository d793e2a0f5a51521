// Use the library part of the `keystone` crate instead of local modules.
use keystone::config::AppConfig;
use keystone::session::{InMemorySessionStore, SessionAuthenticator};
use keystone::web_server::{run_server, AppState};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize structured logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    // 2. Load configuration. A missing signing secret must stop the process
    // here, before it binds a listener.
    let app_config = AppConfig::from_env()?;

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&app_config.database.url)
        .await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Migrations complete.");

    let sessions = Arc::new(SessionAuthenticator::new(
        &app_config.jwt.secret,
        app_config.jwt.token_ttl_minutes,
        Arc::new(InMemorySessionStore::default()),
    ));

    let app_state = AppState {
        db_pool,
        sessions,
        app_config,
    };

    // 3. Start the web server
    tracing::info!("Initializing server...");
    run_server(app_state).await
}
