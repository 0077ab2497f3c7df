// src/main.rs

use assessment_backend::config::{Config, StorageKind};
use assessment_backend::models::user::UserProfile;
use assessment_backend::routes;
use assessment_backend::state::AppState;
use assessment_backend::store::{MemoryStore, PgStore, SharedStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env().expect("Invalid configuration");

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: SharedStore = match config.storage {
        StorageKind::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set");

            let store = PgStore::connect_with_retry(database_url, 5)
                .await
                .expect("Failed to connect to database after 5 retries");
            tracing::info!("Database connected...");

            // Run Migrations Automatically
            tracing::info!("Running migrations...");
            store
                .migrate()
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Migrations applied successfully.");

            Arc::new(store)
        }
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");
            let store = MemoryStore::new();

            if let Some(path) = &config.seed_users {
                match seed_users(&store, path).await {
                    Ok(count) => tracing::info!("Seeded {} users from {}", count, path),
                    Err(e) => tracing::error!("Failed to seed users from {}: {:?}", path, e),
                }
            }

            Arc::new(store)
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    // Create AppState
    let state = AppState { store, config };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

/// Loads a JSON array of user profiles into the in-memory directory.
async fn seed_users(store: &MemoryStore, path: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let users: Vec<UserProfile> = serde_json::from_str(&raw)?;
    let count = users.len();

    for user in users {
        store.insert_user(user).await;
    }
    Ok(count)
}
