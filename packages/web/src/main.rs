use std::sync::Arc;

use anyhow::Context;
use api::{AppState, Settings};
use store::{MemoryStore, PgStore, Store};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::new().context("Failed to load settings")?;

    let store: Arc<dyn Store> = match settings.database.url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, settings.database.max_connections)
                .await
                .context("Failed to connect to database")?;
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Using PostgreSQL store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping everything in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(settings, store).context("Failed to build application state")?;
    api::serve(state).await.context("Server error")?;
    Ok(())
}
