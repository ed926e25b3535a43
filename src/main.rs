use std::sync::Arc;

use anyhow::{Context, Result};
use bistro_orderservice::{
    api::email::{HttpMailer, Mailer},
    core::{app_state::AppState, bootstrap, config, db},
    routes,
    store::{MemoryStore, PgStore, Store},
};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    let store: Arc<dyn Store> = match config.database.url.as_deref() {
        Some(url) => {
            tracing::info!("Running migrations...");
            let migrations_count = db::run_migrations_blocking(MIGRATIONS, url).await?;
            tracing::info!("Run {} new migrations successfully", migrations_count);

            let pool = db::create_pool(url, config.database.max_connections).await?;
            Arc::new(PgStore::new(pool))
        }
        None => Arc::new(MemoryStore::new()),
    };

    let client = reqwest::Client::builder()
        .timeout(config.email.timeout)
        .build()
        .context("Failed to build email HTTP client")?;
    let mailer: Arc<dyn Mailer> = Arc::new(HttpMailer::new(
        client,
        config.email.dispatch_url.clone(),
    ));

    let port = config.server.port;
    let app = routes::app(AppState::new(store, mailer, config))?;

    tracing::info!("Bootstrapping...");
    bootstrap::serve("OrderService", app, port).await
}
