//! CLI subcommands.

pub mod fare;
pub mod migrate;
pub mod payments;
pub mod reservations;
pub mod seed;

use std::sync::Arc;

use soko_engine::{Engine, EngineConfig, PgStore, create_pool};

/// Load configuration from the environment and connect an engine to `PostgreSQL`.
async fn connect() -> Result<(Engine, sqlx::PgPool), Box<dyn std::error::Error>> {
    let config = EngineConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;
    let engine = Engine::new(Arc::new(PgStore::new(pool.clone())), config.settings);
    Ok((engine, pool))
}
