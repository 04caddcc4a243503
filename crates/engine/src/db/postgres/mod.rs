//! `PostgreSQL` implementation of the store traits.
//!
//! All queries are runtime-checked `query_as` calls against internal row types
//! that convert into the domain models. Every conditional write is a single
//! statement whose `WHERE` clause carries the precondition; multi-row units run
//! inside one transaction.

mod drivers;
mod orders;
mod payments;
mod products;
mod rides;

use std::str::FromStr;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::config::DatabaseConfig;

/// Store backed by a `PostgreSQL` connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for migrations and health checks.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create a `PostgreSQL` connection pool from configuration.
///
/// Every connection carries a `statement_timeout`, so no store operation can
/// block indefinitely; a timed-out statement surfaces as a transient error.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is malformed or the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let statement_timeout = config.statement_timeout.as_millis().to_string();
    let options = PgConnectOptions::from_str(config.url.expose_secret())?
        .options([("statement_timeout", statement_timeout.as_str())]);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
}

/// Status names for binding as a `text[]` and comparing with `status::text = ANY($n)`.
fn status_names<T: Copy>(statuses: &[T], name: impl Fn(T) -> &'static str) -> Vec<&'static str> {
    statuses.iter().map(|status| name(*status)).collect()
}
