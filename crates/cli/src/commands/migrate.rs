//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! soko migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SOKO_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/engine/migrations/` and create the `soko` schema:
//! ```text
//! migrations/
//! ├── 20260301000001_create_schema.sql
//! ├── 20260301000002_create_products.sql
//! ├── 20260301000003_create_orders_and_payments.sql
//! └── 20260301000004_create_rides.sql
//! ```

/// Run the engine's database migrations.
///
/// # Errors
///
/// Returns an error if configuration is missing, the database is unreachable,
/// or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (_, pool) = super::connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../engine/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
