//! Soko Engine - booking and fulfillment core.
//!
//! Assigns contended resources (a pending ride, units of stock) to exactly one
//! requester and keeps checkout all-or-nothing across stock, orders and the
//! payment record.
//!
//! # Modules
//!
//! - [`services`] - Fare calculator, inventory ledger, checkout, ride and order
//!   state machines, catalog and payments
//! - [`db`] - Store traits with `PostgreSQL` and in-memory implementations
//! - [`models`] - Persisted domain records
//! - [`events`] - Fire-and-forget domain events
//! - [`config`] - Environment configuration
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = EngineConfig::from_env()?;
//! let pool = create_pool(&config.database).await?;
//! let engine = Engine::new(Arc::new(PgStore::new(pool)), config.settings);
//!
//! let ride = engine.rides().request(&caller, request).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod state;

pub use config::{ConfigError, DatabaseConfig, EngineConfig, EngineSettings};
pub use db::{MemoryStore, PgStore, RepositoryError, SharedStore, Store, create_pool};
pub use error::{BookingError, ErrorKind};
pub use events::{ChannelSink, DomainEvent, EventSink, TracingSink};
pub use state::Engine;
