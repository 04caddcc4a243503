//! Soko Core - Shared types library.
//!
//! This crate provides the types shared by every Soko component:
//! - `engine` - Booking and fulfillment core (rides, stock, checkout, orders)
//! - `cli` - Command-line tools for migrations, seeding and operations
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, statuses with their transition rules, roles and
//!   caller identity, payment methods and vehicle categories

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
