//! Core types for Soko.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod payment;
pub mod role;
pub mod status;
pub mod vehicle;

pub use id::*;
pub use payment::{PaymentMethod, PaymentPurpose, PaymentStatus, UnknownPaymentMethod};
pub use role::{Caller, Role};
pub use status::*;
pub use vehicle::{CarCategory, UnknownCarCategory};
