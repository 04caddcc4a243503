//! Booking and fulfillment services.
//!
//! Each service is a borrowed view over an [`Engine`](crate::Engine). Role and
//! subscription checks happen before any store call, so a rejected caller
//! never causes a state change.

pub mod catalog;
pub mod checkout;
pub mod fare;
pub mod fulfillment;
pub mod inventory;
pub mod payments;
pub mod rides;

pub use catalog::CatalogService;
pub use checkout::{CheckoutReceipt, CheckoutRequest, CheckoutService};
pub use fulfillment::FulfillmentService;
pub use inventory::InventoryLedger;
pub use payments::PaymentService;
pub use rides::{RequestedRide, RideService};

use chrono::NaiveDate;

use soko_core::{Caller, Role};

use crate::error::{BookingError, Result};

/// Reject callers that do not hold `role`.
fn require_role(caller: &Caller, role: Role, action: &'static str) -> Result<()> {
    if caller.is(role) {
        Ok(())
    } else {
        Err(BookingError::Forbidden {
            role: caller.role,
            action,
        })
    }
}

/// Reject callers whose subscription does not cover `today`.
fn require_subscription(caller: &Caller, today: NaiveDate) -> Result<()> {
    if caller.has_active_subscription(today) {
        Ok(())
    } else {
        Err(BookingError::SubscriptionRequired)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{Days, NaiveDate, Utc};
    use tokio::sync::mpsc;

    use soko_core::{Caller, Role, UserId};

    use crate::config::EngineSettings;
    use crate::db::MemoryStore;
    use crate::events::{ChannelSink, DomainEvent};
    use crate::state::Engine;

    pub fn engine() -> (Engine, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sink, rx) = ChannelSink::new();
        let engine = Engine::with_events(
            Arc::new(MemoryStore::new()),
            Arc::new(sink),
            EngineSettings::default(),
        );
        (engine, rx)
    }

    pub fn next_month() -> NaiveDate {
        Utc::now()
            .date_naive()
            .checked_add_days(Days::new(30))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn customer() -> Caller {
        Caller::new(UserId::new(), Role::Customer)
    }

    pub fn subscribed(role: Role) -> Caller {
        Caller::new(UserId::new(), role)
            .verified()
            .with_subscription(next_month())
    }

    pub fn admin() -> Caller {
        Caller::new(UserId::new(), Role::Admin)
    }
}
