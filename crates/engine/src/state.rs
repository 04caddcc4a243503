//! The engine handle shared by every caller.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::EngineSettings;
use crate::db::SharedStore;
use crate::events::{EventSink, TracingSink};
use crate::services::{
    CatalogService, CheckoutService, FulfillmentService, InventoryLedger, PaymentService,
    RideService,
};

/// Booking engine: a store, an event sink and settings.
///
/// This struct is cheaply cloneable via `Arc`. Services are thin views
/// borrowed from it; none of them keeps state of its own.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: SharedStore,
    events: Arc<dyn EventSink>,
    settings: EngineSettings,
}

impl Engine {
    /// Create an engine that logs its events through `tracing`.
    #[must_use]
    pub fn new(store: SharedStore, settings: EngineSettings) -> Self {
        Self::with_events(store, Arc::new(TracingSink), settings)
    }

    /// Create an engine with a custom event sink.
    #[must_use]
    pub fn with_events(
        store: SharedStore,
        events: Arc<dyn EventSink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                events,
                settings,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.inner.store
    }

    #[must_use]
    pub fn events(&self) -> &dyn EventSink {
        self.inner.events.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Timestamp used for every write of one operation.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Calendar day against which subscriptions are checked.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    #[must_use]
    pub const fn inventory(&self) -> InventoryLedger<'_> {
        InventoryLedger::new(self)
    }

    #[must_use]
    pub const fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self)
    }

    #[must_use]
    pub const fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(self)
    }

    #[must_use]
    pub const fn rides(&self) -> RideService<'_> {
        RideService::new(self)
    }

    #[must_use]
    pub const fn fulfillment(&self) -> FulfillmentService<'_> {
        FulfillmentService::new(self)
    }

    #[must_use]
    pub const fn payments(&self) -> PaymentService<'_> {
        PaymentService::new(self)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}
