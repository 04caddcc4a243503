//! Driver availability.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use soko_core::UserId;

/// What ride assignment needs to know about a driver.
///
/// Verification and subscription expiry are owned by the identity service and
/// synced in; the online flag is toggled by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverAvailability {
    pub driver_id: UserId,
    pub online: bool,
    pub verified: bool,
    pub subscription_expiry: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl DriverAvailability {
    /// Whether the subscription covers `today`.
    #[must_use]
    pub fn subscription_valid(&self, today: NaiveDate) -> bool {
        self.subscription_expiry.is_some_and(|expiry| expiry > today)
    }

    /// Counted as available for new rides.
    #[must_use]
    pub fn is_eligible(&self, today: NaiveDate) -> bool {
        self.online && self.verified && self.subscription_valid(today)
    }
}
