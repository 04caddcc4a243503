//! Rides.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use soko_core::{CarCategory, RideId, RideStatus, UserId};

/// Longest distance a ride row holds (`NUMERIC(8, 2)`): 999 999.99 km.
pub const MAX_DISTANCE_KM: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

/// Scale of stored distances.
pub const DISTANCE_SCALE: u32 = 2;

/// A ride and its lifecycle timestamps.
///
/// `driver_id` stays `None` until exactly one accept succeeds and never
/// returns to `None` afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub customer_id: UserId,
    pub driver_id: Option<UserId>,
    pub pickup: String,
    pub destination: String,
    pub distance_km: Decimal,
    pub price: Decimal,
    pub category: CarCategory,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Ride {
    /// Apply a status change in memory, stamping the matching timestamp.
    ///
    /// Callers must have checked the edge; this only records it.
    pub fn mark(&mut self, status: RideStatus, at: DateTime<Utc>) {
        self.status = status;
        match status {
            RideStatus::Pending => {}
            RideStatus::Confirmed => self.confirmed_at = Some(at),
            RideStatus::InProgress => self.started_at = Some(at),
            RideStatus::Completed => self.completed_at = Some(at),
            RideStatus::Cancelled => self.cancelled_at = Some(at),
        }
    }
}

/// Input for requesting a ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub pickup: String,
    pub destination: String,
    pub distance_km: Decimal,
    #[serde(default)]
    pub category: CarCategory,
}
