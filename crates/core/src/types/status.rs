//! Status enums and their transition rules.
//!
//! Each lifecycle is a small state machine. The enums here only describe which
//! edges exist; enforcing them against the store (conditional updates keyed on
//! the current status) is the engine's job.

use serde::{Deserialize, Serialize};

/// Lifecycle of a ride.
///
/// ```text
/// pending -> confirmed -> in_progress -> completed
///    |           |
///    +-----------+-> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "soko.ride_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    /// Requested by a customer, waiting for a driver.
    #[default]
    Pending,
    /// A driver has accepted the ride.
    Confirmed,
    /// The driver has picked the customer up.
    InProgress,
    /// Trip finished and settled.
    Completed,
    /// Abandoned before the trip started.
    Cancelled,
}

impl RideStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses a ride may be in for a transition into `target` to be legal.
    #[must_use]
    pub const fn sources_for(target: Self) -> &'static [Self] {
        match target {
            Self::Pending => &[],
            Self::Confirmed => &[Self::Pending],
            Self::InProgress => &[Self::Confirmed],
            Self::Completed => &[Self::Confirmed, Self::InProgress],
            Self::Cancelled => &[Self::Pending, Self::Confirmed],
        }
    }

    /// Whether `self -> target` is an edge of the ride lifecycle.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        Self::sources_for(target).contains(&self)
    }

    /// Snake-case name as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seller-driven fulfillment status of an order.
///
/// ```text
/// pending -> confirmed -> dispatched -> delivered
///    any non-terminal -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "soko.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Statuses an order may be in for a transition into `target` to be legal.
    #[must_use]
    pub const fn sources_for(target: Self) -> &'static [Self] {
        match target {
            Self::Pending => &[],
            Self::Confirmed => &[Self::Pending],
            Self::Dispatched => &[Self::Confirmed],
            Self::Delivered => &[Self::Dispatched],
            Self::Cancelled => &[Self::Pending, Self::Confirmed, Self::Dispatched],
        }
    }

    /// Whether `self -> target` is an edge of the fulfillment lifecycle.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        Self::sources_for(target).contains(&self)
    }

    /// Snake-case name as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Dispatched => "dispatched",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "dispatched" => Ok(Self::Dispatched),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// State of a stock reservation taken during checkout.
///
/// A reservation is `held` from the moment stock is decremented until the
/// checkout either commits (`committed`) or gives the stock back (`released`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "soko.reservation_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Held,
    Committed,
    Released,
}
