//! Caller roles and identity as handed over by the identity service.
//!
//! The core never authenticates anyone. It trusts the [`Caller`] it is given
//! and only checks the capability tag (`role`) and subscription validity that
//! each operation requires.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::UserId;

/// Capability tag carried by every caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Driver,
    Seller,
    /// Property agent. Subscription-gated, but has no booking operations.
    Agent,
    Admin,
}

impl Role {
    /// Roles whose privileges lapse when their subscription expires.
    #[must_use]
    pub const fn is_subscription_gated(self) -> bool {
        matches!(self, Self::Driver | Self::Seller | Self::Agent)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Driver => write!(f, "driver"),
            Self::Seller => write!(f, "seller"),
            Self::Agent => write!(f, "agent"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "driver" => Ok(Self::Driver),
            "seller" => Ok(Self::Seller),
            "agent" => Ok(Self::Agent),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// The authenticated identity on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
    /// Identity documents checked by an administrator.
    pub verified: bool,
    /// Last day covered by the caller's subscription, if any.
    pub subscription_expiry: Option<NaiveDate>,
}

impl Caller {
    /// Build a caller with no subscription and no verification.
    #[must_use]
    pub const fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            verified: false,
            subscription_expiry: None,
        }
    }

    #[must_use]
    pub const fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    #[must_use]
    pub const fn with_subscription(mut self, expiry: NaiveDate) -> Self {
        self.subscription_expiry = Some(expiry);
        self
    }

    /// Whether the caller holds `role`.
    #[must_use]
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// A subscription is valid while its expiry date lies strictly after `today`.
    #[must_use]
    pub fn has_active_subscription(&self, today: NaiveDate) -> bool {
        self.subscription_expiry.is_some_and(|expiry| expiry > today)
    }
}
