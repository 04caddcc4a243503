//! Payment classification types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a payment method string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid payment method: {0}")]
pub struct UnknownPaymentMethod(pub String);

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "soko.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Settled in person; no gateway confirmation is expected.
    Cash,
    /// M-Pesa paybill, confirmed asynchronously by the gateway.
    MpesaPaybill,
    /// Card payment, confirmed asynchronously by the gateway.
    Card,
}

impl PaymentMethod {
    /// Whether an external gateway has to confirm the payment.
    #[must_use]
    pub const fn requires_confirmation(self) -> bool {
        !matches!(self, Self::Cash)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::MpesaPaybill => "mpesa_paybill",
            Self::Card => "card",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "mpesa_paybill" | "mpesa" => Ok(Self::MpesaPaybill),
            "card" => Ok(Self::Card),
            _ => Err(UnknownPaymentMethod(s.to_owned())),
        }
    }
}

/// What a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "soko.payment_purpose", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    Order,
    Ride,
    Subscription,
}

/// Settlement state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "soko.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Verified,
    Failed,
}

impl PaymentStatus {
    /// Whether the payment has been settled one way or the other.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payment_methods() {
        assert_eq!("cash".parse(), Ok(PaymentMethod::Cash));
        assert_eq!("MPESA_PAYBILL".parse(), Ok(PaymentMethod::MpesaPaybill));
        assert_eq!(" card ".parse(), Ok(PaymentMethod::Card));
        assert_eq!(
            "bitcoin".parse::<PaymentMethod>(),
            Err(UnknownPaymentMethod("bitcoin".to_owned()))
        );
    }

    #[test]
    fn test_only_cash_skips_confirmation() {
        assert!(!PaymentMethod::Cash.requires_confirmation());
        assert!(PaymentMethod::MpesaPaybill.requires_confirmation());
        assert!(PaymentMethod::Card.requires_confirmation());
    }

    #[test]
    fn test_payment_status_finality() {
        assert!(!PaymentStatus::Pending.is_final());
        assert!(PaymentStatus::Verified.is_final());
        assert!(PaymentStatus::Failed.is_final());
        assert_eq!("Verified".parse(), Ok(PaymentStatus::Verified));
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }
}
