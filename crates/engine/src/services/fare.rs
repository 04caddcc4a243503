//! Fare calculator.

use rust_decimal::Decimal;

use soko_core::CarCategory;

use crate::error::{BookingError, Result};

/// Currency units charged per `KM_PER_UNIT` kilometres.
const RATE: Decimal = Decimal::from_parts(200, 0, 0, false, 0);
const KM_PER_UNIT: Decimal = Decimal::from_parts(3, 0, 0, false, 0);
/// Premium multiplier, 1.5.
const PREMIUM_MULTIPLIER: Decimal = Decimal::from_parts(15, 0, 0, false, 1);
const MINIMUM_FARE: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Price of a ride: `distance / 3 * 200`, times 1.5 for premium cars,
/// never below 100. Rounded to cents.
///
/// # Errors
///
/// Returns `BookingError::InvalidInput` if `distance_km` is not positive or
/// so large that the fare cannot be represented.
pub fn price(distance_km: Decimal, category: CarCategory) -> Result<Decimal> {
    if distance_km <= Decimal::ZERO {
        return Err(BookingError::InvalidInput(format!(
            "distance must be positive, got {distance_km}"
        )));
    }

    let too_far = || BookingError::InvalidInput(format!("distance {distance_km} km is too large"));
    let mut amount = distance_km
        .checked_mul(RATE)
        .and_then(|amount| amount.checked_div(KM_PER_UNIT))
        .ok_or_else(too_far)?;
    if category.is_premium() {
        amount = amount.checked_mul(PREMIUM_MULTIPLIER).ok_or_else(too_far)?;
    }

    Ok(amount.max(MINIMUM_FARE).round_dp(2))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn km(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn test_reference_fares() {
        assert_eq!(price(km(9), CarCategory::Medium).unwrap(), km(600));
        assert_eq!(price(km(3), CarCategory::Medium).unwrap(), km(200));
        assert_eq!(price(km(9), CarCategory::Xl).unwrap(), km(900));
    }

    #[test]
    fn test_minimum_fare_applies() {
        assert_eq!(price(km(1), CarCategory::Medium).unwrap(), km(100));
        assert_eq!(price(km(1), CarCategory::Xl).unwrap(), km(100));
    }

    #[test]
    fn test_fractional_distance_rounds_to_cents() {
        assert_eq!(
            price(km(10), CarCategory::Medium).unwrap(),
            "666.67".parse::<Decimal>().unwrap()
        );
        assert_eq!(
            price("4.5".parse().unwrap(), CarCategory::Medium).unwrap(),
            km(300)
        );
    }

    #[test]
    fn test_unrepresentable_distance_rejected() {
        assert!(matches!(
            price(Decimal::MAX, CarCategory::Medium),
            Err(BookingError::InvalidInput(_))
        ));
        assert!(matches!(
            price(Decimal::MAX / km(200), CarCategory::Xl),
            Err(BookingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_positive_distance_rejected() {
        assert!(matches!(
            price(Decimal::ZERO, CarCategory::Medium),
            Err(BookingError::InvalidInput(_))
        ));
        assert!(matches!(
            price(km(-2), CarCategory::Xl),
            Err(BookingError::InvalidInput(_))
        ));
    }
}
