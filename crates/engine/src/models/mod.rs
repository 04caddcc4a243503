//! Domain models for the booking and fulfillment core.

pub mod driver;
pub mod order;
pub mod payment;
pub mod product;
pub mod ride;

use rust_decimal::Decimal;

pub use driver::DriverAvailability;
pub use order::{CartItem, Order, OrderLine};
pub use payment::Payment;
pub use product::{NewProduct, Product, ReserveOutcome, StockReservation};
pub use ride::{DISTANCE_SCALE, MAX_DISTANCE_KM, Ride, RideRequest};

/// Largest amount a money column (`NUMERIC(12, 2)`) holds: 9 999 999 999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_amount_fits_money_columns() {
        assert_eq!(MAX_AMOUNT.to_string(), "9999999999.99");
    }
}
