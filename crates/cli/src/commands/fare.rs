//! Fare quote command. Needs no database.

use rust_decimal::Decimal;

use soko_core::CarCategory;
use soko_engine::services::fare;

/// Print the fare for a distance and category.
///
/// # Errors
///
/// Returns an error if the distance is not positive.
pub fn quote(distance_km: Decimal, category: CarCategory) -> Result<(), Box<dyn std::error::Error>> {
    let price = fare::price(distance_km, category)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{distance_km} km, {category}: {price}");
    }
    Ok(())
}
