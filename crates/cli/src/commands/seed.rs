//! Seed the database with sellers' products and drivers from a YAML fixture.
//!
//! The fixture goes through the same services as live traffic, so seeded data
//! obeys every validation rule. Sellers and drivers are identities owned by
//! the identity service; the fixture only names their IDs and subscription
//! data.

use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use soko_core::{Caller, Role, UserId};
use soko_engine::Engine;
use soko_engine::models::NewProduct;

/// Top-level fixture document.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub sellers: Vec<SeedSeller>,
    #[serde(default)]
    pub drivers: Vec<SeedDriver>,
}

#[derive(Debug, Deserialize)]
pub struct SeedSeller {
    pub id: UserId,
    pub subscription_expiry: NaiveDate,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub title: String,
    pub price: Decimal,
    pub stock: i32,
}

#[derive(Debug, Deserialize)]
pub struct SeedDriver {
    pub id: UserId,
    #[serde(default)]
    pub verified: bool,
    pub subscription_expiry: Option<NaiveDate>,
    #[serde(default)]
    pub online: bool,
}

/// Problems found in a fixture before anything is written.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("{0} validation errors found")]
    Invalid(usize),
}

/// Seed from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or a service call fails.
pub async fn from_file(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::NotFound(file_path.to_owned()).into());
    }

    info!(path = %file_path, "Loading seed data from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        tracing::error!("Seed validation failed:");
        for err in &errors {
            tracing::error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()).into());
    }

    let (engine, _) = super::connect().await?;
    let summary = apply(&engine, seed).await?;

    info!("Seeding complete!");
    info!("  Products created: {}", summary.products);
    info!("  Drivers registered: {}", summary.drivers);
    Ok(())
}

/// Counts of what a seed run wrote.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub drivers: usize,
}

/// Write a parsed fixture through the engine's services.
///
/// # Errors
///
/// Returns the first service error; earlier writes are kept.
pub async fn apply(engine: &Engine, seed: SeedFile) -> Result<SeedSummary, soko_engine::BookingError> {
    let mut summary = SeedSummary::default();

    for seller in seed.sellers {
        let caller = Caller::new(seller.id, Role::Seller)
            .verified()
            .with_subscription(seller.subscription_expiry);
        for product in seller.products {
            let created = engine
                .catalog()
                .create_product(
                    &caller,
                    NewProduct {
                        title: product.title,
                        price: product.price,
                        stock: product.stock,
                    },
                )
                .await?;
            info!(product_id = %created.id, title = %created.title, "Product created");
            summary.products += 1;
        }
    }

    for driver in seed.drivers {
        let mut caller = Caller::new(driver.id, Role::Driver);
        caller.verified = driver.verified;
        caller.subscription_expiry = driver.subscription_expiry;

        engine.rides().register_driver(&caller).await?;
        if driver.online {
            engine.rides().set_online(&caller, true).await?;
        }
        summary.drivers += 1;
    }

    Ok(summary)
}

/// Check a fixture without touching the database.
fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    for seller in &seed.sellers {
        for product in &seller.products {
            if product.title.trim().is_empty() {
                errors.push(format!("seller {}: product with empty title", seller.id));
            }
            if product.price < Decimal::ZERO {
                errors.push(format!("{}: negative price", product.title));
            }
            if product.stock < 0 {
                errors.push(format!("{}: negative stock", product.title));
            }
        }
    }
    errors
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use soko_engine::{EngineSettings, MemoryStore};

    use super::*;

    const FIXTURE: &str = include_str!("../../fixtures/seed.yaml");

    #[test]
    fn test_fixture_parses_and_validates() {
        let seed: SeedFile = serde_yaml::from_str(FIXTURE).unwrap();
        assert_eq!(seed.sellers.len(), 2);
        assert_eq!(seed.drivers.len(), 3);
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let seed: SeedFile = serde_yaml::from_str(
            r#"
sellers:
  - id: 3f6c1a52-8d0e-4f0b-9a44-0c3b9b1f2e01
    subscription_expiry: 2030-01-01
    products:
      - title: " "
        price: "-1"
        stock: -3
"#,
        )
        .unwrap();
        assert_eq!(validate(&seed).len(), 3);
    }

    #[tokio::test]
    async fn test_apply_to_memory_store() {
        let engine = Engine::new(Arc::new(MemoryStore::new()), EngineSettings::default());
        let mut seed: SeedFile = serde_yaml::from_str(FIXTURE).unwrap();
        // Keep the fixture's subscriptions valid whenever the test runs.
        for seller in &mut seed.sellers {
            seller.subscription_expiry = NaiveDate::MAX;
        }

        let summary = apply(&engine, seed).await.unwrap();
        assert_eq!(summary, SeedSummary { products: 3, drivers: 3 });
    }
}
