//! Seller product management.

use rust_decimal::Decimal;
use tracing::instrument;

use soko_core::{Caller, ProductId, Role};

use super::{require_role, require_subscription};
use crate::db::{InventoryStore, RepositoryError};
use crate::error::{BookingError, Result};
use crate::models::{MAX_AMOUNT, NewProduct, Product};
use crate::state::Engine;

/// Product listing and maintenance by sellers.
#[derive(Clone, Copy)]
pub struct CatalogService<'a> {
    engine: &'a Engine,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// List a new product. Requires a subscribed seller.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `SubscriptionRequired`, or `InvalidInput` for a blank
    /// title, negative price or negative stock.
    #[instrument(skip(self, caller, input), fields(seller_id = %caller.id))]
    pub async fn create_product(&self, caller: &Caller, input: NewProduct) -> Result<Product> {
        require_role(caller, Role::Seller, "create products")?;
        require_subscription(caller, self.engine.today())?;

        let title = input.title.trim();
        if title.is_empty() {
            return Err(BookingError::InvalidInput("title is required".to_owned()));
        }
        validate_price(input.price)?;
        if input.stock < 0 {
            return Err(BookingError::InvalidInput(
                "stock cannot be negative".to_owned(),
            ));
        }

        let now = self.engine.now();
        let product = Product {
            id: ProductId::new(),
            seller_id: caller.id,
            title: title.to_owned(),
            price: input.price,
            stock: input.stock,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.engine.store().insert_product(&product).await?;

        tracing::info!(product_id = %product.id, stock = product.stock, "product created");
        Ok(product)
    }

    /// Change the list price. Existing orders keep their snapshotted price.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `InvalidInput`, `ProductNotFound`, or `NotOwner`.
    #[instrument(skip(self, caller), fields(product_id = %id))]
    pub async fn update_price(&self, caller: &Caller, id: ProductId, price: Decimal) -> Result<Product> {
        require_role(caller, Role::Seller, "change prices")?;
        validate_price(price)?;

        match self.engine.store().update_price(id, caller.id, price).await? {
            Some(product) => Ok(product),
            None => Err(self.explain_miss(caller, id).await),
        }
    }

    /// Add units to a product's stock.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `InvalidInput` for a non-positive quantity or one that
    /// would overflow the stock count, `ProductNotFound`, or `NotOwner`.
    #[instrument(skip(self, caller), fields(product_id = %id))]
    pub async fn restock(&self, caller: &Caller, id: ProductId, quantity: i32) -> Result<Product> {
        require_role(caller, Role::Seller, "restock products")?;
        if quantity <= 0 {
            return Err(BookingError::InvalidInput(format!(
                "restock quantity must be positive, got {quantity}"
            )));
        }

        match self.engine.store().restock(id, caller.id, quantity).await {
            Ok(Some(product)) => {
                tracing::info!(quantity, stock = product.stock, "product restocked");
                Ok(product)
            }
            Ok(None) => Err(self.explain_miss(caller, id).await),
            Err(RepositoryError::OutOfRange(_)) => Err(BookingError::InvalidInput(format!(
                "restocking {quantity} units would overflow the stock count"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-remove a product. It stays referenced by existing orders.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `ProductNotFound`, or `NotOwner`.
    pub async fn deactivate(&self, caller: &Caller, id: ProductId) -> Result<Product> {
        self.set_active(caller, id, false).await
    }

    /// Put a soft-removed product back on sale.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `ProductNotFound`, or `NotOwner`.
    pub async fn reactivate(&self, caller: &Caller, id: ProductId) -> Result<Product> {
        self.set_active(caller, id, true).await
    }

    /// Every product of the calling seller, inactive ones included.
    ///
    /// # Errors
    ///
    /// `Forbidden` or a store error.
    pub async fn list_seller_products(&self, caller: &Caller) -> Result<Vec<Product>> {
        require_role(caller, Role::Seller, "list seller products")?;
        Ok(self.engine.store().list_seller_products(caller.id).await?)
    }

    /// A product as the caller may see it: inactive products are only
    /// visible to their seller and to admins.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` or a store error.
    pub async fn get_product(&self, caller: &Caller, id: ProductId) -> Result<Product> {
        let product = self
            .engine
            .store()
            .get_product(id)
            .await?
            .ok_or(BookingError::ProductNotFound(id))?;

        if product.active || product.seller_id == caller.id || caller.is(Role::Admin) {
            Ok(product)
        } else {
            Err(BookingError::ProductNotFound(id))
        }
    }

    #[instrument(skip(self, caller), fields(product_id = %id))]
    async fn set_active(&self, caller: &Caller, id: ProductId, active: bool) -> Result<Product> {
        require_role(caller, Role::Seller, "change product visibility")?;

        match self.engine.store().set_active(id, caller.id, active).await? {
            Some(product) => {
                tracing::info!(active, "product visibility changed");
                Ok(product)
            }
            None => Err(self.explain_miss(caller, id).await),
        }
    }

    /// Why an owner-scoped update matched nothing.
    async fn explain_miss(&self, caller: &Caller, id: ProductId) -> BookingError {
        match self.engine.store().get_product(id).await {
            Ok(None) => BookingError::ProductNotFound(id),
            Ok(Some(product)) if product.seller_id != caller.id => BookingError::NotOwner("product"),
            Ok(Some(_)) => BookingError::Internal(format!("update of product {id} matched no row")),
            Err(e) => e.into(),
        }
    }
}

/// Prices are non-negative whole cents no larger than [`MAX_AMOUNT`].
fn validate_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(BookingError::InvalidInput(
            "price cannot be negative".to_owned(),
        ));
    }
    if price > MAX_AMOUNT {
        return Err(BookingError::InvalidInput(format!(
            "price cannot exceed {MAX_AMOUNT}"
        )));
    }
    if price.normalize().scale() > 2 {
        return Err(BookingError::InvalidInput(
            "price has more than two decimal places".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::testing;

    fn input(stock: i32) -> NewProduct {
        NewProduct {
            title: "  Maize flour 2kg ".to_owned(),
            price: Decimal::from(180),
            stock,
        }
    }

    #[tokio::test]
    async fn test_create_trims_title_and_starts_active() {
        let (engine, _rx) = testing::engine();
        let seller = testing::subscribed(Role::Seller);

        let product = engine.catalog().create_product(&seller, input(12)).await.unwrap();
        assert_eq!(product.title, "Maize flour 2kg");
        assert!(product.active);
        assert_eq!(product.seller_id, seller.id);
    }

    #[tokio::test]
    async fn test_create_requires_subscribed_seller() {
        let (engine, _rx) = testing::engine();

        let err = engine
            .catalog()
            .create_product(&testing::customer(), input(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Forbidden { .. }));

        let lapsed = Caller::new(soko_core::UserId::new(), Role::Seller);
        let err = engine.catalog().create_product(&lapsed, input(1)).await.unwrap_err();
        assert!(matches!(err, BookingError::SubscriptionRequired));
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let (engine, _rx) = testing::engine();
        let seller = testing::subscribed(Role::Seller);

        assert!(engine.catalog().create_product(&seller, input(-1)).await.is_err());

        let mut bad = input(1);
        bad.price = Decimal::from(-5);
        assert!(engine.catalog().create_product(&seller, bad).await.is_err());

        let mut blank = input(1);
        blank.title = "   ".to_owned();
        assert!(engine.catalog().create_product(&seller, blank).await.is_err());
    }

    #[tokio::test]
    async fn test_only_owner_may_update() {
        let (engine, _rx) = testing::engine();
        let owner = testing::subscribed(Role::Seller);
        let other = testing::subscribed(Role::Seller);
        let product = engine.catalog().create_product(&owner, input(3)).await.unwrap();

        let err = engine
            .catalog()
            .update_price(&other, product.id, Decimal::from(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotOwner("product")));

        let updated = engine
            .catalog()
            .update_price(&owner, product.id, Decimal::from(200))
            .await
            .unwrap();
        assert_eq!(updated.price, Decimal::from(200));

        let err = engine
            .catalog()
            .restock(&owner, ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_restock_adds_units() {
        let (engine, _rx) = testing::engine();
        let seller = testing::subscribed(Role::Seller);
        let product = engine.catalog().create_product(&seller, input(3)).await.unwrap();

        let restocked = engine.catalog().restock(&seller, product.id, 7).await.unwrap();
        assert_eq!(restocked.stock, 10);
        assert!(engine.catalog().restock(&seller, product.id, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_restock_past_i32_max_is_rejected() {
        let (engine, _rx) = testing::engine();
        let seller = testing::subscribed(Role::Seller);
        let product = engine
            .catalog()
            .create_product(&seller, input(i32::MAX - 1))
            .await
            .unwrap();

        let err = engine.catalog().restock(&seller, product.id, 5).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidInput(_)));

        let unchanged = engine.catalog().get_product(&seller, product.id).await.unwrap();
        assert_eq!(unchanged.stock, i32::MAX - 1);
        let topped = engine.catalog().restock(&seller, product.id, 1).await.unwrap();
        assert_eq!(topped.stock, i32::MAX);
    }

    #[tokio::test]
    async fn test_price_must_fit_money_columns() {
        let (engine, _rx) = testing::engine();
        let seller = testing::subscribed(Role::Seller);

        let mut huge = input(1);
        huge.price = Decimal::MAX;
        let err = engine.catalog().create_product(&seller, huge).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidInput(_)));

        let mut fractional = input(1);
        fractional.price = "9.999".parse().unwrap();
        assert!(engine.catalog().create_product(&seller, fractional).await.is_err());

        let mut ceiling = input(1);
        ceiling.price = MAX_AMOUNT;
        let product = engine.catalog().create_product(&seller, ceiling).await.unwrap();

        let err = engine
            .catalog()
            .update_price(&seller, product.id, MAX_AMOUNT + Decimal::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_deactivated_product_hidden_from_buyers() {
        let (engine, _rx) = testing::engine();
        let seller = testing::subscribed(Role::Seller);
        let product = engine.catalog().create_product(&seller, input(3)).await.unwrap();

        engine.catalog().deactivate(&seller, product.id).await.unwrap();

        let buyer = testing::customer();
        assert!(matches!(
            engine.catalog().get_product(&buyer, product.id).await,
            Err(BookingError::ProductNotFound(_))
        ));
        assert!(engine.catalog().get_product(&seller, product.id).await.is_ok());
        assert!(matches!(
            engine.inventory().reserve(product.id, 1).await,
            Err(BookingError::ProductNotFound(_))
        ));

        engine.catalog().reactivate(&seller, product.id).await.unwrap();
        assert!(engine.inventory().reserve(product.id, 1).await.is_ok());
        assert_eq!(engine.catalog().list_seller_products(&seller).await.unwrap().len(), 1);
    }
}
