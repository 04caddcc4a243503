//! Service-level errors.
//!
//! Every service returns [`BookingError`]. Callers that need to branch on the
//! broad category (retry, report, reject) use [`BookingError::kind`] instead of
//! matching individual variants.

use thiserror::Error;

use soko_core::{
    OrderId, PaymentId, ProductId, RideId, Role, UnknownCarCategory, UnknownPaymentMethod, UserId,
};

use crate::db::RepositoryError;

/// Broad category of a [`BookingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input; the caller can fix it.
    Validation,
    NotFound,
    /// Lost a race or the target is not in the expected state.
    Conflict,
    /// Wrong role or not the owner of the resource.
    Unauthorized,
    SubscriptionRequired,
    /// The store failed or timed out; retrying may succeed.
    TransientStore,
    Internal,
}

/// Errors returned by booking and fulfillment operations.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    InvalidPaymentMethod(#[from] UnknownPaymentMethod),

    #[error(transparent)]
    InvalidCarCategory(#[from] UnknownCarCategory),

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("ride not found: {0}")]
    RideNotFound(RideId),

    #[error("driver not found: {0}")]
    DriverNotFound(UserId),

    #[error("payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("no payment with reference {0}")]
    PaymentReferenceNotFound(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// The ride is gone, no longer pending, or another driver got it first.
    #[error("ride {0} is no longer available")]
    RideUnavailable(RideId),

    /// The driver is offline or not verified.
    #[error("driver {0} is not available for rides")]
    DriverUnavailable(UserId),

    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("role {role} may not {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("caller does not own this {0}")]
    NotOwner(&'static str),

    #[error("an active subscription is required")]
    SubscriptionRequired,

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::InvalidPaymentMethod(_) | Self::InvalidCarCategory(_) => {
                ErrorKind::Validation
            }
            Self::ProductNotFound(_)
            | Self::OrderNotFound(_)
            | Self::RideNotFound(_)
            | Self::DriverNotFound(_)
            | Self::PaymentNotFound(_)
            | Self::PaymentReferenceNotFound(_) => ErrorKind::NotFound,
            Self::InsufficientStock { .. }
            | Self::RideUnavailable(_)
            | Self::DriverUnavailable(_)
            | Self::InvalidTransition { .. } => ErrorKind::Conflict,
            Self::Forbidden { .. } | Self::NotOwner(_) => ErrorKind::Unauthorized,
            Self::SubscriptionRequired => ErrorKind::SubscriptionRequired,
            Self::Store(err) if err.is_transient() => ErrorKind::TransientStore,
            Self::Store(RepositoryError::Conflict(_)) => ErrorKind::Conflict,
            Self::Store(RepositoryError::NotFound) => ErrorKind::NotFound,
            Self::Store(RepositoryError::OutOfRange(_)) => ErrorKind::Validation,
            Self::Store(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same call may succeed if retried unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientStore
    }

    pub(crate) fn invalid_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Result type alias for `BookingError`.
pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            BookingError::InvalidInput("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BookingError::from(UnknownPaymentMethod("bitcoin".into())).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BookingError::RideUnavailable(RideId::new()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            BookingError::InsufficientStock {
                product_id: ProductId::new(),
                requested: 2,
                available: 1,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(BookingError::NotOwner("ride").kind(), ErrorKind::Unauthorized);
        assert_eq!(
            BookingError::PaymentReferenceNotFound("ORDER_x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BookingError::SubscriptionRequired.kind(),
            ErrorKind::SubscriptionRequired
        );
    }

    #[test]
    fn test_only_transient_store_errors_are_retryable() {
        let transient = BookingError::Store(RepositoryError::Unavailable("timeout".into()));
        assert_eq!(transient.kind(), ErrorKind::TransientStore);
        assert!(transient.is_retryable());

        let corrupt = BookingError::Store(RepositoryError::DataCorruption("bad".into()));
        assert_eq!(corrupt.kind(), ErrorKind::Internal);
        assert!(!corrupt.is_retryable());

        let conflict = BookingError::Store(RepositoryError::Conflict("dup".into()));
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert!(!conflict.is_retryable());

        assert!(!BookingError::RideUnavailable(RideId::new()).is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err = BookingError::Store(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        assert!(err.is_retryable());
    }
}
