//! Payment confirmation and payer history.
//!
//! The core only writes payment rows; confirmation of non-cash payments comes
//! from outside (an administrator or the payment gateway callback).

use tracing::instrument;

use soko_core::{Caller, PaymentId, PaymentStatus, Role};

use super::require_role;
use crate::db::PaymentStore;
use crate::error::{BookingError, Result};
use crate::events::DomainEvent;
use crate::models::Payment;
use crate::state::Engine;

/// Payment settlement.
#[derive(Clone, Copy)]
pub struct PaymentService<'a> {
    engine: &'a Engine,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Settle a pending payment as `verified` or `failed`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is an admin
    /// - `InvalidInput` if `outcome` is `pending`
    /// - `PaymentNotFound`
    /// - `InvalidTransition` if the payment was already settled
    #[instrument(skip(self, caller), fields(payment_id = %payment_id))]
    pub async fn confirm_payment(
        &self,
        caller: &Caller,
        payment_id: PaymentId,
        outcome: PaymentStatus,
    ) -> Result<Payment> {
        require_role(caller, Role::Admin, "confirm payments")?;
        if !outcome.is_final() {
            return Err(BookingError::InvalidInput(
                "a payment can only be settled as verified or failed".to_owned(),
            ));
        }

        let store = self.engine.store();
        let Some(payment) = store
            .settle_payment(payment_id, outcome, self.engine.now())
            .await?
        else {
            return Err(match store.get_payment(payment_id).await? {
                None => BookingError::PaymentNotFound(payment_id),
                Some(existing) => {
                    BookingError::invalid_transition("payment", existing.status, outcome)
                }
            });
        };

        tracing::info!(status = ?payment.status, reference = %payment.reference, "payment settled");
        self.engine.events().publish(DomainEvent::PaymentRecorded {
            payment_id,
            payer_id: payment.payer_id,
            status: payment.status,
        });
        Ok(payment)
    }

    /// Look a payment up by its external reference (`ORDER_<id>`, `RIDE_<id>`).
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is an admin; `PaymentReferenceNotFound`
    /// if no payment carries the reference.
    pub async fn find_by_reference(&self, caller: &Caller, reference: &str) -> Result<Payment> {
        require_role(caller, Role::Admin, "look up payments")?;
        let reference = reference.trim();
        self.engine
            .store()
            .find_payment_by_reference(reference)
            .await?
            .ok_or_else(|| BookingError::PaymentReferenceNotFound(reference.to_owned()))
    }

    /// Payments made by the caller, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Store` if the store call fails.
    pub async fn list_my_payments(&self, caller: &Caller) -> Result<Vec<Payment>> {
        Ok(self.engine.store().list_payer_payments(caller.id).await?)
    }
}
