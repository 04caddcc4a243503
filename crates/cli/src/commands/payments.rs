//! Payment settlement command, for payments confirmed out of band.

use soko_core::{Caller, PaymentStatus, Role, UserId};

/// Settle the pending payment carrying `reference`.
///
/// # Errors
///
/// Returns an error if the reference is unknown, the payment is already
/// settled, or the store call fails.
pub async fn confirm(
    reference: &str,
    outcome: PaymentStatus,
) -> Result<(), Box<dyn std::error::Error>> {
    let (engine, _) = super::connect().await?;
    let operator = Caller::new(UserId::new(), Role::Admin);

    let payment = engine
        .payments()
        .find_by_reference(&operator, reference)
        .await?;
    let settled = engine
        .payments()
        .confirm_payment(&operator, payment.id, outcome)
        .await?;

    tracing::info!(
        payment_id = %settled.id,
        amount = %settled.amount,
        status = %settled.status,
        "Payment settled"
    );
    Ok(())
}
