//! Stock reservation maintenance.

/// Release reservations still held after the configured TTL.
///
/// Meant to run periodically (cron, systemd timer); stock held by a process
/// that died mid-checkout otherwise stays unavailable.
///
/// # Errors
///
/// Returns an error if configuration is missing or the store call fails.
pub async fn sweep() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, _) = super::connect().await?;

    let released = engine.inventory().sweep_stale(engine.now()).await?;
    tracing::info!(released, "Reservation sweep complete");
    Ok(())
}
