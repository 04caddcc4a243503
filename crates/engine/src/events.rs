//! Fire-and-forget domain events.
//!
//! Services publish an event after a state change has committed. Publishing
//! never blocks and never fails the operation; a sink that cannot deliver
//! drops the event and logs it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use soko_core::{OrderId, OrderStatus, PaymentId, PaymentStatus, RideId, UserId};

/// Something that happened in the booking core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    RideRequested {
        ride_id: RideId,
        customer_id: UserId,
        price: Decimal,
        /// Drivers eligible at request time. Informational only.
        eligible_drivers: i64,
    },
    RideAccepted {
        ride_id: RideId,
        driver_id: UserId,
    },
    RideCompleted {
        ride_id: RideId,
        driver_id: UserId,
        payment_id: PaymentId,
        amount: Decimal,
    },
    RideCancelled {
        ride_id: RideId,
        cancelled_by: UserId,
    },
    OrdersPlaced {
        customer_id: UserId,
        order_ids: Vec<OrderId>,
        payment_id: PaymentId,
        total_amount: Decimal,
        requires_payment: bool,
    },
    OrderStatusChanged {
        order_id: OrderId,
        customer_id: UserId,
        status: OrderStatus,
    },
    PaymentRecorded {
        payment_id: PaymentId,
        payer_id: UserId,
        status: PaymentStatus,
    },
}

impl DomainEvent {
    /// Stable event name, used as the `event` log field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RideRequested { .. } => "ride_requested",
            Self::RideAccepted { .. } => "ride_accepted",
            Self::RideCompleted { .. } => "ride_completed",
            Self::RideCancelled { .. } => "ride_cancelled",
            Self::OrdersPlaced { .. } => "orders_placed",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::PaymentRecorded { .. } => "payment_recorded",
        }
    }
}

/// Receiver of domain events (notifications, payment gateway hooks).
pub trait EventSink: Send + Sync {
    /// Hand over an event. Must not block.
    fn publish(&self, event: DomainEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(event = event.name(), %payload, "domain event"),
            Err(e) => tracing::warn!(event = event.name(), error = %e, "unserializable event"),
        }
    }
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelSink {
    /// Create a sink together with the receiving end.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: DomainEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            tracing::debug!(event = event.name(), "event receiver dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DomainEvent::RideAccepted {
            ride_id: RideId::new(),
            driver_id: UserId::new(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ride_accepted");
        assert_eq!(event.name(), "ride_accepted");
    }

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        let first = RideId::new();
        let second = RideId::new();
        sink.publish(DomainEvent::RideCancelled {
            ride_id: first,
            cancelled_by: UserId::new(),
        });
        sink.publish(DomainEvent::RideCancelled {
            ride_id: second,
            cancelled_by: UserId::new(),
        });

        assert!(matches!(rx.try_recv().unwrap(), DomainEvent::RideCancelled { ride_id, .. } if ride_id == first));
        assert!(matches!(rx.try_recv().unwrap(), DomainEvent::RideCancelled { ride_id, .. } if ride_id == second));
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.publish(DomainEvent::RideAccepted {
            ride_id: RideId::new(),
            driver_id: UserId::new(),
        });
    }
}
