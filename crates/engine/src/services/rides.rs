//! Ride assignment state machine.
//!
//! ```text
//! pending ──accept──▶ confirmed ──start──▶ in_progress ──complete──▶ completed
//!    │                    │  └──────────────complete───────────────────▲
//!    └──cancel──▶ cancelled ◀──cancel──┘
//! ```
//!
//! Every edge is one conditional write keyed on the current status (and on
//! the acting driver or customer). When the write matches nothing, the ride
//! is re-read only to report why.

use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use soko_core::{Caller, PaymentId, Role, RideId, RideStatus};

use super::{fare, require_role, require_subscription};
use crate::db::{DriverStore, RideActor, RideStore};
use crate::error::{BookingError, Result};
use crate::events::DomainEvent;
use crate::models::{
    DISTANCE_SCALE, DriverAvailability, MAX_DISTANCE_KM, Payment, Ride, RideRequest,
};
use crate::state::Engine;

/// A freshly requested ride and how many drivers could take it right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedRide {
    pub ride: Ride,
    /// Informational; no driver is held for the ride.
    pub eligible_drivers: i64,
}

/// Ride lifecycle operations.
#[derive(Clone, Copy)]
pub struct RideService<'a> {
    engine: &'a Engine,
}

impl<'a> RideService<'a> {
    #[must_use]
    pub const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Price and persist a new pending ride for the calling customer.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a customer; `InvalidInput` for a blank
    /// pickup or destination, or a distance that is not positive or too long
    /// once rounded to hundredths of a kilometre.
    #[instrument(skip(self, caller, request), fields(customer_id = %caller.id))]
    pub async fn request(&self, caller: &Caller, request: RideRequest) -> Result<RequestedRide> {
        require_role(caller, Role::Customer, "request rides")?;

        let pickup = request.pickup.trim();
        let destination = request.destination.trim();
        if pickup.is_empty() || destination.is_empty() {
            return Err(BookingError::InvalidInput(
                "pickup and destination are required".to_owned(),
            ));
        }
        // Priced on the distance as stored.
        let distance_km = request
            .distance_km
            .round_dp_with_strategy(DISTANCE_SCALE, RoundingStrategy::MidpointAwayFromZero);
        if distance_km > MAX_DISTANCE_KM {
            return Err(BookingError::InvalidInput(format!(
                "distance cannot exceed {MAX_DISTANCE_KM} km"
            )));
        }
        let price = fare::price(distance_km, request.category)?;

        let ride = Ride {
            id: RideId::new(),
            customer_id: caller.id,
            driver_id: None,
            pickup: pickup.to_owned(),
            destination: destination.to_owned(),
            distance_km,
            price,
            category: request.category,
            status: RideStatus::Pending,
            created_at: self.engine.now(),
            confirmed_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        };
        self.engine.store().insert_ride(&ride).await?;

        let eligible_drivers = self
            .engine
            .store()
            .count_eligible_drivers(self.engine.today())
            .await?;

        tracing::info!(ride_id = %ride.id, %price, eligible_drivers, "ride requested");
        self.engine.events().publish(DomainEvent::RideRequested {
            ride_id: ride.id,
            customer_id: ride.customer_id,
            price,
            eligible_drivers,
        });

        Ok(RequestedRide {
            ride,
            eligible_drivers,
        })
    }

    /// Claim a pending ride. Of any number of concurrent accepts for one
    /// ride, exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is a driver
    /// - `SubscriptionRequired`
    /// - `DriverNotFound` if the driver never registered availability
    /// - `DriverUnavailable` if the driver is offline or unverified
    /// - `RideUnavailable` if the ride does not exist, is not pending, or
    ///   another driver claimed it first
    #[instrument(skip(self, caller), fields(driver_id = %caller.id, ride_id = %ride_id))]
    pub async fn accept(&self, caller: &Caller, ride_id: RideId) -> Result<Ride> {
        require_role(caller, Role::Driver, "accept rides")?;
        require_subscription(caller, self.engine.today())?;

        let driver = self
            .engine
            .store()
            .get_driver(caller.id)
            .await?
            .ok_or(BookingError::DriverNotFound(caller.id))?;
        if !driver.online || !driver.verified {
            return Err(BookingError::DriverUnavailable(caller.id));
        }

        let Some(ride) = self
            .engine
            .store()
            .accept_ride(ride_id, caller.id, self.engine.now())
            .await?
        else {
            tracing::warn!("ride not available to accept");
            return Err(BookingError::RideUnavailable(ride_id));
        };

        tracing::info!("ride accepted");
        self.engine.events().publish(DomainEvent::RideAccepted {
            ride_id,
            driver_id: caller.id,
        });
        Ok(ride)
    }

    /// Pick up the customer. Only the assigned driver, only from `confirmed`.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `RideNotFound`, `NotOwner`, or `InvalidTransition`.
    #[instrument(skip(self, caller), fields(driver_id = %caller.id, ride_id = %ride_id))]
    pub async fn start(&self, caller: &Caller, ride_id: RideId) -> Result<Ride> {
        require_role(caller, Role::Driver, "start rides")?;

        let target = RideStatus::InProgress;
        let actor = RideActor::Driver(caller.id);
        match self
            .engine
            .store()
            .transition_ride(
                ride_id,
                actor,
                RideStatus::sources_for(target),
                target,
                self.engine.now(),
            )
            .await?
        {
            Some(ride) => {
                tracing::info!("ride started");
                Ok(ride)
            }
            None => Err(self.explain_miss(ride_id, actor, target).await),
        }
    }

    /// Finish the ride and record its verified cash payment in one unit.
    ///
    /// # Errors
    ///
    /// `Forbidden`, `RideNotFound`, `NotOwner`, or `InvalidTransition`.
    #[instrument(skip(self, caller), fields(driver_id = %caller.id, ride_id = %ride_id))]
    pub async fn complete(&self, caller: &Caller, ride_id: RideId) -> Result<(Ride, Payment)> {
        require_role(caller, Role::Driver, "complete rides")?;

        let Some((ride, payment)) = self
            .engine
            .store()
            .complete_ride(ride_id, caller.id, PaymentId::new(), self.engine.now())
            .await?
        else {
            return Err(self
                .explain_miss(ride_id, RideActor::Driver(caller.id), RideStatus::Completed)
                .await);
        };

        tracing::info!(payment_id = %payment.id, amount = %payment.amount, "ride completed");
        self.engine.events().publish(DomainEvent::RideCompleted {
            ride_id,
            driver_id: caller.id,
            payment_id: payment.id,
            amount: payment.amount,
        });
        Ok((ride, payment))
    }

    /// Cancel a ride. The requesting customer may cancel while it is pending
    /// or confirmed; the assigned driver only once confirmed. The driver
    /// binding is kept.
    ///
    /// # Errors
    ///
    /// `Forbidden` for other roles, `RideNotFound`, `NotOwner`, or
    /// `InvalidTransition`.
    #[instrument(skip(self, caller), fields(caller_id = %caller.id, ride_id = %ride_id))]
    pub async fn cancel(&self, caller: &Caller, ride_id: RideId) -> Result<Ride> {
        const CUSTOMER_SOURCES: &[RideStatus] = &[RideStatus::Pending, RideStatus::Confirmed];
        const DRIVER_SOURCES: &[RideStatus] = &[RideStatus::Confirmed];

        let (actor, from) = match caller.role {
            Role::Customer => (RideActor::Customer(caller.id), CUSTOMER_SOURCES),
            Role::Driver => (RideActor::Driver(caller.id), DRIVER_SOURCES),
            role => {
                return Err(BookingError::Forbidden {
                    role,
                    action: "cancel rides",
                });
            }
        };

        let target = RideStatus::Cancelled;
        let Some(ride) = self
            .engine
            .store()
            .transition_ride(ride_id, actor, from, target, self.engine.now())
            .await?
        else {
            return Err(self.explain_miss(ride_id, actor, target).await);
        };

        tracing::info!("ride cancelled");
        self.engine.events().publish(DomainEvent::RideCancelled {
            ride_id,
            cancelled_by: caller.id,
        });
        Ok(ride)
    }

    /// Record the identity service's view of a driver (verification and
    /// subscription). A new record starts offline.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a driver.
    #[instrument(skip(self, caller), fields(driver_id = %caller.id))]
    pub async fn register_driver(&self, caller: &Caller) -> Result<DriverAvailability> {
        require_role(caller, Role::Driver, "register as driver")?;

        let record = DriverAvailability {
            driver_id: caller.id,
            online: false,
            verified: caller.verified,
            subscription_expiry: caller.subscription_expiry,
            updated_at: self.engine.now(),
        };
        Ok(self.engine.store().upsert_driver(&record).await?)
    }

    /// Go online or offline. Independent of any ride.
    ///
    /// # Errors
    ///
    /// `Forbidden` or `DriverNotFound`.
    #[instrument(skip(self, caller), fields(driver_id = %caller.id))]
    pub async fn set_online(&self, caller: &Caller, online: bool) -> Result<DriverAvailability> {
        require_role(caller, Role::Driver, "change availability")?;

        let driver = self
            .engine
            .store()
            .set_driver_online(caller.id, online, self.engine.now())
            .await?
            .ok_or(BookingError::DriverNotFound(caller.id))?;
        tracing::info!(online, "driver availability changed");
        Ok(driver)
    }

    /// Newest pending rides, up to the configured board size.
    ///
    /// # Errors
    ///
    /// `Forbidden` or `SubscriptionRequired`.
    pub async fn list_available(&self, caller: &Caller) -> Result<Vec<Ride>> {
        require_role(caller, Role::Driver, "list open rides")?;
        require_subscription(caller, self.engine.today())?;

        let limit = self.engine.settings().available_rides_limit;
        Ok(self.engine.store().list_pending_rides(limit).await?)
    }

    /// Rides requested by the calling customer.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a customer.
    pub async fn list_customer_rides(&self, caller: &Caller) -> Result<Vec<Ride>> {
        require_role(caller, Role::Customer, "list customer rides")?;
        Ok(self.engine.store().list_customer_rides(caller.id).await?)
    }

    /// Rides assigned to the calling driver.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a driver.
    pub async fn list_driver_rides(&self, caller: &Caller) -> Result<Vec<Ride>> {
        require_role(caller, Role::Driver, "list driver rides")?;
        Ok(self.engine.store().list_driver_rides(caller.id).await?)
    }

    /// A ride, visible to its customer, its driver and admins.
    ///
    /// # Errors
    ///
    /// `RideNotFound` or `NotOwner`.
    pub async fn get_ride(&self, caller: &Caller, ride_id: RideId) -> Result<Ride> {
        let ride = self
            .engine
            .store()
            .get_ride(ride_id)
            .await?
            .ok_or(BookingError::RideNotFound(ride_id))?;

        let visible = caller.is(Role::Admin)
            || ride.customer_id == caller.id
            || ride.driver_id == Some(caller.id);
        if visible {
            Ok(ride)
        } else {
            Err(BookingError::NotOwner("ride"))
        }
    }

    /// Why a scoped transition matched nothing: missing, wrong owner, or
    /// wrong state, in that order.
    async fn explain_miss(&self, ride_id: RideId, actor: RideActor, target: RideStatus) -> BookingError {
        let ride = match self.engine.store().get_ride(ride_id).await {
            Ok(Some(ride)) => ride,
            Ok(None) => return BookingError::RideNotFound(ride_id),
            Err(e) => return e.into(),
        };

        let owned = match actor {
            RideActor::Driver(id) => ride.driver_id == Some(id),
            RideActor::Customer(id) => ride.customer_id == id,
        };
        if owned {
            tracing::warn!(status = %ride.status, %target, "rejected ride transition");
            BookingError::invalid_transition("ride", ride.status, target)
        } else {
            BookingError::NotOwner("ride")
        }
    }
}
