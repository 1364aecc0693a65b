// src/services/trip_service.rs
use chrono::Utc;
use std::sync::Arc;
use tracing;

use crate::{
    errors::{DispatchError as AppError, DispatchResult},
    models::{
        finances::{DriverFinancesEntry, FinancesReport},
        trip::{Delivery, DeliveryDetails, FareQuote, TripRequest},
    },
    services::{
        driver_service::DriverRegistry,
        messaging_service::NotificationService,
        retry_service::RetryScheduler,
        trip_store::TripStore,
        user_service::UserDirectory,
    },
    utils::id_generator::{IdGenerator, IdType},
};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Quotes the fare for each vehicle class at a given trip distance.
///
/// Rates are per-kilometre plus the class's flat platform charge, rounded to
/// two decimal places.
pub fn quote_fares(distance_km: f64) -> DispatchResult<FareQuote> {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return Err(AppError::validation_error(
            "distance",
            "Distance must be a positive number",
        ));
    }

    Ok(FareQuote {
        scooter: round2(0.50 * distance_km + 0.20),
        van: round2(1.10 * distance_km + 0.30),
        truck: round2(2.30 * distance_km + 0.50),
    })
}

/// Drives the trip lifecycle: request creation kicks off the matching loop,
/// acceptance races are settled by the store's one-way flag flip, and
/// completion settles ratings and the driver's ledger.
pub struct TripService {
    store: Arc<dyn TripStore>,
    users: Arc<dyn UserDirectory>,
    registry: Arc<dyn DriverRegistry>,
    notifications: Arc<dyn NotificationService>,
    scheduler: Arc<RetryScheduler>,
}

impl TripService {
    pub fn new(
        store: Arc<dyn TripStore>,
        users: Arc<dyn UserDirectory>,
        registry: Arc<dyn DriverRegistry>,
        notifications: Arc<dyn NotificationService>,
        scheduler: Arc<RetryScheduler>,
    ) -> Self {
        Self {
            store,
            users,
            registry,
            notifications,
            scheduler,
        }
    }

    fn validate_details(details: &DeliveryDetails) -> DispatchResult<()> {
        if !details.fare.is_finite() || details.fare <= 0.0 {
            return Err(AppError::validation_error(
                "fare",
                "Fare must be a positive number",
            ));
        }
        for (field, coords) in [
            ("origin", details.origin),
            ("destination", details.destination),
        ] {
            if !coords.latitude.is_finite()
                || !coords.longitude.is_finite()
                || coords.latitude.abs() > 90.0
                || coords.longitude.abs() > 180.0
            {
                return Err(AppError::InvalidFieldValue {
                    field: field.to_string(),
                    value: coords.to_query_pair(),
                    reason: "Coordinates out of range".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Creates a trip request and starts its matching loop in the background.
    pub async fn create_trip(
        &self,
        requester_id: &str,
        details: DeliveryDetails,
    ) -> DispatchResult<TripRequest> {
        Self::validate_details(&details)?;

        if self.users.get_user(requester_id).await?.is_none() {
            return Err(AppError::user_not_found(requester_id));
        }

        let trip = TripRequest {
            id: IdGenerator::generate(IdType::Trip),
            requester_id: requester_id.to_string(),
            details,
            accepted: false,
            created_at: Utc::now(),
        };
        self.store.create_trip(&trip).await?;
        tracing::info!("Trip {} created for requester {}", trip.id, requester_id);

        self.scheduler.clone().spawn(trip.id.clone());
        Ok(trip)
    }

    /// A driver claims a pending trip. Exactly one concurrent accept wins; the
    /// loser gets `TripAlreadyAccepted` and keeps (or regains) availability.
    pub async fn accept_trip(&self, trip_id: &str, driver_id: &str) -> DispatchResult<Delivery> {
        let trip = self
            .store
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| AppError::trip_not_found(trip_id))?;
        if trip.accepted {
            return Err(AppError::TripAlreadyAccepted(trip_id.to_string()));
        }

        let vehicle = self.registry.get_vehicle(driver_id).await?;

        // Take the driver before flipping the trip so a half-won race never
        // leaves an accepted trip with no committed driver.
        self.registry.set_availability(driver_id, false).await?;

        if !self.store.mark_accepted(trip_id).await? {
            if let Err(error) = self.registry.set_availability(driver_id, true).await {
                tracing::warn!(
                    "Failed to release driver {} after lost accept race: {}",
                    driver_id,
                    error
                );
            }
            return Err(AppError::TripAlreadyAccepted(trip_id.to_string()));
        }

        let delivery = Delivery::new(&trip, driver_id);
        self.store.create_delivery(&delivery).await?;
        tracing::info!(
            "Trip {} accepted by driver {} as delivery {}",
            trip_id,
            driver_id,
            delivery.id
        );

        // The acceptance is committed; the confirmation push is best effort.
        match (
            self.users.get_user(&trip.requester_id).await,
            self.users.get_user(driver_id).await,
        ) {
            (Ok(Some(client)), Ok(Some(driver))) => {
                if let Err(error) = self
                    .notifications
                    .notify_driver_found(&client, &driver, &vehicle, &delivery.id)
                    .await
                {
                    tracing::warn!(
                        "Failed to push driver-found for delivery {}: {}",
                        delivery.id,
                        error
                    );
                }
            }
            _ => {
                tracing::warn!(
                    "Skipping driver-found push for delivery {}: profiles unresolved",
                    delivery.id
                );
            }
        }

        Ok(delivery)
    }

    /// The client cancels an in-progress delivery. The delivery is kept as an
    /// unsuccessful record and the driver is released and told.
    pub async fn cancel_delivery(&self, delivery_id: &str) -> DispatchResult<Delivery> {
        let mut delivery = self
            .store
            .get_delivery(delivery_id)
            .await?
            .ok_or_else(|| AppError::delivery_not_found(delivery_id))?;
        if delivery.end_time.is_some() {
            return Err(AppError::bad_request("Delivery has already ended"));
        }

        delivery.successful = false;
        delivery.end_time = Some(Utc::now());
        self.store.update_delivery(&delivery).await?;

        self.registry
            .set_availability(&delivery.driver_id, true)
            .await?;
        tracing::info!(
            "Delivery {} cancelled, driver {} released",
            delivery_id,
            delivery.driver_id
        );

        let client_name = match self.users.get_user(&delivery.client_id).await {
            Ok(Some(client)) => client.full_name(),
            _ => "the client".to_string(),
        };
        if let Ok(Some(driver)) = self.users.get_user(&delivery.driver_id).await {
            if let Err(error) = self
                .notifications
                .notify_delivery_cancelled(&driver, &client_name)
                .await
            {
                tracing::warn!(
                    "Failed to push cancellation for delivery {}: {}",
                    delivery_id,
                    error
                );
            }
        }

        Ok(delivery)
    }

    /// The driver completes a delivery: the client's running rating absorbs
    /// the driver's score, the delivery settles at the final fare, a ledger
    /// row is appended and the driver goes back into rotation.
    pub async fn end_trip(
        &self,
        delivery_id: &str,
        client_rating: f64,
        final_fare: f64,
    ) -> DispatchResult<Delivery> {
        if !final_fare.is_finite() || final_fare < 0.0 {
            return Err(AppError::validation_error(
                "fare",
                "Final fare must be a non-negative number",
            ));
        }

        let mut delivery = self
            .store
            .get_delivery(delivery_id)
            .await?
            .ok_or_else(|| AppError::delivery_not_found(delivery_id))?;
        if delivery.end_time.is_some() {
            return Err(AppError::bad_request("Delivery has already ended"));
        }

        let mut client = self
            .users
            .get_user(&delivery.client_id)
            .await?
            .ok_or_else(|| AppError::user_not_found(&delivery.client_id))?;
        client.apply_rating(client_rating);
        self.users
            .update_rating(&client.id, client.rating, client.rating_count)
            .await?;

        delivery.end_time = Some(Utc::now());
        delivery.successful = true;
        delivery.fare = final_fare;
        self.store.update_delivery(&delivery).await?;

        let entry = DriverFinancesEntry::new(
            &delivery.driver_id,
            final_fare,
            delivery.vehicle.charge(),
            Utc::now().date_naive(),
        );
        self.store.append_finances(entry).await?;

        self.registry
            .set_availability(&delivery.driver_id, true)
            .await?;
        tracing::info!(
            "Delivery {} settled at {} for driver {}",
            delivery_id,
            final_fare,
            delivery.driver_id
        );

        Ok(delivery)
    }

    /// The client rates the driver of a completed delivery.
    pub async fn rate_driver(&self, delivery_id: &str, rating: f64) -> DispatchResult<f64> {
        let delivery = self
            .store
            .get_delivery(delivery_id)
            .await?
            .ok_or_else(|| AppError::delivery_not_found(delivery_id))?;
        let mut driver = self
            .users
            .get_user(&delivery.driver_id)
            .await?
            .ok_or_else(|| AppError::user_not_found(&delivery.driver_id))?;
        driver.apply_rating(rating);
        self.users
            .update_rating(&driver.id, driver.rating, driver.rating_count)
            .await?;
        Ok(driver.rating)
    }

    /// Aggregated earnings report over the driver's ledger rows.
    pub async fn driver_finances(&self, driver_id: &str) -> DispatchResult<FinancesReport> {
        let entries = self.store.finances_for_driver(driver_id).await?;
        Ok(FinancesReport::compute(&entries, Utc::now().date_naive()))
    }

    /// Delivery history for a client or driver, newest first.
    pub async fn deliveries_for_user(&self, user_id: &str) -> DispatchResult<Vec<Delivery>> {
        self.store.deliveries_for_user(user_id).await
    }
}
