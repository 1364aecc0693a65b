// src/services/matching_service.rs
use std::sync::Arc;
use tracing;

use crate::{
    errors::DispatchResult,
    models::{driver::DriverSnapshot, trip::Coordinates, trip::TripRequest, user::UserProfile},
    services::{
        driver_service::{DriverRegistry, LocationStore},
        geo_service::{DistanceOracle, DistanceResult},
        messaging_service::NotificationService,
    },
};

/// Result of one matching attempt. `NoMatch` is a normal outcome, never an
/// error.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched {
        driver: DriverSnapshot,
        distance_meters: u32,
    },
    NoMatch,
}

pub struct MatchingService {
    registry: Arc<dyn DriverRegistry>,
    locations: Arc<dyn LocationStore>,
    oracle: Arc<dyn DistanceOracle>,
    notifications: Arc<dyn NotificationService>,
}

impl MatchingService {
    pub fn new(
        registry: Arc<dyn DriverRegistry>,
        locations: Arc<dyn LocationStore>,
        oracle: Arc<dyn DistanceOracle>,
        notifications: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            registry,
            locations,
            oracle,
            notifications,
        }
    }

    /// Assembles fresh driver snapshots for one matching attempt: the registry
    /// view plus each driver's last known location, fetched concurrently.
    pub async fn collect_snapshots(
        &self,
        trip: &TripRequest,
    ) -> DispatchResult<Vec<DriverSnapshot>> {
        let mut snapshots = self
            .registry
            .list_available_drivers(trip.details.vehicle)
            .await?;

        let lookups = snapshots
            .iter()
            .map(|snapshot| self.locations.last_known_location(&snapshot.driver_id));
        let locations = futures::future::join_all(lookups).await;

        for (snapshot, location) in snapshots.iter_mut().zip(locations) {
            snapshot.location = location?;
        }
        Ok(snapshots)
    }

    /// One full attempt: snapshot the fleet, then find and notify the nearest
    /// eligible driver.
    pub async fn attempt(
        &self,
        trip: &TripRequest,
        requester: &UserProfile,
    ) -> DispatchResult<MatchOutcome> {
        let snapshots = self.collect_snapshots(trip).await?;
        self.find_match(trip, requester, &snapshots).await
    }

    /// Selects the nearest eligible driver out of `snapshots`.
    ///
    /// Eligible means: matching vehicle class, available, and a known
    /// location. Candidates whose distance lookup fails are skipped. The
    /// strictly smallest distance wins; ties keep the first candidate
    /// encountered. On a match the chosen driver gets a "new request" push,
    /// fire-and-forget. This never mutates the trip or driver availability;
    /// that happens at acceptance.
    pub async fn find_match(
        &self,
        trip: &TripRequest,
        requester: &UserProfile,
        snapshots: &[DriverSnapshot],
    ) -> DispatchResult<MatchOutcome> {
        let candidates: Vec<(&DriverSnapshot, Coordinates)> = snapshots
            .iter()
            .filter(|snapshot| {
                snapshot.available
                    && snapshot
                        .vehicle
                        .as_ref()
                        .is_some_and(|vehicle| vehicle.class == trip.details.vehicle)
            })
            .filter_map(|snapshot| snapshot.location.map(|location| (snapshot, location)))
            .collect();

        if candidates.is_empty() {
            tracing::info!("No eligible drivers for trip {}", trip.id);
            return Ok(MatchOutcome::NoMatch);
        }

        let destinations: Vec<Coordinates> =
            candidates.iter().map(|(_, location)| *location).collect();
        let distances = self
            .oracle
            .driving_distances(trip.details.origin, &destinations)
            .await?;

        let mut closest: Option<(&DriverSnapshot, u32)> = None;
        for ((snapshot, _), distance) in candidates.iter().copied().zip(distances) {
            let meters = match distance {
                DistanceResult::Meters(meters) => meters,
                DistanceResult::Unavailable => {
                    tracing::debug!(
                        "Skipping driver {} for trip {}: distance unavailable",
                        snapshot.driver_id,
                        trip.id
                    );
                    continue;
                }
            };
            match closest {
                Some((_, best)) if meters >= best => {}
                _ => closest = Some((snapshot, meters)),
            }
        }

        let Some((driver, distance_meters)) = closest else {
            tracing::info!("All distance lookups failed for trip {}", trip.id);
            return Ok(MatchOutcome::NoMatch);
        };

        tracing::info!(
            "Matched trip {} to driver {} at {}m",
            trip.id,
            driver.driver_id,
            distance_meters
        );

        // Fire-and-forget: a failed push is logged and does not change the
        // match outcome.
        if let Err(error) = self
            .notifications
            .notify_new_request(driver, trip, &requester.full_name(), distance_meters)
            .await
        {
            tracing::warn!(
                "Failed to push new-request to driver {}: {}",
                driver.driver_id,
                error
            );
        }

        Ok(MatchOutcome::Matched {
            driver: driver.clone(),
            distance_meters,
        })
    }
}
