// src/services/retry_service.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing;

use crate::{
    models::{trip::TripRequest, user::UserProfile},
    services::{
        matching_service::{MatchOutcome, MatchingService},
        messaging_service::NotificationService,
        trip_store::TripStore,
        user_service::UserDirectory,
    },
};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the immediate first attempt.
    pub max_retries: u32,
    /// Full wait between attempts.
    pub retry_wait: Duration,
    /// Acceptance poll cadence inside a wait.
    pub poll_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            retry_wait: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Terminal state of one trip's retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The trip was accepted; all further attempts are cancelled.
    Accepted,
    /// The attempt ceiling was reached; the requester was told no driver was
    /// found.
    Exhausted,
    /// The trip or its requester no longer resolves; stopped silently.
    Aborted,
    /// Another loop already owns this trip id; this one never started.
    AlreadyScheduled,
}

enum AttemptResult {
    Accepted,
    Aborted,
    Continue,
}

/// Per-trip matching retry loop: an immediate first attempt, then a fixed
/// number of retries on a fixed cadence, polling the trip's `accepted` flag
/// once per second so an acceptance mid-wait short-circuits. The active set
/// guarantees at most one loop per trip id.
pub struct RetryScheduler {
    store: Arc<dyn TripStore>,
    users: Arc<dyn UserDirectory>,
    matching: Arc<MatchingService>,
    notifications: Arc<dyn NotificationService>,
    config: RetryConfig,
    active: Mutex<HashSet<String>>,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<dyn TripStore>,
        users: Arc<dyn UserDirectory>,
        matching: Arc<MatchingService>,
        notifications: Arc<dyn NotificationService>,
        config: RetryConfig,
    ) -> Self {
        Self {
            store,
            users,
            matching,
            notifications,
            config,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Spawns the retry loop for a newly created trip.
    pub fn spawn(self: Arc<Self>, trip_id: String) -> tokio::task::JoinHandle<RetryOutcome> {
        tokio::spawn(async move { self.run(trip_id).await })
    }

    pub async fn run(self: Arc<Self>, trip_id: String) -> RetryOutcome {
        {
            let mut active = self.active.lock().expect("active set poisoned");
            if !active.insert(trip_id.clone()) {
                tracing::warn!("Retry loop already running for trip {}", trip_id);
                return RetryOutcome::AlreadyScheduled;
            }
        }

        let outcome = self.run_loop(&trip_id).await;

        self.active
            .lock()
            .expect("active set poisoned")
            .remove(&trip_id);
        tracing::info!("Retry loop for trip {} finished: {:?}", trip_id, outcome);
        outcome
    }

    async fn run_loop(&self, trip_id: &str) -> RetryOutcome {
        // Immediate first attempt keeps the common case fast.
        match self.attempt(trip_id, 0).await {
            AttemptResult::Accepted => return RetryOutcome::Accepted,
            AttemptResult::Aborted => return RetryOutcome::Aborted,
            AttemptResult::Continue => {}
        }

        for attempt in 1..=self.config.max_retries {
            match self.wait_for_acceptance(trip_id).await {
                AttemptResult::Accepted => return RetryOutcome::Accepted,
                AttemptResult::Aborted => return RetryOutcome::Aborted,
                AttemptResult::Continue => {}
            }

            match self.attempt(trip_id, attempt).await {
                AttemptResult::Accepted => return RetryOutcome::Accepted,
                AttemptResult::Aborted => return RetryOutcome::Aborted,
                AttemptResult::Continue => {}
            }
        }

        self.exhaust(trip_id).await
    }

    /// Sleeps through one retry wait, checking the acceptance flag once per
    /// poll interval.
    async fn wait_for_acceptance(&self, trip_id: &str) -> AttemptResult {
        let polls = (self.config.retry_wait.as_millis()
            / self.config.poll_interval.as_millis().max(1)) as u64;
        for _ in 0..polls {
            match self.store.get_trip(trip_id).await {
                Ok(Some(trip)) if trip.accepted => {
                    tracing::info!("Trip {} accepted during countdown", trip_id);
                    return AttemptResult::Accepted;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::info!("Trip {} no longer exists, aborting", trip_id);
                    return AttemptResult::Aborted;
                }
                Err(error) => {
                    // Store hiccups during the wait are not fatal; the next
                    // poll or attempt re-reads.
                    tracing::warn!("Acceptance poll failed for trip {}: {}", trip_id, error);
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        AttemptResult::Continue
    }

    /// One matching attempt against freshly re-read state. Errors are
    /// transient: they consume the attempt and the loop continues.
    async fn attempt(&self, trip_id: &str, attempt: u32) -> AttemptResult {
        let trip = match self.store.get_trip(trip_id).await {
            Ok(Some(trip)) => trip,
            Ok(None) => {
                tracing::info!("Trip {} not found, aborting retry loop", trip_id);
                return AttemptResult::Aborted;
            }
            Err(error) => {
                tracing::warn!("Attempt {} for trip {} failed to load trip: {}", attempt, trip_id, error);
                return AttemptResult::Continue;
            }
        };

        if trip.accepted {
            return AttemptResult::Accepted;
        }

        let requester = match self.users.get_user(&trip.requester_id).await {
            Ok(Some(requester)) => requester,
            Ok(None) => {
                tracing::info!(
                    "Requester {} for trip {} not found, aborting",
                    trip.requester_id,
                    trip_id
                );
                return AttemptResult::Aborted;
            }
            Err(error) => {
                tracing::warn!("Attempt {} for trip {} failed to load requester: {}", attempt, trip_id, error);
                return AttemptResult::Continue;
            }
        };

        match self.matching.attempt(&trip, &requester).await {
            Ok(MatchOutcome::Matched { driver, distance_meters }) => {
                tracing::info!(
                    "Attempt {} for trip {} offered to driver {} at {}m",
                    attempt,
                    trip_id,
                    driver.driver_id,
                    distance_meters
                );
            }
            Ok(MatchOutcome::NoMatch) => {
                tracing::info!("Attempt {} for trip {}: no match", attempt, trip_id);
            }
            Err(error) => {
                tracing::warn!(
                    "Attempt {} for trip {} failed transiently: {}",
                    attempt,
                    trip_id,
                    error
                );
            }
        }

        AttemptResult::Continue
    }

    /// The ceiling was reached without acceptance: tell the requester, unless
    /// they no longer resolve.
    async fn exhaust(&self, trip_id: &str) -> RetryOutcome {
        let Some(requester) = self.trip_requester(trip_id).await else {
            return RetryOutcome::Aborted;
        };

        if let Err(error) = self.notifications.notify_no_driver_found(&requester).await {
            tracing::warn!(
                "Failed to push no-driver-found for trip {}: {}",
                trip_id,
                error
            );
        }
        RetryOutcome::Exhausted
    }

    async fn trip_requester(&self, trip_id: &str) -> Option<UserProfile> {
        let trip: TripRequest = self.store.get_trip(trip_id).await.ok().flatten()?;
        self.users.get_user(&trip.requester_id).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::driver::VehicleInfo;
    use crate::models::trip::{Coordinates, DeliveryDetails, PaymentMethod, VehicleClass};
    use crate::services::driver_service::{
        DriverRecord, MemoryDriverRegistry, MemoryLocationStore,
    };
    use crate::services::geo_service::{DistanceResult, StubDistanceOracle};
    use crate::services::messaging_service::RecordingNotificationService;
    use crate::services::trip_store::MemoryTripStore;
    use crate::services::user_service::MemoryUserDirectory;
    use chrono::Utc;

    struct Harness {
        store: Arc<MemoryTripStore>,
        users: Arc<MemoryUserDirectory>,
        registry: Arc<MemoryDriverRegistry>,
        locations: Arc<MemoryLocationStore>,
        oracle: Arc<StubDistanceOracle>,
        gateway: Arc<RecordingNotificationService>,
        scheduler: Arc<RetryScheduler>,
    }

    fn harness(oracle: StubDistanceOracle) -> Harness {
        let store = Arc::new(MemoryTripStore::new());
        let users = Arc::new(MemoryUserDirectory::new());
        let registry = Arc::new(MemoryDriverRegistry::new());
        let locations = Arc::new(MemoryLocationStore::new());
        let oracle = Arc::new(oracle);
        let gateway = Arc::new(RecordingNotificationService::default());

        let matching = Arc::new(MatchingService::new(
            registry.clone(),
            locations.clone(),
            oracle.clone(),
            gateway.clone(),
        ));
        let scheduler = Arc::new(RetryScheduler::new(
            store.clone(),
            users.clone(),
            matching,
            gateway.clone(),
            RetryConfig::default(),
        ));

        Harness {
            store,
            users,
            registry,
            locations,
            oracle,
            gateway,
            scheduler,
        }
    }

    fn requester() -> UserProfile {
        UserProfile {
            id: "usr-250825-aaaaa".to_string(),
            name: "Ama".to_string(),
            surname: "Mensah".to_string(),
            push_token: Some("tok-requester".to_string()),
            rating: 5.0,
            rating_count: 3,
        }
    }

    fn trip() -> TripRequest {
        TripRequest {
            id: "trip-250825-abc12".to_string(),
            requester_id: "usr-250825-aaaaa".to_string(),
            details: DeliveryDetails {
                origin: Coordinates::new(0.0, 0.0),
                destination: Coordinates::new(1.0, 1.0),
                vehicle: VehicleClass::Van,
                fare: 10.0,
                payment_method: PaymentMethod::Cash,
            },
            accepted: false,
            created_at: Utc::now(),
        }
    }

    async fn seed(harness: &Harness) {
        harness.users.insert(requester()).await;
        harness.store.create_trip(&trip()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_initial_attempt_plus_four_retries() {
        let harness = harness(StubDistanceOracle::default());
        seed(&harness).await;

        let outcome = harness
            .scheduler
            .clone()
            .run(trip().id)
            .await;

        assert_eq!(outcome, RetryOutcome::Exhausted);
        // With no drivers registered the only push is the exhaustion notice.
        assert_eq!(harness.gateway.sent_types(), vec!["no_driver_found"]);
    }

    #[tokio::test(start_paused = true)]
    async fn each_attempt_queries_fresh_snapshots() {
        let location = Coordinates::new(0.01, 0.01);
        let oracle = StubDistanceOracle::with_distances(vec![(
            location,
            DistanceResult::Meters(400),
        )]);
        let harness = harness(oracle);
        seed(&harness).await;

        harness
            .registry
            .register(DriverRecord {
                driver_id: "drv-250825-bbbbb".to_string(),
                name: "Kofi".to_string(),
                surname: "Owusu".to_string(),
                push_token: Some("tok-driver".to_string()),
                vehicle: Some(VehicleInfo {
                    id: "veh-1".to_string(),
                    class: VehicleClass::Van,
                    name: "Sprinter".to_string(),
                    number_plate: "GR-1234-25".to_string(),
                    model: "2019".to_string(),
                    color: "white".to_string(),
                }),
                available: true,
                rating: 4.5,
                rating_count: 12,
            })
            .await;
        harness
            .locations
            .report("drv-250825-bbbbb", location)
            .await;

        let outcome = harness.scheduler.clone().run(trip().id).await;

        assert_eq!(outcome, RetryOutcome::Exhausted);
        // One oracle call per attempt: initial + 4 retries.
        assert_eq!(harness.oracle.call_count(), 5);
        // Every attempt pushed a new-request offer, then exhaustion notified
        // the requester.
        let types = harness.gateway.sent_types();
        assert_eq!(
            types,
            vec![
                "new_request",
                "new_request",
                "new_request",
                "new_request",
                "new_request",
                "no_driver_found"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn acceptance_mid_wait_short_circuits() {
        let harness = harness(StubDistanceOracle::default());
        seed(&harness).await;

        let handle = harness.scheduler.clone().spawn(trip().id);

        // Let the loop get into its third wait window, then accept.
        tokio::time::sleep(Duration::from_secs(25)).await;
        harness.store.mark_accepted(&trip().id).await.unwrap();

        let before_accept = harness.oracle.call_count();
        let outcome = handle.await.unwrap();

        assert_eq!(outcome, RetryOutcome::Accepted);
        // No further matching attempts after the flag was observed.
        assert_eq!(harness.oracle.call_count(), before_accept);
        // And no notification of any kind was sent for the acceptance path.
        assert!(harness.gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_trip_aborts_silently() {
        let harness = harness(StubDistanceOracle::default());
        seed(&harness).await;

        let handle = harness.scheduler.clone().spawn(trip().id);
        tokio::time::sleep(Duration::from_secs(3)).await;
        harness.store.remove_trip(&trip().id).await;

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, RetryOutcome::Aborted);
        assert!(harness.gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_requester_aborts_silently() {
        let harness = harness(StubDistanceOracle::default());
        seed(&harness).await;
        harness.users.remove("usr-250825-aaaaa").await;

        let outcome = harness.scheduler.clone().run(trip().id).await;
        assert_eq!(outcome, RetryOutcome::Aborted);
        assert!(harness.gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_oracle_failure_consumes_attempts_until_exhaustion() {
        let location = Coordinates::new(0.01, 0.01);
        let oracle = StubDistanceOracle::with_distances(vec![(
            location,
            DistanceResult::Meters(400),
        )]);
        oracle.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let harness = harness(oracle);
        seed(&harness).await;

        harness
            .registry
            .register(DriverRecord {
                driver_id: "drv-250825-ccccc".to_string(),
                name: "Yaw".to_string(),
                surname: "Asante".to_string(),
                push_token: None,
                vehicle: Some(VehicleInfo {
                    id: "veh-2".to_string(),
                    class: VehicleClass::Van,
                    name: "Transit".to_string(),
                    number_plate: "GW-555-25".to_string(),
                    model: "2021".to_string(),
                    color: "blue".to_string(),
                }),
                available: true,
                rating: 4.0,
                rating_count: 2,
            })
            .await;
        harness.locations.report("drv-250825-ccccc", location).await;

        let outcome = harness.scheduler.clone().run(trip().id).await;

        // Persistent errors converge to exhaustion, not a crash.
        assert_eq!(outcome, RetryOutcome::Exhausted);
        assert_eq!(harness.oracle.call_count(), 5);
        assert_eq!(harness.gateway.sent_types(), vec!["no_driver_found"]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_loop_for_same_trip_never_starts() {
        let harness = harness(StubDistanceOracle::default());
        seed(&harness).await;

        let first = harness.scheduler.clone().spawn(trip().id);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = harness.scheduler.clone().run(trip().id).await;
        assert_eq!(second, RetryOutcome::AlreadyScheduled);

        harness.store.mark_accepted(&trip().id).await.unwrap();
        assert_eq!(first.await.unwrap(), RetryOutcome::Accepted);
    }
}
