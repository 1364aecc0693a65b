// src/services/trip_store.rs
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{
    errors::{DispatchError as AppError, DispatchResult},
    models::{finances::DriverFinancesEntry, trip::Delivery, trip::TripRequest},
};

/// Transactional store for trip requests, deliveries and the finances ledger.
/// The store must support an atomic one-way flip of a trip's `accepted` flag;
/// `mark_accepted` reports whether this call performed the flip, so exactly
/// one concurrent accept can win it.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn create_trip(&self, trip: &TripRequest) -> DispatchResult<()>;
    async fn get_trip(&self, trip_id: &str) -> DispatchResult<Option<TripRequest>>;
    async fn mark_accepted(&self, trip_id: &str) -> DispatchResult<bool>;

    async fn create_delivery(&self, delivery: &Delivery) -> DispatchResult<()>;
    async fn get_delivery(&self, delivery_id: &str) -> DispatchResult<Option<Delivery>>;
    async fn update_delivery(&self, delivery: &Delivery) -> DispatchResult<()>;
    async fn deliveries_for_user(&self, user_id: &str) -> DispatchResult<Vec<Delivery>>;

    async fn append_finances(&self, entry: DriverFinancesEntry) -> DispatchResult<()>;
    async fn finances_for_driver(
        &self,
        driver_id: &str,
    ) -> DispatchResult<Vec<DriverFinancesEntry>>;
}

/// In-memory store for development and testing.
#[derive(Default)]
pub struct MemoryTripStore {
    trips: RwLock<HashMap<String, TripRequest>>,
    deliveries: RwLock<HashMap<String, Delivery>>,
    ledger: RwLock<Vec<DriverFinancesEntry>>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the requester deleting their trip mid-search.
    pub async fn remove_trip(&self, trip_id: &str) {
        self.trips.write().await.remove(trip_id);
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn create_trip(&self, trip: &TripRequest) -> DispatchResult<()> {
        self.trips
            .write()
            .await
            .insert(trip.id.clone(), trip.clone());
        Ok(())
    }

    async fn get_trip(&self, trip_id: &str) -> DispatchResult<Option<TripRequest>> {
        Ok(self.trips.read().await.get(trip_id).cloned())
    }

    async fn mark_accepted(&self, trip_id: &str) -> DispatchResult<bool> {
        let mut trips = self.trips.write().await;
        let trip = trips
            .get_mut(trip_id)
            .ok_or_else(|| AppError::trip_not_found(trip_id))?;
        if trip.accepted {
            return Ok(false);
        }
        trip.accepted = true;
        Ok(true)
    }

    async fn create_delivery(&self, delivery: &Delivery) -> DispatchResult<()> {
        self.deliveries
            .write()
            .await
            .insert(delivery.id.clone(), delivery.clone());
        Ok(())
    }

    async fn get_delivery(&self, delivery_id: &str) -> DispatchResult<Option<Delivery>> {
        Ok(self.deliveries.read().await.get(delivery_id).cloned())
    }

    async fn update_delivery(&self, delivery: &Delivery) -> DispatchResult<()> {
        let mut deliveries = self.deliveries.write().await;
        if !deliveries.contains_key(&delivery.id) {
            return Err(AppError::delivery_not_found(&delivery.id));
        }
        deliveries.insert(delivery.id.clone(), delivery.clone());
        Ok(())
    }

    async fn deliveries_for_user(&self, user_id: &str) -> DispatchResult<Vec<Delivery>> {
        let deliveries = self.deliveries.read().await;
        let mut matched: Vec<Delivery> = deliveries
            .values()
            .filter(|delivery| delivery.client_id == user_id || delivery.driver_id == user_id)
            .cloned()
            .collect();
        // Newest first
        matched.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(matched)
    }

    async fn append_finances(&self, entry: DriverFinancesEntry) -> DispatchResult<()> {
        self.ledger.write().await.push(entry);
        Ok(())
    }

    async fn finances_for_driver(
        &self,
        driver_id: &str,
    ) -> DispatchResult<Vec<DriverFinancesEntry>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .iter()
            .filter(|entry| entry.driver_id == driver_id)
            .cloned()
            .collect())
    }
}
