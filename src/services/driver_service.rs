// src/services/driver_service.rs
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing;

use crate::{
    errors::{DispatchError as AppError, DispatchResult},
    models::{
        driver::{DriverSnapshot, VehicleInfo},
        trip::{Coordinates, VehicleClass},
    },
};

/// Driver registry collaborator. Availability is the one piece of shared
/// mutable state contended by concurrent accepts: taking a driver
/// (`available = false`) is a compare-and-set against `true` and loses with
/// `DriverNotAvailable`; releasing (`available = true`) is idempotent.
#[async_trait]
pub trait DriverRegistry: Send + Sync {
    async fn list_available_drivers(
        &self,
        vehicle: VehicleClass,
    ) -> DispatchResult<Vec<DriverSnapshot>>;
    async fn get_vehicle(&self, driver_id: &str) -> DispatchResult<VehicleInfo>;
    async fn set_availability(&self, driver_id: &str, available: bool) -> DispatchResult<()>;
}

/// Last-known driver coordinates, fed by the external live-location feed.
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn last_known_location(&self, driver_id: &str) -> DispatchResult<Option<Coordinates>>;
}

/// One registered driver as the in-memory registry holds it.
#[derive(Debug, Clone)]
pub struct DriverRecord {
    pub driver_id: String,
    pub name: String,
    pub surname: String,
    pub push_token: Option<String>,
    pub vehicle: Option<VehicleInfo>,
    pub available: bool,
    pub rating: f64,
    pub rating_count: u32,
}

impl DriverRecord {
    fn to_snapshot(&self) -> DriverSnapshot {
        DriverSnapshot {
            driver_id: self.driver_id.clone(),
            name: self.name.clone(),
            surname: self.surname.clone(),
            location: None,
            vehicle: self.vehicle.clone(),
            available: self.available,
            push_token: self.push_token.clone(),
            rating: self.rating,
            rating_count: self.rating_count,
        }
    }
}

/// In-memory registry for development and testing; the production registry
/// lives behind the same trait in the excluded driver subsystem.
#[derive(Default)]
pub struct MemoryDriverRegistry {
    drivers: RwLock<HashMap<String, DriverRecord>>,
}

impl MemoryDriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, record: DriverRecord) {
        self.drivers
            .write()
            .await
            .insert(record.driver_id.clone(), record);
    }

    pub async fn is_available(&self, driver_id: &str) -> Option<bool> {
        self.drivers
            .read()
            .await
            .get(driver_id)
            .map(|record| record.available)
    }
}

#[async_trait]
impl DriverRegistry for MemoryDriverRegistry {
    async fn list_available_drivers(
        &self,
        vehicle: VehicleClass,
    ) -> DispatchResult<Vec<DriverSnapshot>> {
        let drivers = self.drivers.read().await;
        let snapshots = drivers
            .values()
            .filter(|record| {
                record.available
                    && record
                        .vehicle
                        .as_ref()
                        .is_some_and(|info| info.class == vehicle)
            })
            .map(DriverRecord::to_snapshot)
            .collect();
        Ok(snapshots)
    }

    async fn get_vehicle(&self, driver_id: &str) -> DispatchResult<VehicleInfo> {
        let drivers = self.drivers.read().await;
        drivers
            .get(driver_id)
            .and_then(|record| record.vehicle.clone())
            .ok_or_else(|| AppError::VehicleNotFound(driver_id.to_string()))
    }

    async fn set_availability(&self, driver_id: &str, available: bool) -> DispatchResult<()> {
        let mut drivers = self.drivers.write().await;
        let record = drivers
            .get_mut(driver_id)
            .ok_or_else(|| AppError::driver_not_found(driver_id))?;

        if !available && !record.available {
            // The compare-and-set lost: someone already took this driver.
            return Err(AppError::DriverNotAvailable(driver_id.to_string()));
        }

        record.available = available;
        tracing::debug!("Driver {} availability set to {}", driver_id, available);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLocationStore {
    locations: RwLock<HashMap<String, Coordinates>>,
}

impl MemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn report(&self, driver_id: &str, location: Coordinates) {
        self.locations
            .write()
            .await
            .insert(driver_id.to_string(), location);
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn last_known_location(&self, driver_id: &str) -> DispatchResult<Option<Coordinates>> {
        Ok(self.locations.read().await.get(driver_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn van_driver(id: &str, available: bool) -> DriverRecord {
        DriverRecord {
            driver_id: id.to_string(),
            name: "Kofi".to_string(),
            surname: "Owusu".to_string(),
            push_token: Some("tok".to_string()),
            vehicle: Some(VehicleInfo {
                id: "veh-1".to_string(),
                class: VehicleClass::Van,
                name: "Sprinter".to_string(),
                number_plate: "GR-1234-25".to_string(),
                model: "2019".to_string(),
                color: "white".to_string(),
            }),
            available,
            rating: 4.5,
            rating_count: 12,
        }
    }

    #[tokio::test]
    async fn listing_filters_class_and_availability() {
        let registry = MemoryDriverRegistry::new();
        registry.register(van_driver("drv-1", true)).await;
        registry.register(van_driver("drv-2", false)).await;

        let vans = registry
            .list_available_drivers(VehicleClass::Van)
            .await
            .unwrap();
        assert_eq!(vans.len(), 1);
        assert_eq!(vans[0].driver_id, "drv-1");

        let trucks = registry
            .list_available_drivers(VehicleClass::Truck)
            .await
            .unwrap();
        assert!(trucks.is_empty());
    }

    #[tokio::test]
    async fn taking_an_unavailable_driver_conflicts() {
        let registry = MemoryDriverRegistry::new();
        registry.register(van_driver("drv-1", true)).await;

        registry.set_availability("drv-1", false).await.unwrap();
        let second = registry.set_availability("drv-1", false).await;
        assert!(matches!(second, Err(AppError::DriverNotAvailable(_))));

        // Releasing is idempotent.
        registry.set_availability("drv-1", true).await.unwrap();
        registry.set_availability("drv-1", true).await.unwrap();
    }
}
