// src/state.rs
use std::sync::Arc;

use crate::services::{
    driver_service::{MemoryDriverRegistry, MemoryLocationStore},
    geo_service::{
        DistanceMatrixConfig, DistanceOracle, GoogleDistanceOracle, HaversineDistanceOracle,
    },
    matching_service::MatchingService,
    messaging_service::{
        FcmNotificationService, MockNotificationService, NotificationService,
    },
    retry_service::{RetryConfig, RetryScheduler},
    trip_service::TripService,
    trip_store::MemoryTripStore,
    user_service::MemoryUserDirectory,
};

#[derive(Clone, Default)]
pub struct AppConfig {
    pub google_maps_api_key: Option<String>,
    pub fcm_server_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            google_maps_api_key: std::env::var("GOOGLE_MAPS_API_KEY").ok(),
            fcm_server_key: std::env::var("FCM_SERVER_KEY").ok(),
        }
    }
}

pub struct AppState {
    pub store: Arc<MemoryTripStore>,
    pub users: Arc<MemoryUserDirectory>,
    pub registry: Arc<MemoryDriverRegistry>,
    pub locations: Arc<MemoryLocationStore>,
    pub notification_service: Arc<dyn NotificationService>,
    pub trip_service: Arc<TripService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryTripStore::new());
        let users = Arc::new(MemoryUserDirectory::new());
        let registry = Arc::new(MemoryDriverRegistry::new());
        let locations = Arc::new(MemoryLocationStore::new());

        let oracle: Arc<dyn DistanceOracle> = match &config.google_maps_api_key {
            Some(api_key) => Arc::new(GoogleDistanceOracle::new(DistanceMatrixConfig::new(
                api_key.clone(),
            ))?),
            None => {
                tracing::warn!(
                    "GOOGLE_MAPS_API_KEY not set, using straight-line distance fallback"
                );
                Arc::new(HaversineDistanceOracle)
            }
        };

        let notification_service: Arc<dyn NotificationService> = match &config.fcm_server_key {
            Some(server_key) => Arc::new(FcmNotificationService::with_server_key(
                server_key.clone(),
            )?),
            None => {
                tracing::warn!("FCM_SERVER_KEY not set, using mock notification service");
                Arc::new(MockNotificationService)
            }
        };

        let matching_service = Arc::new(MatchingService::new(
            registry.clone(),
            locations.clone(),
            oracle,
            notification_service.clone(),
        ));
        let scheduler = Arc::new(RetryScheduler::new(
            store.clone(),
            users.clone(),
            matching_service,
            notification_service.clone(),
            RetryConfig::default(),
        ));
        let trip_service = Arc::new(TripService::new(
            store.clone(),
            users.clone(),
            registry.clone(),
            notification_service.clone(),
            scheduler,
        ));

        Ok(Self {
            store,
            users,
            registry,
            locations,
            notification_service,
            trip_service,
            config,
        })
    }
}
