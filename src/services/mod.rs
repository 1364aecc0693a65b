// src/services/mod.rs
pub mod driver_service;
pub mod geo_service;
pub mod matching_service;
pub mod messaging_service;
pub mod retry_service;
pub mod trip_service;
pub mod trip_store;
pub mod user_service;
