// src/models/driver.rs
use serde::{Deserialize, Serialize};

use crate::models::trip::{Coordinates, VehicleClass};

/// Registered vehicle details for a driver.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VehicleInfo {
    pub id: String,
    pub class: VehicleClass,
    pub name: String,
    pub number_plate: String,
    pub model: String,
    pub color: String,
}

/// Ephemeral read-only view of one driver, assembled per matching attempt.
///
/// Availability reflects the instant the snapshot was taken; staleness beyond
/// one attempt cycle is corrected by the next retry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverSnapshot {
    pub driver_id: String,
    pub name: String,
    pub surname: String,
    pub location: Option<Coordinates>,
    pub vehicle: Option<VehicleInfo>,
    pub available: bool,
    pub push_token: Option<String>,
    pub rating: f64,
    pub rating_count: u32,
}
