// src/models/trip.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// "lat,lng" string the distance provider expects.
    pub fn to_query_pair(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Scooter,
    Van,
    Truck,
    #[serde(other)]
    Other,
}

impl VehicleClass {
    /// Per-trip platform charge deducted from driver earnings.
    pub fn charge(&self) -> f64 {
        match self {
            VehicleClass::Scooter => 0.20,
            VehicleClass::Van => 0.30,
            VehicleClass::Truck => 0.50,
            VehicleClass::Other => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Scooter => "scooter",
            VehicleClass::Van => "van",
            VehicleClass::Truck => "truck",
            VehicleClass::Other => "other",
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Wallet,
}

/// The validated body of a delivery request, as handed over by the API layer.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeliveryDetails {
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub vehicle: VehicleClass,
    pub fare: f64,
    pub payment_method: PaymentMethod,
}

/// A pending delivery request awaiting a driver match and acceptance.
///
/// `accepted` flips false -> true exactly once and never back.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TripRequest {
    pub id: String,
    pub requester_id: String,
    pub details: DeliveryDetails,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

/// The accepted, in-progress-or-settled trip resulting from a TripRequest.
///
/// Terminal once `end_time` is set or `successful` is false.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Delivery {
    pub id: String,
    pub driver_id: String,
    pub client_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub vehicle: VehicleClass,
    pub fare: f64,
    pub payment_method: PaymentMethod,
    pub successful: bool,
}

impl Delivery {
    pub fn new(trip: &TripRequest, driver_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            driver_id: driver_id.to_string(),
            client_id: trip.requester_id.clone(),
            start_time: Utc::now(),
            end_time: None,
            origin: trip.details.origin,
            destination: trip.details.destination,
            vehicle: trip.details.vehicle,
            fare: trip.details.fare,
            payment_method: trip.details.payment_method.clone(),
            successful: true,
        }
    }
}

/// Quoted fare per vehicle class for a given distance.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FareQuote {
    pub scooter: f64,
    pub van: f64,
    pub truck: f64,
}
