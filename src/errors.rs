use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for the dispatch core.
#[derive(Debug)]
pub enum DispatchError {
    // Validation errors - surfaced to the caller, never retried
    BadRequest(String),
    ValidationFailed(Vec<ValidationError>),
    InvalidFieldValue { field: String, value: String, reason: String },

    // Lookup errors - terminal for the operation that raised them
    TripNotFound(String),
    DeliveryNotFound(String),
    UserNotFound(String),
    DriverNotFound(String),
    VehicleNotFound(String),

    // Conflict errors - a compare-and-set lost the race
    DriverNotAvailable(String),
    TripAlreadyAccepted(String),

    // External service errors - transient from the scheduler's perspective
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),
    OracleUnavailable(String),
    PushDelivery(String),
    InvalidPushToken(String),

    // Serialization and parsing errors
    JsonParsing(String),
    JsonSerialization(String),
    InvalidFormat(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            DispatchError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            DispatchError::InvalidFieldValue { field, value, reason } => {
                write!(f, "Invalid value '{}' for field '{}': {}", value, field, reason)
            }

            DispatchError::TripNotFound(id) => write!(f, "Trip not found: {}", id),
            DispatchError::DeliveryNotFound(id) => write!(f, "Delivery not found: {}", id),
            DispatchError::UserNotFound(id) => write!(f, "User not found: {}", id),
            DispatchError::DriverNotFound(id) => write!(f, "Driver not found: {}", id),
            DispatchError::VehicleNotFound(id) => {
                write!(f, "No registered vehicle for driver: {}", id)
            }

            DispatchError::DriverNotAvailable(id) => {
                write!(f, "Driver is no longer available: {}", id)
            }
            DispatchError::TripAlreadyAccepted(id) => {
                write!(f, "Trip is already accepted: {}", id)
            }

            DispatchError::NetworkTimeout => write!(f, "Network request timed out"),
            DispatchError::NetworkConnection(msg) => {
                write!(f, "Network connection error: {}", msg)
            }
            DispatchError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),
            DispatchError::OracleUnavailable(msg) => {
                write!(f, "Distance provider unavailable: {}", msg)
            }
            DispatchError::PushDelivery(msg) => write!(f, "Push delivery error: {}", msg),
            DispatchError::InvalidPushToken(msg) => write!(f, "Invalid push token: {}", msg),

            DispatchError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),
            DispatchError::JsonSerialization(msg) => {
                write!(f, "JSON serialization error: {}", msg)
            }
            DispatchError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

// Convenience type alias for Results
pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// Whether the retry scheduler should treat this as a failed attempt
    /// rather than a terminal outcome.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchError::NetworkTimeout
                | DispatchError::NetworkConnection(_)
                | DispatchError::HttpClient(_)
                | DispatchError::OracleUnavailable(_)
                | DispatchError::PushDelivery(_)
        )
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        DispatchError::BadRequest(msg.into())
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn trip_not_found(trip_id: impl Into<String>) -> Self {
        DispatchError::TripNotFound(trip_id.into())
    }

    pub fn delivery_not_found(delivery_id: impl Into<String>) -> Self {
        DispatchError::DeliveryNotFound(delivery_id.into())
    }

    pub fn user_not_found(user_id: impl Into<String>) -> Self {
        DispatchError::UserNotFound(user_id.into())
    }

    pub fn driver_not_found(driver_id: impl Into<String>) -> Self {
        DispatchError::DriverNotFound(driver_id.into())
    }
}

// Conversion implementations for common error types
impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DispatchError::NetworkTimeout
        } else if err.is_connect() {
            DispatchError::NetworkConnection(err.to_string())
        } else {
            DispatchError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() {
            DispatchError::JsonParsing(err.to_string())
        } else {
            DispatchError::JsonSerialization(err.to_string())
        }
    }
}

impl From<uuid::Error> for DispatchError {
    fn from(err: uuid::Error) -> Self {
        DispatchError::InvalidFormat(format!("Invalid UUID: {}", err))
    }
}

impl From<chrono::ParseError> for DispatchError {
    fn from(err: chrono::ParseError) -> Self {
        DispatchError::InvalidFormat(format!("Invalid date/time format: {}", err))
    }
}
