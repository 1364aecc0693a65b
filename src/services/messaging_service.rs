// src/services/messaging_service.rs
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing;

use crate::{
    errors::{DispatchError as AppError, DispatchResult},
    models::{driver::DriverSnapshot, driver::VehicleInfo, trip::TripRequest, user::UserProfile},
};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("FCM send failed: {0}")]
    FcmError(String),

    #[error("Device token not found")]
    NoDeviceToken,

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::FcmError(msg) => AppError::PushDelivery(msg),
            NotificationError::NoDeviceToken => {
                AppError::InvalidPushToken("Device token not found".to_string())
            }
            NotificationError::SerializationError(msg) => AppError::JsonSerialization(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub fcm_server_key: String,
    pub fcm_url: String,
    pub timeout: Duration,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            fcm_server_key: std::env::var("FCM_SERVER_KEY").unwrap_or_else(|_| "".to_string()),
            fcm_url: "https://fcm.googleapis.com/fcm/send".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
    pub priority: NotificationPriority,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPriority {
    Normal,
    High, // Will wake sleeping devices
}

impl Default for NotificationPriority {
    fn default() -> Self {
        Self::High
    }
}

impl NotificationMessage {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            data: None,
            priority: NotificationPriority::default(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Push gateway. Domain events share payload construction through the default
/// methods; implementations only provide the raw token send. A recipient with
/// no registered token is skipped, not an error.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_to_token(&self, token: &str, message: NotificationMessage) -> DispatchResult<()>;

    async fn notify_new_request(
        &self,
        driver: &DriverSnapshot,
        trip: &TripRequest,
        requester_name: &str,
        distance_meters: u32,
    ) -> DispatchResult<()> {
        let Some(token) = driver.push_token.as_deref() else {
            tracing::warn!("Driver {} has no push token, skipping new-request push", driver.driver_id);
            return Ok(());
        };

        let message = NotificationMessage::new(
            "New Delivery Request",
            &format!("{} needs a delivery nearby!", requester_name),
        )
        .with_data(json!({
            "type": "new_request",
            "trip_id": trip.id,
            "requester_name": requester_name,
            "requester_lat": trip.details.origin.latitude.to_string(),
            "requester_lng": trip.details.origin.longitude.to_string(),
            "destination_lat": trip.details.destination.latitude.to_string(),
            "destination_lng": trip.details.destination.longitude.to_string(),
            "distance_meters": distance_meters.to_string(),
            "cost": trip.details.fare.to_string(),
        }));

        self.send_to_token(token, message).await
    }

    async fn notify_driver_found(
        &self,
        client: &UserProfile,
        driver: &UserProfile,
        vehicle: &VehicleInfo,
        delivery_id: &str,
    ) -> DispatchResult<()> {
        let Some(token) = client.push_token.as_deref() else {
            tracing::warn!("Client {} has no push token, skipping driver-found push", client.id);
            return Ok(());
        };

        let message = NotificationMessage::new(
            "Driver Found",
            "A driver has accepted your request!",
        )
        .with_data(json!({
            "type": "driver_found",
            "delivery_id": delivery_id,
            "driver_name": driver.full_name(),
            "vehicle": vehicle.class.to_string(),
            "vehicle_name": vehicle.name,
            "number_plate": vehicle.number_plate,
            "vehicle_model": vehicle.model,
            "color": vehicle.color,
            "rating": driver.rating.to_string(),
            "total_ratings": driver.rating_count.to_string(),
        }));

        self.send_to_token(token, message).await
    }

    async fn notify_no_driver_found(&self, requester: &UserProfile) -> DispatchResult<()> {
        let Some(token) = requester.push_token.as_deref() else {
            tracing::warn!("Requester {} has no push token, skipping no-driver push", requester.id);
            return Ok(());
        };

        // Informational, no need to wake a sleeping device.
        let message = NotificationMessage::new(
            "No Drivers Found",
            "We couldn't find an available driver at the moment. Please try again shortly.",
        )
        .with_data(json!({ "type": "no_driver_found" }))
        .with_priority(NotificationPriority::Normal);

        self.send_to_token(token, message).await
    }

    async fn notify_delivery_cancelled(
        &self,
        driver: &UserProfile,
        client_name: &str,
    ) -> DispatchResult<()> {
        let Some(token) = driver.push_token.as_deref() else {
            tracing::warn!("Driver {} has no push token, skipping cancellation push", driver.id);
            return Ok(());
        };

        let message = NotificationMessage::new(
            "Delivery Cancelled",
            &format!("by {}", client_name),
        )
        .with_data(json!({ "type": "delivery_cancelled" }));

        self.send_to_token(token, message).await
    }
}

pub struct FcmNotificationService {
    config: FcmConfig,
    client: reqwest::Client,
}

impl FcmNotificationService {
    pub fn new(config: FcmConfig) -> DispatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn with_server_key(server_key: String) -> DispatchResult<Self> {
        Self::new(FcmConfig {
            fcm_server_key: server_key,
            ..Default::default()
        })
    }
}

#[async_trait]
impl NotificationService for FcmNotificationService {
    async fn send_to_token(&self, token: &str, message: NotificationMessage) -> DispatchResult<()> {
        if token.is_empty() {
            return Err(NotificationError::NoDeviceToken.into());
        }

        tracing::debug!("Sending FCM notification: {}", message.title);

        let mut fcm_message = json!({
            "to": token,
            "notification": {
                "title": message.title,
                "body": message.body,
                "sound": "default"
            },
            "priority": match message.priority {
                NotificationPriority::High => "high",
                NotificationPriority::Normal => "normal",
            }
        });

        if let Some(data) = message.data {
            fcm_message["data"] = data;
        }

        let response = self
            .client
            .post(&self.config.fcm_url)
            .header("Authorization", format!("key={}", self.config.fcm_server_key))
            .header("Content-Type", "application/json")
            .json(&fcm_message)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("FCM request failed: {}", error_text);
            return Err(NotificationError::FcmError(error_text).into());
        }

        tracing::debug!("FCM notification sent successfully");
        Ok(())
    }
}

// Mock service for development and testing
#[derive(Debug, Default)]
pub struct MockNotificationService;

#[async_trait]
impl NotificationService for MockNotificationService {
    async fn send_to_token(&self, token: &str, message: NotificationMessage) -> DispatchResult<()> {
        tracing::info!(
            "[MOCK] Would send push to {}: {} - {}",
            token,
            message.title,
            message.body
        );
        Ok(())
    }
}

/// Test double that records every push it is asked to deliver.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotificationService {
    pub sent: std::sync::Mutex<Vec<(String, NotificationMessage)>>,
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingNotificationService {
    pub fn sent_types(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, message)| {
                message
                    .data
                    .as_ref()
                    .and_then(|data| data.get("type"))
                    .and_then(|value| value.as_str())
                    .map(str::to_string)
            })
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl NotificationService for RecordingNotificationService {
    async fn send_to_token(&self, token: &str, message: NotificationMessage) -> DispatchResult<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::PushDelivery("simulated send failure".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), message));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::{Coordinates, DeliveryDetails, PaymentMethod, VehicleClass};
    use chrono::Utc;

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

    fn driver_with_token(token: Option<&str>) -> DriverSnapshot {
        DriverSnapshot {
            driver_id: "drv-250825-bbbbb".to_string(),
            name: "Kofi".to_string(),
            surname: "Owusu".to_string(),
            location: Some(Coordinates::new(0.1, 0.1)),
            vehicle: None,
            available: true,
            push_token: token.map(str::to_string),
            rating: 4.5,
            rating_count: 10,
        }
    }

    #[tokio::test]
    async fn new_request_push_carries_trip_payload() {
        let gateway = RecordingNotificationService::default();
        gateway
            .notify_new_request(&driver_with_token(Some("tok-1")), &trip(), "Ama Mensah", 500)
            .await
            .unwrap();

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "tok-1");
        let data = sent[0].1.data.as_ref().unwrap();
        assert_eq!(data["type"], "new_request");
        assert_eq!(data["distance_meters"], "500");
        assert_eq!(data["cost"], "10");
        assert_eq!(data["trip_id"], "trip-250825-abc12");
    }

    #[tokio::test]
    async fn missing_token_is_skipped_not_an_error() {
        let gateway = RecordingNotificationService::default();
        gateway
            .notify_new_request(&driver_with_token(None), &trip(), "Ama Mensah", 500)
            .await
            .unwrap();
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_driver_push_uses_normal_priority() {
        let requester = UserProfile {
            id: "usr-250825-aaaaa".to_string(),
            name: "Ama".to_string(),
            surname: "Mensah".to_string(),
            push_token: Some("tok-1".to_string()),
            rating: 5.0,
            rating_count: 3,
        };
        let gateway = RecordingNotificationService::default();
        gateway.notify_no_driver_found(&requester).await.unwrap();

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.priority, NotificationPriority::Normal);
    }

    #[tokio::test]
    async fn fcm_rejects_an_empty_token_before_sending() {
        let gateway = FcmNotificationService::with_server_key("key".to_string()).unwrap();
        let result = gateway
            .send_to_token("", NotificationMessage::new("Title", "Body"))
            .await;
        assert!(matches!(result, Err(AppError::InvalidPushToken(_))));
    }

    #[test]
    fn gateway_errors_map_into_crate_errors() {
        let error: AppError = NotificationError::FcmError("401 from upstream".to_string()).into();
        assert!(matches!(error, AppError::PushDelivery(_)));
        // Push failures must look transient to the retry loop.
        assert!(error.is_transient());

        let error: AppError = NotificationError::NoDeviceToken.into();
        assert!(matches!(error, AppError::InvalidPushToken(_)));

        let error: AppError =
            NotificationError::SerializationError("bad payload".to_string()).into();
        assert!(matches!(error, AppError::JsonSerialization(_)));
    }
}
