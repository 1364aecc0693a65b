// src/main.rs
use std::time::Duration;

use swift_dispatch::{
    models::{
        driver::VehicleInfo,
        trip::{Coordinates, DeliveryDetails, PaymentMethod, VehicleClass},
        user::UserProfile,
    },
    services::driver_service::DriverRecord,
    services::trip_service,
    state::{AppConfig, AppState},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swift_dispatch=info".into()),
        )
        .init();

    let state = AppState::new(AppConfig::from_env())?;
    seed_demo_data(&state).await;

    // Walk one request through the whole lifecycle.
    let details = DeliveryDetails {
        origin: Coordinates::new(5.6037, -0.1870),
        destination: Coordinates::new(5.6500, -0.2000),
        vehicle: VehicleClass::Van,
        fare: trip_service::quote_fares(6.2)?.van,
        payment_method: PaymentMethod::Cash,
    };
    let trip = state
        .trip_service
        .create_trip("usr-250825-ama01", details)
        .await?;
    tracing::info!("Submitted trip {} at fare {}", trip.id, trip.details.fare);

    // Give the matching loop a moment to push the offer out.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let delivery = state
        .trip_service
        .accept_trip(&trip.id, "drv-250825-kofi1")
        .await?;
    tracing::info!("Driver accepted, delivery {}", delivery.id);

    let ended = state
        .trip_service
        .end_trip(&delivery.id, 5.0, delivery.fare)
        .await?;
    tracing::info!("Delivery {} settled at {}", ended.id, ended.fare);

    let report = state
        .trip_service
        .driver_finances("drv-250825-kofi1")
        .await?;
    tracing::info!(
        "Driver finances today: earnings {:.2}, charges {:.2}, profit {:.2} over {} trips",
        report.today.earnings,
        report.today.charges,
        report.today.profit,
        report.today.total_trips
    );

    Ok(())
}

async fn seed_demo_data(state: &AppState) {
    state
        .users
        .insert(UserProfile {
            id: "usr-250825-ama01".to_string(),
            name: "Ama".to_string(),
            surname: "Mensah".to_string(),
            push_token: None,
            rating: 5.0,
            rating_count: 2,
        })
        .await;
    state
        .users
        .insert(UserProfile {
            id: "drv-250825-kofi1".to_string(),
            name: "Kofi".to_string(),
            surname: "Owusu".to_string(),
            push_token: None,
            rating: 4.5,
            rating_count: 12,
        })
        .await;

    state
        .registry
        .register(DriverRecord {
            driver_id: "drv-250825-kofi1".to_string(),
            name: "Kofi".to_string(),
            surname: "Owusu".to_string(),
            push_token: None,
            vehicle: Some(VehicleInfo {
                id: "veh-250825-van01".to_string(),
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
    state
        .registry
        .register(DriverRecord {
            driver_id: "drv-250825-yaw02".to_string(),
            name: "Yaw".to_string(),
            surname: "Asante".to_string(),
            push_token: None,
            vehicle: Some(VehicleInfo {
                id: "veh-250825-van02".to_string(),
                class: VehicleClass::Van,
                name: "Transit".to_string(),
                number_plate: "GW-5678-25".to_string(),
                model: "2021".to_string(),
                color: "blue".to_string(),
            }),
            available: true,
            rating: 4.0,
            rating_count: 5,
        })
        .await;

    state
        .locations
        .report("drv-250825-kofi1", Coordinates::new(5.6100, -0.1900))
        .await;
    state
        .locations
        .report("drv-250825-yaw02", Coordinates::new(5.7000, -0.2500))
        .await;
}
