// src/services/geo_service.rs
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing;

use crate::{
    errors::{DispatchError as AppError, DispatchResult},
    models::trip::Coordinates,
};

/// Outcome of one candidate's distance lookup. A candidate can fail
/// individually (no route, provider element error) without failing the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceResult {
    Meters(u32),
    Unavailable,
}

/// Wraps the external driving-distance provider: one origin, many candidate
/// destinations, one travel distance (or failure) per candidate.
#[async_trait]
pub trait DistanceOracle: Send + Sync {
    async fn driving_distances(
        &self,
        origin: Coordinates,
        destinations: &[Coordinates],
    ) -> DispatchResult<Vec<DistanceResult>>;
}

#[derive(Debug, Clone)]
pub struct DistanceMatrixConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl DistanceMatrixConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://maps.googleapis.com/maps/api/distancematrix/json".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Google Distance Matrix client. All candidates go out in a single request;
/// a bounded timeout keeps a slow provider from stalling the caller.
pub struct GoogleDistanceOracle {
    config: DistanceMatrixConfig,
    client: reqwest::Client,
}

impl GoogleDistanceOracle {
    pub fn new(config: DistanceMatrixConfig) -> DispatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,
    rows: Vec<DistanceMatrixRow>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixRow {
    elements: Vec<DistanceMatrixElement>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixElement {
    status: String,
    distance: Option<DistanceValue>,
}

#[derive(Debug, Deserialize)]
struct DistanceValue {
    value: u32,
}

#[async_trait]
impl DistanceOracle for GoogleDistanceOracle {
    async fn driving_distances(
        &self,
        origin: Coordinates,
        destinations: &[Coordinates],
    ) -> DispatchResult<Vec<DistanceResult>> {
        if destinations.is_empty() {
            return Ok(Vec::new());
        }

        let destination_param = destinations
            .iter()
            .map(Coordinates::to_query_pair)
            .collect::<Vec<_>>()
            .join("|");

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("origins", origin.to_query_pair()),
                ("destinations", destination_param),
                ("mode", "driving".to_string()),
                ("key", self.config.api_key.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::OracleUnavailable(format!(
                "distance matrix returned HTTP {}",
                status
            )));
        }

        let body: DistanceMatrixResponse = response.json().await?;
        if body.status != "OK" {
            return Err(AppError::OracleUnavailable(format!(
                "distance matrix status {}",
                body.status
            )));
        }

        let row = body
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::OracleUnavailable("empty distance matrix rows".to_string()))?;

        if row.elements.len() != destinations.len() {
            return Err(AppError::OracleUnavailable(format!(
                "expected {} elements, got {}",
                destinations.len(),
                row.elements.len()
            )));
        }

        let results = row
            .elements
            .into_iter()
            .map(|element| match (element.status.as_str(), element.distance) {
                ("OK", Some(distance)) => DistanceResult::Meters(distance.value),
                (status, _) => {
                    tracing::debug!("Distance element skipped with status: {}", status);
                    DistanceResult::Unavailable
                }
            })
            .collect();

        Ok(results)
    }
}

/// Straight-line fallback used when no distance provider is configured.
/// Haversine is a rough stand-in for driving distance, good enough for the
/// dev harness.
#[derive(Debug, Default)]
pub struct HaversineDistanceOracle;

impl HaversineDistanceOracle {
    fn distance_meters(from: Coordinates, to: Coordinates) -> u32 {
        let earth_radius_km = 6371.0;
        let lat1_rad = from.latitude.to_radians();
        let lat2_rad = to.latitude.to_radians();
        let delta_lat = (to.latitude - from.latitude).to_radians();
        let delta_lon = (to.longitude - from.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        (earth_radius_km * c * 1000.0).round() as u32
    }
}

#[async_trait]
impl DistanceOracle for HaversineDistanceOracle {
    async fn driving_distances(
        &self,
        origin: Coordinates,
        destinations: &[Coordinates],
    ) -> DispatchResult<Vec<DistanceResult>> {
        Ok(destinations
            .iter()
            .map(|destination| {
                DistanceResult::Meters(Self::distance_meters(origin, *destination))
            })
            .collect())
    }
}

/// Test double with canned per-destination distances and a call counter.
#[cfg(test)]
#[derive(Default)]
pub struct StubDistanceOracle {
    pub distances: std::sync::Mutex<Vec<(Coordinates, DistanceResult)>>,
    pub calls: std::sync::atomic::AtomicUsize,
    pub fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl StubDistanceOracle {
    pub fn with_distances(pairs: Vec<(Coordinates, DistanceResult)>) -> Self {
        Self {
            distances: std::sync::Mutex::new(pairs),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl DistanceOracle for StubDistanceOracle {
    async fn driving_distances(
        &self,
        _origin: Coordinates,
        destinations: &[Coordinates],
    ) -> DispatchResult<Vec<DistanceResult>> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::OracleUnavailable("stubbed outage".to_string()));
        }
        let known = self.distances.lock().unwrap();
        Ok(destinations
            .iter()
            .map(|destination| {
                known
                    .iter()
                    .find(|(coords, _)| coords == destination)
                    .map(|(_, result)| *result)
                    .unwrap_or(DistanceResult::Unavailable)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_parsing_tolerates_missing_distance() {
        let body = r#"{
            "status": "OK",
            "rows": [{
                "elements": [
                    {"status": "OK", "distance": {"value": 500, "text": "0.5 km"}},
                    {"status": "ZERO_RESULTS"}
                ]
            }]
        }"#;

        let parsed: DistanceMatrixResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.rows[0].elements.len(), 2);
        assert_eq!(parsed.rows[0].elements[0].distance.as_ref().unwrap().value, 500);
        assert!(parsed.rows[0].elements[1].distance.is_none());
    }
}
