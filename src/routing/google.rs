//! Google Routes API (Directions v2) client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{RouteRequest, RoutesResponse, RoutingError, RoutingProvider};
use crate::config::RoutingConfig;
use crate::models::Coordinates;

const FIELD_MASK: &str = "routes.duration,routes.staticDuration,routes.distanceMeters";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    lat_lng: LatLng,
}

#[derive(Serialize)]
struct Waypoint {
    location: Location,
}

impl From<Coordinates> for Waypoint {
    fn from(coordinates: Coordinates) -> Self {
        Self {
            location: Location {
                lat_lng: LatLng {
                    latitude: coordinates.latitude,
                    longitude: coordinates.longitude,
                },
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComputeRoutesRequest {
    origin: Waypoint,
    destination: Waypoint,
    travel_mode: &'static str,
    routing_preference: &'static str,
    /// RFC 3339, UTC
    departure_time: String,
}

impl From<&RouteRequest> for ComputeRoutesRequest {
    fn from(request: &RouteRequest) -> Self {
        Self {
            origin: request.origin.into(),
            destination: request.destination.into(),
            travel_mode: "DRIVE",
            routing_preference: "TRAFFIC_AWARE_OPTIMAL",
            departure_time: request
                .departure_time
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Client for `directions/v2:computeRoutes`
pub struct GoogleRoutesClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleRoutesClient {
    /// Create a client. A missing API key is reported when a route is
    /// requested, not here.
    pub fn new(config: &RoutingConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("snowtrip/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl RoutingProvider for GoogleRoutesClient {
    #[instrument(skip(self))]
    async fn compute_routes(&self, request: &RouteRequest) -> Result<RoutesResponse, RoutingError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RoutingError::NotConfigured("GOOGLE_MAPS_API_KEY".to_string()))?;

        let url = format!("{}/directions/v2:computeRoutes", self.base_url);
        let body = ComputeRoutesRequest::from(request);
        debug!("Requesting route departing {}", body.departure_time);

        let response = self
            .http
            .post(url)
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| RoutingError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RoutingError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(RoutingError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| RoutingError::InvalidResponse(e.to_string()))
    }
}
