//! Traffic-aware drive times
//!
//! [`DriveTimeSequencer`] issues one routing request per departure instant,
//! strictly one after another, keeps departures at least two minutes in the
//! future and retries a call once when the provider rejects its departure as
//! not being in the future. Any other failure aborts the whole plan.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::models::Coordinates;

pub mod google;

/// Minimum lead time of a departure sent to the provider
pub const MIN_DEPARTURE_BUFFER: TimeDelta = TimeDelta::minutes(2);

/// Lead time used when retrying after a future-time rejection
pub const RETRY_DEPARTURE_BUFFER: TimeDelta = TimeDelta::minutes(5);

/// Marker the provider puts in the error payload for past departure times
const FUTURE_TIME_MARKER: &str = "future time";

/// Errors raised while computing routes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("Routing API error: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No routes found")]
    NoRoute,

    #[error("Invalid duration token: {0:?}")]
    InvalidDuration(String),

    #[error("Invalid routing response: {0}")]
    InvalidResponse(String),
}

impl RoutingError {
    /// Client error whose JSON payload reports a departure time that is not in
    /// the future. A body that is not JSON never qualifies.
    #[must_use]
    pub fn is_future_time_violation(&self) -> bool {
        matches!(self, RoutingError::Rejected { status: 400, body } if payload_mentions_future_time(body))
    }
}

fn payload_mentions_future_time(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .is_ok_and(|payload| payload.to_string().contains(FUTURE_TIME_MARKER))
}

/// One routing call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub departure_time: DateTime<Utc>,
}

impl RouteRequest {
    fn departing_at(self, departure_time: DateTime<Utc>) -> Self {
        Self {
            departure_time,
            ..self
        }
    }
}

/// A route alternative as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAlternative {
    /// Traffic-aware duration token, e.g. `"723s"`
    pub duration: String,
    /// Duration token ignoring traffic
    pub static_duration: String,
    #[serde(default)]
    pub distance_meters: u64,
}

/// Provider response; alternatives are ordered best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutesResponse {
    #[serde(default)]
    pub routes: Vec<RouteAlternative>,
}

/// Result of one leg of a drive-time plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    /// Traffic-aware duration in seconds
    pub duration_seconds: u64,
    pub static_duration_seconds: u64,
    pub distance_meters: u64,
    /// Departure actually sent to the provider
    pub departure_time: DateTime<Utc>,
}

impl RouteResult {
    #[must_use]
    pub fn traffic_delay_seconds(&self) -> u64 {
        self.duration_seconds
            .saturating_sub(self.static_duration_seconds)
    }
}

/// A driving-route backend
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn compute_routes(&self, request: &RouteRequest) -> Result<RoutesResponse, RoutingError>;
}

#[async_trait]
impl<T: RoutingProvider + ?Sized> RoutingProvider for &T {
    async fn compute_routes(&self, request: &RouteRequest) -> Result<RoutesResponse, RoutingError> {
        (**self).compute_routes(request).await
    }
}

#[async_trait]
impl<T: RoutingProvider + ?Sized> RoutingProvider for Arc<T> {
    async fn compute_routes(&self, request: &RouteRequest) -> Result<RoutesResponse, RoutingError> {
        (**self).compute_routes(request).await
    }
}

/// Parse a duration token of the form `"<seconds>s"`, e.g. `"723s"` or
/// `"723.5s"`. Fractional seconds are truncated.
pub fn parse_duration(token: &str) -> Result<u64, RoutingError> {
    let invalid = || RoutingError::InvalidDuration(token.to_string());

    let number = token.strip_suffix('s').ok_or_else(invalid)?;
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid());
    }
    whole.parse().map_err(|_| invalid())
}

/// `requested`, or `now + MIN_DEPARTURE_BUFFER` when `requested` is less than
/// that far ahead.
#[must_use]
pub fn effective_departure(requested: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    requested.max(now + MIN_DEPARTURE_BUFFER)
}

fn extract_result(
    response: RoutesResponse,
    departure_time: DateTime<Utc>,
) -> Result<RouteResult, RoutingError> {
    let route = response.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
    Ok(RouteResult {
        duration_seconds: parse_duration(&route.duration)?,
        static_duration_seconds: parse_duration(&route.static_duration)?,
        distance_meters: route.distance_meters,
        departure_time,
    })
}

/// Plans drive times over a [`RoutingProvider`].
///
/// Calls are issued sequentially to stay within provider rate limits, so the
/// latency of a plan grows linearly with the number of departures.
pub struct DriveTimeSequencer<P> {
    provider: P,
}

impl<P: RoutingProvider> DriveTimeSequencer<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Compute one route per departure instant, in input order.
    ///
    /// Fails fast: the first unrecoverable error is returned and no further
    /// departures are requested.
    #[instrument(skip(self, departures), fields(legs = departures.len()))]
    pub async fn plan_routes(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        departures: &[DateTime<Utc>],
    ) -> Result<Vec<RouteResult>, RoutingError> {
        let mut results = Vec::with_capacity(departures.len());

        for &departure_time in departures {
            let request = RouteRequest {
                origin,
                destination,
                departure_time,
            };
            let result = self.compute_route(request).await?;
            info!(
                "Route departing {}: {}s ({}s traffic delay), {}m",
                result.departure_time,
                result.duration_seconds,
                result.traffic_delay_seconds(),
                result.distance_meters
            );
            results.push(result);
        }

        Ok(results)
    }

    async fn compute_route(&self, request: RouteRequest) -> Result<RouteResult, RoutingError> {
        let departure = effective_departure(request.departure_time, Utc::now());
        if departure != request.departure_time {
            debug!(
                "Departure {} too close to now, using {}",
                request.departure_time, departure
            );
        }

        match self.call(request.departing_at(departure)).await {
            Err(e) if e.is_future_time_violation() => {
                let retry_departure = Utc::now() + RETRY_DEPARTURE_BUFFER;
                warn!(
                    "Provider rejected departure {} as not in the future, retrying with {}",
                    departure, retry_departure
                );
                self.call(request.departing_at(retry_departure)).await
            }
            other => other,
        }
    }

    async fn call(&self, request: RouteRequest) -> Result<RouteResult, RoutingError> {
        let response = self.provider.compute_routes(&request).await?;
        extract_result(response, request.departure_time)
    }
}
