//! Open-Meteo forecast client
//!
//! Requests hourly temperature, snowfall, rain and wind speed with units
//! converted by the provider (°F, inches, mph) and timestamps as unix seconds.
//! Raw responses are cached for up to the configured TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngExt;
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{HourlySeries, WeatherProvider};
use crate::cache::PersistentCache;
use crate::config::WeatherConfig;
use crate::models::Coordinates;
use crate::{Result, SnowtripError};

pub const SOURCE_NAME: &str = "Open-Meteo";

const HOURLY_FIELDS: &str = "temperature_2m,snowfall,rain,windspeed_10m";

/// Forecast response from the `/forecast` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: String,
    pub hourly: HourlyData,
}

/// Hourly series; entries are `null` where the model has no value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyData {
    /// Unix timestamps (seconds)
    pub time: Vec<i64>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub snowfall: Vec<Option<f64>>,
    #[serde(default)]
    pub rain: Vec<Option<f64>>,
    #[serde(default, alias = "wind_speed_10m")]
    pub windspeed_10m: Vec<Option<f64>>,
}

impl TryFrom<ForecastResponse> for HourlySeries {
    type Error = SnowtripError;

    fn try_from(response: ForecastResponse) -> Result<Self> {
        let hourly = response.hourly;
        let timestamps = hourly
            .time
            .iter()
            .map(|&secs| {
                DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
                    SnowtripError::api(format!("Invalid timestamp in Open-Meteo response: {secs}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        HourlySeries::try_new(
            timestamps,
            hourly.temperature_2m,
            hourly.snowfall,
            hourly.rain,
            hourly.windspeed_10m,
        )
    }
}

/// Open-Meteo API client
pub struct OpenMeteoClient {
    http: ClientWithMiddleware,
    base_url: String,
    cache: Option<Arc<PersistentCache>>,
    cache_ttl: Duration,
}

impl OpenMeteoClient {
    /// Create a client; transient failures are retried `config.max_retries`
    /// times with exponential backoff.
    pub fn new(
        config: &WeatherConfig,
        cache: Option<Arc<PersistentCache>>,
        cache_ttl: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("snowtrip/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache,
            cache_ttl,
        })
    }

    fn forecast_url(&self, coordinates: Coordinates, days: u32) -> Result<Url> {
        let params = [
            ("latitude", coordinates.latitude.to_string()),
            ("longitude", coordinates.longitude.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", days.to_string()),
            ("temperature_unit", "fahrenheit".to_string()),
            ("windspeed_unit", "mph".to_string()),
            ("precipitation_unit", "inch".to_string()),
            ("timeformat", "unixtime".to_string()),
        ];
        Url::parse_with_params(&format!("{}/forecast", self.base_url), &params)
            .map_err(|e| SnowtripError::config(format!("Invalid weather base URL: {e}")))
    }

    async fn fetch(&self, coordinates: Coordinates, days: u32) -> Result<ForecastResponse> {
        let url = self.forecast_url(coordinates, days)?;
        debug!("Open-Meteo request URL: {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SnowtripError::api(format!("Open-Meteo request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SnowtripError::api(format!("Open-Meteo API error: {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| SnowtripError::api(format!("Failed to parse Open-Meteo response: {e}")))
    }

    async fn cached(&self, key: &str) -> Option<ForecastResponse> {
        let cache = self.cache.as_ref()?;
        match cache.get::<ForecastResponse>(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Ignoring unreadable forecast cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn store(&self, key: &str, response: &ForecastResponse) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        // Spread expiries so resorts fetched together do not all refresh at once.
        let jitter: f64 = rand::rng().random_range(0.9..1.0);
        if let Err(e) = cache
            .put(key, response.clone(), self.cache_ttl.mul_f64(jitter))
            .await
        {
            warn!("Failed to cache forecast {}: {}", key, e);
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    #[instrument(skip(self))]
    async fn hourly_forecast(&self, coordinates: Coordinates, days: u32) -> Result<HourlySeries> {
        let key = coordinates.cache_key(&format!("forecast-{days}d"));

        let response = match self.cached(&key).await {
            Some(response) => {
                debug!("Forecast cache hit for {}", key);
                response
            }
            None => {
                let response = self.fetch(coordinates, days).await?;
                self.store(&key, &response).await;
                response
            }
        };

        HourlySeries::try_from(response)
    }
}
