use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    error_handling::HandleErrorLayer,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::{BoxError, ServiceBuilder, timeout::error::Elapsed};
use tracing::{error, info, warn};

use crate::{
    Result, SnowtripError,
    cache::PersistentCache,
    config::SnowtripConfig,
    error::ErrorCategory,
    favorites::{FavoritesStore, InMemoryFavorites, PersistentFavorites},
    models::Coordinates,
    resorts::{Resort, ResortDirectory},
    routing::{DriveTimeSequencer, RouteResult, RoutingProvider, google::GoogleRoutesClient},
    weather::{ResortForecast, WeatherProvider, forecast_for_resort, open_meteo::OpenMeteoClient},
};

const MAX_CLIENT_ID_LEN: usize = 128;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub directory: &'static ResortDirectory,
    pub weather: Arc<dyn WeatherProvider>,
    pub routing: Arc<dyn RoutingProvider>,
    pub favorites: Arc<dyn FavoritesStore>,
    pub forecast_days: u32,
    pub max_departures: usize,
}

impl AppState {
    /// Wire the production providers. Favorites live in the persistent cache
    /// when it is enabled and in memory otherwise.
    pub fn from_config(config: &SnowtripConfig) -> anyhow::Result<Self> {
        let cache = if config.cache.enabled {
            let cache = PersistentCache::open(&config.cache.location)
                .with_context(|| format!("Failed to open cache at {}", config.cache.location))?;
            Some(Arc::new(cache))
        } else {
            None
        };

        let weather = OpenMeteoClient::new(&config.weather, cache.clone(), config.forecast_ttl())?;
        let routing = GoogleRoutesClient::new(&config.routing)?;
        if config.routing.api_key.is_none() {
            warn!("No routing API key configured, drive times are unavailable");
        }
        let favorites: Arc<dyn FavoritesStore> = match cache {
            Some(cache) => Arc::new(PersistentFavorites::new(cache)),
            None => Arc::new(InMemoryFavorites::default()),
        };

        Ok(Self {
            directory: ResortDirectory::builtin(),
            weather: Arc::new(weather),
            routing: Arc::new(routing),
            favorites,
            forecast_days: config.weather.forecast_days,
            max_departures: config.routing.max_departures,
        })
    }
}

impl IntoResponse for SnowtripError {
    fn into_response(self) -> Response {
        let status = match self.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCategory::Upstream => {
                error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.user_message() });
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResortSummary {
    #[serde(flatten)]
    pub resort: &'static Resort,
    pub gradient: &'static str,
    pub icon: &'static str,
}

impl From<&'static Resort> for ResortSummary {
    fn from(resort: &'static Resort) -> Self {
        Self {
            resort,
            gradient: resort.gradient(),
            icon: resort.icon(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveRequest {
    pub origin: Option<Coordinates>,
    pub resort_id: Option<String>,
    pub departure_times: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveResponse {
    pub resort_id: String,
    pub resort_name: String,
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub routes: Vec<RouteResult>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesResponse {
    pub client_id: String,
    pub resort_ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteToggleResponse {
    pub resort_id: String,
    pub favorite: bool,
}

/// API routes. Every route except `POST /drive` is bounded by
/// `request_timeout`; drive planning is only limited per provider call.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let bounded = Router::new()
        .route("/resorts", get(get_resorts))
        .route("/resorts/{slug}", get(get_resort))
        .route("/forecast/{id}", get(get_forecast))
        .route("/favorites/{client_id}", get(get_favorites))
        .route("/favorites/{client_id}/{resort_id}", post(toggle_favorite))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        );

    Router::new()
        .route("/drive", post(plan_drive))
        .merge(bounded)
        .with_state(state)
}

async fn handle_middleware_error(err: BoxError) -> SnowtripError {
    if err.is::<Elapsed>() {
        SnowtripError::timeout("Request timed out")
    } else {
        SnowtripError::general(format!("Unhandled internal error: {err}"))
    }
}

fn resort_not_found() -> SnowtripError {
    SnowtripError::not_found("Resort not found")
}

fn check_client_id(client_id: &str) -> Result<()> {
    if client_id.len() > MAX_CLIENT_ID_LEN {
        return Err(SnowtripError::validation("Invalid client id"));
    }
    Ok(())
}

async fn get_resorts(State(state): State<AppState>) -> Json<Vec<ResortSummary>> {
    Json(state.directory.all().iter().map(ResortSummary::from).collect())
}

async fn get_resort(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ResortSummary>> {
    let resort = state.directory.by_slug(&slug).ok_or_else(resort_not_found)?;
    Ok(Json(resort.into()))
}

async fn get_forecast(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResortForecast>> {
    let resort = state.directory.by_id(&id).ok_or_else(resort_not_found)?;

    let forecast = forecast_for_resort(state.weather.as_ref(), resort, state.forecast_days)
        .await
        .map_err(|e| {
            error!("Forecast for {} failed: {}", resort.id, e);
            SnowtripError::general("Failed to fetch forecast")
        })?;

    Ok(Json(forecast))
}

/// Validate a drive request; nothing here touches the routing provider.
fn parse_drive_request(
    request: DriveRequest,
    max_departures: usize,
) -> Result<(Coordinates, String, Vec<DateTime<Utc>>)> {
    let (Some(origin), Some(resort_id), Some(times)) =
        (request.origin, request.resort_id, request.departure_times)
    else {
        return Err(SnowtripError::validation(
            "Missing required fields: origin, resortId, departureTimes",
        ));
    };
    if times.is_empty() {
        return Err(SnowtripError::validation(
            "Missing required fields: origin, resortId, departureTimes",
        ));
    }
    if times.len() > max_departures {
        return Err(SnowtripError::validation(format!(
            "Maximum {max_departures} departure times allowed"
        )));
    }
    if !origin.is_valid() {
        return Err(SnowtripError::validation("Invalid origin coordinates"));
    }

    let departures = times
        .iter()
        .map(|t| {
            DateTime::parse_from_rfc3339(t)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| SnowtripError::validation(format!("Invalid departure time: {t}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((origin, resort_id, departures))
}

async fn plan_drive(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DriveRequest>, JsonRejection>,
) -> Result<Json<DriveResponse>> {
    let Json(request) = payload
        .map_err(|rejection| SnowtripError::validation(format!("Invalid request body: {rejection}")))?;
    let (origin, resort_id, departures) = parse_drive_request(request, state.max_departures)?;

    let resort = state.directory.by_id(&resort_id).ok_or_else(resort_not_found)?;
    let destination = resort.coordinates();
    info!(
        "Planning {} departures from {} to {}",
        departures.len(),
        origin.format_coordinates(),
        resort.name
    );

    let sequencer = DriveTimeSequencer::new(state.routing.clone());
    let routes = sequencer
        .plan_routes(origin, destination, &departures)
        .await?;

    Ok(Json(DriveResponse {
        resort_id: resort.id.to_string(),
        resort_name: resort.name.to_string(),
        origin,
        destination,
        routes,
        fetched_at: Utc::now(),
    }))
}

async fn get_favorites(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<FavoritesResponse>> {
    check_client_id(&client_id)?;
    let resort_ids = state.favorites.list(&client_id).await?;
    Ok(Json(FavoritesResponse {
        client_id,
        resort_ids,
    }))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path((client_id, resort_id)): Path<(String, String)>,
) -> Result<Json<FavoriteToggleResponse>> {
    check_client_id(&client_id)?;
    let resort = state.directory.by_id(&resort_id).ok_or_else(resort_not_found)?;
    let favorite = state.favorites.toggle(&client_id, resort.id).await?;
    Ok(Json(FavoriteToggleResponse {
        resort_id: resort.id.to_string(),
        favorite,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(times: Option<Vec<&str>>) -> DriveRequest {
        DriveRequest {
            origin: Some(Coordinates::new(40.7608, -111.8910)),
            resort_id: Some("alta".to_string()),
            departure_times: times.map(|t| t.into_iter().map(str::to_string).collect()),
        }
    }

    #[test]
    fn test_parse_drive_request() {
        let (origin, resort_id, departures) = parse_drive_request(
            request(Some(vec!["2026-01-15T07:00:00-07:00", "2026-01-15T15:00:00Z"])),
            10,
        )
        .unwrap();
        assert_eq!(origin, Coordinates::new(40.7608, -111.8910));
        assert_eq!(resort_id, "alta");
        assert_eq!(departures[0].to_rfc3339(), "2026-01-15T14:00:00+00:00");
        assert_eq!(departures[1].to_rfc3339(), "2026-01-15T15:00:00+00:00");
    }

    #[test]
    fn test_missing_fields() {
        for req in [request(None), request(Some(vec![]))] {
            let err = parse_drive_request(req, 10).unwrap_err();
            assert_eq!(
                err.user_message(),
                "Missing required fields: origin, resortId, departureTimes"
            );
        }
    }

    #[test]
    fn test_too_many_departures() {
        let times = vec!["2026-01-15T07:00:00Z"; 11];
        let err = parse_drive_request(request(Some(times)), 10).unwrap_err();
        assert_eq!(err.user_message(), "Maximum 10 departure times allowed");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_unparsable_departure() {
        let err = parse_drive_request(request(Some(vec!["tomorrow morning"])), 10).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn test_state_without_cache_uses_memory_favorites() {
        let mut config = SnowtripConfig::default();
        config.cache.enabled = false;
        config.cache.location = "/nonexistent/never-created".to_string();

        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.max_departures, 10);
        assert_eq!(state.forecast_days, 7);
        assert_eq!(state.weather.name(), "Open-Meteo");
        assert!(state.favorites.toggle("client-a", "alta").await.unwrap());
    }

    #[test]
    fn test_error_status_mapping() {
        let response = SnowtripError::not_found("Resort not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = SnowtripError::validation("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = SnowtripError::timeout("Request timed out").into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let response = SnowtripError::api("upstream").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
