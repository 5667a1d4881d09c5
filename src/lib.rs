//! `snowtrip` - Ski resort snow forecasts and traffic-aware drive times
//!
//! This library provides the forecast window aggregation, drive-time
//! sequencing and the HTTP API serving both.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod favorites;
pub mod models;
pub mod resorts;
pub mod routing;
pub mod telemetry;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use api::AppState;
pub use cache::PersistentCache;
pub use config::SnowtripConfig;
pub use error::SnowtripError;
pub use models::Coordinates;
pub use resorts::{Resort, ResortDirectory};
pub use routing::{DriveTimeSequencer, RouteResult, RoutingError, RoutingProvider};
pub use weather::{ForecastWindow, HourlySeries, WeatherProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, SnowtripError>;
