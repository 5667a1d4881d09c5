//! Configuration management for the snowtrip service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::SnowtripError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable consulted when no routing key is configured
pub const GOOGLE_MAPS_API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowtripConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Weather provider settings
    pub weather: WeatherConfig,
    /// Routing provider settings
    pub routing: RoutingConfig,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    pub port: u16,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u32,
    /// PEM certificate; HTTPS is served when both cert and key are set
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Base URL for the Open-Meteo API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    pub max_retries: u32,
    /// Forecast horizon in days
    pub forecast_days: u32,
}

/// Routing API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Google Maps API key
    pub api_key: Option<String>,
    /// Base URL for the Routes API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
    /// Maximum departures accepted in one drive-time request
    pub max_departures: usize,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the on-disk cache; favorites are kept in memory otherwise
    pub enabled: bool,
    /// Cache directory location
    pub location: String,
    /// Lifetime of cached forecast responses in minutes
    pub forecast_ttl_minutes: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
    /// OTLP/HTTP collector endpoint for span export
    pub otlp_endpoint: Option<String>,
}

// Default value functions
fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u32 {
    60
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_weather_timeout() -> u32 {
    30
}

fn default_weather_max_retries() -> u32 {
    3
}

fn default_forecast_days() -> u32 {
    7
}

fn default_routing_base_url() -> String {
    "https://routes.googleapis.com".to_string()
}

fn default_routing_timeout() -> u32 {
    30
}

fn default_max_departures() -> usize {
    10
}

fn default_cache_location() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("snowtrip").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".cache/snowtrip".to_string())
}

fn default_forecast_ttl() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_base_url(),
            timeout_seconds: default_weather_timeout(),
            max_retries: default_weather_max_retries(),
            forecast_days: default_forecast_days(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_routing_base_url(),
            timeout_seconds: default_routing_timeout(),
            max_departures: default_max_departures(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            location: default_cache_location(),
            forecast_ttl_minutes: default_forecast_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl SnowtripConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // SNOWTRIP_ROUTING__API_KEY -> routing.api_key
        builder = builder.add_source(
            Environment::with_prefix("SNOWTRIP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: SnowtripConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        if config.routing.api_key.is_none() {
            config.routing.api_key = std::env::var(GOOGLE_MAPS_API_KEY_ENV).ok();
        }

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("snowtrip").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.bind.is_empty() {
            self.server.bind = default_bind();
        }
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.weather.forecast_days == 0 {
            self.weather.forecast_days = default_forecast_days();
        }
        if self.routing.base_url.is_empty() {
            self.routing.base_url = default_routing_base_url();
        }
        if self.routing.timeout_seconds == 0 {
            self.routing.timeout_seconds = default_routing_timeout();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        if let Some(api_key) = &self.routing.api_key
            && api_key.trim().is_empty()
        {
            return Err(SnowtripError::config(
                "Routing API key cannot be empty if provided. Either remove it or provide a valid key.",
            )
            .into());
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds > 300 {
            return Err(SnowtripError::config("Weather API timeout cannot exceed 300 seconds").into());
        }

        if self.routing.timeout_seconds > 300 {
            return Err(SnowtripError::config("Routing API timeout cannot exceed 300 seconds").into());
        }

        if self.server.request_timeout_seconds == 0 || self.server.request_timeout_seconds > 300 {
            return Err(
                SnowtripError::config("Request timeout must be between 1 and 300 seconds").into(),
            );
        }

        if self.weather.max_retries > 10 {
            return Err(SnowtripError::config("Weather API max retries cannot exceed 10").into());
        }

        if !(1..=16).contains(&self.weather.forecast_days) {
            return Err(SnowtripError::config("Forecast days must be between 1 and 16").into());
        }

        if !(1..=25).contains(&self.routing.max_departures) {
            return Err(
                SnowtripError::config("Maximum departures must be between 1 and 25").into(),
            );
        }

        if self.cache.forecast_ttl_minutes > 60 {
            return Err(
                SnowtripError::config("Forecast cache TTL cannot exceed 60 minutes").into(),
            );
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(SnowtripError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(SnowtripError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather API", &self.weather.base_url),
            ("Routing API", &self.routing.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SnowtripError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if self.server.tls_cert.is_some() != self.server.tls_key.is_some() {
            return Err(SnowtripError::config(
                "TLS requires both server.tls_cert and server.tls_key",
            )
            .into());
        }

        Ok(())
    }

    /// Forecast cache lifetime
    #[must_use]
    pub fn forecast_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.cache.forecast_ttl_minutes) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SnowtripConfig::default();
        assert_eq!(config.weather.base_url, "https://api.open-meteo.com/v1");
        assert_eq!(config.weather.timeout_seconds, 30);
        assert_eq!(config.weather.forecast_days, 7);
        assert_eq!(config.routing.base_url, "https://routes.googleapis.com");
        assert_eq!(config.routing.max_departures, 10);
        assert_eq!(config.cache.forecast_ttl_minutes, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.routing.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_api_key() {
        let mut config = SnowtripConfig::default();
        config.routing.api_key = Some("  ".to_string());
        let result = config.validate_api_keys();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = SnowtripConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = SnowtripConfig::default();
        config.weather.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = SnowtripConfig::default();
        config.cache.forecast_ttl_minutes = 61;
        assert!(config.validate().is_err());

        let mut config = SnowtripConfig::default();
        config.routing.max_departures = 0;
        assert!(config.validate().is_err());

        let mut config = SnowtripConfig::default();
        config.weather.forecast_days = 17;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_partial_tls() {
        let mut config = SnowtripConfig::default();
        config.server.tls_cert = Some(PathBuf::from("cert.pem"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8088

[routing]
api_key = "file-key"
max_departures = 5

[cache]
enabled = false
"#
        )
        .unwrap();

        let config = SnowtripConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.routing.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.routing.max_departures, 5);
        assert!(!config.cache.enabled);
        // untouched sections keep their defaults
        assert_eq!(config.weather.forecast_days, 7);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_forecast_ttl() {
        let mut config = SnowtripConfig::default();
        config.cache.forecast_ttl_minutes = 45;
        assert_eq!(config.forecast_ttl(), std::time::Duration::from_secs(2700));
    }

    #[test]
    fn test_config_path_generation() {
        let path = SnowtripConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("snowtrip"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
