//! Weather forecast windows
//!
//! Hourly provider samples are bucketed into fixed 12-hour windows anchored at
//! local midnight of the resort's timezone, then reduced per window: snow and
//! rain are summed, temperature keeps its min and max, wind keeps its max.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::Coordinates;
use crate::resorts::Resort;
use crate::{Result, SnowtripError};

pub mod open_meteo;

/// Width of every forecast window
pub const WINDOW_HOURS: i64 = 12;

/// Number of days covered by a resort forecast
pub const DEFAULT_HORIZON_DAYS: u32 = 7;

/// Source of hourly forecast samples
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Label reported alongside forecasts, e.g. "Open-Meteo"
    fn name(&self) -> &'static str;

    /// Hourly temperature (°F), snowfall (in), rain (in) and wind speed (mph)
    async fn hourly_forecast(&self, coordinates: Coordinates, days: u32) -> Result<HourlySeries>;
}

/// Parallel hourly series as delivered by a weather provider.
///
/// Index `i` of every value series describes the hour at `timestamps[i]`.
/// `None` marks a sample the provider did not report.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries {
    timestamps: Vec<DateTime<Utc>>,
    temperature: Vec<Option<f64>>,
    snowfall: Vec<Option<f64>>,
    rain: Vec<Option<f64>>,
    wind_speed: Vec<Option<f64>>,
}

impl HourlySeries {
    /// Build a series, rejecting value series whose length differs from the
    /// timestamp series.
    pub fn try_new(
        timestamps: Vec<DateTime<Utc>>,
        temperature: Vec<Option<f64>>,
        snowfall: Vec<Option<f64>>,
        rain: Vec<Option<f64>>,
        wind_speed: Vec<Option<f64>>,
    ) -> Result<Self> {
        let expected = timestamps.len();
        let lengths = [
            ("temperature", temperature.len()),
            ("snowfall", snowfall.len()),
            ("rain", rain.len()),
            ("wind_speed", wind_speed.len()),
        ];
        if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != expected) {
            return Err(SnowtripError::api(format!(
                "Hourly series '{name}' has {len} samples, expected {expected}"
            )));
        }

        Ok(Self {
            timestamps,
            temperature,
            snowfall,
            rain,
            wind_speed,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn indices_within(&self, window: &TimeWindow) -> impl Iterator<Item = usize> + '_ {
        let start = window.start.with_timezone(&Utc);
        let end = window.end.with_timezone(&Utc);
        self.timestamps
            .iter()
            .enumerate()
            .filter(move |(_, t)| **t >= start && **t < end)
            .map(|(i, _)| i)
    }
}

/// Half-open interval `[start, end)` in the resort's timezone
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Reduced weather for one window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastWindow {
    pub window_start: DateTime<FixedOffset>,
    pub window_end: DateTime<FixedOffset>,
    /// Snowfall total in inches, one decimal
    pub snow_sum: f64,
    /// Rain total in inches, one decimal
    pub rain_sum: f64,
    /// °F
    pub temp_min: i32,
    /// °F
    pub temp_max: i32,
    /// mph
    pub wind_max: i32,
}

/// Running sum/min/max over the samples of one series inside a window
#[derive(Debug, Default)]
struct Reduction {
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Reduction {
    fn over(values: &[Option<f64>], indices: &[usize]) -> Self {
        let mut reduction = Self::default();
        for value in indices.iter().filter_map(|&i| values.get(i).copied().flatten()) {
            reduction.sum += value;
            reduction.min = Some(reduction.min.map_or(value, |m| m.min(value)));
            reduction.max = Some(reduction.max.map_or(value, |m| m.max(value)));
        }
        reduction
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round_whole(value: Option<f64>) -> i32 {
    value.map_or(0, |v| v.round() as i32)
}

/// Local midnight of `now`'s calendar day in `tz`.
///
/// Some zones switch to DST at midnight, in which case the day starts at the
/// first local time that exists.
fn start_of_day(tz: Tz, now: DateTime<Utc>) -> DateTime<Tz> {
    let midnight = now
        .with_timezone(&tz)
        .date_naive()
        .and_time(NaiveTime::MIN);

    (0..=96)
        .map(|step| midnight + TimeDelta::minutes(15 * step))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .unwrap_or_else(|| now.with_timezone(&tz))
}

/// Generate `2 * horizon_days` contiguous 12-hour windows starting at local
/// midnight of `now` in `tz`.
#[must_use]
pub fn generate_windows(tz: Tz, now: DateTime<Utc>, horizon_days: u32) -> Vec<TimeWindow> {
    let day_zero = start_of_day(tz, now);
    let half_day = TimeDelta::hours(WINDOW_HOURS);

    (0..i64::from(horizon_days))
        .flat_map(|day| {
            let am = day_zero + TimeDelta::hours(24 * day);
            let pm = am + half_day;
            [
                TimeWindow { start: am, end: pm },
                TimeWindow {
                    start: pm,
                    end: pm + half_day,
                },
            ]
        })
        .collect()
}

/// Bucket `series` into the windows of [`generate_windows`] and reduce each
/// bucket. Windows without samples report zeros.
#[must_use]
pub fn aggregate(
    series: &HourlySeries,
    tz: Tz,
    now: DateTime<Utc>,
    horizon_days: u32,
) -> Vec<ForecastWindow> {
    generate_windows(tz, now, horizon_days)
        .iter()
        .map(|window| {
            let indices: Vec<usize> = series.indices_within(window).collect();
            let snow = Reduction::over(&series.snowfall, &indices);
            let rain = Reduction::over(&series.rain, &indices);
            let temperature = Reduction::over(&series.temperature, &indices);
            let wind = Reduction::over(&series.wind_speed, &indices);

            ForecastWindow {
                window_start: window.start.fixed_offset(),
                window_end: window.end.fixed_offset(),
                snow_sum: round_tenth(snow.sum),
                rain_sum: round_tenth(rain.sum),
                temp_min: round_whole(temperature.min),
                temp_max: round_whole(temperature.max),
                wind_max: round_whole(wind.max),
            }
        })
        .collect()
}

/// Forecast payload for one resort
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResortForecast {
    pub resort_id: String,
    pub resort_name: String,
    pub forecast: Vec<ForecastWindow>,
    pub fetched_at: DateTime<Utc>,
    pub source: String,
}

/// Fetch hourly samples for `resort` and reduce them into forecast windows.
pub async fn forecast_for_resort(
    provider: &dyn WeatherProvider,
    resort: &Resort,
    horizon_days: u32,
) -> Result<ResortForecast> {
    let tz: Tz = resort.tz.parse().map_err(|_| {
        SnowtripError::config(format!(
            "Unknown timezone '{}' for resort {}",
            resort.tz, resort.id
        ))
    })?;

    let series = provider
        .hourly_forecast(resort.coordinates(), horizon_days)
        .await?;
    debug!("Received {} hourly samples for {}", series.len(), resort.id);

    let now = Utc::now();
    let forecast = aggregate(&series, tz, now, horizon_days);
    info!(
        "Built {} forecast windows for {} ({})",
        forecast.len(),
        resort.name,
        resort.tz
    );

    Ok(ResortForecast {
        resort_id: resort.id.to_string(),
        resort_name: resort.name.to_string(),
        forecast,
        fetched_at: now,
        source: provider.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resorts::ResortDirectory;
    use rstest::rstest;

    fn denver() -> Tz {
        "America/Denver".parse().unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    /// Samples given as (instant, temperature, snowfall, rain, wind)
    type Sample = (DateTime<Utc>, Option<f64>, Option<f64>, Option<f64>, Option<f64>);

    fn series(samples: &[Sample]) -> HourlySeries {
        HourlySeries::try_new(
            samples.iter().map(|s| s.0).collect(),
            samples.iter().map(|s| s.1).collect(),
            samples.iter().map(|s| s.2).collect(),
            samples.iter().map(|s| s.3).collect(),
            samples.iter().map(|s| s.4).collect(),
        )
        .unwrap()
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(7)]
    fn test_windows_tile_the_horizon(#[case] days: u32) {
        let now = utc("2026-01-15T18:30:00Z");
        let windows = generate_windows(denver(), now, days);

        assert_eq!(windows.len(), 2 * days as usize);
        let day_zero = utc("2026-01-15T07:00:00Z");
        assert_eq!(windows[0].start, day_zero);
        assert_eq!(
            windows.last().unwrap().end,
            day_zero + TimeDelta::hours(24 * i64::from(days))
        );
        for window in &windows {
            assert_eq!(window.end - window.start, TimeDelta::hours(12));
        }
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_day_zero_uses_local_calendar_day() {
        // 03:00 UTC on the 15th is still the evening of the 14th in Denver.
        let now = utc("2026-01-15T03:00:00Z");
        let windows = generate_windows(denver(), now, 1);
        assert_eq!(windows[0].start, utc("2026-01-14T07:00:00Z"));
        assert_eq!(windows[0].start.to_rfc3339(), "2026-01-14T00:00:00-07:00");
    }

    #[test]
    fn test_windows_across_dst_change_stay_twelve_hours() {
        // US DST starts 2026-03-08 at 02:00 local.
        let now = utc("2026-03-07T20:00:00Z");
        let windows = generate_windows(denver(), now, 3);
        for window in &windows {
            assert_eq!(window.end - window.start, TimeDelta::hours(12));
        }
        assert_eq!(windows[2].start.to_rfc3339(), "2026-03-08T00:00:00-07:00");
        assert_eq!(windows[4].start.to_rfc3339(), "2026-03-09T01:00:00-06:00");
    }

    #[test]
    fn test_day_starting_in_dst_gap() {
        // Havana moves clocks from 00:00 to 01:00 on 2026-03-08.
        let havana: Tz = "America/Havana".parse().unwrap();
        let now = utc("2026-03-08T12:00:00Z");
        let windows = generate_windows(havana, now, 1);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].end - windows[0].start, TimeDelta::hours(12));
    }

    #[test]
    fn test_empty_window_reports_zeros() {
        let now = utc("2026-01-15T18:00:00Z");
        let result = aggregate(&series(&[]), denver(), now, 2);
        assert_eq!(result.len(), 4);
        for window in result {
            assert_eq!(window.snow_sum, 0.0);
            assert_eq!(window.rain_sum, 0.0);
            assert_eq!(window.temp_min, 0);
            assert_eq!(window.temp_max, 0);
            assert_eq!(window.wind_max, 0);
        }
    }

    #[test]
    fn test_snow_sum() {
        let now = utc("2026-01-15T18:00:00Z");
        let start = utc("2026-01-15T07:00:00Z");
        let samples = [1.0, 0.5, 0.0]
            .iter()
            .enumerate()
            .map(|(i, snow)| {
                (
                    start + TimeDelta::hours(i as i64),
                    Some(20.0),
                    Some(*snow),
                    Some(0.0),
                    Some(5.0),
                )
            })
            .collect::<Vec<_>>();

        let result = aggregate(&series(&samples), denver(), now, 1);
        assert_eq!(result[0].snow_sum, 1.5);
        assert_eq!(result[1].snow_sum, 0.0);
    }

    #[test]
    fn test_boundary_sample_belongs_to_next_window() {
        let now = utc("2026-01-15T18:00:00Z");
        let noon = utc("2026-01-15T19:00:00Z");
        let result = aggregate(
            &series(&[(noon, Some(30.0), Some(2.0), Some(0.1), Some(12.0))]),
            denver(),
            now,
            1,
        );

        assert_eq!(result[0].snow_sum, 0.0);
        assert_eq!(result[0].temp_max, 0);
        assert_eq!(result[1].snow_sum, 2.0);
        assert_eq!(result[1].rain_sum, 0.1);
        assert_eq!(result[1].temp_min, 30);
        assert_eq!(result[1].wind_max, 12);
    }

    #[test]
    fn test_min_max_and_rounding() {
        let now = utc("2026-01-15T18:00:00Z");
        let start = utc("2026-01-15T07:00:00Z");
        let result = aggregate(
            &series(&[
                (start, Some(-2.4), Some(0.25), Some(0.04), Some(10.6)),
                (start + TimeDelta::hours(1), Some(0.0), Some(0.01), Some(0.04), Some(18.4)),
                (start + TimeDelta::hours(2), Some(14.6), Some(0.0), None, Some(3.0)),
            ]),
            denver(),
            now,
            1,
        );

        let am = &result[0];
        assert_eq!(am.temp_min, -2);
        assert_eq!(am.temp_max, 15);
        assert_eq!(am.wind_max, 18);
        assert_eq!(am.snow_sum, 0.3);
        assert_eq!(am.rain_sum, 0.1);
    }

    #[test]
    fn test_null_samples_are_ignored() {
        let now = utc("2026-01-15T18:00:00Z");
        let start = utc("2026-01-15T07:00:00Z");
        let result = aggregate(
            &series(&[
                (start, None, None, None, None),
                (start + TimeDelta::hours(1), Some(25.0), None, Some(0.2), None),
            ]),
            denver(),
            now,
            1,
        );

        assert_eq!(result[0].temp_min, 25);
        assert_eq!(result[0].temp_max, 25);
        assert_eq!(result[0].snow_sum, 0.0);
        assert_eq!(result[0].rain_sum, 0.2);
        assert_eq!(result[0].wind_max, 0);
    }

    #[test]
    fn test_series_length_mismatch_is_rejected() {
        let result = HourlySeries::try_new(
            vec![utc("2026-01-15T07:00:00Z")],
            vec![Some(1.0)],
            vec![],
            vec![Some(0.0)],
            vec![Some(0.0)],
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("snowfall"));
    }

    #[test]
    fn test_window_serialization() {
        let now = utc("2026-01-15T18:00:00Z");
        let result = aggregate(&series(&[]), denver(), now, 1);
        let json = serde_json::to_value(&result[0]).unwrap();
        assert_eq!(json["windowStart"], "2026-01-15T00:00:00-07:00");
        assert_eq!(json["windowEnd"], "2026-01-15T12:00:00-07:00");
        assert_eq!(json["tempMin"], 0);
        assert!(json.get("snowSum").is_some());
    }

    struct FixedProvider {
        series: HourlySeries,
    }

    #[async_trait]
    impl WeatherProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "Fixed"
        }

        async fn hourly_forecast(&self, _: Coordinates, _: u32) -> Result<HourlySeries> {
            Ok(self.series.clone())
        }
    }

    #[tokio::test]
    async fn test_forecast_for_resort() {
        let provider = FixedProvider {
            series: series(&[]),
        };
        let resort = ResortDirectory::builtin().by_id("stratton").unwrap();

        let forecast = forecast_for_resort(&provider, resort, DEFAULT_HORIZON_DAYS)
            .await
            .unwrap();

        assert_eq!(forecast.resort_id, "stratton");
        assert_eq!(forecast.resort_name, "Stratton Mountain");
        assert_eq!(forecast.source, "Fixed");
        assert_eq!(forecast.forecast.len(), 14);
    }
}
