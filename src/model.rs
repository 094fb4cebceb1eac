//! Data models for Aircast.
//!
//! The central type is [`Sample`], one timestamped AQI observation at a
//! geographic point. Everything derived from samples — severity bands, trend
//! reports, health statistics — lives here too, so the banding thresholds in
//! [`AqiLevel`] have exactly one implementation shared by the trend analyzer
//! and the stats aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format used by the WAQI provider (`time.s`) and therefore by
/// every stored sample. Samples whose timestamp fails to parse under this
/// format are still kept; the analyzer falls back to raw string ordering.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a reference instant the way samples store their timestamps.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// A single air-quality observation.
///
/// Created on each successful upstream fetch and persisted as-is; immutable
/// once stored. `aqi` is absent when the provider reported no overall index —
/// such samples are excluded from trend computation but still count toward
/// raw record totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Provider-reported observation time, `YYYY-MM-DD HH:MM:SS`, local to
    /// the reporting station.
    pub timestamp: String,

    /// Overall AQI, if the provider reported one.
    pub aqi: Option<i64>,

    /// Latitude of the queried point.
    pub lat: f64,

    /// Longitude of the queried point.
    pub lon: f64,

    /// Human-readable place name (station name or caller-supplied label).
    pub label: String,
}

/// Severity band for an AQI value.
///
/// Thresholds are inclusive upper bounds: <=50 Good, <=100 Moderate,
/// <=150 Unhealthy, <=200 VeryUnhealthy, everything above Hazardous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiLevel {
    Good,
    Moderate,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiLevel {
    /// Band an AQI value. Total over all integers.
    pub fn from_aqi(aqi: i64) -> Self {
        if aqi <= 50 {
            AqiLevel::Good
        } else if aqi <= 100 {
            AqiLevel::Moderate
        } else if aqi <= 150 {
            AqiLevel::Unhealthy
        } else if aqi <= 200 {
            AqiLevel::VeryUnhealthy
        } else {
            AqiLevel::Hazardous
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            AqiLevel::Good => "Good",
            AqiLevel::Moderate => "Moderate",
            AqiLevel::Unhealthy => "Unhealthy",
            AqiLevel::VeryUnhealthy => "Very unhealthy",
            AqiLevel::Hazardous => "Hazardous",
        }
    }
}

/// Direction of the fitted AQI trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Slope above +0.5 AQI per sample.
    Rising,

    /// Slope below -0.5 AQI per sample.
    Falling,

    /// Slope within [-0.5, +0.5].
    Stable,

    /// Not enough usable samples to fit a trend.
    Unknown,
}

/// Outcome of trend analysis over one series of samples.
///
/// Derived per request, never persisted. The optional fields are populated
/// only when the minimum-sample guard passes; a degraded result carries just
/// the direction (`Unknown`), a zero confidence, and the usable-sample count.
#[derive(Debug, Clone, Serialize)]
pub struct TrendResult {
    /// Fitted direction.
    pub trend: Trend,

    /// Heuristic trustworthiness score, always within [0, 100].
    pub confidence: u8,

    /// Human-readable summary. Presentation detail; the numeric fields are
    /// the contract.
    pub narrative: String,

    /// Number of samples with a usable AQI that fed the analysis.
    pub sample_count: usize,

    /// AQI of the chronologically last usable sample.
    pub last_aqi: Option<i64>,

    /// Projected next AQI, within [0, 500].
    pub projected_aqi: Option<i64>,

    /// Severity band of `last_aqi`.
    pub current_level: Option<AqiLevel>,

    /// Least-squares slope of AQI over sample index.
    pub slope: Option<f64>,
}

impl TrendResult {
    /// Degraded result for a series with fewer usable samples than the
    /// analyzer needs.
    pub fn insufficient(sample_count: usize) -> Self {
        Self {
            trend: Trend::Unknown,
            confidence: 0,
            narrative: "Not enough historical data to determine a trend.".to_string(),
            sample_count,
            last_aqi: None,
            projected_aqi: None,
            current_level: None,
            slope: None,
        }
    }
}

/// Response for the forecast endpoints: a [`TrendResult`] merged with the
/// location it describes.
#[derive(Debug, Clone, Serialize)]
pub struct TrendResponse {
    /// Location label the forecast applies to ("General" for the global one).
    pub location: String,

    pub trend: Trend,
    pub confidence: u8,
    pub narrative: String,
    pub sample_count: usize,
    pub last_aqi: Option<i64>,
    pub projected_aqi: Option<i64>,
    pub current_level: Option<AqiLevel>,
    pub slope: Option<f64>,
}

impl TrendResponse {
    /// Attach a location to an analysis result.
    pub fn from_result(result: TrendResult, location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            trend: result.trend,
            confidence: result.confidence,
            narrative: result.narrative,
            sample_count: result.sample_count,
            last_aqi: result.last_aqi,
            projected_aqi: result.projected_aqi,
            current_level: result.current_level,
            slope: result.slope,
        }
    }
}

/// Share of valid records falling into each severity band, each rounded to
/// one decimal. All zero when no valid records exist.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BandPercentages {
    pub good: f64,
    pub moderate: f64,
    pub unhealthy: f64,
    pub very_unhealthy: f64,
    pub hazardous: f64,
}

/// Average AQI for one calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyAverage {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,

    /// Mean AQI of that day's valid samples, rounded to one decimal.
    pub avg_aqi: f64,
}

/// Response for GET /api/stats/health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatsResponse {
    pub percentages_by_band: BandPercentages,

    /// Daily averages over the trailing seven days, ascending by date; days
    /// without samples are omitted.
    pub daily_averages: Vec<DailyAverage>,

    /// Total stored rows, including those without an AQI.
    pub total_records: i64,
}

/// Whole-store aggregate numbers.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateStats {
    /// Total stored rows.
    pub total_records: i64,

    /// Mean AQI over valid rows, one decimal. Absent when nothing is stored.
    pub avg_aqi: Option<f64>,

    pub min_aqi: Option<i64>,
    pub max_aqi: Option<i64>,

    /// Number of distinct coordinate pairs seen.
    pub distinct_locations: i64,
}

/// Per-location rollup for the detailed analysis endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LocationGroup {
    pub label: String,
    pub lat: f64,
    pub lon: f64,

    /// Stored rows for this coordinate pair.
    pub sample_count: i64,

    /// Mean AQI over the pair's valid rows, one decimal.
    pub avg_aqi: Option<f64>,
}

/// Response for GET /api/stats/detailed.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedStatsResponse {
    pub overall: AggregateStats,

    /// Locations with at least `min_count` samples, busiest first.
    pub by_location: Vec<LocationGroup>,
}

/// Current-conditions payload for the ingestion proxy.
#[derive(Debug, Clone, Serialize)]
pub struct AirQualityResponse {
    /// Reporting station name.
    pub station: String,

    pub aqi: i64,
    pub level: AqiLevel,

    /// Tracked pollutant readings from the provider's `iaqi` map.
    pub pollutants: PollutantReadings,

    /// Provider-reported observation time, when present.
    pub last_updated: Option<String>,
}

/// The four pollutants surfaced to clients. Values are the provider's
/// per-pollutant index numbers; absent when the station does not measure one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollutantReadings {
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
}

/// Query parameters for GET /api/air and GET /api/forecast.
#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub lat: f64,
    pub lon: f64,

    /// Display label for the location; defaults to the station name (air)
    /// or `"lat,lon"` (forecast) when omitted.
    pub label: Option<String>,
}

/// Query parameters for GET /api/search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Free-text station keyword.
    pub q: String,
}

/// Query parameters for GET /api/stats/detailed.
#[derive(Debug, Deserialize)]
pub struct DetailedStatsQuery {
    /// Minimum samples a location needs to appear in the breakdown
    /// (default: 2).
    #[serde(default = "default_min_count")]
    pub min_count: i64,
}

fn default_min_count() -> i64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banding_boundaries() {
        // Inclusive upper bounds on every band edge
        assert_eq!(AqiLevel::from_aqi(0), AqiLevel::Good);
        assert_eq!(AqiLevel::from_aqi(50), AqiLevel::Good);
        assert_eq!(AqiLevel::from_aqi(51), AqiLevel::Moderate);
        assert_eq!(AqiLevel::from_aqi(100), AqiLevel::Moderate);
        assert_eq!(AqiLevel::from_aqi(101), AqiLevel::Unhealthy);
        assert_eq!(AqiLevel::from_aqi(150), AqiLevel::Unhealthy);
        assert_eq!(AqiLevel::from_aqi(151), AqiLevel::VeryUnhealthy);
        assert_eq!(AqiLevel::from_aqi(200), AqiLevel::VeryUnhealthy);
        assert_eq!(AqiLevel::from_aqi(201), AqiLevel::Hazardous);
        assert_eq!(AqiLevel::from_aqi(500), AqiLevel::Hazardous);
    }

    #[test]
    fn test_level_serializes_snake_case() {
        let json = serde_json::to_string(&AqiLevel::VeryUnhealthy).unwrap();
        assert_eq!(json, "\"very_unhealthy\"");
    }

    #[test]
    fn test_trend_serializes_lowercase() {
        let json = serde_json::to_string(&Trend::Rising).unwrap();
        assert_eq!(json, "\"rising\"");
    }

    #[test]
    fn test_insufficient_result_shape() {
        let result = TrendResult::insufficient(2);

        assert_eq!(result.trend, Trend::Unknown);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.sample_count, 2);
        assert!(result.last_aqi.is_none());
        assert!(result.projected_aqi.is_none());
        assert!(result.current_level.is_none());
        assert!(result.slope.is_none());
    }

    #[test]
    fn test_format_timestamp_round_trips() {
        let ts = format_timestamp(Utc::now());
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }
}
