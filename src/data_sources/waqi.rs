//! WAQI (World Air Quality Index) client.
//!
//! WAQI aggregates official air-quality monitoring stations worldwide and
//! exposes per-station AQI plus individual pollutant readings. Two endpoints
//! are used here: the geolocated feed (nearest station to a coordinate pair)
//! and the keyword search.
//!
//! # API Reference
//!
//! See: <https://aqicn.org/json-api/doc/>
//!
//! # Data Shape Caveats
//!
//! The API is loosely typed: `data` is an object on success but a bare
//! message string on error, and the overall `aqi` arrives as a number on the
//! feed endpoint but as a string (possibly `"-"` for "no data") on the
//! search endpoint. The response types below absorb both shapes; a non-"ok"
//! status or an absent AQI is reported as [`WaqiError::Unavailable`], never
//! as a parse fault.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::PollutantReadings;

/// Base URL for the WAQI API.
const WAQI_API_BASE: &str = "https://api.waqi.info";

/// Failure modes of a WAQI request, from the caller's point of view.
#[derive(Debug, Error)]
pub enum WaqiError {
    /// The request itself failed (network, TLS, decode).
    #[error("request to the WAQI API failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered but has no usable data: non-"ok" status,
    /// missing payload, or no overall AQI for the station.
    #[error("air quality data unavailable")]
    Unavailable,
}

/// Client for querying the WAQI API.
#[derive(Clone)]
pub struct WaqiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl WaqiClient {
    /// Create a new WAQI client.
    ///
    /// # Arguments
    ///
    /// * `token` - WAQI API token; the public "demo" token works for
    ///   evaluation but is heavily rate limited.
    pub fn new(token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: WAQI_API_BASE.to_string(),
            token: token.to_string(),
        }
    }

    /// Create a new WAQI client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            token: token.to_string(),
        }
    }

    /// Fetch the reading of the station nearest to a coordinate pair.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = WaqiClient::new("demo");
    /// let reading = client.fetch_by_geo(19.4326, -99.1332).await?;
    /// println!("{} AQI {}", reading.station, reading.aqi);
    /// ```
    pub async fn fetch_by_geo(&self, lat: f64, lon: f64) -> Result<AirReading, WaqiError> {
        let url = format!(
            "{}/feed/geo:{};{}/?token={}",
            self.base_url, lat, lon, self.token
        );

        let response = self.client.get(&url).send().await?;
        let envelope = response.json::<WaqiEnvelope>().await?;
        envelope.into_reading()
    }

    /// Search stations by free-text keyword.
    pub async fn search(&self, keyword: &str) -> Result<Vec<StationMatch>, WaqiError> {
        let url = format!(
            "{}/search/?token={}&keyword={}",
            self.base_url,
            self.token,
            urlencoding::encode(keyword)
        );

        let response = self.client.get(&url).send().await?;
        let envelope = response.json::<WaqiEnvelope>().await?;

        if envelope.status != "ok" {
            return Err(WaqiError::Unavailable);
        }
        let entries: Vec<WaqiSearchEntry> =
            serde_json::from_value(envelope.data).map_err(|_| WaqiError::Unavailable)?;

        Ok(entries.into_iter().map(StationMatch::from_entry).collect())
    }
}

/// A cooked station reading: the subset of the feed payload the rest of the
/// system consumes, with the loose typing already resolved.
#[derive(Debug, Clone)]
pub struct AirReading {
    /// Overall AQI. Always present — an AQI-less feed is `Unavailable`.
    pub aqi: i64,

    /// Reporting station name.
    pub station: String,

    /// The tracked pollutant subset of the station's `iaqi` map.
    pub pollutants: PollutantReadings,

    /// Provider-reported observation time (`time.s`), when present.
    pub last_updated: Option<String>,
}

/// A station returned by the search endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StationMatch {
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,

    /// Current AQI, when the station is reporting one.
    pub aqi: Option<i64>,
}

impl StationMatch {
    fn from_entry(entry: WaqiSearchEntry) -> Self {
        Self {
            name: entry.station.name,
            lat: entry.station.geo.first().copied(),
            lon: entry.station.geo.get(1).copied(),
            // Search reports AQI as a string, "-" when not reporting
            aqi: entry.aqi.parse().ok(),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Top-level WAQI response: `data` is an object on success, a message string
/// on error, so it stays untyped until the status is checked.
#[derive(Debug, Clone, Deserialize)]
struct WaqiEnvelope {
    #[serde(default)]
    status: String,

    #[serde(default)]
    data: serde_json::Value,
}

impl WaqiEnvelope {
    fn into_reading(self) -> Result<AirReading, WaqiError> {
        if self.status != "ok" {
            return Err(WaqiError::Unavailable);
        }

        let data: WaqiFeedData =
            serde_json::from_value(self.data).map_err(|_| WaqiError::Unavailable)?;
        let aqi = overall_aqi(&data.aqi).ok_or(WaqiError::Unavailable)?;

        let last_updated = if data.time.s.is_empty() {
            None
        } else {
            Some(data.time.s)
        };

        Ok(AirReading {
            aqi,
            station: data.city.name,
            pollutants: PollutantReadings {
                pm25: data.iaqi.get("pm25").map(|m| m.v),
                pm10: data.iaqi.get("pm10").map(|m| m.v),
                no2: data.iaqi.get("no2").map(|m| m.v),
                o3: data.iaqi.get("o3").map(|m| m.v),
            },
            last_updated,
        })
    }
}

/// The overall AQI is usually an integer but may be a float or the string
/// `"-"` for "not reporting".
fn overall_aqi(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|v| v.round() as i64))
}

/// Successful feed payload.
#[derive(Debug, Clone, Default, Deserialize)]
struct WaqiFeedData {
    #[serde(default)]
    aqi: serde_json::Value,

    #[serde(default)]
    city: WaqiCity,

    /// Per-pollutant readings, keyed by pollutant code ("pm25", "o3", ...).
    #[serde(default)]
    iaqi: HashMap<String, WaqiMeasurement>,

    #[serde(default)]
    time: WaqiTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WaqiCity {
    #[serde(default)]
    name: String,

    /// `[lat, lon]` of the station.
    #[serde(default)]
    geo: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WaqiMeasurement {
    #[serde(default)]
    v: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WaqiTime {
    /// Observation time, `YYYY-MM-DD HH:MM:SS`, local to the station.
    #[serde(default)]
    s: String,
}

/// One entry of the search payload.
#[derive(Debug, Clone, Deserialize)]
struct WaqiSearchEntry {
    #[serde(default)]
    aqi: String,

    #[serde(default)]
    station: WaqiSearchStation,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WaqiSearchStation {
    #[serde(default)]
    name: String,

    #[serde(default)]
    geo: Vec<f64>,
}
