//! HTTP API handlers for Aircast.
//!
//! - **GET /api/air**: proxy the upstream provider for current conditions at
//!   a coordinate pair, persisting each successful reading as history.
//! - **GET /api/search**: proxy the provider's station keyword search.
//! - **GET /api/forecast**: trend forecast for one location's history.
//! - **GET /api/forecast/general**: trend forecast across all locations.
//! - **GET /api/stats/health**: band percentages and daily averages.
//! - **GET /api/stats/detailed**: whole-store aggregate + per-location rollup.
//! - **GET /health**: liveness check.
//!
//! Handlers never panic: provider unavailability maps to 404, transport
//! failures to 502, and anything that escapes the forecast/stats layers is
//! rendered as a structured "analysis failed" body with a diagnostic string.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::data_sources::WaqiClient;
use crate::data_sources::waqi::{StationMatch, WaqiError};
use crate::model::{
    AirQualityResponse, AqiLevel, DetailedStatsQuery, DetailedStatsResponse,
    HealthStatsResponse, LocationQuery, Sample, SearchQuery, TrendResponse,
    format_timestamp,
};
use crate::storage::Storage;
use crate::{forecast, stats};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub provider: WaqiClient,
}

/// Error payload for every non-2xx JSON response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: Option<String>,
}

impl ErrorBody {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            detail: None,
        }
    }

    fn with_detail(error: &str, detail: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            detail: Some(detail.to_string()),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn provider_error(e: WaqiError) -> ApiError {
    match e {
        WaqiError::Unavailable => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new("data unavailable")),
        ),
        WaqiError::Http(err) => {
            warn!(error = %err, "Upstream provider request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody::with_detail("upstream request failed", err)),
            )
        }
    }
}

fn analysis_error(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::with_detail("analysis failed", e)),
    )
}

/// GET /api/air - Current conditions at a coordinate pair.
///
/// Fetches the nearest station's reading from the upstream provider. Each
/// successful reading is persisted as a [`Sample`] so the forecast endpoints
/// accumulate history. A provider answer without usable data is a 404, not
/// a fault.
///
/// # Query Parameters
///
/// - `lat`, `lon` (required)
/// - `label` (optional): stored location label; defaults to the station name
#[instrument(skip(state))]
pub async fn get_air(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<AirQualityResponse>, ApiError> {
    let reading = state
        .provider
        .fetch_by_geo(query.lat, query.lon)
        .await
        .map_err(provider_error)?;

    let label = query
        .label
        .clone()
        .filter(|l| !l.is_empty())
        .or_else(|| {
            if reading.station.is_empty() {
                None
            } else {
                Some(reading.station.clone())
            }
        })
        .unwrap_or_else(|| format!("{},{}", query.lat, query.lon));

    let sample = Sample {
        timestamp: reading
            .last_updated
            .clone()
            .unwrap_or_else(|| format_timestamp(Utc::now())),
        aqi: Some(reading.aqi),
        lat: query.lat,
        lon: query.lon,
        label,
    };

    if let Err(e) = state.storage.insert_sample(&sample).await {
        warn!(lat = query.lat, lon = query.lon, error = %e, "Failed to persist sample");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::with_detail("failed to persist sample", e)),
        ));
    }

    info!(
        lat = query.lat,
        lon = query.lon,
        aqi = reading.aqi,
        station = %sample.label,
        "Air quality fetched"
    );

    Ok(Json(AirQualityResponse {
        station: sample.label.clone(),
        aqi: reading.aqi,
        level: AqiLevel::from_aqi(reading.aqi),
        pollutants: reading.pollutants,
        last_updated: reading.last_updated,
    }))
}

/// Response for GET /api/search.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<StationMatch>,
}

/// GET /api/search - Station keyword search, proxied to the provider.
#[instrument(skip(state))]
pub async fn get_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let results = state
        .provider
        .search(&query.q)
        .await
        .map_err(provider_error)?;

    info!(keyword = %query.q, result_count = results.len(), "Stations searched");
    Ok(Json(SearchResponse { results }))
}

/// GET /api/forecast - Trend forecast for one coordinate pair's history.
///
/// # Query Parameters
///
/// - `lat`, `lon` (required): exact coordinates previous samples were stored
///   under
/// - `label` (optional): display label; defaults to `"lat,lon"`
#[instrument(skip(state))]
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<TrendResponse>, ApiError> {
    let label = query
        .label
        .clone()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| format!("{},{}", query.lat, query.lon));

    match forecast::forecast_for_location(&state.storage, query.lat, query.lon, &label).await {
        Ok(response) => {
            info!(
                location = %response.location,
                trend = ?response.trend,
                confidence = response.confidence,
                samples = response.sample_count,
                "Forecast computed"
            );
            Ok(Json(response))
        }
        Err(e) => {
            warn!(lat = query.lat, lon = query.lon, error = %e, "Forecast failed");
            Err(analysis_error(e))
        }
    }
}

/// GET /api/forecast/general - Trend forecast across all locations.
#[instrument(skip(state))]
pub async fn get_general_forecast(
    State(state): State<AppState>,
) -> Result<Json<TrendResponse>, ApiError> {
    match forecast::forecast_general(&state.storage).await {
        Ok(response) => {
            info!(
                trend = ?response.trend,
                confidence = response.confidence,
                samples = response.sample_count,
                "General forecast computed"
            );
            Ok(Json(response))
        }
        Err(e) => {
            warn!(error = %e, "General forecast failed");
            Err(analysis_error(e))
        }
    }
}

/// GET /api/stats/health - Band percentages and trailing daily averages.
#[instrument(skip(state))]
pub async fn get_health_stats(
    State(state): State<AppState>,
) -> Result<Json<HealthStatsResponse>, ApiError> {
    match stats::health_stats(&state.storage, Utc::now()).await {
        Ok(response) => {
            info!(
                total_records = response.total_records,
                days = response.daily_averages.len(),
                "Health stats computed"
            );
            Ok(Json(response))
        }
        Err(e) => {
            warn!(error = %e, "Health stats failed");
            Err(analysis_error(e))
        }
    }
}

/// GET /api/stats/detailed - Whole-store aggregate and per-location rollup.
///
/// # Query Parameters
///
/// - `min_count` (optional): minimum samples a location needs to appear in
///   the breakdown (default: 2)
#[instrument(skip(state))]
pub async fn get_detailed_stats(
    State(state): State<AppState>,
    Query(query): Query<DetailedStatsQuery>,
) -> Result<Json<DetailedStatsResponse>, ApiError> {
    match stats::detailed_stats(&state.storage, query.min_count).await {
        Ok(response) => {
            info!(
                total_records = response.overall.total_records,
                locations = response.by_location.len(),
                "Detailed stats computed"
            );
            Ok(Json(response))
        }
        Err(e) => {
            warn!(error = %e, "Detailed stats failed");
            Err(analysis_error(e))
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
