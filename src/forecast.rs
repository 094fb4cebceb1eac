//! Forecast orchestration: pulls recent history out of the sample store,
//! applies the insufficient-data policies, and hands the series to the trend
//! analyzer.
//!
//! This is the single fault boundary for forecasting. The analyzer itself
//! cannot fail; anything that goes wrong below this layer (in practice, a
//! store query) surfaces as a [`ForecastError`] and is rendered by the API
//! layer as a structured "analysis failed" response, never an unhandled
//! fault.

use thiserror::Error;

use crate::model::{TrendResponse, TrendResult};
use crate::storage::Storage;
use crate::trend;

/// How many recent samples feed a per-location forecast.
const LOCATION_SAMPLE_LIMIT: i64 = 7;

/// How many recent samples feed the global forecast.
const GENERAL_SAMPLE_LIMIT: i64 = 10;

/// Raw samples (valid or not) the global forecast needs before it even
/// attempts analysis.
const GENERAL_MIN_RAW_SAMPLES: usize = 3;

/// Location label for the cross-location forecast.
const GENERAL_LABEL: &str = "General";

/// Failure below the forecast boundary.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The sample store could not be queried.
    #[error("sample store query failed: {0}")]
    Store(anyhow::Error),
}

/// Forecast the AQI trend for one exact coordinate pair.
///
/// Fetches the most recent history for `(lat, lon)` and analyzes it. With no
/// stored samples at all, returns a "no historical data" shape without
/// invoking the analyzer.
pub async fn forecast_for_location(
    storage: &Storage,
    lat: f64,
    lon: f64,
    label: &str,
) -> Result<TrendResponse, ForecastError> {
    let samples = storage
        .query_by_location(lat, lon, LOCATION_SAMPLE_LIMIT)
        .await
        .map_err(ForecastError::Store)?;

    if samples.is_empty() {
        let mut result = TrendResult::insufficient(0);
        result.narrative = format!("No historical data for {}.", label);
        return Ok(TrendResponse::from_result(result, label));
    }

    let result = trend::analyze(&samples, label);
    Ok(TrendResponse::from_result(result, label))
}

/// Forecast the AQI trend across all locations.
///
/// Fetches the most recent samples store-wide. Fewer than three raw samples
/// (valid or not) short-circuits into the insufficient-data shape; otherwise
/// the analyzer decides, and may still come back insufficient if too few of
/// them carry an AQI.
pub async fn forecast_general(storage: &Storage) -> Result<TrendResponse, ForecastError> {
    let samples = storage
        .query_recent(GENERAL_SAMPLE_LIMIT)
        .await
        .map_err(ForecastError::Store)?;

    if samples.len() < GENERAL_MIN_RAW_SAMPLES {
        let result = TrendResult::insufficient(samples.len());
        return Ok(TrendResponse::from_result(result, GENERAL_LABEL));
    }

    let result = trend::analyze(&samples, GENERAL_LABEL);
    Ok(TrendResponse::from_result(result, GENERAL_LABEL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sample, Trend};

    async fn setup_test_storage() -> Storage {
        Storage::new("sqlite::memory:").await.unwrap()
    }

    async fn seed(storage: &Storage, lat: f64, lon: f64, aqis: &[Option<i64>]) {
        for (hour, aqi) in aqis.iter().enumerate() {
            storage
                .insert_sample(&Sample {
                    timestamp: format!("2024-01-15 {:02}:00:00", hour),
                    aqi: *aqi,
                    lat,
                    lon,
                    label: "Test Station".to_string(),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_location_with_no_history() {
        let storage = setup_test_storage().await;

        let response = forecast_for_location(&storage, 19.43, -99.13, "Centro")
            .await
            .unwrap();

        assert_eq!(response.location, "Centro");
        assert_eq!(response.trend, Trend::Unknown);
        assert_eq!(response.confidence, 0);
        assert_eq!(response.sample_count, 0);
        assert!(response.narrative.contains("No historical data"));
    }

    #[tokio::test]
    async fn test_location_rising_trend() {
        let storage = setup_test_storage().await;
        seed(
            &storage,
            19.43,
            -99.13,
            &[Some(20), Some(30), Some(40), Some(50), Some(60)],
        )
        .await;

        let response = forecast_for_location(&storage, 19.43, -99.13, "Centro")
            .await
            .unwrap();

        assert_eq!(response.trend, Trend::Rising);
        assert_eq!(response.last_aqi, Some(60));
        assert_eq!(response.projected_aqi, Some(65));
        assert_eq!(response.sample_count, 5);
    }

    #[tokio::test]
    async fn test_location_uses_only_most_recent_seven() {
        let storage = setup_test_storage().await;
        // Nine samples; the two oldest must not participate
        seed(
            &storage,
            19.43,
            -99.13,
            &[
                Some(500),
                Some(500),
                Some(70),
                Some(70),
                Some(70),
                Some(70),
                Some(70),
                Some(70),
                Some(70),
            ],
        )
        .await;

        let response = forecast_for_location(&storage, 19.43, -99.13, "Centro")
            .await
            .unwrap();

        assert_eq!(response.sample_count, 7);
        assert_eq!(response.trend, Trend::Stable);
    }

    #[tokio::test]
    async fn test_location_ignores_other_coordinates() {
        let storage = setup_test_storage().await;
        seed(&storage, 40.71, -74.00, &[Some(20), Some(40), Some(60)]).await;

        let response = forecast_for_location(&storage, 19.43, -99.13, "Centro")
            .await
            .unwrap();

        assert_eq!(response.trend, Trend::Unknown);
        assert_eq!(response.sample_count, 0);
    }

    #[tokio::test]
    async fn test_general_insufficient_raw_count() {
        let storage = setup_test_storage().await;
        seed(&storage, 19.43, -99.13, &[Some(40), None]).await;

        let response = forecast_general(&storage).await.unwrap();

        assert_eq!(response.location, "General");
        assert_eq!(response.trend, Trend::Unknown);
        assert_eq!(response.confidence, 0);
        // Raw count, absent-AQI row included
        assert_eq!(response.sample_count, 2);
    }

    #[tokio::test]
    async fn test_general_enough_raw_but_too_few_valid() {
        let storage = setup_test_storage().await;
        seed(&storage, 19.43, -99.13, &[Some(40), Some(50), None, None]).await;

        let response = forecast_general(&storage).await.unwrap();

        // Analyzer's own guard kicks in: only two usable samples
        assert_eq!(response.trend, Trend::Unknown);
        assert_eq!(response.sample_count, 2);
    }

    #[tokio::test]
    async fn test_general_merges_locations() {
        let storage = setup_test_storage().await;
        seed(&storage, 19.43, -99.13, &[Some(100), Some(100)]).await;
        seed(&storage, 40.71, -74.00, &[Some(100), Some(100)]).await;

        let response = forecast_general(&storage).await.unwrap();

        assert_eq!(response.location, "General");
        assert_eq!(response.trend, Trend::Stable);
        assert_eq!(response.sample_count, 4);
    }
}
