//! Health statistics derived from the full sample store.
//!
//! Two views: the share of time spent in each severity band plus daily
//! rolling averages (the health stats endpoint), and a whole-store aggregate
//! with a per-location breakdown (the detailed analysis endpoint). Banding
//! goes through [`AqiLevel::from_aqi`], the same classifier the trend
//! analyzer uses, so the thresholds cannot drift apart.

use chrono::{DateTime, Utc};

use crate::model::{
    AqiLevel, BandPercentages, DetailedStatsResponse, HealthStatsResponse,
};
use crate::storage::Storage;

/// Length of the trailing window for daily averages.
const DAILY_AVERAGE_DAYS: i64 = 7;

/// Compute band percentages and daily averages over everything stored.
///
/// # Arguments
///
/// * `storage` - Database connection
/// * `now` - Reference timestamp (typically current time)
pub async fn health_stats(
    storage: &Storage,
    now: DateTime<Utc>,
) -> anyhow::Result<HealthStatsResponse> {
    let total_records = storage.count_samples().await?;
    let values = storage.valid_aqi_values().await?;
    let percentages_by_band = band_percentages(&values);
    let daily_averages = storage.daily_averages(DAILY_AVERAGE_DAYS, now).await?;

    Ok(HealthStatsResponse {
        percentages_by_band,
        daily_averages,
        total_records,
    })
}

/// Whole-store aggregate plus the per-location rollup.
pub async fn detailed_stats(
    storage: &Storage,
    min_count: i64,
) -> anyhow::Result<DetailedStatsResponse> {
    let overall = storage.aggregate_stats().await?;
    let by_location = storage.query_by_location_grouped(min_count).await?;

    Ok(DetailedStatsResponse {
        overall,
        by_location,
    })
}

/// Bin AQI values through the shared banding and express each band as a
/// percentage of the valid total, rounded to one decimal. All zero when the
/// input is empty.
fn band_percentages(values: &[i64]) -> BandPercentages {
    if values.is_empty() {
        return BandPercentages::default();
    }

    let mut counts = [0usize; 5];
    for &aqi in values {
        let slot = match AqiLevel::from_aqi(aqi) {
            AqiLevel::Good => 0,
            AqiLevel::Moderate => 1,
            AqiLevel::Unhealthy => 2,
            AqiLevel::VeryUnhealthy => 3,
            AqiLevel::Hazardous => 4,
        };
        counts[slot] += 1;
    }

    let total = values.len() as f64;
    let pct = |count: usize| (count as f64 * 100.0 / total * 10.0).round() / 10.0;

    BandPercentages {
        good: pct(counts[0]),
        moderate: pct(counts[1]),
        unhealthy: pct(counts[2]),
        very_unhealthy: pct(counts[3]),
        hazardous: pct(counts[4]),
    }
}
