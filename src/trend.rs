//! Trend analysis over a series of AQI samples.
//!
//! Pure computation: no I/O, no clock. Given the samples a caller fetched
//! (in any order), [`analyze`] filters out entries without an AQI, orders the
//! rest chronologically, fits a least-squares line over the sequence index,
//! and derives a direction, a bounded confidence score, and a one-step
//! projection. Every degenerate input (too few samples, zero variance, zero
//! mean, unparseable timestamps) falls back to a documented default — this
//! module never fails outward.

use chrono::NaiveDateTime;

use crate::model::{AqiLevel, Sample, TIMESTAMP_FORMAT, Trend, TrendResult};

/// Minimum number of AQI-bearing samples needed to fit a trend.
pub const MIN_TREND_SAMPLES: usize = 3;

/// Slope magnitude above which the series counts as rising or falling.
const SLOPE_THRESHOLD: f64 = 0.5;

/// Projections never leave the AQI scale.
const AQI_SCALE_MAX: i64 = 500;

/// How far a one-step projection moves from the last observation.
const PROJECTION_STEP: i64 = 5;

/// One usable observation inside the analyzer.
struct SeriesEntry {
    raw_ts: String,
    parsed: Option<NaiveDateTime>,
    aqi: i64,
}

/// Analyze one series of samples and describe its trend.
///
/// `location` only feeds the narrative text. Arrival order of `samples` is
/// irrelevant: the analyzer re-sorts by timestamp, so any permutation of the
/// same samples yields an identical result.
pub fn analyze(samples: &[Sample], location: &str) -> TrendResult {
    let mut entries: Vec<SeriesEntry> = samples
        .iter()
        .filter_map(|s| {
            s.aqi.map(|aqi| SeriesEntry {
                raw_ts: s.timestamp.clone(),
                parsed: NaiveDateTime::parse_from_str(&s.timestamp, TIMESTAMP_FORMAT).ok(),
                aqi,
            })
        })
        .collect();

    if entries.len() < MIN_TREND_SAMPLES {
        return TrendResult::insufficient(entries.len());
    }

    sort_chronologically(&mut entries);

    let values: Vec<f64> = entries.iter().map(|e| e.aqi as f64).collect();
    let slope = least_squares_slope(&values);
    let trend = classify(slope);
    let confidence = confidence_score(&values, slope);

    let last_aqi = entries[entries.len() - 1].aqi;
    let projected_aqi = project(trend, last_aqi);
    let current_level = AqiLevel::from_aqi(last_aqi);
    let narrative = narrative(trend, last_aqi, projected_aqi, location);

    TrendResult {
        trend,
        confidence,
        narrative,
        sample_count: entries.len(),
        last_aqi: Some(last_aqi),
        projected_aqi: Some(projected_aqi),
        current_level: Some(current_level),
        slope: Some(slope),
    }
}

/// Sort entries ascending by parsed timestamp. If any entry failed to parse,
/// fall back to ordering by the raw string for the whole series — a
/// best-effort policy, never an error. The sort is stable, so ties keep
/// arrival order.
fn sort_chronologically(entries: &mut [SeriesEntry]) {
    if entries.iter().all(|e| e.parsed.is_some()) {
        entries.sort_by_key(|e| e.parsed);
    } else {
        entries.sort_by(|a, b| a.raw_ts.cmp(&b.raw_ts));
    }
}

/// Ordinary-least-squares slope of `values` against their index.
fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_xx: f64 = (0..values.len()).map(|i| (i * i) as f64).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    // Zero only for n <= 1, which the sample guard already excludes
    if denominator == 0.0 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}

fn classify(slope: f64) -> Trend {
    if slope > SLOPE_THRESHOLD {
        Trend::Rising
    } else if slope < -SLOPE_THRESHOLD {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

/// Heuristic confidence in the fitted trend, in [0, 100].
///
/// Three bounded components are summed and then clamped:
///
/// - consistency (max 80): low coefficient of variation means steadier data;
///   a non-positive mean counts as worst case, and the floor is 10
/// - volume (max 70): more samples, more trust — saturates at ten
/// - strength (max 30): steeper slopes read as more decisive
///
/// The components can sum past 100 before the final clamp, so high-volume
/// steady series saturate early. The clamp, not the component weights, is
/// the contract — do not rebalance them.
fn confidence_score(values: &[f64], slope: f64) -> u8 {
    let n = values.len();

    let consistency = if n > 1 {
        let mean = values.iter().sum::<f64>() / n as f64;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
        let coefficient = if mean > 0.0 { variance.sqrt() / mean } else { 1.0 };
        (80.0 - coefficient * 60.0).max(10.0)
    } else {
        // Unreachable behind the sample guard; still worth a sane value
        30.0
    };

    let volume = ((n as f64 / 10.0) * 70.0).min(70.0);
    let strength = (slope.abs() * 20.0).min(30.0);

    (consistency + volume + strength).clamp(0.0, 100.0).round() as u8
}

/// One-step projection from the last observation, clamped to the AQI scale.
fn project(trend: Trend, last_aqi: i64) -> i64 {
    match trend {
        Trend::Rising => (last_aqi + PROJECTION_STEP).min(AQI_SCALE_MAX),
        Trend::Falling => (last_aqi - PROJECTION_STEP).max(0),
        Trend::Stable | Trend::Unknown => last_aqi,
    }
}

/// Human-readable summary of the trend for a location.
fn narrative(trend: Trend, last_aqi: i64, projected_aqi: i64, location: &str) -> String {
    match trend {
        Trend::Rising => format!(
            "Air quality at {} is deteriorating; AQI around {} expected next.",
            location, projected_aqi
        ),
        Trend::Falling => format!(
            "Air quality at {} is improving; AQI around {} expected next.",
            location, projected_aqi
        ),
        Trend::Stable => format!(
            "Air quality at {} is holding steady around AQI {}.",
            location, last_aqi
        ),
        Trend::Unknown => format!("Air quality trend at {} is unknown.", location),
    }
}
