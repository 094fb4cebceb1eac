//! SQLite storage layer for Aircast.
//!
//! Implements the sample store: an append-only table of timestamped AQI
//! observations keyed by coordinate pair. Timestamps are stored as the TEXT
//! the provider reported (`YYYY-MM-DD HH:MM:SS`), which keeps lexicographic
//! and chronological order aligned for well-formed rows; malformed rows are
//! tolerated and handled downstream by the analyzer's sort fallback.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::model::{
    AggregateStats, DailyAverage, LocationGroup, Sample, format_timestamp,
};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:aircast.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                label TEXT NOT NULL,
                aqi INTEGER,
                ts TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Index for efficient most-recent-first queries by coordinate pair
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_samples_location_ts
            ON samples(lat, lon, ts)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new sample. Used by the ingestion path only; samples are
    /// never updated or deleted.
    pub async fn insert_sample(&self, sample: &Sample) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO samples (lat, lon, label, aqi, ts)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.lat)
        .bind(sample.lon)
        .bind(&sample.label)
        .bind(sample.aqi)
        .bind(&sample.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch up to `limit` samples for an exact coordinate pair,
    /// most-recent-first. Equality match, not proximity: two nearby stations
    /// are two separate series.
    pub async fn query_by_location(
        &self,
        lat: f64,
        lon: f64,
        limit: i64,
    ) -> anyhow::Result<Vec<Sample>> {
        let rows = sqlx::query(
            r#"
            SELECT lat, lon, label, aqi, ts
            FROM samples
            WHERE lat = ? AND lon = ?
            ORDER BY ts DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(lat)
        .bind(lon)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_sample).collect())
    }

    /// Fetch up to `limit` samples across all locations, most-recent-first.
    pub async fn query_recent(&self, limit: i64) -> anyhow::Result<Vec<Sample>> {
        let rows = sqlx::query(
            r#"
            SELECT lat, lon, label, aqi, ts
            FROM samples
            ORDER BY ts DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_sample).collect())
    }

    /// Total number of stored rows, with or without an AQI.
    pub async fn count_samples(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as total FROM samples")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }

    /// Whole-store aggregate numbers. The AQI aggregates skip rows without
    /// an AQI; the totals do not.
    pub async fn aggregate_stats(&self) -> anyhow::Result<AggregateStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as total,
                   ROUND(AVG(aqi), 1) as avg_aqi,
                   MIN(aqi) as min_aqi,
                   MAX(aqi) as max_aqi,
                   COUNT(DISTINCT lat || ',' || lon) as distinct_locations
            FROM samples
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AggregateStats {
            total_records: row.get("total"),
            avg_aqi: row.get("avg_aqi"),
            min_aqi: row.get("min_aqi"),
            max_aqi: row.get("max_aqi"),
            distinct_locations: row.get("distinct_locations"),
        })
    }

    /// Per-location rollup for every coordinate pair with at least
    /// `min_count` samples, busiest first.
    pub async fn query_by_location_grouped(
        &self,
        min_count: i64,
    ) -> anyhow::Result<Vec<LocationGroup>> {
        let rows = sqlx::query(
            r#"
            SELECT lat, lon, MIN(label) as label,
                   COUNT(*) as sample_count,
                   ROUND(AVG(aqi), 1) as avg_aqi
            FROM samples
            GROUP BY lat, lon
            HAVING COUNT(*) >= ?
            ORDER BY sample_count DESC
            "#,
        )
        .bind(min_count)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| LocationGroup {
                label: r.get("label"),
                lat: r.get("lat"),
                lon: r.get("lon"),
                sample_count: r.get("sample_count"),
                avg_aqi: r.get("avg_aqi"),
            })
            .collect())
    }

    /// All AQI values currently stored, skipping rows without one. The stats
    /// aggregator bins these through the shared banding so the thresholds
    /// live in one place instead of in SQL.
    pub async fn valid_aqi_values(&self) -> anyhow::Result<Vec<i64>> {
        let rows = sqlx::query("SELECT aqi FROM samples WHERE aqi IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| r.get("aqi")).collect())
    }

    /// Average AQI per calendar day over the trailing `days` days, ascending
    /// by date. Days without a valid sample are omitted.
    ///
    /// # Arguments
    ///
    /// * `days` - Length of the trailing window
    /// * `now` - The reference timestamp (typically current time)
    pub async fn daily_averages(
        &self,
        days: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<DailyAverage>> {
        let cutoff = format_timestamp(now - Duration::days(days));

        let rows = sqlx::query(
            r#"
            SELECT date(ts) as day, ROUND(AVG(aqi), 1) as avg_aqi
            FROM samples
            WHERE aqi IS NOT NULL AND ts >= ? AND date(ts) IS NOT NULL
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| DailyAverage {
                date: r.get("day"),
                avg_aqi: r.get("avg_aqi"),
            })
            .collect())
    }
}

fn row_to_sample(row: &sqlx::sqlite::SqliteRow) -> Sample {
    Sample {
        timestamp: row.get("ts"),
        aqi: row.get("aqi"),
        lat: row.get("lat"),
        lon: row.get("lon"),
        label: row.get("label"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lat: f64, lon: f64, ts: &str, aqi: Option<i64>) -> Sample {
        Sample {
            timestamp: ts.to_string(),
            aqi,
            lat,
            lon,
            label: "Test Station".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_query_by_location() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-15 10:00:00", Some(42)))
            .await
            .unwrap();

        let samples = storage.query_by_location(19.43, -99.13, 7).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].aqi, Some(42));
        assert_eq!(samples[0].timestamp, "2024-01-15 10:00:00");
    }

    #[tokio::test]
    async fn test_query_by_location_is_exact_match() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-15 10:00:00", Some(42)))
            .await
            .unwrap();
        storage
            .insert_sample(&sample(19.44, -99.13, "2024-01-15 10:00:00", Some(90)))
            .await
            .unwrap();

        let samples = storage.query_by_location(19.43, -99.13, 7).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].aqi, Some(42));
    }

    #[tokio::test]
    async fn test_query_by_location_limit_and_order() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        for hour in 0..9 {
            storage
                .insert_sample(&sample(
                    19.43,
                    -99.13,
                    &format!("2024-01-15 {:02}:00:00", hour),
                    Some(hour),
                ))
                .await
                .unwrap();
        }

        let samples = storage.query_by_location(19.43, -99.13, 7).await.unwrap();
        assert_eq!(samples.len(), 7);
        // Most recent first
        assert_eq!(samples[0].timestamp, "2024-01-15 08:00:00");
        assert_eq!(samples[6].timestamp, "2024-01-15 02:00:00");
    }

    #[tokio::test]
    async fn test_query_recent_spans_locations() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-15 10:00:00", Some(40)))
            .await
            .unwrap();
        storage
            .insert_sample(&sample(40.71, -74.00, "2024-01-15 11:00:00", Some(60)))
            .await
            .unwrap();

        let samples = storage.query_recent(10).await.unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].aqi, Some(60));
    }

    #[tokio::test]
    async fn test_aggregate_stats() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-15 10:00:00", Some(40)))
            .await
            .unwrap();
        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-15 11:00:00", Some(60)))
            .await
            .unwrap();
        storage
            .insert_sample(&sample(40.71, -74.00, "2024-01-15 11:00:00", None))
            .await
            .unwrap();

        let stats = storage.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.avg_aqi, Some(50.0));
        assert_eq!(stats.min_aqi, Some(40));
        assert_eq!(stats.max_aqi, Some(60));
        assert_eq!(stats.distinct_locations, 2);
    }

    #[tokio::test]
    async fn test_aggregate_stats_empty_store() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        let stats = storage.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_records, 0);
        assert!(stats.avg_aqi.is_none());
        assert!(stats.min_aqi.is_none());
    }

    #[tokio::test]
    async fn test_grouped_respects_min_count() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        for hour in 0..3 {
            storage
                .insert_sample(&sample(
                    19.43,
                    -99.13,
                    &format!("2024-01-15 {:02}:00:00", hour),
                    Some(50),
                ))
                .await
                .unwrap();
        }
        storage
            .insert_sample(&sample(40.71, -74.00, "2024-01-15 10:00:00", Some(80)))
            .await
            .unwrap();

        let groups = storage.query_by_location_grouped(2).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].sample_count, 3);
        assert_eq!(groups[0].avg_aqi, Some(50.0));
    }

    #[tokio::test]
    async fn test_valid_aqi_values_skips_absent() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-15 10:00:00", Some(42)))
            .await
            .unwrap();
        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-15 11:00:00", None))
            .await
            .unwrap();

        let values = storage.valid_aqi_values().await.unwrap();
        assert_eq!(values, vec![42]);
    }

    #[tokio::test]
    async fn test_daily_averages_window_and_order() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();

        // Two days inside the window, one far outside
        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-14 10:00:00", Some(40)))
            .await
            .unwrap();
        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-14 11:00:00", Some(60)))
            .await
            .unwrap();
        storage
            .insert_sample(&sample(19.43, -99.13, "2024-01-15 09:00:00", Some(90)))
            .await
            .unwrap();
        storage
            .insert_sample(&sample(19.43, -99.13, "2023-12-01 10:00:00", Some(200)))
            .await
            .unwrap();

        let averages = storage.daily_averages(7, now).await.unwrap();
        assert_eq!(averages.len(), 2);
        assert_eq!(averages[0].date, "2024-01-14");
        assert_eq!(averages[0].avg_aqi, 50.0);
        assert_eq!(averages[1].date, "2024-01-15");
        assert_eq!(averages[1].avg_aqi, 90.0);
    }
}
