//! Read-only aggregation over the reading store.
//!
//! Set-based aggregates (avg/min/max/count) are pushed down to the store;
//! hourly bucketing and equidistant sampling run in-process over a single
//! ascending fetch of the window, so the grouping/stride logic stays
//! independent of store internals.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Serialize;

use crate::db::models::{Reading, ReadingKind, WindowStats};
use crate::db::store::ReadingStore;

/// Number of equidistant samples returned alongside combined statistics.
pub const SAMPLE_POINTS: usize = 20;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Page {
    pub data: Vec<Reading>,
    pub page: i64,
    pub total_pages: i64,
    pub total_records: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyAverage {
    pub hour: u32,
    pub average: f64,
}

#[derive(Debug, Clone)]
pub struct KindStats {
    pub stats: WindowStats,
    pub samples: Vec<Reading>,
}

#[derive(Debug, Clone)]
pub struct CombinedStats {
    pub temperature: KindStats,
    pub air: KindStats,
}

// ---------------------------------------------------------------------------
// Time-window helpers
// ---------------------------------------------------------------------------

/// Parse a caller-supplied bound: RFC3339, or `YYYY-MM-DD` taken as midnight
/// UTC. `None` means the input is a request error, never an empty window.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = raw.parse::<NaiveDate>().ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Inclusive `[00:00:00, 23:59:59.999999]` bounds of one UTC day.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    let end = date
        .and_hms_micro_opt(23, 59, 59, 999_999)
        .expect("end of day is always valid");
    (start.and_utc(), end.and_utc())
}

/// Largest accepted `page`/`limit` value; anything above it is treated like
/// any other invalid input.
pub const MAX_PAGE_PARAM: i64 = 1_000_000;

/// Fallback-parse a pagination parameter: non-numeric, sub-1, or oversized
/// input falls back to the default rather than erroring.
pub fn page_param(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|v| (1..=MAX_PAGE_PARAM).contains(v))
        .unwrap_or(default)
}

pub fn total_pages(total_records: i64, limit: i64) -> i64 {
    total_records.saturating_add(limit - 1) / limit
}

// ---------------------------------------------------------------------------
// Pure computation
// ---------------------------------------------------------------------------

/// Group readings by the UTC hour of `created_at` and average each bucket.
/// Hours without readings are omitted; output is ordered by hour.
pub fn bucket_by_hour(readings: &[Reading]) -> Vec<HourlyAverage> {
    let mut by_hour: std::collections::BTreeMap<u32, Vec<f64>> = std::collections::BTreeMap::new();
    for reading in readings {
        by_hour
            .entry(reading.created_at.hour())
            .or_default()
            .push(reading.value);
    }
    by_hour
        .into_iter()
        .map(|(hour, values)| HourlyAverage {
            hour,
            average: values.iter().sum::<f64>() / values.len() as f64,
        })
        .collect()
}

/// Pick up to `n` readings at a uniform stride across an ascending window.
///
/// The stride is `max(1, total / n)`, computed once for the whole window.
/// Fewer than `n` rows yields one sample per row; an empty window yields
/// an empty result.
pub fn sample_equidistant(readings: &[Reading], n: usize) -> Vec<Reading> {
    if readings.is_empty() || n == 0 {
        return Vec::new();
    }
    let stride = (readings.len() / n).max(1);
    readings.iter().step_by(stride).take(n).cloned().collect()
}

// ---------------------------------------------------------------------------
// Store-backed operations
// ---------------------------------------------------------------------------

pub async fn paginated(
    store: &dyn ReadingStore,
    kind: ReadingKind,
    page: i64,
    limit: i64,
) -> Result<Page> {
    let offset = (page - 1).saturating_mul(limit);
    let data = store.page_desc(kind, offset, limit).await?;
    let total_records = store.count(kind).await?;
    Ok(Page {
        data,
        page,
        total_pages: total_pages(total_records, limit),
        total_records,
    })
}

/// All readings of `kind` for the current UTC day, ascending.
pub async fn today(store: &dyn ReadingStore, kind: ReadingKind) -> Result<Vec<Reading>> {
    let (start, end) = day_bounds(Utc::now().date_naive());
    store.range_asc(kind, start, end).await
}

pub async fn range(
    store: &dyn ReadingStore,
    kind: ReadingKind,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Reading>> {
    store.range_asc(kind, from, to).await
}

pub async fn average(
    store: &dyn ReadingStore,
    kind: ReadingKind,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Option<f64>> {
    Ok(store.window_stats(kind, from, to).await?.average)
}

pub async fn stats(
    store: &dyn ReadingStore,
    kind: ReadingKind,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<WindowStats> {
    store.window_stats(kind, from, to).await
}

/// Sparse per-hour averages for one day of `kind`.
pub async fn hourly_average(
    store: &dyn ReadingStore,
    kind: ReadingKind,
    date: NaiveDate,
) -> Result<Vec<HourlyAverage>> {
    let (start, end) = day_bounds(date);
    let readings = store.range_asc(kind, start, end).await?;
    Ok(bucket_by_hour(&readings))
}

async fn kind_stats(
    store: &dyn ReadingStore,
    kind: ReadingKind,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<KindStats> {
    let stats = store.window_stats(kind, from, to).await?;
    let window = store.range_asc(kind, from, to).await?;
    Ok(KindStats {
        stats,
        samples: sample_equidistant(&window, SAMPLE_POINTS),
    })
}

/// Statistics plus equidistant samples for both kinds over one window.
pub async fn combined_stats(
    store: &dyn ReadingStore,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<CombinedStats> {
    let temperature = kind_stats(store, ReadingKind::Temperature, from, to).await?;
    let air = kind_stats(store, ReadingKind::AirQuality, from, to).await?;
    Ok(CombinedStats { temperature, air })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;
    use crate::db::memory::MemoryReadingStore;

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 18, hour, min, sec).unwrap()
    }

    fn reading(value: f64, created_at: DateTime<Utc>) -> Reading {
        Reading {
            id: Uuid::new_v4(),
            kind: ReadingKind::Temperature,
            value,
            source: None,
            created_at,
        }
    }

    // -----------------------------------------------------------------------
    // parse_timestamp / day_bounds
    // -----------------------------------------------------------------------

    #[test]
    fn parse_timestamp_accepts_date_only() {
        let ts = parse_timestamp("2025-05-18").unwrap();
        assert_eq!(ts, at(0, 0, 0));
    }

    #[test]
    fn parse_timestamp_accepts_rfc3339() {
        let ts = parse_timestamp("2025-05-18T12:30:00Z").unwrap();
        assert_eq!(ts, at(12, 30, 0));
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("next tuesday").is_none());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("2025-13-40").is_none());
    }

    #[test]
    fn day_bounds_cover_whole_day_inclusive() {
        let (start, end) = day_bounds("2025-05-18".parse().unwrap());
        assert_eq!(start, at(0, 0, 0));
        assert!(end > at(23, 59, 58));
        assert!(end < at(0, 0, 0) + chrono::Duration::days(1));
    }

    // -----------------------------------------------------------------------
    // page_param / total_pages
    // -----------------------------------------------------------------------

    #[test]
    fn page_param_falls_back_on_missing_or_invalid() {
        assert_eq!(page_param(None, 20), 20);
        assert_eq!(page_param(Some("abc"), 20), 20);
        assert_eq!(page_param(Some("0"), 20), 20);
        assert_eq!(page_param(Some("-3"), 1), 1);
        assert_eq!(page_param(Some("7"), 20), 7);
    }

    #[test]
    fn page_param_rejects_oversized_values() {
        assert_eq!(page_param(Some("9223372036854775807"), 20), 20);
        assert_eq!(page_param(Some("1000001"), 20), 20);
        assert_eq!(page_param(Some(&MAX_PAGE_PARAM.to_string()), 20), MAX_PAGE_PARAM);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 20), 1);
    }

    #[test]
    fn total_pages_saturates_on_huge_limits() {
        assert_eq!(total_pages(25, i64::MAX), 1);
        assert_eq!(total_pages(0, i64::MAX), 0);
    }

    // -----------------------------------------------------------------------
    // bucket_by_hour
    // -----------------------------------------------------------------------

    #[test]
    fn bucket_by_hour_is_sparse_and_averaged() {
        let readings = vec![
            reading(10.0, at(3, 5, 0)),
            reading(20.0, at(3, 40, 0)),
            reading(7.0, at(14, 0, 0)),
        ];

        let buckets = bucket_by_hour(&readings);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0], HourlyAverage { hour: 3, average: 15.0 });
        assert_eq!(buckets[1], HourlyAverage { hour: 14, average: 7.0 });
    }

    #[test]
    fn bucket_by_hour_empty_input() {
        assert!(bucket_by_hour(&[]).is_empty());
    }

    // -----------------------------------------------------------------------
    // sample_equidistant
    // -----------------------------------------------------------------------

    #[test]
    fn sampling_45_rows_uses_stride_two() {
        let readings: Vec<Reading> = (0..45)
            .map(|i| reading(i as f64, at(0, 0, 0) + chrono::Duration::minutes(i)))
            .collect();

        let samples = sample_equidistant(&readings, 20);
        assert_eq!(samples.len(), 20);
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(sample.value, (i * 2) as f64);
        }
    }

    #[test]
    fn sampling_fewer_rows_than_points_returns_all() {
        let readings: Vec<Reading> = (0..5)
            .map(|i| reading(i as f64, at(0, 0, 0) + chrono::Duration::minutes(i)))
            .collect();

        let samples = sample_equidistant(&readings, 20);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[4].value, 4.0);
    }

    #[test]
    fn sampling_empty_window_is_empty() {
        assert!(sample_equidistant(&[], 20).is_empty());
    }

    // -----------------------------------------------------------------------
    // Store-backed operations
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn range_is_inclusive_and_ascending() {
        let store = MemoryReadingStore::new();
        store.seed(ReadingKind::Temperature, 1.0, at(9, 0, 0)).await;
        store.seed(ReadingKind::Temperature, 2.0, at(10, 0, 0)).await;
        store.seed(ReadingKind::Temperature, 3.0, at(11, 0, 0)).await;
        store.seed(ReadingKind::Temperature, 4.0, at(12, 0, 0)).await;
        // Other kind must never leak into the window.
        store.seed(ReadingKind::AirQuality, 99.0, at(10, 30, 0)).await;

        let rows = range(&store, ReadingKind::Temperature, at(10, 0, 0), at(11, 0, 0))
            .await
            .unwrap();
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn average_over_empty_window_is_none() {
        let store = MemoryReadingStore::new();
        let avg = average(&store, ReadingKind::Temperature, at(0, 0, 0), at(23, 0, 0))
            .await
            .unwrap();
        assert_eq!(avg, None);
    }

    #[tokio::test]
    async fn stats_count_matches_range_cardinality() {
        let store = MemoryReadingStore::new();
        for i in 0..7 {
            store
                .seed(ReadingKind::AirQuality, i as f64, at(8, i, 0))
                .await;
        }

        let from = at(0, 0, 0);
        let to = at(23, 0, 0);
        let s = stats(&store, ReadingKind::AirQuality, from, to).await.unwrap();
        let rows = range(&store, ReadingKind::AirQuality, from, to).await.unwrap();
        assert_eq!(s.count, rows.len() as i64);
        assert_eq!(s.min, Some(0.0));
        assert_eq!(s.max, Some(6.0));
        assert_eq!(s.average, Some(3.0));
    }

    #[tokio::test]
    async fn pagination_second_page_of_25() {
        let store = MemoryReadingStore::new();
        for i in 0..25 {
            store
                .seed(
                    ReadingKind::Temperature,
                    i as f64,
                    at(0, 0, 0) + chrono::Duration::minutes(i),
                )
                .await;
        }

        let page = paginated(&store, ReadingKind::Temperature, 2, 10).await.unwrap();
        assert_eq!(page.total_records, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 10);
        // Descending order: page 2 holds the 11th..20th most recent.
        assert_eq!(page.data[0].value, 14.0);
        assert_eq!(page.data[9].value, 5.0);
    }

    #[tokio::test]
    async fn pagination_with_extreme_inputs_does_not_overflow() {
        let store = MemoryReadingStore::new();
        for i in 0..3u32 {
            store
                .seed(ReadingKind::Temperature, i as f64, at(1, i, 0))
                .await;
        }

        // Past-the-end page with a huge limit: empty page, sane totals.
        let page = paginated(&store, ReadingKind::Temperature, 2, i64::MAX)
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total_records, 3);
        assert_eq!(page.total_pages, 1);

        // Both parameters at the extreme must still not panic.
        let page = paginated(&store, ReadingKind::Temperature, i64::MAX, i64::MAX)
            .await
            .unwrap();
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn hourly_average_over_store_day() {
        let store = MemoryReadingStore::new();
        store.seed(ReadingKind::Temperature, 10.0, at(3, 10, 0)).await;
        store.seed(ReadingKind::Temperature, 20.0, at(3, 50, 0)).await;
        store.seed(ReadingKind::Temperature, 7.5, at(14, 0, 0)).await;
        // A different day must not contribute to the buckets.
        store
            .seed(
                ReadingKind::Temperature,
                100.0,
                at(3, 0, 0) + chrono::Duration::days(1),
            )
            .await;

        let buckets = hourly_average(&store, ReadingKind::Temperature, "2025-05-18".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(
            buckets,
            vec![
                HourlyAverage { hour: 3, average: 15.0 },
                HourlyAverage { hour: 14, average: 7.5 },
            ]
        );
    }

    #[tokio::test]
    async fn combined_stats_reports_both_kinds_independently() {
        let store = MemoryReadingStore::new();
        store.seed(ReadingKind::Temperature, 18.0, at(9, 0, 0)).await;
        store.seed(ReadingKind::Temperature, 22.0, at(10, 0, 0)).await;

        let combined = combined_stats(&store, at(0, 0, 0), at(23, 0, 0)).await.unwrap();
        assert_eq!(combined.temperature.stats.count, 2);
        assert_eq!(combined.temperature.stats.average, Some(20.0));
        assert_eq!(combined.temperature.samples.len(), 2);

        // No air readings: null aggregates, count 0, no samples.
        assert_eq!(combined.air.stats.count, 0);
        assert_eq!(combined.air.stats.average, None);
        assert!(combined.air.samples.is_empty());
    }
}
