use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{Reading, ReadingKind, WindowStats};

/// Persistence boundary for readings.
///
/// Readings are insert-only: the store assigns `id` and `created_at`, and all
/// retrieval is windowed on `created_at` with inclusive bounds. Aggregates
/// (avg/min/max/count) are pushed down to the store; bucketing and sampling
/// happen in-process over `range_asc` results.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert(
        &self,
        kind: ReadingKind,
        value: f64,
        source: Option<String>,
    ) -> Result<Reading>;

    async fn count(&self, kind: ReadingKind) -> Result<i64>;

    /// One page of readings ordered by `created_at` descending.
    async fn page_desc(&self, kind: ReadingKind, offset: i64, limit: i64) -> Result<Vec<Reading>>;

    /// All readings with `created_at` in `[from, to]`, ascending.
    async fn range_asc(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>>;

    /// Aggregates over `[from, to]`; null avg/min/max and count 0 when empty.
    async fn window_stats(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<WindowStats>;
}

#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(
        &self,
        kind: ReadingKind,
        value: f64,
        source: Option<String>,
    ) -> Result<Reading> {
        let reading = sqlx::query_as::<_, Reading>(
            r#"
            INSERT INTO readings (kind, value, source)
            VALUES ($1, $2, $3)
            RETURNING id, kind, value, source, created_at
            "#,
        )
        .bind(kind)
        .bind(value)
        .bind(source)
        .fetch_one(&self.pool)
        .await?;

        Ok(reading)
    }

    async fn count(&self, kind: ReadingKind) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM readings WHERE kind = $1")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn page_desc(&self, kind: ReadingKind, offset: i64, limit: i64) -> Result<Vec<Reading>> {
        let rows = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, kind, value, source, created_at
            FROM readings
            WHERE kind = $1
            ORDER BY created_at DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(kind)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn range_asc(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let rows = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, kind, value, source, created_at
            FROM readings
            WHERE kind = $1
              AND created_at >= $2
              AND created_at <= $3
            ORDER BY created_at ASC
            "#,
        )
        .bind(kind)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn window_stats(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<WindowStats> {
        let stats = sqlx::query_as::<_, WindowStats>(
            r#"
            SELECT AVG(value)  AS average,
                   MIN(value)  AS min,
                   MAX(value)  AS max,
                   COUNT(*)    AS count
            FROM readings
            WHERE kind = $1
              AND created_at >= $2
              AND created_at <= $3
            "#,
        )
        .bind(kind)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
