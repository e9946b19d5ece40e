//! In-memory `ReadingStore` used by unit and HTTP tests. Mirrors the
//! Postgres implementation's semantics: server-assigned id/created_at,
//! inclusive windows, null aggregates over empty windows.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Reading, ReadingKind, WindowStats};
use super::store::ReadingStore;

#[derive(Clone, Default)]
pub struct MemoryReadingStore {
    rows: Arc<RwLock<Vec<Reading>>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reading with an explicit timestamp, for seeding windows.
    pub async fn seed(&self, kind: ReadingKind, value: f64, created_at: DateTime<Utc>) -> Reading {
        let reading = Reading {
            id: Uuid::new_v4(),
            kind,
            value,
            source: None,
            created_at,
        };
        self.rows.write().await.push(reading.clone());
        reading
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert(
        &self,
        kind: ReadingKind,
        value: f64,
        source: Option<String>,
    ) -> Result<Reading> {
        let reading = Reading {
            id: Uuid::new_v4(),
            kind,
            value,
            source,
            created_at: Utc::now(),
        };
        self.rows.write().await.push(reading.clone());
        Ok(reading)
    }

    async fn count(&self, kind: ReadingKind) -> Result<i64> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|r| r.kind == kind).count() as i64)
    }

    async fn page_desc(&self, kind: ReadingKind, offset: i64, limit: i64) -> Result<Vec<Reading>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Reading> =
            rows.iter().filter(|r| r.kind == kind).cloned().collect();
        matching.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn range_asc(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Reading> = rows
            .iter()
            .filter(|r| r.kind == kind && r.created_at >= from && r.created_at <= to)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }

    async fn window_stats(
        &self,
        kind: ReadingKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<WindowStats> {
        let matching = self.range_asc(kind, from, to).await?;
        let count = matching.len() as i64;
        if count == 0 {
            return Ok(WindowStats {
                average: None,
                min: None,
                max: None,
                count: 0,
            });
        }
        let values: Vec<f64> = matching.iter().map(|r| r.value).collect();
        let sum: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(WindowStats {
            average: Some(sum / count as f64),
            min: Some(min),
            max: Some(max),
            count,
        })
    }
}
