use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::analytics::{self, HourlyAverage, Page};
use crate::db::models::{Reading, ReadingKind, WindowStats};

/// Wire format of one reading. camelCase to match the broker payload
/// convention (`airQuality`).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingDto {
    pub id: Uuid,
    pub kind: ReadingKind,
    pub value: f64,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Reading> for ReadingDto {
    fn from(r: Reading) -> Self {
        Self {
            id: r.id,
            kind: r.kind,
            value: r.value,
            source: r.source,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: i64,
    pub total_pages: i64,
    pub total_records: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse {
    pub data: Vec<ReadingDto>,
    pub pagination: PaginationDto,
}

impl From<Page> for PaginatedResponse {
    fn from(p: Page) -> Self {
        Self {
            data: p.data.into_iter().map(Into::into).collect(),
            pagination: PaginationDto {
                page: p.page,
                total_pages: p.total_pages,
                total_records: p.total_records,
            },
        }
    }
}

/// `average` is null when the window holds no readings.
#[derive(Debug, Serialize, ToSchema)]
pub struct AverageResponse {
    pub average: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: i64,
}

impl From<WindowStats> for StatsResponse {
    fn from(s: WindowStats) -> Self {
        Self {
            average: s.average,
            min: s.min,
            max: s.max,
            count: s.count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HourlyAverageDto {
    pub hour: u32,
    pub average: f64,
}

impl From<HourlyAverage> for HourlyAverageDto {
    fn from(h: HourlyAverage) -> Self {
        Self {
            hour: h.hour,
            average: h.average,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct KindStatsDto {
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: i64,
    pub samples: Vec<ReadingDto>,
}

impl From<analytics::KindStats> for KindStatsDto {
    fn from(k: analytics::KindStats) -> Self {
        Self {
            average: k.stats.average,
            min: k.stats.min,
            max: k.stats.max,
            count: k.stats.count,
            samples: k.samples.into_iter().map(Into::into).collect(),
        }
    }
}

/// Response of the combined `GET /stats` endpoint, keyed by kind.
#[derive(Debug, Serialize, ToSchema)]
pub struct CombinedStatsResponse {
    pub temperature: KindStatsDto,
    pub air: KindStatsDto,
}

impl From<analytics::CombinedStats> for CombinedStatsResponse {
    fn from(c: analytics::CombinedStats) -> Self {
        Self {
            temperature: c.temperature.into(),
            air: c.air.into(),
        }
    }
}

/// Request body of `POST /{kind}` — exactly one of the value fields applies,
/// matching the kind in the path.
///
/// Schema documentation only: the handler reads the raw JSON itself, so a
/// missing or non-numeric value surfaces as the ingest validation error
/// (400 with a message) rather than a body deserialization failure.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReadingBody {
    /// Temperature value; required for `kind = temperature`.
    pub degrees: Option<f64>,
    /// Air-quality value; required for `kind = air_quality`.
    #[serde(rename = "airQuality")]
    pub air_quality: Option<f64>,
    pub source: Option<String>,
}

/// Event pushed to every live observer when a reading is persisted.
#[derive(Debug, Serialize, ToSchema)]
pub struct NewReadingEvent {
    pub event: &'static str,
    pub kind: ReadingKind,
    pub data: ReadingDto,
}

impl NewReadingEvent {
    pub fn from_reading(reading: Reading) -> Self {
        Self {
            event: "new_reading",
            kind: reading.kind,
            data: reading.into(),
        }
    }
}
