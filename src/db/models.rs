use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Mirrors the `reading_kind` Postgres enum.
///
/// Each kind maps to exactly one broker topic and one payload value field
/// (`degrees` for temperature, `airQuality` for air quality).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "reading_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReadingKind {
    Temperature,
    AirQuality,
}

impl ReadingKind {
    pub const ALL: [ReadingKind; 2] = [ReadingKind::Temperature, ReadingKind::AirQuality];

    /// Name of the numeric field carried by broker payloads and POST bodies
    /// of this kind.
    pub fn value_field(self) -> &'static str {
        match self {
            ReadingKind::Temperature => "degrees",
            ReadingKind::AirQuality => "airQuality",
        }
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadingKind::Temperature => "temperature",
            ReadingKind::AirQuality => "air_quality",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reading {
    pub id: Uuid,
    pub kind: ReadingKind,
    pub value: f64,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Store-computed aggregates over one `[from, to]` window of a single kind.
///
/// `average`/`min`/`max` are `None` when the window holds no readings;
/// `count` is always the number of matching rows.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct WindowStats {
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_value_fields_match_payload_convention() {
        assert_eq!(ReadingKind::Temperature.value_field(), "degrees");
        assert_eq!(ReadingKind::AirQuality.value_field(), "airQuality");
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReadingKind::AirQuality).unwrap(),
            "\"air_quality\""
        );
        assert_eq!(
            serde_json::to_string(&ReadingKind::Temperature).unwrap(),
            "\"temperature\""
        );
    }

    #[test]
    fn kind_display_matches_serde() {
        for kind in ReadingKind::ALL {
            let via_serde = serde_json::to_string(&kind).unwrap();
            assert_eq!(via_serde, format!("\"{kind}\""));
        }
    }
}
