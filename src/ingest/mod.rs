pub mod mqtt;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::db::models::{Reading, ReadingKind};
use crate::db::store::ReadingStore;
use crate::realtime::ReadingBroadcaster;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload's value field is missing, non-numeric, or not finite.
    /// Terminal for that single message, never for the subscriber.
    #[error("{field} must be a finite number")]
    InvalidValue { field: &'static str },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Turns one decoded payload into one persisted reading and notifies
/// observers. Shared by the broker path and the HTTP ingestion path.
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn ReadingStore>,
    broadcaster: ReadingBroadcaster,
}

impl IngestService {
    pub fn new(store: Arc<dyn ReadingStore>, broadcaster: ReadingBroadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// Validate `payload`, persist it as a reading of `kind`, then broadcast.
    ///
    /// The broadcast is best-effort and cannot fail the persistence that
    /// already happened; observers offline at this moment simply miss the
    /// event.
    pub async fn ingest(&self, kind: ReadingKind, payload: &Value) -> Result<Reading, IngestError> {
        let field = kind.value_field();
        let value = payload
            .get(field)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or(IngestError::InvalidValue { field })?;

        let source = payload
            .get("source")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let reading = self.store.insert(kind, value, source).await?;
        debug!(kind = %kind, value, id = %reading.id, "Reading persisted");

        self.broadcaster.publish(reading.clone());
        Ok(reading)
    }
}
