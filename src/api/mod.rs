pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::db::store::ReadingStore;
use crate::ingest::IngestService;
use crate::realtime::ReadingBroadcaster;
use handlers::ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub broadcaster: ReadingBroadcaster,
    pub ingest: IngestService,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, broadcaster: ReadingBroadcaster) -> Self {
        let ingest = IngestService::new(store.clone(), broadcaster.clone());
        Self {
            store,
            broadcaster,
            ingest,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        // Static before dynamic: `/stats` is the combined endpoint, not a kind.
        .route("/stats", get(handlers::combined_stats))
        .route("/live", get(handlers::live_readings))
        .route(
            "/{kind}",
            get(handlers::list_readings).post(handlers::create_reading),
        )
        .route("/{kind}/today", get(handlers::today_readings))
        .route("/{kind}/range", get(handlers::range_readings))
        .route("/{kind}/average", get(handlers::average))
        .route("/{kind}/stats", get(handlers::kind_stats))
        .route("/{kind}/hourly-average", get(handlers::hourly_average))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
