use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::warn;
use utoipa::OpenApi;

use super::{
    dto::{
        AverageResponse, CombinedStatsResponse, CreateReadingBody, HourlyAverageDto, KindStatsDto,
        NewReadingEvent, PaginatedResponse, PaginationDto, ReadingDto, StatsResponse,
    },
    errors::ApiError,
    AppState,
};
use crate::analytics::{self, DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::db::models::{Reading, ReadingKind};

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Raw strings on purpose: invalid or non-numeric values fall back to the
/// defaults instead of failing deserialization with a 400.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DateParam {
    pub date: Option<String>,
}

/// Both bounds are required; either missing or unparsable is a request error.
fn parse_window(params: &WindowParams) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let (Some(from), Some(to)) = (params.from.as_deref(), params.to.as_deref()) else {
        return Err(ApiError::bad_request("from and to required"));
    };
    let from = analytics::parse_timestamp(from)
        .ok_or_else(|| ApiError::bad_request(format!("invalid 'from' date: {from}")))?;
    let to = analytics::parse_timestamp(to)
        .ok_or_else(|| ApiError::bad_request(format!("invalid 'to' date: {to}")))?;
    Ok((from, to))
}

fn parse_date(params: &DateParam) -> Result<NaiveDate, ApiError> {
    let raw = params
        .date
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("date required (YYYY-MM-DD)"))?;
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid date: {raw}")))
}

// ---------------------------------------------------------------------------
// Per-kind handlers
// ---------------------------------------------------------------------------

/// Paginated listing of one kind, most recent first.
#[utoipa::path(
    get,
    path = "/{kind}",
    params(
        ("kind" = ReadingKind, Path, description = "Reading kind"),
        ("page" = Option<String>, Query, description = "Page number (default 1)"),
        ("limit" = Option<String>, Query, description = "Page size (default 20)"),
    ),
    responses(
        (status = 200, description = "One page of readings, newest first", body = PaginatedResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(state): State<AppState>,
    Path(kind): Path<ReadingKind>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse>, ApiError> {
    let page = analytics::page_param(params.page.as_deref(), DEFAULT_PAGE);
    let limit = analytics::page_param(params.limit.as_deref(), DEFAULT_LIMIT);

    let result = analytics::paginated(state.store.as_ref(), kind, page, limit).await?;
    Ok(Json(result.into()))
}

/// All of today's readings of one kind (UTC day), ascending.
#[utoipa::path(
    get,
    path = "/{kind}/today",
    params(("kind" = ReadingKind, Path, description = "Reading kind")),
    responses(
        (status = 200, description = "Today's readings, ascending", body = Vec<ReadingDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn today_readings(
    State(state): State<AppState>,
    Path(kind): Path<ReadingKind>,
) -> Result<Json<Vec<ReadingDto>>, ApiError> {
    let rows = analytics::today(state.store.as_ref(), kind).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Readings of one kind with `createdAt` in `[from, to]`, ascending.
#[utoipa::path(
    get,
    path = "/{kind}/range",
    params(
        ("kind" = ReadingKind, Path, description = "Reading kind"),
        ("from" = String, Query, description = "Window start (RFC3339 or YYYY-MM-DD)"),
        ("to" = String, Query, description = "Window end (RFC3339 or YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Readings in the window, ascending", body = Vec<ReadingDto>),
        (status = 400, description = "Missing or unparsable bound"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn range_readings(
    State(state): State<AppState>,
    Path(kind): Path<ReadingKind>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<ReadingDto>>, ApiError> {
    let (from, to) = parse_window(&params)?;
    let rows = analytics::range(state.store.as_ref(), kind, from, to).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Arithmetic mean of one kind's values over a window; null when empty.
#[utoipa::path(
    get,
    path = "/{kind}/average",
    params(
        ("kind" = ReadingKind, Path, description = "Reading kind"),
        ("from" = String, Query, description = "Window start"),
        ("to" = String, Query, description = "Window end"),
    ),
    responses(
        (status = 200, description = "Average over the window", body = AverageResponse),
        (status = 400, description = "Missing or unparsable bound"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn average(
    State(state): State<AppState>,
    Path(kind): Path<ReadingKind>,
    Query(params): Query<WindowParams>,
) -> Result<Json<AverageResponse>, ApiError> {
    let (from, to) = parse_window(&params)?;
    let average = analytics::average(state.store.as_ref(), kind, from, to).await?;
    Ok(Json(AverageResponse { average }))
}

/// Average/min/max/count of one kind over a window.
#[utoipa::path(
    get,
    path = "/{kind}/stats",
    params(
        ("kind" = ReadingKind, Path, description = "Reading kind"),
        ("from" = String, Query, description = "Window start"),
        ("to" = String, Query, description = "Window end"),
    ),
    responses(
        (status = 200, description = "Statistics over the window", body = StatsResponse),
        (status = 400, description = "Missing or unparsable bound"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn kind_stats(
    State(state): State<AppState>,
    Path(kind): Path<ReadingKind>,
    Query(params): Query<WindowParams>,
) -> Result<Json<StatsResponse>, ApiError> {
    let (from, to) = parse_window(&params)?;
    let stats = analytics::stats(state.store.as_ref(), kind, from, to).await?;
    Ok(Json(stats.into()))
}

/// Sparse per-hour averages of one kind for a single day.
#[utoipa::path(
    get,
    path = "/{kind}/hourly-average",
    params(
        ("kind" = ReadingKind, Path, description = "Reading kind"),
        ("date" = String, Query, description = "Day to bucket (YYYY-MM-DD)"),
    ),
    responses(
        (status = 200, description = "Hours with readings and their averages", body = Vec<HourlyAverageDto>),
        (status = 400, description = "Missing or unparsable date"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn hourly_average(
    State(state): State<AppState>,
    Path(kind): Path<ReadingKind>,
    Query(params): Query<DateParam>,
) -> Result<Json<Vec<HourlyAverageDto>>, ApiError> {
    let date = parse_date(&params)?;
    let buckets = analytics::hourly_average(state.store.as_ref(), kind, date).await?;
    Ok(Json(buckets.into_iter().map(Into::into).collect()))
}

/// Create one reading over HTTP; same validation and broadcast as the
/// broker path.
#[utoipa::path(
    post,
    path = "/{kind}",
    params(("kind" = ReadingKind, Path, description = "Reading kind")),
    request_body = CreateReadingBody,
    responses(
        (status = 201, description = "Created reading", body = ReadingDto),
        (status = 400, description = "Missing or non-numeric value field"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn create_reading(
    State(state): State<AppState>,
    Path(kind): Path<ReadingKind>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<ReadingDto>), ApiError> {
    let reading = state.ingest.ingest(kind, &payload).await?;
    Ok((StatusCode::CREATED, Json(reading.into())))
}

// ---------------------------------------------------------------------------
// Combined statistics
// ---------------------------------------------------------------------------

/// Per-kind statistics over one window, with up to 20 equidistant samples
/// per kind.
#[utoipa::path(
    get,
    path = "/stats",
    params(
        ("from" = String, Query, description = "Window start"),
        ("to" = String, Query, description = "Window end"),
    ),
    responses(
        (status = 200, description = "Statistics for both kinds", body = CombinedStatsResponse),
        (status = 400, description = "Missing or unparsable bound"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "analytics"
)]
pub async fn combined_stats(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<CombinedStatsResponse>, ApiError> {
    let (from, to) = parse_window(&params)?;
    let combined = analytics::combined_stats(state.store.as_ref(), from, to).await?;
    Ok(Json(combined.into()))
}

// ---------------------------------------------------------------------------
// Real-time channel
// ---------------------------------------------------------------------------

/// WebSocket endpoint pushing every newly persisted reading to the observer
/// as a `new_reading` event. No backlog: events published before the
/// connection are never replayed.
pub async fn live_readings(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rx = state.broadcaster.subscribe();
    ws.on_upgrade(move |socket| stream_readings(socket, rx))
}

async fn stream_readings(mut socket: WebSocket, mut rx: broadcast::Receiver<Reading>) {
    loop {
        tokio::select! {
            inbound = socket.recv() => match inbound {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
            reading = rx.recv() => match reading {
                Ok(reading) => {
                    let event = NewReadingEvent::from_reading(reading);
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        // This observer is gone; others are unaffected.
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Slow observer dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy")),
    tag = "system"
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        list_readings,
        today_readings,
        range_readings,
        average,
        kind_stats,
        hourly_average,
        create_reading,
        combined_stats,
        health,
    ),
    components(schemas(
        ReadingDto,
        ReadingKind,
        CreateReadingBody,
        PaginatedResponse,
        PaginationDto,
        AverageResponse,
        StatsResponse,
        HourlyAverageDto,
        KindStatsDto,
        CombinedStatsResponse,
        NewReadingEvent,
    )),
    tags(
        (name = "readings", description = "Reading ingestion and listing"),
        (name = "analytics", description = "Time-windowed aggregation"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "Telemetry Service API",
        version = "0.1.0",
        description = "REST API for sensor telemetry ingestion and analytics"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
