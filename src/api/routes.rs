use crate::config::Config;
use crate::db::{DayCountRow, Database, HourCountRow, Settings, SettingsUpdate, TopSiteRow};
use crate::tracker::minutes::current_minute_of_day;
use crate::tracker::ranker::BookmarkEntry;
use crate::tracker::{self, TrackerError, VisitRequest};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

const STATS_TOP_SITES: usize = 20;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/track", post(track))
        .route("/api/bookmarks", get(bookmarks))
        .route(
            "/api/bookmarks/:domain",
            put(bookmark_update).delete(bookmark_delete),
        )
        .route("/api/settings", get(settings_get).put(settings_put))
        .route("/api/stats", get(stats))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct BookmarksQuery {
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookmarkUpdatePayload {
    url: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct TrackPayload {
    success: bool,
    ignored: bool,
}

#[derive(Debug, Serialize)]
struct BookmarksPayload {
    top: Vec<BookmarkEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsPayload {
    top_sites: Vec<TopSiteRow>,
    by_day_of_week: Vec<DayCountRow>,
    by_hour: Vec<HourCountRow>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn track(
    State(state): State<ApiState>,
    Json(payload): Json<VisitRequest>,
) -> ApiResult<Json<TrackPayload>> {
    let mut database = Database::open(&state.config.db_path)?;
    let settings = database.settings()?;

    let outcome = tracker::record_visit(&mut database, &settings, payload, &Local)?;

    Ok(Json(TrackPayload {
        success: true,
        ignored: outcome.ignored,
    }))
}

async fn bookmarks(
    State(state): State<ApiState>,
    Query(query): Query<BookmarksQuery>,
) -> ApiResult<Json<BookmarksPayload>> {
    let requested = query
        .limit
        .as_deref()
        .and_then(|raw| raw.trim().parse::<usize>().ok());
    let limit = state.config.effective_limit(requested);
    let current_minute = current_minute_of_day(&Local::now());

    let database = Database::open(&state.config.db_path)?;
    let top = tracker::list_bookmarks(&database, limit, current_minute)?;

    Ok(Json(BookmarksPayload { top }))
}

async fn bookmark_update(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
    Json(payload): Json<BookmarkUpdatePayload>,
) -> ApiResult<Json<Value>> {
    let database = Database::open(&state.config.db_path)?;
    tracker::update_bookmark(
        &database,
        &domain,
        payload.url.as_deref(),
        payload.title.as_deref(),
    )?;

    Ok(Json(json!({ "success": true })))
}

async fn bookmark_delete(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut database = Database::open(&state.config.db_path)?;
    tracker::delete_bookmark(&mut database, &domain)?;

    Ok(Json(json!({ "success": true })))
}

async fn settings_get(State(state): State<ApiState>) -> ApiResult<Json<Settings>> {
    let database = Database::open(&state.config.db_path)?;
    Ok(Json(database.settings()?))
}

async fn settings_put(
    State(state): State<ApiState>,
    Json(payload): Json<SettingsUpdate>,
) -> ApiResult<Json<Value>> {
    let mut database = Database::open(&state.config.db_path)?;
    let settings = database.save_settings(&payload)?;

    Ok(Json(json!({
        "success": true,
        "mergeToRoot": settings.merge_to_root,
        "ignoredDomains": settings.ignored_domains
    })))
}

async fn stats(State(state): State<ApiState>) -> ApiResult<Json<StatsPayload>> {
    let database = Database::open(&state.config.db_path)?;

    Ok(Json(StatsPayload {
        top_sites: database.top_sites(STATS_TOP_SITES)?,
        by_day_of_week: database.visits_by_weekday()?,
        by_hour: database.visits_by_hour()?,
    }))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<TrackerError> for ApiError {
    fn from(value: TrackerError) -> Self {
        match value {
            TrackerError::NotFound(_) => Self::NotFound("Bookmark not found".to_string()),
            TrackerError::Persistence(error) => Self::Internal(error),
            invalid => Self::BadRequest(invalid.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => {
                error!(error = %error, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
