use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::domain::BannerService;
use crate::error::StorageError;
use crate::models::{CreateBannerRequest, StatsQuery, StatsRangeRequest, StatsResponse};

/// Shared handler state; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub service: BannerService,
}

impl AppState {
    pub fn new(service: BannerService) -> Self {
        Self { service }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/counter/:id",
            get(register_click).fallback(method_not_allowed),
        )
        .route("/stats/:id", post(load_stats).fallback(method_not_allowed))
        .route("/banners", post(create_banner).fallback(method_not_allowed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /counter/:id — registers one click for a banner.
async fn register_click(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let banner_id = match parse_banner_id(&id) {
        Ok(banner_id) => banner_id,
        Err(response) => return response,
    };

    match state.service.save_statistics(banner_id).await {
        Ok(()) => {
            info!(banner_id, "click registered");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => {
            error!(banner_id, error = %err, "failed to register click");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// POST /stats/:id — returns per-minute click counts within [from, to).
async fn load_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StatsRangeRequest>, JsonRejection>,
) -> Response {
    let banner_id = match parse_banner_id(&id) {
        Ok(banner_id) => banner_id,
        Err(response) => return response,
    };
    let req = match require_json(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    let Some(from) = parse_flexible_time(&req.from) else {
        warn!(from = %req.from, "invalid 'from' time format");
        return (StatusCode::BAD_REQUEST, "invalid 'from' time format").into_response();
    };
    let Some(to) = parse_flexible_time(&req.to) else {
        warn!(to = %req.to, "invalid 'to' time format");
        return (StatusCode::BAD_REQUEST, "invalid 'to' time format").into_response();
    };

    let query = StatsQuery {
        banner_id,
        from,
        to,
    };
    match state.service.load_stats(query).await {
        Ok(stats) => {
            info!(banner_id, rows = stats.len(), "stats loaded");
            (StatusCode::OK, Json(StatsResponse { stats })).into_response()
        }
        Err(err) => {
            error!(banner_id, error = %err, "failed to load stats");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// POST /banners — creates a banner with a unique name.
async fn create_banner(
    State(state): State<AppState>,
    body: Result<Json<CreateBannerRequest>, JsonRejection>,
) -> Response {
    let req = match require_json(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match state.service.create_banner(&req.name).await {
        Ok(()) => {
            info!(name = %req.name, "banner created");
            (StatusCode::CREATED, Json(json!({ "status": "created" }))).into_response()
        }
        Err(StorageError::NameConflict) => {
            warn!(name = %req.name, "banner name already exists");
            (
                StatusCode::CONFLICT,
                Json(json!({ "error": "banner name already exists" })),
            )
                .into_response()
        }
        Err(err) => {
            error!(name = %req.name, error = %err, "failed to create banner");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
}

fn parse_banner_id(id: &str) -> Result<i64, Response> {
    id.parse::<i64>().map_err(|_| {
        warn!(banner_id = %id, "invalid banner ID");
        (StatusCode::BAD_REQUEST, "invalid banner ID").into_response()
    })
}

/// Any extraction failure (syntax, type mismatch, missing content type) is a
/// client error.
fn require_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match body {
        Ok(Json(req)) => Ok(req),
        Err(rejection) => {
            warn!(error = %rejection, "invalid JSON body");
            Err((StatusCode::BAD_REQUEST, "invalid JSON body").into_response())
        }
    }
}

const NAIVE_TIME_LAYOUTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.6f"];

/// Tries the accepted timestamp layouts in order, succeeding on the first
/// match. Layouts without an offset are interpreted as UTC.
fn parse_flexible_time(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    NAIVE_TIME_LAYOUTS.iter().find_map(|layout| {
        NaiveDateTime::parse_from_str(value, layout)
            .ok()
            .map(|t| Utc.from_utc_datetime(&t))
    })
}
