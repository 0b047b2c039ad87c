use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use services::{
    AppServices, Clock, IngestRequest, IngestResponse, ProgressServiceError, ProgressSnapshot,
    UserProgressItem, ValidationError,
};
use watch_core::model::{ProgressKey, UserId, VideoId};

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    services: AppServices,
    clock: Clock,
    environment: Arc<str>,
    port: u16,
}

impl AppState {
    #[must_use]
    pub fn new(
        services: AppServices,
        clock: Clock,
        environment: impl Into<Arc<str>>,
        port: u16,
    ) -> Self {
        Self {
            services,
            clock,
            environment: environment.into(),
            port,
        }
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Handler failure rendered as `{ "error": ... }`.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Internal(&'static str),
}

impl ApiError {
    /// Client mistakes keep their message; backend failures get `public` and a log line.
    fn from_service(err: ProgressServiceError, public: &'static str) -> Self {
        if err.is_client_error() {
            Self::BadRequest(err.to_string())
        } else {
            error!(error = %err, "{public}");
            Self::Internal(public)
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

//
// ─── ROUTER ────────────────────────────────────────────────────────────────────
//

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/progress", get(get_progress).post(post_progress))
        .route("/api/user/{user_id}/progress", get(list_user_progress))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// Allow-list CORS with credentials; an empty list allows any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!(origin = %origin, "ignoring unusable CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CACHE_CONTROL,
            header::PRAGMA,
            HeaderName::from_static("x-requested-with"),
        ]))
        .allow_credentials(true)
}

//
// ─── HANDLERS ──────────────────────────────────────────────────────────────────
//

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "timestamp": state.clock.now().to_rfc3339(),
        "environment": &*state.environment,
        "port": state.port,
        "store": state.services.storage_kind().as_str(),
    }))
}

async fn post_progress(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state
        .services
        .progress()
        .ingest_request(request)
        .await
        .map_err(|err| ApiError::from_service(err, "Failed to save progress"))?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressQuery {
    user_id: Option<String>,
    video_id: Option<String>,
}

impl ProgressQuery {
    fn into_key(self) -> Result<ProgressKey, ValidationError> {
        let user_id = UserId::new(self.user_id.ok_or(ValidationError::MissingField("userId"))?)?;
        let video_id =
            VideoId::new(self.video_id.ok_or(ValidationError::MissingField("videoId"))?)?;
        Ok(ProgressKey::new(user_id, video_id))
    }
}

async fn get_progress(
    State(state): State<AppState>,
    query: Result<Query<ProgressQuery>, QueryRejection>,
) -> Result<Json<ProgressSnapshot>, ApiError> {
    let Query(query) = query?;
    let key = query.into_key()?;
    let snapshot = state
        .services
        .progress()
        .get_progress(&key)
        .await
        .map_err(|err| ApiError::from_service(err, "Failed to retrieve progress"))?;
    Ok(Json(snapshot))
}

async fn list_user_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<UserProgressItem>>, ApiError> {
    let user_id = UserId::new(user_id).map_err(ValidationError::from)?;
    let items = state
        .services
        .progress()
        .list_user_progress(&user_id)
        .await
        .map_err(|err| ApiError::from_service(err, "Failed to retrieve user progress"))?;
    Ok(Json(items))
}

async fn not_found(method: Method, uri: Uri) -> Response {
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    warn!(%method, path = %path, "route not found");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Route not found",
            "path": path,
            "method": method.as_str(),
        })),
    )
        .into_response()
}
