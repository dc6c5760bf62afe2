use axum::{
    extract::{rejection::PathRejection, Path, Request, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::config::Config;
use crate::error::ApiError;
use crate::health::HealthChecker;
use crate::metrics::RequestMetrics;
use crate::middleware::RequestContext;
use crate::rate_limiter::RateLimiter;
use crate::response::{ApiDocs, ApiResponse, RateLimitPolicy};
use crate::upstream::ApodSource;
use crate::validation::{validate_date_today, INVALID_DATE_FORMAT};

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Everything a request needs, injected once at start-up
pub struct AppState {
    pub config: Config,
    pub apod: Arc<dyn ApodSource>,
    pub rate_limiter: RateLimiter,
    pub metrics: RequestMetrics,
    pub health: HealthChecker,
}

impl AppState {
    pub fn new(config: Config, apod: Arc<dyn ApodSource>) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window());
        let metrics = RequestMetrics::new();
        let health = HealthChecker::new(metrics.clone());

        Self {
            config,
            apod,
            rate_limiter,
            metrics,
            health,
        }
    }
}

/// API documentation
pub async fn root(State(state): State<SharedState>) -> impl IntoResponse {
    Json(ApiDocs::new(RateLimitPolicy {
        window_minutes: state.rate_limiter.window().as_secs() / 60,
        max_requests: state.rate_limiter.max_requests(),
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.health.check_health(&state.config))
}

/// Today's picture
pub async fn get_apod_today(
    State(state): State<SharedState>,
    Extension(context): Extension<RequestContext>,
) -> Response {
    serve_apod(&state, context, Ok(None)).await
}

/// Picture for the `:date` segment. A segment that cannot be decoded is a
/// malformed date, never "today".
pub async fn get_apod_for_date(
    State(state): State<SharedState>,
    Extension(context): Extension<RequestContext>,
    date: Result<Path<String>, PathRejection>,
) -> Response {
    let date = date.map(|Path(date)| Some(date)).map_err(|rejection| {
        debug!(
            request_id = %context.request_id,
            rejection = %rejection,
            "Undecodable date segment"
        );
        ApiError::validation("date", INVALID_DATE_FORMAT)
    });
    serve_apod(&state, context, date).await
}

async fn serve_apod(
    state: &AppState,
    context: RequestContext,
    date: Result<Option<String>, ApiError>,
) -> Response {
    state.metrics.record_request();

    let (date, result) = match date {
        Ok(date) => {
            let result = fetch_apod(state, date.as_deref()).await;
            (date, result)
        }
        Err(err) => (Some("<undecodable>".to_string()), Err(err)),
    };
    state.metrics.record_outcome(result.is_ok());
    let date = date.as_deref().unwrap_or("today");

    match result {
        Ok(record) => {
            info!(
                request_id = %context.request_id,
                received_at = %context.received_at,
                date,
                outcome = "success",
                "APOD request served"
            );
            ApiResponse::success(record, context.request_id).into_response()
        }
        Err(err) => {
            warn!(
                request_id = %context.request_id,
                received_at = %context.received_at,
                date,
                outcome = "failed",
                error_type = ?err.error_type(),
                status = err.status().as_u16(),
                error = %err,
                "APOD request failed"
            );
            ApiResponse::failure(&err, context.request_id, state.config.is_development())
                .into_response()
        }
    }
}

async fn fetch_apod(state: &AppState, date: Option<&str>) -> Result<Value, ApiError> {
    validate_date_today(date)?;

    state.apod.fetch(date).await.map_err(|err| {
        warn!(error = %err, "Upstream APOD call failed");
        ApiError::from(classify(&err))
    })
}

/// Catch-all for unknown routes and unsupported methods
pub async fn not_found(State(state): State<SharedState>, request: Request) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|context| context.request_id.clone())
        .unwrap_or_else(|| RequestContext::new("unknown").request_id);

    let err = ApiError::NotFound {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
    };
    ApiResponse::failure(&err, request_id, state.config.is_development()).into_response()
}
