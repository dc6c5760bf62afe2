use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, ErrorInfo};
use crate::metrics::RequestCounts;

/// Normalized envelope returned for every API outcome.
///
/// Only [`ApiResponse::success`] and [`ApiResponse::failure`] construct one,
/// so exactly one of `data` / `error` is ever present.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    request_id: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiResponse {
    pub fn success(data: Value, request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            request_id: request_id.into(),
            status: StatusCode::OK,
        }
    }

    pub fn failure(error: &ApiError, request_id: impl Into<String>, expose_details: bool) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_info(expose_details)),
            request_id: request_id.into(),
            status: error.status(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    /// Seconds since the service started
    pub uptime: f64,
    pub request_count: u64,
    /// Breakdown by outcome, including requests turned away by the rate limiter
    pub requests: RequestCounts,
    pub has_custom_api_key: bool,
    pub environment: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct EndpointDoc {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub window_minutes: u64,
    pub max_requests: u64,
}

/// Static description of the API surface served at `/`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDocs {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointDoc>,
    pub rate_limit: RateLimitPolicy,
}

impl ApiDocs {
    pub fn new(rate_limit: RateLimitPolicy) -> Self {
        Self {
            name: "APOD Proxy API",
            version: env!("CARGO_PKG_VERSION"),
            description: "Proxy for NASA's Astronomy Picture of the Day API",
            endpoints: vec![
                EndpointDoc {
                    method: "GET",
                    path: "/",
                    description: "This documentation",
                },
                EndpointDoc {
                    method: "GET",
                    path: "/health",
                    description: "Service status, uptime and request count",
                },
                EndpointDoc {
                    method: "GET",
                    path: "/api/apod",
                    description: "Today's Astronomy Picture of the Day",
                },
                EndpointDoc {
                    method: "GET",
                    path: "/api/apod/:date",
                    description: "Picture for a date (YYYY-MM-DD, from 1995-06-16 to today)",
                },
            ],
            rate_limit,
        }
    }
}
