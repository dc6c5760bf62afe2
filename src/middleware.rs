use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::SharedState;
use crate::response::ApiResponse;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request context, stored in the request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub received_at: DateTime<Utc>,
    pub client_ip: String,
}

impl RequestContext {
    pub fn new(client_ip: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            received_at: Utc::now(),
            client_ip: client_ip.into(),
        }
    }
}

/// Outermost middleware: assigns the request id, logs the request, and turns
/// handler panics into an `INTERNAL_SERVER_ERROR` envelope.
pub async fn request_context(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = RequestContext::new(client_ip(&request, state.config.trust_proxy));
    let request_id = context.request_id.clone();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    info!(
        target: "apod_proxy::middleware",
        request_id = %request_id,
        method = %method,
        path = %path,
        client_ip = %context.client_ip,
        "Incoming request"
    );

    request.extensions_mut().insert(context);

    let mut response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(
                target: "apod_proxy::middleware",
                request_id = %request_id,
                method = %method,
                path = %path,
                detail = %detail,
                "Unhandled fault while serving request"
            );
            ApiResponse::failure(
                &ApiError::Internal(detail),
                request_id.clone(),
                state.config.is_development(),
            )
            .into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    info!(
        target: "apod_proxy::middleware",
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

/// Fixed window rate limiting per client IP. Rejected requests never reach
/// the handlers.
pub async fn rate_limit(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let context = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::new(client_ip(&request, state.config.trust_proxy)));
    let expose_details = state.config.is_development();

    let decision = match state.rate_limiter.check(&context.client_ip) {
        Ok(decision) => decision,
        Err(err) => {
            return ApiResponse::failure(&err, context.request_id, expose_details).into_response()
        }
    };

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        state.metrics.record_rate_limited();
        warn!(
            target: "apod_proxy::middleware",
            request_id = %context.request_id,
            client_ip = %context.client_ip,
            limit = decision.limit,
            "Rate limit exceeded"
        );
        let mut response =
            ApiResponse::failure(&ApiError::RateLimited, context.request_id, expose_details)
                .into_response();
        // Round up so clients never retry a moment too early.
        let retry_after = decision.reset_after.as_secs()
            + u64::from(decision.reset_after.subsec_nanos() > 0);
        insert_header(response.headers_mut(), "retry-after", retry_after);
        response
    };

    insert_header(response.headers_mut(), "x-ratelimit-limit", decision.limit);
    insert_header(
        response.headers_mut(),
        "x-ratelimit-remaining",
        decision.remaining,
    );
    response
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
}

/// Identify the client. Forwarding headers are only honoured behind a trusted proxy.
pub fn client_ip(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = request.headers().get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    let first_ip = first_ip.trim();
                    if !first_ip.is_empty() {
                        return first_ip.to_string();
                    }
                }
            }
        }

        if let Some(real_ip) = request.headers().get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                let ip_str = ip_str.trim();
                if !ip_str.is_empty() {
                    return ip_str.to_string();
                }
            }
        }
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(name: &'static str, value: &'static str) -> Request {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .headers_mut()
            .insert(name, HeaderValue::from_static(value));
        request
    }

    #[test]
    fn test_client_ip_with_forwarded_header() {
        let request = request_with("x-forwarded-for", "192.168.1.1, 10.0.0.1");
        assert_eq!(client_ip(&request, true), "192.168.1.1");
    }

    #[test]
    fn test_client_ip_with_real_ip_header() {
        let request = request_with("x-real-ip", "203.0.113.1");
        assert_eq!(client_ip(&request, true), "203.0.113.1");
    }

    #[test]
    fn test_blank_forwarding_headers_fall_back_to_peer() {
        let mut request = request_with("x-real-ip", "  ");
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static(""));
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 1, 2, 3], 4000))));
        assert_eq!(client_ip(&request, true), "10.1.2.3");
    }

    #[test]
    fn test_forwarding_headers_ignored_without_trusted_proxy() {
        let mut request = request_with("x-forwarded-for", "192.168.1.1");
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(client_ip(&request, false), "127.0.0.1");
    }

    #[test]
    fn test_client_ip_fallback() {
        let request = Request::new(axum::body::Body::empty());
        assert_eq!(client_ip(&request, false), "unknown");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "panic with non-string payload");
    }
}
