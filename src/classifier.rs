//! Maps upstream failures onto the client-facing error taxonomy.

use crate::error::{ApiError, ErrorType};
use crate::upstream::UpstreamError;
use axum::http::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub error_type: ErrorType,
    pub status: StatusCode,
    pub message: String,
}

fn default_message(error_type: ErrorType) -> &'static str {
    match error_type {
        ErrorType::TimeoutError => "Request to NASA API timed out. Please try again.",
        ErrorType::NetworkError => "Unable to reach NASA API. Please try again later.",
        ErrorType::RateLimitError => "NASA API rate limit exceeded. Please try again later.",
        ErrorType::ValidationError => "Invalid request parameters",
        ErrorType::AuthError => "Invalid or missing NASA API key",
        ErrorType::NasaServerError => {
            "NASA API is temporarily unavailable. Please try again later."
        }
        ErrorType::NasaApiError => "NASA API request failed",
        ErrorType::NotFoundError => "Resource not found",
        ErrorType::InternalServerError => "Internal server error",
        ErrorType::UnknownError => "An unexpected error occurred",
    }
}

/// Classify a failed upstream call. Pure; the same input always yields the
/// same classification.
pub fn classify(error: &UpstreamError) -> Classification {
    match error {
        UpstreamError::Timeout(_) => fixed(ErrorType::TimeoutError, StatusCode::REQUEST_TIMEOUT),
        UpstreamError::Connect(_) => {
            fixed(ErrorType::NetworkError, StatusCode::SERVICE_UNAVAILABLE)
        }
        UpstreamError::Status {
            status, message, ..
        } => classify_status(*status, message.as_deref()),
        UpstreamError::Transport(_) | UpstreamError::Decode(_) => {
            fixed(ErrorType::UnknownError, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn classify_status(status: u16, upstream_message: Option<&str>) -> Classification {
    match status {
        429 => fixed(ErrorType::RateLimitError, StatusCode::TOO_MANY_REQUESTS),
        400 => with_upstream_message(
            ErrorType::ValidationError,
            StatusCode::BAD_REQUEST,
            upstream_message,
        ),
        403 => fixed(ErrorType::AuthError, StatusCode::FORBIDDEN),
        500..=u16::MAX => fixed(ErrorType::NasaServerError, StatusCode::SERVICE_UNAVAILABLE),
        400..=499 => match StatusCode::from_u16(status) {
            Ok(code) => with_upstream_message(ErrorType::NasaApiError, code, upstream_message),
            Err(_) => fixed(ErrorType::UnknownError, StatusCode::INTERNAL_SERVER_ERROR),
        },
        _ => fixed(ErrorType::UnknownError, StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn fixed(error_type: ErrorType, status: StatusCode) -> Classification {
    with_upstream_message(error_type, status, None)
}

fn with_upstream_message(
    error_type: ErrorType,
    status: StatusCode,
    upstream_message: Option<&str>,
) -> Classification {
    Classification {
        error_type,
        status,
        message: upstream_message
            .unwrap_or_else(|| default_message(error_type))
            .to_string(),
    }
}

impl From<Classification> for ApiError {
    fn from(classification: Classification) -> Self {
        ApiError::Upstream {
            error_type: classification.error_type,
            status: classification.status,
            message: classification.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16, message: Option<&str>) -> UpstreamError {
        UpstreamError::Status {
            status,
            message: message.map(str::to_string),
            body: None,
        }
    }

    fn check(error: UpstreamError, error_type: ErrorType, status: u16) -> Classification {
        let classification = classify(&error);
        assert_eq!(classification.error_type, error_type, "{error:?}");
        assert_eq!(classification.status.as_u16(), status, "{error:?}");
        classification
    }

    #[test]
    fn test_transport_failures() {
        check(
            UpstreamError::Timeout("operation timed out".into()),
            ErrorType::TimeoutError,
            408,
        );
        check(
            UpstreamError::Connect("connection refused".into()),
            ErrorType::NetworkError,
            503,
        );
        check(
            UpstreamError::Transport("connection reset".into()),
            ErrorType::UnknownError,
            500,
        );
        check(
            UpstreamError::Decode("expected value".into()),
            ErrorType::UnknownError,
            500,
        );
    }

    #[test]
    fn test_status_table() {
        check(status_error(429, None), ErrorType::RateLimitError, 429);
        check(status_error(400, None), ErrorType::ValidationError, 400);
        check(status_error(403, None), ErrorType::AuthError, 403);
        check(status_error(500, None), ErrorType::NasaServerError, 503);
        check(status_error(502, None), ErrorType::NasaServerError, 503);
        check(status_error(504, None), ErrorType::NasaServerError, 503);
        check(status_error(404, None), ErrorType::NasaApiError, 404);
        check(status_error(401, None), ErrorType::NasaApiError, 401);
        check(status_error(418, None), ErrorType::NasaApiError, 418);
        check(status_error(302, None), ErrorType::UnknownError, 500);
    }

    #[test]
    fn test_default_messages() {
        assert_eq!(
            classify(&UpstreamError::Timeout("x".into())).message,
            "Request to NASA API timed out. Please try again."
        );
        assert_eq!(
            classify(&status_error(403, None)).message,
            "Invalid or missing NASA API key"
        );
        assert_eq!(
            classify(&status_error(500, None)).message,
            "NASA API is temporarily unavailable. Please try again later."
        );
        assert_eq!(
            classify(&status_error(400, None)).message,
            "Invalid request parameters"
        );
        assert_eq!(
            classify(&status_error(404, None)).message,
            "NASA API request failed"
        );
    }

    #[test]
    fn test_upstream_message_used_for_validation_and_api_errors() {
        let message = "Date must be between Jun 16, 1995 and Oct 18, 2026.";
        assert_eq!(classify(&status_error(400, Some(message))).message, message);
        assert_eq!(classify(&status_error(404, Some("No data"))).message, "No data");
    }

    #[test]
    fn test_upstream_message_ignored_for_fixed_categories() {
        assert_eq!(
            classify(&status_error(403, Some("API_KEY_INVALID"))).message,
            "Invalid or missing NASA API key"
        );
        assert_eq!(
            classify(&status_error(429, Some("slow down"))).message,
            "NASA API rate limit exceeded. Please try again later."
        );
    }

    #[test]
    fn test_into_api_error() {
        let error: ApiError = classify(&status_error(500, None)).into();
        assert_eq!(error.error_type(), ErrorType::NasaServerError);
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
