use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Client-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    ValidationError,
    TimeoutError,
    NetworkError,
    RateLimitError,
    AuthError,
    NasaServerError,
    NasaApiError,
    NotFoundError,
    InternalServerError,
    UnknownError,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        field: Option<&'static str>,
        message: String,
    },

    #[error("Upstream error ({error_type:?}): {message}")]
    Upstream {
        error_type: ErrorType,
        status: StatusCode,
        message: String,
    },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Route {method} {path} not found")]
    NotFound { method: String, path: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Serialized form of an error inside the response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";
const INTERNAL_MESSAGE: &str = "Internal server error";

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: Some(field),
            message: message.into(),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            ApiError::Validation { .. } => ErrorType::ValidationError,
            ApiError::Upstream { error_type, .. } => *error_type,
            ApiError::RateLimited => ErrorType::RateLimitError,
            ApiError::NotFound { .. } => ErrorType::NotFoundError,
            ApiError::Internal(_) => ErrorType::InternalServerError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, .. } => *status,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the envelope payload. Internal detail is only included when
    /// `expose_details` is set (development deployments).
    pub fn to_info(&self, expose_details: bool) -> ErrorInfo {
        let (message, field, details) = match self {
            ApiError::Validation { field, message } => {
                (message.clone(), field.map(str::to_string), None)
            }
            ApiError::Upstream { message, .. } => (message.clone(), None, None),
            ApiError::RateLimited => (RATE_LIMIT_MESSAGE.to_string(), None, None),
            ApiError::NotFound { .. } => (self.to_string(), None, None),
            ApiError::Internal(detail) => (
                INTERNAL_MESSAGE.to_string(),
                None,
                expose_details.then(|| detail.clone()),
            ),
        };

        ErrorInfo {
            message,
            error_type: self.error_type(),
            status: self.status().as_u16(),
            field,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_serialization() {
        let json = serde_json::to_string(&ErrorType::NasaServerError).unwrap();
        assert_eq!(json, "\"NASA_SERVER_ERROR\"");
        let json = serde_json::to_string(&ErrorType::InternalServerError).unwrap();
        assert_eq!(json, "\"INTERNAL_SERVER_ERROR\"");
    }

    #[test]
    fn test_validation_info_carries_field() {
        let info = ApiError::validation("date", "bad date").to_info(false);
        assert_eq!(info.status, 400);
        assert_eq!(info.error_type, ErrorType::ValidationError);
        assert_eq!(info.field.as_deref(), Some("date"));
    }

    #[test]
    fn test_not_found_message() {
        let err = ApiError::NotFound {
            method: "GET".to_string(),
            path: "/nonexistent".to_string(),
        };
        let info = err.to_info(false);
        assert_eq!(info.status, 404);
        assert_eq!(info.message, "Route GET /nonexistent not found");
    }

    #[test]
    fn test_internal_details_hidden_in_production() {
        let err = ApiError::Internal("boom at src/handlers.rs".to_string());

        let production = err.to_info(false);
        assert_eq!(production.message, "Internal server error");
        assert!(production.details.is_none());

        let development = err.to_info(true);
        assert_eq!(
            development.details.as_deref(),
            Some("boom at src/handlers.rs")
        );
    }
}
