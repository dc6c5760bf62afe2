//! Reqwest-backed APOD source.
//!
//! The client performs exactly one GET per call and surfaces every failure as
//! an [`UpstreamError`]. Classification into client-facing categories lives in
//! [`crate::classifier`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("apod-proxy/", env!("CARGO_PKG_VERSION"));
const BODY_PREVIEW_CHAR_LIMIT: usize = 300;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("could not reach upstream: {0}")]
    Connect(String),

    #[error("upstream transport failure: {0}")]
    Transport(String),

    #[error("upstream responded with status {status}")]
    Status {
        status: u16,
        message: Option<String>,
        body: Option<String>,
    },

    #[error("invalid upstream payload: {0}")]
    Decode(String),
}

/// Source of APOD records.
#[async_trait]
pub trait ApodSource: Send + Sync {
    /// Fetch the record for `date`, or today's record when `None`.
    async fn fetch(&self, date: Option<&str>) -> Result<Value, UpstreamError>;
}

pub struct HttpApodClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpApodClient {
    /// Build a client with a hard per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ApodSource for HttpApodClient {
    async fn fetch(&self, date: Option<&str>) -> Result<Value, UpstreamError> {
        let mut query = vec![("api_key", self.api_key.as_str())];
        if let Some(date) = date {
            query.push(("date", date));
        }

        let response = self
            .client
            .get(&self.base_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        serde_json::from_slice(body.as_ref())
            .map_err(|e| UpstreamError::Decode(format!("invalid APOD JSON payload: {e}")))
    }
}

fn map_transport_error(error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout(error.to_string())
    } else if error.is_connect() {
        UpstreamError::Connect(error.to_string())
    } else {
        UpstreamError::Transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> UpstreamError {
    let preview = body_preview(body);
    UpstreamError::Status {
        status: status.as_u16(),
        message: upstream_message(body),
        body: (!preview.is_empty()).then_some(preview),
    }
}

/// Pull the human readable message out of a NASA error body.
///
/// APOD reports its own errors as `{"code": 400, "msg": "..."}` while the
/// api.nasa.gov gateway uses `{"error": {"code": "...", "message": "..."}}`.
fn upstream_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("msg")
        .or_else(|| value.get("error").and_then(|error| error.get("message")))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

fn body_preview(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact
        .chars()
        .take(BODY_PREVIEW_CHAR_LIMIT)
        .collect::<String>();
    if compact.chars().count() > BODY_PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apod_error_message_extracted() {
        let error = map_status_error(
            StatusCode::BAD_REQUEST,
            br#"{"code":400,"msg":"Date must be between Jun 16, 1995 and Oct 18, 2026.","service_version":"v1"}"#,
        );
        match error {
            UpstreamError::Status {
                status,
                message,
                body,
            } => {
                assert_eq!(status, 400);
                assert_eq!(
                    message.as_deref(),
                    Some("Date must be between Jun 16, 1995 and Oct 18, 2026.")
                );
                assert!(body.unwrap().contains("service_version"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_gateway_error_message_extracted() {
        let body = br#"{"error":{"code":"API_KEY_INVALID","message":"An invalid api_key was supplied."}}"#;
        assert_eq!(
            upstream_message(body).as_deref(),
            Some("An invalid api_key was supplied.")
        );
    }

    #[test]
    fn test_non_json_body_has_no_message() {
        let error = map_status_error(StatusCode::BAD_GATEWAY, b"<html>\n  bad gateway\n</html>");
        assert_eq!(
            error,
            UpstreamError::Status {
                status: 502,
                message: None,
                body: Some("<html> bad gateway </html>".to_string()),
            }
        );
    }

    #[test]
    fn test_empty_body_is_omitted() {
        let error = map_status_error(StatusCode::FORBIDDEN, b"");
        assert_eq!(
            error,
            UpstreamError::Status {
                status: 403,
                message: None,
                body: None,
            }
        );
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(BODY_PREVIEW_CHAR_LIMIT + 10);
        let preview = body_preview(body.as_bytes());
        assert_eq!(preview.chars().count(), BODY_PREVIEW_CHAR_LIMIT + 3);
        assert!(preview.ends_with("..."));
    }
}
