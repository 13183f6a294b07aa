//! API error types and response formatting.
//!
//! Every error renders the uniform envelope
//! `{ "ok": false, "error": "...", "code": "..." }`. Listing endpoints send it
//! with the status below; content endpoints wrap it in a 200 through
//! [`ApiError::envelope`].

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::scripture::UpstreamError;

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The book name matched no canon entry.
    #[error("{0}")]
    BookNotFound(String),

    /// Chapter, verse or count outside its accepted range.
    #[error("{0}")]
    InvalidRange(String),

    /// Invalid request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A credential or identifier the handler needs is not configured.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(&'static str),

    /// The scripture provider failed and no fallback exists.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<lectio_core::Error> for ApiError {
    fn from(err: lectio_core::Error) -> Self {
        match err {
            lectio_core::Error::BookNotFound(_) => Self::BookNotFound(err.to_string()),
            lectio_core::Error::InvalidRange { .. }
            | lectio_core::Error::InvalidChapter(_)
            | lectio_core::Error::InvalidVerse(_) => {
                Self::InvalidRange(err.to_string())
            }
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    ok: bool,
    error: String,
    code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BookNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRange(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ConfigurationMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BookNotFound(_) => "book_not_found",
            Self::InvalidRange(_) => "invalid_range",
            Self::BadRequest(_) => "bad_request",
            Self::ConfigurationMissing(_) => "configuration_missing",
            Self::Upstream(UpstreamError::Malformed(_)) => "upstream_malformed",
            Self::Upstream(_) => "upstream_unavailable",
            Self::Internal(_) => "internal_error",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// The envelope body, without a status.
    pub fn envelope(&self) -> ErrorResponse {
        let error = match self {
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                "An internal error occurred".to_string()
            }
            Self::Serialization(err) => {
                tracing::error!(error = %err, "serialization error");
                "A serialization error occurred".to_string()
            }
            Self::Upstream(err) => {
                tracing::warn!(error = %err, "upstream error");
                self.to_string()
            }
            _ => self.to_string(),
        };

        ErrorResponse {
            ok: false,
            error,
            code: self.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn book_not_found_is_404_envelope() {
        let err: ApiError = lectio_core::Error::BookNotFound("xyzzy".to_string()).into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "book_not_found");
        assert!(body["error"].as_str().unwrap().contains("xyzzy"));
    }

    #[tokio::test]
    async fn core_range_errors_are_400() {
        let err: ApiError = lectio_core::Error::InvalidVerse("x".to_string()).into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_range");
    }

    #[tokio::test]
    async fn configuration_missing_is_503() {
        let (status, body) = render(ApiError::ConfigurationMissing("SCRIPTURE_API_KEY")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "configuration_missing");
        assert!(body["error"].as_str().unwrap().contains("SCRIPTURE_API_KEY"));
    }

    #[tokio::test]
    async fn upstream_errors_are_502_with_kind() {
        let (status, body) = render(UpstreamError::Timeout.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "upstream_unavailable");

        let (_, body) = render(UpstreamError::Malformed("eof".to_string()).into()).await;
        assert_eq!(body["code"], "upstream_malformed");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = render(anyhow::anyhow!("secret detail").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
    }
}
