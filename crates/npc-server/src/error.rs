//! JSON error responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use npc_llm::{ProviderError, ProviderErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
pub const INVALID_JSON: &str = "INVALID_JSON";
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
pub const UNSUPPORTED_MEDIA_TYPE: &str = "UNSUPPORTED_MEDIA_TYPE";
pub const NOT_FOUND: &str = "NOT_FOUND";

pub const LLM_PROVIDER_UNAVAILABLE: &str = "LLM_PROVIDER_UNAVAILABLE";
pub const LLM_BAD_REQUEST: &str = "LLM_BAD_REQUEST";
pub const LLM_RATE_LIMITED: &str = "LLM_RATE_LIMITED";
pub const LLM_TIMEOUT: &str = "LLM_TIMEOUT";
pub const LLM_UNAUTHORIZED: &str = "LLM_UNAUTHORIZED";
pub const LLM_MODEL_NOT_FOUND: &str = "LLM_MODEL_NOT_FOUND";

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

/// An error a handler returns; renders as [`ErrorResponse`] JSON.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, code: &str) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                code: code.to_string(),
                request_id: None,
                details: None,
            },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, VALIDATION_ERROR)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, NOT_FOUND)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, INTERNAL_SERVER_ERROR)
    }

    /// A failed tick. Provider failures keep their kind in the status code.
    pub fn tick_failed(message: impl Into<String>, provider_error: Option<&ProviderError>) -> Self {
        let Some(err) = provider_error else {
            return Self::internal(message);
        };
        let (status, code) = match err.kind {
            ProviderErrorKind::Unavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, LLM_PROVIDER_UNAVAILABLE)
            }
            ProviderErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, LLM_TIMEOUT),
            ProviderErrorKind::RateLimited => (StatusCode::TOO_MANY_REQUESTS, LLM_RATE_LIMITED),
            ProviderErrorKind::BadRequest => (StatusCode::BAD_REQUEST, LLM_BAD_REQUEST),
            ProviderErrorKind::Unauthorized => (StatusCode::UNAUTHORIZED, LLM_UNAUTHORIZED),
            ProviderErrorKind::ModelNotFound => (StatusCode::NOT_FOUND, LLM_MODEL_NOT_FOUND),
            ProviderErrorKind::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
            }
        };
        Self::new(status, message, code)
            .with_detail("provider", err.provider.clone())
            .with_detail("model", err.model.clone())
            .with_detail("retryable", err.is_retryable())
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body
            .details
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_request_id(mut self, request_id: &crate::RequestId) -> Self {
        if !request_id.0.is_empty() {
            self.body.request_id = Some(request_id.0.clone());
        }
        self
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        match rejection {
            JsonRejection::JsonDataError(e) => Self::validation(e.body_text()),
            JsonRejection::MissingJsonContentType(_) => Self::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type must be application/json",
                UNSUPPORTED_MEDIA_TYPE,
            ),
            _ => Self::new(StatusCode::BAD_REQUEST, "Invalid JSON", INVALID_JSON),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_error(kind: ProviderErrorKind) -> ProviderError {
        ProviderError::new("ollama", "qwen3:1.7b", kind, "")
    }

    #[test]
    fn test_tick_failure_status_mapping() {
        let cases = [
            (ProviderErrorKind::Unavailable, 503, LLM_PROVIDER_UNAVAILABLE, true),
            (ProviderErrorKind::Timeout, 504, LLM_TIMEOUT, true),
            (ProviderErrorKind::RateLimited, 429, LLM_RATE_LIMITED, true),
            (ProviderErrorKind::BadRequest, 400, LLM_BAD_REQUEST, false),
            (ProviderErrorKind::Unauthorized, 401, LLM_UNAUTHORIZED, false),
            (ProviderErrorKind::ModelNotFound, 404, LLM_MODEL_NOT_FOUND, false),
            (ProviderErrorKind::Other("x".into()), 500, INTERNAL_SERVER_ERROR, false),
        ];
        for (kind, status, code, retryable) in cases {
            let err = ApiError::tick_failed("boom", Some(&provider_error(kind)));
            assert_eq!(err.status.as_u16(), status);
            assert_eq!(err.body.code, code);
            assert_eq!(err.body.details.unwrap()["retryable"], retryable);
        }
    }

    #[test]
    fn test_tick_failure_without_provider_error() {
        let err = ApiError::tick_failed("render failed", None);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.body.details.is_none());
    }

    #[test]
    fn test_error_body_omits_empty_fields() {
        let err = ApiError::not_found("NPC not found");
        let value = serde_json::to_value(&err.body).unwrap();
        assert_eq!(value, serde_json::json!({"error": "NPC not found", "code": "NOT_FOUND"}));
    }
}
