//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same `{error, message}` body and maps
//! domain errors onto HTTP status codes.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use folio_core::error::FolioError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    #[error("{0}")]
    NotFound(String),
    /// 413 Payload Too Large - upload exceeds the configured limit.
    #[error("{0}")]
    PayloadTooLarge(String),
    /// 422 Unprocessable Entity - the document yielded no usable text.
    #[error("{0}")]
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<FolioError> for ApiError {
    fn from(err: FolioError) -> Self {
        match err {
            FolioError::Validation(msg) => ApiError::BadRequest(msg),
            FolioError::NotFound(msg) => ApiError::NotFound(msg),
            FolioError::Extraction(msg) => ApiError::UnprocessableEntity(msg),
            FolioError::EmptyInput => {
                ApiError::UnprocessableEntity("No text could be extracted from the document".into())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folio_error_mapping() {
        assert!(matches!(
            ApiError::from(FolioError::Validation("bad".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(FolioError::NotFound("x".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(FolioError::EmptyInput),
            ApiError::UnprocessableEntity(_)
        ));
        assert!(matches!(
            ApiError::from(FolioError::Extraction("no text".into())),
            ApiError::UnprocessableEntity(_)
        ));
        assert!(matches!(
            ApiError::from(FolioError::Storage("disk".into())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::BadRequest("a".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("b".into()), StatusCode::NOT_FOUND),
            (ApiError::PayloadTooLarge("c".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (ApiError::UnprocessableEntity("d".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::Internal("e".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
