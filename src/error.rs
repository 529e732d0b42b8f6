use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::signup::repo::StoreError;

/// Client-facing message for every internal failure; details stay in the
/// server logs.
const GENERIC_FAILURE: &str = "An error occurred. Please try again.";

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("invalid email format")]
    InvalidEmail,

    #[error("invalid request body")]
    InvalidPayload,

    #[error("signup storage unavailable")]
    StorageUnavailable(#[source] anyhow::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for SignupError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(e) => Self::StorageUnavailable(e),
            StoreError::Digest(e) => Self::Internal(e),
        }
    }
}

impl IntoResponse for SignupError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later.",
            ),
            Self::InvalidEmail => (StatusCode::BAD_REQUEST, "Invalid email format"),
            Self::InvalidPayload => (StatusCode::BAD_REQUEST, "Invalid request body."),
            Self::StorageUnavailable(err) => {
                error!(error = %err, "signup storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
            }
            Self::Internal(err) => {
                error!(error = %err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
            }
        };

        let mut response = (
            status,
            Json(ErrorBody {
                success: false,
                message,
            }),
        )
            .into_response();

        if let Self::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_maps_to_429_with_retry_after() {
        let response = SignupError::RateLimited {
            retry_after: Duration::from_secs(42),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("42")
        );
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Too many requests, please try again later.");
    }

    #[tokio::test]
    async fn invalid_email_maps_to_400() {
        let response = SignupError::InvalidEmail.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid email format");
    }

    #[tokio::test]
    async fn storage_failure_hides_details_from_client() {
        let response =
            SignupError::StorageUnavailable(anyhow::anyhow!("connection refused on 5432"))
                .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "An error occurred. Please try again.");
        assert!(!body.to_string().contains("5432"));
    }
}
