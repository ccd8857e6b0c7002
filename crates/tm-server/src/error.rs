//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`tm_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and get a JSON error body with the right
//! status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: tm_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: tm_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: impl ToString) -> Self {
        self.request_id = Some(id.to_string());
        self
    }
}

impl From<tm_core::Error> for AppError {
    fn from(e: tm_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                request_id = self.request_id.as_deref().unwrap_or("-"),
                error = %self.inner,
                "Server error in download handler"
            );
        } else {
            tracing::info!(status = %status, error = %self.inner, "Request rejected");
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}
