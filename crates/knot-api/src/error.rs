//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Resolve(#[from] knot_core::Error),

  #[error("not found: {0}")]
  NotFound(String),

  /// The request could not be decoded at all.
  #[error("malformed request: {0}")]
  Malformed(String),
}

impl ApiError {
  /// Stable machine-readable code sent alongside the message.
  pub fn code(&self) -> &'static str {
    match self {
      ApiError::Resolve(e) => e.code(),
      ApiError::NotFound(_) => "not_found",
      ApiError::Malformed(_) => "malformed_request",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Resolve(knot_core::Error::InvalidInput(_)) => {
        StatusCode::BAD_REQUEST
      }
      ApiError::Resolve(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = json!({
      "success": false,
      "code":    self.code(),
      "message": self.to_string(),
    });
    (status, Json(body)).into_response()
  }
}
