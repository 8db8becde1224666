//! API error type and [`axum::response::IntoResponse`] implementation.

use accolade_core::Error as CoreError;
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
  /// No verified caller was attached to the request.
  #[error("unauthorized")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) => match e {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = match &self {
      ApiError::Core(CoreError::InvalidTransition { current, attempted }) => json!({
        "error": self.to_string(),
        "current": current,
        "attempted": attempted,
      }),
      _ => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}
