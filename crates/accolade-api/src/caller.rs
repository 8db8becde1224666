//! The [`Caller`] extractor.

use accolade_core::scope::Actor;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// The verified caller of a request.
///
/// Authentication happens in front of this router: whatever verifies the
/// credentials inserts an [`Actor`] into the request extensions. A request
/// without one is rejected with `401`.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Actor>()
      .copied()
      .map(Caller)
      .ok_or(ApiError::Unauthorized)
  }
}
