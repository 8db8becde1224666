//! Error types for `accolade-core`.

use std::time::Duration;

use thiserror::Error;

use crate::reference::{Operation, Status};

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or missing input. The client must fix the request.
  #[error("validation failed: {0}")]
  Validation(String),

  /// The reference is not in the status the operation requires.
  #[error("cannot {attempted} an achievement that is {current}")]
  InvalidTransition {
    current:   Status,
    attempted: Operation,
  },

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("{entity} not found: {id}")]
  NotFound {
    entity: &'static str,
    id:     String,
  },

  /// Transport or connectivity failure in one of the stores, including
  /// timeouts. The write may or may not have landed.
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }

  pub fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }

  /// Only storage failures are worth retrying, and only after the caller has
  /// re-read the current status.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::Storage(_)) }
}

/// A store call that did not complete within the configured timeout.
#[derive(Debug, Error)]
#[error("{op} timed out after {after:?}")]
pub struct TimedOut {
  pub op:    &'static str,
  pub after: Duration,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
