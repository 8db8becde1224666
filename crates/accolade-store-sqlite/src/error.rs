//! Error type for `accolade-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] accolade_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum string that no variant matches.
  #[error("unknown {kind}: {value:?}")]
  UnknownValue { kind: &'static str, value: String },

  #[error("stored points out of range: {0}")]
  PointsOutOfRange(i64),

  #[error("student not found: {0}")]
  StudentNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
