//! Handler for `GET /students/:id/achievements`.

use std::sync::Arc;

use accolade_core::{
  lifecycle::Coordinator,
  reference::{DEFAULT_PAGE_SIZE, ReferenceSummary},
  store::{DetailStore, Directory, ReferenceStore},
};
use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct PageParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /students/:id/achievements[?limit=..][&offset=..]`, newest first.
/// A student without achievements yields `[]`.
pub async fn achievements<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(student_id): Path<Uuid>,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<ReferenceSummary>>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  let summaries = coordinator
    .get_by_student(
      &actor,
      student_id,
      params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
      params.offset.unwrap_or(0),
    )
    .await?;
  Ok(Json(summaries))
}
