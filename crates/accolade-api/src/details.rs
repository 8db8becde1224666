//! Handler for `GET /details/:id`.

use std::sync::Arc;

use accolade_core::{
  achievement::AchievementDetail,
  lifecycle::Coordinator,
  store::{DetailStore, Directory, ReferenceStore},
};
use axum::{
  Json,
  extract::{Path, State},
};
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

/// `GET /details/:id`. Soft-deleted documents are 404 here; use
/// `/achievements/:id/history` to see them.
pub async fn get_one<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(detail_id): Path<Uuid>,
) -> Result<Json<AchievementDetail>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  Ok(Json(coordinator.get_detail(&actor, detail_id).await?))
}
