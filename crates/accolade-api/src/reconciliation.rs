//! Handlers for `/reconciliation`, administrators only.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/reconciliation` | Warnings flagged since startup and not yet acknowledged |
//! | `DELETE` | `/reconciliation/:detail_id` | Acknowledge every warning about one document |

use std::sync::Arc;

use accolade_core::{
  Error,
  lifecycle::Coordinator,
  reconcile::FlaggedWarning,
  scope::Actor,
  store::{DetailStore, Directory, ReferenceStore},
};
use axum::{
  Json,
  extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

fn require_admin(actor: &Actor) -> Result<(), ApiError> {
  if !matches!(actor, Actor::Admin { .. }) {
    return Err(Error::Forbidden("only administrators may reconcile".into()).into());
  }
  Ok(())
}

pub async fn list<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
) -> Result<Json<Vec<FlaggedWarning>>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  require_admin(&actor)?;
  Ok(Json(coordinator.ledger().entries()))
}

#[derive(Debug, Serialize)]
pub struct Acknowledged {
  pub acknowledged: usize,
}

pub async fn acknowledge<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(detail_id): Path<Uuid>,
) -> Result<Json<Acknowledged>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  require_admin(&actor)?;
  let acknowledged = coordinator.ledger().acknowledge(detail_id);
  tracing::info!(%detail_id, acknowledged, "consistency warnings acknowledged");
  Ok(Json(Acknowledged { acknowledged }))
}
