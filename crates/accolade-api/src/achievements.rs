//! Handlers for `/achievements` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/achievements` | Caller's scope; optional `status`, `limit`, `offset` |
//! | `POST`   | `/achievements` | Body: [`NewAchievementBody`]; returns 201 + both halves |
//! | `GET`    | `/achievements/tags/:tag` | Visible documents carrying the tag |
//! | `PUT`    | `/achievements/:id` | Body: [`PatchBody`]; drafts only |
//! | `DELETE` | `/achievements/:id` | Drafts only; the detail is soft-deleted |
//! | `GET`    | `/achievements/:id/history` | Includes soft-deleted documents |
//! | `POST`   | `/achievements/:id/attachments` | Body: `{"file_name","file_url","file_type"}` |
//! | `DELETE` | `/achievements/:id/attachments/:file_name` | |
//! | `POST`   | `/achievements/:id/submit` | |
//! | `POST`   | `/achievements/:id/verify` | Body: `{"points": n}` |
//! | `POST`   | `/achievements/:id/reject` | Body: `{"note": "..."}` |
//! | `DELETE` | `/achievements/:id/purge` | Administrators only; returns 204 |

use std::sync::Arc;

use accolade_core::{
  achievement::{
    AchievementDetail, AchievementDetails, DetailPatch, NewAttachment, NewDetail,
  },
  lifecycle::{AchievementHistory, Coordinator, Created},
  reference::{AchievementReference, DEFAULT_PAGE_SIZE, ReferenceSummary, Status},
  scope::Actor,
  store::{DetailStore, Directory, ReferenceStore},
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub status: Option<Status>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /achievements[?status=submitted][&limit=..][&offset=..]`
pub async fn list<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ReferenceSummary>>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  let summaries = coordinator
    .list(
      &actor,
      params.status,
      params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
      params.offset.unwrap_or(0),
    )
    .await?;
  Ok(Json(summaries))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /achievements`.
#[derive(Debug, Deserialize)]
pub struct NewAchievementBody {
  /// Students always create for themselves and may leave this out.
  pub student_id:       Option<Uuid>,
  pub title:            String,
  #[serde(default)]
  pub description:      String,
  #[serde(rename = "type")]
  pub achievement_type: String,
  /// Type-specific fields; shape depends on `type`.
  #[serde(default)]
  pub details:          serde_json::Value,
  #[serde(default)]
  pub tags:             Vec<String>,
}

impl NewAchievementBody {
  fn into_parts(self, actor: &Actor) -> Result<(Uuid, NewDetail), ApiError> {
    let student_id = match (self.student_id, actor) {
      (Some(id), _) => id,
      (None, Actor::Student { student_id, .. }) => *student_id,
      (None, _) => {
        return Err(ApiError::BadRequest("student_id is required".into()));
      }
    };
    let details =
      AchievementDetails::from_parts(&self.achievement_type, self.details)?;
    let mut input = NewDetail::new(self.title, details);
    input.description = self.description;
    input.tags = self.tags;
    Ok((student_id, input))
  }
}

/// `POST /achievements`: returns 201 + the new reference and detail.
pub async fn create<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Json(body): Json<NewAchievementBody>,
) -> Result<impl IntoResponse, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  let (student_id, input) = body.into_parts(&actor)?;
  let created: Created = coordinator.create(&actor, student_id, input).await?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Tags ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct TagParams {
  pub limit: Option<usize>,
}

/// `GET /achievements/tags/:tag[?limit=..]`
pub async fn find_by_tag<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(tag): Path<String>,
  Query(params): Query<TagParams>,
) -> Result<Json<Vec<AchievementDetail>>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  let details = coordinator
    .find_by_tag(&actor, &tag, params.limit.unwrap_or(DEFAULT_PAGE_SIZE))
    .await?;
  Ok(Json(details))
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `PUT /achievements/:id`. Absent fields are left as
/// they are; `details` must come with its `type`.
#[derive(Debug, Deserialize)]
pub struct PatchBody {
  pub title:            Option<String>,
  pub description:      Option<String>,
  #[serde(rename = "type")]
  pub achievement_type: Option<String>,
  pub details:          Option<serde_json::Value>,
  pub tags:             Option<Vec<String>>,
}

impl TryFrom<PatchBody> for DetailPatch {
  type Error = ApiError;

  fn try_from(b: PatchBody) -> Result<Self, ApiError> {
    let details = match (b.achievement_type, b.details) {
      (Some(tag), data) => Some(AchievementDetails::from_parts(
        &tag,
        data.unwrap_or(serde_json::Value::Null),
      )?),
      (None, Some(_)) => {
        return Err(ApiError::BadRequest("details require a type".into()));
      }
      (None, None) => None,
    };
    Ok(DetailPatch {
      title: b.title,
      description: b.description,
      details,
      tags: b.tags,
    })
  }
}

/// `PUT /achievements/:id`
pub async fn update<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<PatchBody>,
) -> Result<Json<AchievementDetail>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  let patch = DetailPatch::try_from(body)?;
  Ok(Json(coordinator.update_draft(&actor, id, patch).await?))
}

/// `POST /achievements/:id/attachments`
pub async fn add_attachment<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<NewAttachment>,
) -> Result<impl IntoResponse, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  let detail = coordinator.add_attachment(&actor, id, body).await?;
  Ok((StatusCode::CREATED, Json(detail)))
}

/// `DELETE /achievements/:id/attachments/:file_name`
pub async fn remove_attachment<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path((id, file_name)): Path<(Uuid, String)>,
) -> Result<Json<AchievementDetail>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  Ok(Json(coordinator.remove_attachment(&actor, id, &file_name).await?))
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// `POST /achievements/:id/submit`
pub async fn submit<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<AchievementReference>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  Ok(Json(coordinator.submit(&actor, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub points: u32,
}

/// `POST /achievements/:id/verify`: body `{"points": n}`.
pub async fn verify<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<VerifyBody>,
) -> Result<Json<AchievementReference>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  Ok(Json(coordinator.verify(&actor, id, body.points).await?))
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  #[serde(default)]
  pub note: String,
}

/// `POST /achievements/:id/reject`: body `{"note": "..."}`.
pub async fn reject<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<RejectBody>,
) -> Result<Json<AchievementReference>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  Ok(Json(coordinator.reject(&actor, id, &body.note).await?))
}

/// `DELETE /achievements/:id`
pub async fn delete<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<AchievementReference>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  Ok(Json(coordinator.delete(&actor, id).await?))
}

/// `DELETE /achievements/:id/purge`
pub async fn purge<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  coordinator.purge(&actor, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── History ─────────────────────────────────────────────────────────────────

/// `GET /achievements/:id/history`
pub async fn history<D, R, Dir>(
  State(coordinator): State<Arc<Coordinator<D, R, Dir>>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<AchievementHistory>, ApiError>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  Ok(Json(coordinator.history(&actor, id).await?))
}
