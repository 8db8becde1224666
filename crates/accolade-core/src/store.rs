//! Store traits consumed by the lifecycle coordinator.
//!
//! Adapters are narrow and carry no business logic: they never check
//! ownership or decide whether a transition is allowed. "Not found" is
//! reported through `Option`/`bool`; an `Err` always means the store itself
//! failed, and the coordinator surfaces it as a storage error.
//!
//! All methods return `Send` futures so the coordinator can hand multi-write
//! sequences to a spawned task.

use std::future::Future;

use uuid::Uuid;

use crate::{
  achievement::{AchievementDetail, Attachment, DetailPatch, NewDetail},
  reference::{
    AchievementReference, ReferenceQuery, ReferenceSummary, StatusChange,
    TransitionOutcome,
  },
};

// ─── Detail documents ────────────────────────────────────────────────────────

/// The document store holding [`AchievementDetail`]s.
///
/// Soft-deleted documents are invisible to every method except
/// [`DetailStore::get_detail`] with `include_deleted` set.
pub trait DetailStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new document for `student_id`. The id and timestamps are
  /// assigned by the store.
  fn insert_detail(
    &self,
    student_id: Uuid,
    input: NewDetail,
  ) -> impl Future<Output = Result<AchievementDetail, Self::Error>> + Send + '_;

  fn get_detail(
    &self,
    detail_id: Uuid,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Option<AchievementDetail>, Self::Error>> + Send + '_;

  /// Apply `patch` and bump `updated_at`. Returns `None` if there is no
  /// visible document with this id.
  fn update_detail(
    &self,
    detail_id: Uuid,
    patch: DetailPatch,
  ) -> impl Future<Output = Result<Option<AchievementDetail>, Self::Error>> + Send + '_;

  /// Overwrite the point value. Returns `false` if there is no visible
  /// document with this id.
  fn set_points(
    &self,
    detail_id: Uuid,
    points: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn push_attachment(
    &self,
    detail_id: Uuid,
    attachment: Attachment,
  ) -> impl Future<Output = Result<Option<AchievementDetail>, Self::Error>> + Send + '_;

  /// Remove every attachment named `file_name`.
  fn pull_attachment(
    &self,
    detail_id: Uuid,
    file_name: String,
  ) -> impl Future<Output = Result<Option<AchievementDetail>, Self::Error>> + Send + '_;

  /// Set `deleted_at` (kept if already set) and bump `updated_at`. Returns
  /// `false` if no document with this id exists at all.
  fn soft_delete(
    &self,
    detail_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Visible documents carrying `tag`, newest first, optionally restricted
  /// to some owners.
  fn find_by_tag(
    &self,
    tag: String,
    student_ids: Option<Vec<Uuid>>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AchievementDetail>, Self::Error>> + Send + '_;
}

// ─── Reference rows ──────────────────────────────────────────────────────────

/// The relational store holding [`AchievementReference`] rows.
pub trait ReferenceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new `draft` reference pointing at `detail_id`. Fails if a
  /// reference for that detail already exists.
  fn insert_reference(
    &self,
    student_id: Uuid,
    detail_id: Uuid,
  ) -> impl Future<Output = Result<AchievementReference, Self::Error>> + Send + '_;

  fn get_reference(
    &self,
    reference_id: Uuid,
  ) -> impl Future<Output = Result<Option<AchievementReference>, Self::Error>> + Send + '_;

  fn get_reference_by_detail(
    &self,
    detail_id: Uuid,
  ) -> impl Future<Output = Result<Option<AchievementReference>, Self::Error>> + Send + '_;

  fn list_references(
    &self,
    query: ReferenceQuery,
  ) -> impl Future<Output = Result<Vec<ReferenceSummary>, Self::Error>> + Send + '_;

  /// Compare-and-swap on status: apply `change` only if the row is still in
  /// `change.expected()`. Must be atomic with respect to concurrent calls on
  /// the same row.
  fn transition(
    &self,
    reference_id: Uuid,
    change: StatusChange,
  ) -> impl Future<Output = Result<TransitionOutcome, Self::Error>> + Send + '_;

  /// Physically remove a row. Administrative use only.
  fn delete_reference(
    &self,
    reference_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Read-only view of advisor assignments.
pub trait Directory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn is_advisor_of(
    &self,
    lecturer_id: Uuid,
    student_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn advisees_of(
    &self,
    lecturer_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;
}
