//! The lifecycle coordinator: create, submit, verify, reject and delete
//! achievements across the detail store and the reference store.
//!
//! There is no transaction spanning the two stores. Each operation writes in
//! a fixed order and reports success only after its last write commits:
//!
//! | operation | first write | second write | if the second write fails |
//! |-----------|-------------|--------------|---------------------------|
//! | create | detail document | reference row (`draft`) | orphaned, invisible detail |
//! | verify | reference → `verified` | detail points | verified with stale points |
//! | delete | detail soft-delete | reference → `deleted` | hidden detail, live reference |
//! | purge | detail soft-delete | reference row removed | hidden detail, live reference |
//!
//! Partial states are never rolled back. They are flagged on the
//! [`ConsistencyLedger`] and the interrupting error is returned.
//!
//! Status changes are conditional writes, so two racing requests for the same
//! transition cannot both succeed.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  achievement::{AchievementDetail, DetailPatch, NewAttachment, NewDetail},
  error::TimedOut,
  reconcile::{ConsistencyLedger, ConsistencyWarning},
  reference::{
    AchievementReference, Operation, ReferenceQuery, ReferenceSummary, Status,
    StatusChange, TransitionOutcome, page_limit,
  },
  scope::{self, Actor, Scope},
  store::{DetailStore, Directory, ReferenceStore},
};

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
  /// Upper bound on every individual store call.
  pub store_timeout: Duration,
  /// Extra attempts for reads that fail with a storage error. Writes are
  /// never retried.
  pub read_retries:  u32,
}

impl Default for CoordinatorSettings {
  fn default() -> Self {
    Self { store_timeout: Duration::from_secs(5), read_retries: 1 }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Both halves of a freshly created achievement.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Created {
  pub reference: AchievementReference,
  pub detail:    AchievementDetail,
}

impl Created {
  pub fn reference_id(&self) -> Uuid { self.reference.reference_id }

  pub fn detail_id(&self) -> Uuid { self.detail.detail_id }
}

/// A reference row together with its detail document, deleted or not.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AchievementHistory {
  pub reference: AchievementReference,
  /// `None` only if the document is missing altogether.
  pub detail:    Option<AchievementDetail>,
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

/// Orchestrates the achievement lifecycle over injected store handles.
///
/// Opening and closing the stores is the owner's business; the coordinator
/// only borrows them through `Arc`s. Cloning is cheap.
pub struct Coordinator<D, R, Dir> {
  details:    Arc<D>,
  references: Arc<R>,
  directory:  Arc<Dir>,
  ledger:     ConsistencyLedger,
  settings:   CoordinatorSettings,
}

impl<D, R, Dir> Clone for Coordinator<D, R, Dir> {
  fn clone(&self) -> Self {
    Self {
      details:    Arc::clone(&self.details),
      references: Arc::clone(&self.references),
      directory:  Arc::clone(&self.directory),
      ledger:     self.ledger.clone(),
      settings:   self.settings,
    }
  }
}

impl<D, R, Dir> Coordinator<D, R, Dir>
where
  D: DetailStore + 'static,
  R: ReferenceStore + 'static,
  Dir: Directory + 'static,
{
  pub fn new(details: Arc<D>, references: Arc<R>, directory: Arc<Dir>) -> Self {
    Self {
      details,
      references,
      directory,
      ledger: ConsistencyLedger::new(),
      settings: CoordinatorSettings::default(),
    }
  }

  pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
    self.settings = settings;
    self
  }

  pub fn with_ledger(mut self, ledger: ConsistencyLedger) -> Self {
    self.ledger = ledger;
    self
  }

  pub fn ledger(&self) -> &ConsistencyLedger { &self.ledger }

  pub fn settings(&self) -> CoordinatorSettings { self.settings }

  // ── Writes ───────────────────────────────────────────────────────────────

  /// Create a draft achievement for `student_id`.
  ///
  /// The detail document is written first. If the reference row cannot be
  /// written afterwards the document is left behind as an orphan, flagged
  /// for reconciliation, and the storage error is returned.
  pub async fn create(
    &self,
    actor: &Actor,
    student_id: Uuid,
    input: NewDetail,
  ) -> Result<Created> {
    if !actor.may_own(student_id) {
      return Err(Error::Forbidden(format!(
        "{} may not create achievements for student {student_id}",
        actor.role()
      )));
    }
    input.validate()?;

    let details = Arc::clone(&self.details);
    let references = Arc::clone(&self.references);
    let ledger = self.ledger.clone();
    let timeout = self.settings.store_timeout;

    detached(async move {
      let detail = guarded(
        "insert_detail",
        timeout,
        details.insert_detail(student_id, input),
      )
      .await?;

      match guarded(
        "insert_reference",
        timeout,
        references.insert_reference(student_id, detail.detail_id),
      )
      .await
      {
        Ok(reference) => {
          tracing::debug!(
            reference_id = %reference.reference_id,
            detail_id = %detail.detail_id,
            %student_id,
            "achievement created"
          );
          Ok(Created { reference, detail })
        }
        Err(e) => {
          ledger.flag(ConsistencyWarning::OrphanedDetail {
            detail_id: detail.detail_id,
            student_id,
            cause: e.to_string(),
          });
          Err(e)
        }
      }
    })
    .await
  }

  /// Move a draft to `submitted`. Only the owner (or an administrator) may
  /// submit.
  pub async fn submit(
    &self,
    actor: &Actor,
    reference_id: Uuid,
  ) -> Result<AchievementReference> {
    let reference = self.load_reference(reference_id).await?;
    self.require_owner(actor, &reference)?;
    require_status(&reference, Operation::Submit)?;

    let change = StatusChange::Submit { at: Utc::now() };
    apply_change(
      self.references.as_ref(),
      self.settings.store_timeout,
      reference_id,
      change,
    )
    .await
  }

  /// Approve a submitted achievement and award `points`.
  ///
  /// The status is committed first. If the point value cannot be written to
  /// the detail document afterwards, the status stays `verified`, the stale
  /// points are flagged for reconciliation, and the error is returned.
  pub async fn verify(
    &self,
    actor: &Actor,
    reference_id: Uuid,
    points: u32,
  ) -> Result<AchievementReference> {
    let reference = self.load_reference(reference_id).await?;
    self.require_decider(actor, &reference).await?;
    require_status(&reference, Operation::Verify)?;
    let verifier_id = actor
      .verifier_id()
      .ok_or_else(|| Error::Forbidden("students cannot verify".into()))?;

    let details = Arc::clone(&self.details);
    let references = Arc::clone(&self.references);
    let ledger = self.ledger.clone();
    let timeout = self.settings.store_timeout;
    let detail_id = reference.detail_id;

    detached(async move {
      let change = StatusChange::Verify { at: Utc::now(), verifier_id };
      let verified =
        apply_change(references.as_ref(), timeout, reference_id, change).await?;

      let stale = |cause: String| ConsistencyWarning::StalePoints {
        reference_id,
        detail_id,
        points,
        cause,
      };
      match guarded("set_points", timeout, details.set_points(detail_id, points))
        .await
      {
        Ok(true) => Ok(verified),
        Ok(false) => {
          ledger.flag(stale("detail document not found".into()));
          Err(Error::not_found("achievement detail", detail_id))
        }
        Err(e) => {
          ledger.flag(stale(e.to_string()));
          Err(e)
        }
      }
    })
    .await
  }

  /// Reject a submitted achievement. The note is mandatory.
  pub async fn reject(
    &self,
    actor: &Actor,
    reference_id: Uuid,
    note: &str,
  ) -> Result<AchievementReference> {
    let note = note.trim();
    if note.is_empty() {
      return Err(Error::Validation("rejection note is required".into()));
    }
    let reference = self.load_reference(reference_id).await?;
    self.require_decider(actor, &reference).await?;
    require_status(&reference, Operation::Reject)?;

    let change = StatusChange::Reject { at: Utc::now(), note: note.to_owned() };
    apply_change(
      self.references.as_ref(),
      self.settings.store_timeout,
      reference_id,
      change,
    )
    .await
  }

  /// Delete a draft: soft-delete the detail document, then mark the
  /// reference `deleted`.
  pub async fn delete(
    &self,
    actor: &Actor,
    reference_id: Uuid,
  ) -> Result<AchievementReference> {
    let reference = self.load_reference(reference_id).await?;
    self.require_owner(actor, &reference)?;
    require_status(&reference, Operation::Delete)?;

    let details = Arc::clone(&self.details);
    let references = Arc::clone(&self.references);
    let ledger = self.ledger.clone();
    let timeout = self.settings.store_timeout;
    let detail_id = reference.detail_id;

    detached(async move {
      if !guarded("soft_delete", timeout, details.soft_delete(detail_id)).await? {
        tracing::warn!(%reference_id, %detail_id, "deleting a reference whose detail is missing");
      }

      let change = StatusChange::Delete { at: Utc::now() };
      let outcome = apply_change(references.as_ref(), timeout, reference_id, change).await;
      match &outcome {
        Ok(_) | Err(Error::NotFound { .. }) => {}
        Err(e) => ledger.flag(ConsistencyWarning::HiddenDetailLiveReference {
          reference_id,
          detail_id,
          cause: e.to_string(),
        }),
      }
      outcome
    })
    .await
  }

  /// Replace parts of a draft's detail document.
  pub async fn update_draft(
    &self,
    actor: &Actor,
    reference_id: Uuid,
    patch: DetailPatch,
  ) -> Result<AchievementDetail> {
    patch.validate()?;
    let reference = self.editable_reference(actor, reference_id).await?;

    guarded(
      "update_detail",
      self.settings.store_timeout,
      self.details.update_detail(reference.detail_id, patch),
    )
    .await?
    .ok_or_else(|| Error::not_found("achievement detail", reference.detail_id))
  }

  /// Attach a file to a draft. File names are unique per document.
  pub async fn add_attachment(
    &self,
    actor: &Actor,
    reference_id: Uuid,
    input: NewAttachment,
  ) -> Result<AchievementDetail> {
    input.validate()?;
    let reference = self.editable_reference(actor, reference_id).await?;
    let detail = self.load_detail(reference.detail_id, false).await?;
    if detail.attachment(&input.file_name).is_some() {
      return Err(Error::Validation(format!(
        "attachment {:?} already exists",
        input.file_name
      )));
    }

    guarded(
      "push_attachment",
      self.settings.store_timeout,
      self
        .details
        .push_attachment(reference.detail_id, input.stamp(Utc::now())),
    )
    .await?
    .ok_or_else(|| Error::not_found("achievement detail", reference.detail_id))
  }

  pub async fn remove_attachment(
    &self,
    actor: &Actor,
    reference_id: Uuid,
    file_name: &str,
  ) -> Result<AchievementDetail> {
    let reference = self.editable_reference(actor, reference_id).await?;
    let detail = self.load_detail(reference.detail_id, false).await?;
    if detail.attachment(file_name).is_none() {
      return Err(Error::not_found("attachment", file_name));
    }

    guarded(
      "pull_attachment",
      self.settings.store_timeout,
      self
        .details
        .pull_attachment(reference.detail_id, file_name.to_owned()),
    )
    .await?
    .ok_or_else(|| Error::not_found("achievement detail", reference.detail_id))
  }

  /// Administrative hard delete: hide the detail document, then remove the
  /// reference row for good. Works from any status.
  pub async fn purge(&self, actor: &Actor, reference_id: Uuid) -> Result<()> {
    if !matches!(actor, Actor::Admin { .. }) {
      return Err(Error::Forbidden("only administrators may purge".into()));
    }
    let reference = self.load_reference(reference_id).await?;

    let details = Arc::clone(&self.details);
    let references = Arc::clone(&self.references);
    let ledger = self.ledger.clone();
    let timeout = self.settings.store_timeout;
    let detail_id = reference.detail_id;

    detached(async move {
      guarded("soft_delete", timeout, details.soft_delete(detail_id)).await?;

      match guarded(
        "delete_reference",
        timeout,
        references.delete_reference(reference_id),
      )
      .await
      {
        Ok(true) => {
          tracing::info!(%reference_id, %detail_id, "reference purged");
          Ok(())
        }
        Ok(false) => Err(Error::not_found("achievement reference", reference_id)),
        Err(e) => {
          ledger.flag(ConsistencyWarning::HiddenDetailLiveReference {
            reference_id,
            detail_id,
            cause: e.to_string(),
          });
          Err(e)
        }
      }
    })
    .await
  }

  // ── Reads ────────────────────────────────────────────────────────────────

  /// A student's achievements, newest first. Deleted achievements are left
  /// out; a student without any yields an empty list.
  pub async fn get_by_student(
    &self,
    actor: &Actor,
    student_id: Uuid,
    limit: usize,
    offset: usize,
  ) -> Result<Vec<ReferenceSummary>> {
    self.require_reader(actor, student_id).await?;
    let query = ReferenceQuery::for_student(student_id).page(limit, offset);
    self
      .read("list_references", || self.references.list_references(query.clone()))
      .await
  }

  /// Achievements across the caller's whole scope, optionally filtered by
  /// status (an advisor's `submitted` queue, for instance).
  pub async fn list(
    &self,
    actor: &Actor,
    status: Option<Status>,
    limit: usize,
    offset: usize,
  ) -> Result<Vec<ReferenceSummary>> {
    let scope = self.scope(actor).await?;
    if scope.is_empty() {
      return Ok(Vec::new());
    }
    let query = ReferenceQuery {
      student_ids: scope.student_ids(),
      status,
      ..ReferenceQuery::default()
    }
    .page(limit, offset);
    self
      .read("list_references", || self.references.list_references(query.clone()))
      .await
  }

  /// A visible detail document. Soft-deleted documents are not found here;
  /// use [`Coordinator::history`]. Documents outside the caller's scope are
  /// reported as not found, so existence does not leak.
  pub async fn get_detail(
    &self,
    actor: &Actor,
    detail_id: Uuid,
  ) -> Result<AchievementDetail> {
    let detail = self.load_detail(detail_id, false).await?;
    match self.require_reader(actor, detail.student_id).await {
      Ok(()) => Ok(detail),
      Err(Error::Forbidden(_)) => Err(Error::not_found("achievement detail", detail_id)),
      Err(e) => Err(e),
    }
  }

  /// The reference row and its detail document, including soft-deleted
  /// documents.
  pub async fn history(
    &self,
    actor: &Actor,
    reference_id: Uuid,
  ) -> Result<AchievementHistory> {
    let reference = self.load_reference(reference_id).await?;
    self.require_reader(actor, reference.student_id).await?;
    let detail_id = reference.detail_id;
    let detail = self
      .read("get_detail", || self.details.get_detail(detail_id, true))
      .await?;
    Ok(AchievementHistory { reference, detail })
  }

  /// Visible documents carrying `tag` within the caller's scope, newest
  /// first.
  pub async fn find_by_tag(
    &self,
    actor: &Actor,
    tag: &str,
    limit: usize,
  ) -> Result<Vec<AchievementDetail>> {
    let tag = tag.trim();
    if tag.is_empty() {
      return Err(Error::Validation("tag must not be empty".into()));
    }
    let scope = self.scope(actor).await?;
    if scope.is_empty() {
      return Ok(Vec::new());
    }
    let student_ids = scope.student_ids();
    let limit = page_limit(limit);
    self
      .read("find_by_tag", || {
        self
          .details
          .find_by_tag(tag.to_owned(), student_ids.clone(), limit)
      })
      .await
  }

  /// The caller's read scope.
  pub async fn scope(&self, actor: &Actor) -> Result<Scope> {
    self
      .read("advisees_of", || scope::scope_for(self.directory.as_ref(), actor))
      .await
  }

  // ── Helpers ──────────────────────────────────────────────────────────────

  /// Run an idempotent read under the timeout, retrying storage failures.
  async fn read<T, E, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
  {
    let mut attempt = 0;
    loop {
      match guarded(op, self.settings.store_timeout, call()).await {
        Err(e) if e.is_retryable() && attempt < self.settings.read_retries => {
          attempt += 1;
          tracing::debug!(op, attempt, error = %e, "retrying read");
        }
        other => return other,
      }
    }
  }

  async fn load_reference(&self, reference_id: Uuid) -> Result<AchievementReference> {
    self
      .read("get_reference", || self.references.get_reference(reference_id))
      .await?
      .ok_or_else(|| Error::not_found("achievement reference", reference_id))
  }

  async fn load_detail(
    &self,
    detail_id: Uuid,
    include_deleted: bool,
  ) -> Result<AchievementDetail> {
    self
      .read("get_detail", || self.details.get_detail(detail_id, include_deleted))
      .await?
      .ok_or_else(|| Error::not_found("achievement detail", detail_id))
  }

  /// Load a reference the caller owns and that is still a draft.
  async fn editable_reference(
    &self,
    actor: &Actor,
    reference_id: Uuid,
  ) -> Result<AchievementReference> {
    let reference = self.load_reference(reference_id).await?;
    self.require_owner(actor, &reference)?;
    require_status(&reference, Operation::Edit)?;
    Ok(reference)
  }

  fn require_owner(&self, actor: &Actor, reference: &AchievementReference) -> Result<()> {
    if actor.may_own(reference.student_id) {
      Ok(())
    } else {
      Err(Error::Forbidden(format!(
        "{} does not own achievement {}",
        actor.role(),
        reference.reference_id
      )))
    }
  }

  async fn require_decider(
    &self,
    actor: &Actor,
    reference: &AchievementReference,
  ) -> Result<()> {
    let student_id = reference.student_id;
    let allowed = self
      .read("is_advisor_of", || {
        scope::may_decide(self.directory.as_ref(), actor, student_id)
      })
      .await?;
    if allowed {
      Ok(())
    } else {
      Err(Error::Forbidden(format!(
        "{} is not the advisor of student {student_id}",
        actor.role()
      )))
    }
  }

  async fn require_reader(&self, actor: &Actor, student_id: Uuid) -> Result<()> {
    let allowed = self
      .read("is_advisor_of", || {
        scope::may_read(self.directory.as_ref(), actor, student_id)
      })
      .await?;
    if allowed {
      Ok(())
    } else {
      Err(Error::Forbidden(format!(
        "{} may not read achievements of student {student_id}",
        actor.role()
      )))
    }
  }
}

// ─── Free helpers ────────────────────────────────────────────────────────────

fn require_status(reference: &AchievementReference, op: Operation) -> Result<()> {
  if op.is_permitted_from(reference.status) {
    Ok(())
  } else {
    Err(Error::InvalidTransition { current: reference.status, attempted: op })
  }
}

/// Conditional status write. A lost race surfaces as `InvalidTransition`
/// carrying the status the winner left behind.
async fn apply_change<R: ReferenceStore>(
  references: &R,
  timeout: Duration,
  reference_id: Uuid,
  change: StatusChange,
) -> Result<AchievementReference> {
  let attempted = change.operation();
  match guarded("transition", timeout, references.transition(reference_id, change)).await? {
    TransitionOutcome::Applied(reference) => {
      tracing::debug!(
        %reference_id,
        status = %reference.status,
        "status changed"
      );
      Ok(reference)
    }
    TransitionOutcome::Stale(current) => {
      Err(Error::InvalidTransition { current, attempted })
    }
    TransitionOutcome::Missing => {
      Err(Error::not_found("achievement reference", reference_id))
    }
  }
}

/// Await a store call under `timeout`, mapping both store failures and
/// timeouts to [`Error::Storage`].
async fn guarded<T, E>(
  op: &'static str,
  timeout: Duration,
  call: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
  E: std::error::Error + Send + Sync + 'static,
{
  match tokio::time::timeout(timeout, call).await {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => {
      tracing::warn!(op, error = %e, "store call failed");
      Err(Error::storage(e))
    }
    Err(_) => {
      tracing::warn!(op, ?timeout, "store call timed out");
      Err(Error::storage(TimedOut { op, after: timeout }))
    }
  }
}

/// Run a multi-write sequence on its own task, so that dropping the caller's
/// future cannot stop the sequence between two writes.
async fn detached<T>(
  sequence: impl Future<Output = Result<T>> + Send + 'static,
) -> Result<T>
where
  T: Send + 'static,
{
  match tokio::spawn(sequence).await {
    Ok(result) => result,
    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
    Err(e) => Err(Error::storage(e)),
  }
}
