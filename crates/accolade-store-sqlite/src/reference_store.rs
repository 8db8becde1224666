//! [`SqliteReferenceStore`]: the SQLite implementation of
//! [`ReferenceStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use accolade_core::{
  reference::{
    AchievementReference, ReferenceQuery, ReferenceSummary, Status,
    StatusChange, TransitionOutcome,
  },
  store::ReferenceStore,
};

use crate::{
  Result,
  encode::{
    REFERENCE_COLUMNS, RawReference, decode_status, encode_dt, encode_status,
    encode_uuid, encode_uuids,
  },
  schema::REFERENCE_SCHEMA,
};

/// Reference rows and the advisor directory, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteReferenceStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteReferenceStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(REFERENCE_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_reference_where(
    &self,
    column: &'static str,
    id: Uuid,
  ) -> Result<Option<AchievementReference>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawReference> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {REFERENCE_COLUMNS} FROM achievement_references
                 WHERE {column} = ?1"
              ),
              rusqlite::params![id_str],
              RawReference::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReference::into_reference).transpose()
  }
}

impl ReferenceStore for SqliteReferenceStore {
  type Error = crate::Error;

  async fn insert_reference(
    &self,
    student_id: Uuid,
    detail_id: Uuid,
  ) -> Result<AchievementReference> {
    let now = Utc::now();
    let reference = AchievementReference {
      reference_id: Uuid::new_v4(),
      student_id,
      detail_id,
      status: Status::Draft,
      submitted_at: None,
      verified_at: None,
      verified_by: None,
      rejection_note: None,
      created_at: now,
      updated_at: now,
    };

    let id_str      = encode_uuid(reference.reference_id);
    let student_str = encode_uuid(student_id);
    let detail_str  = encode_uuid(detail_id);
    let status_str  = encode_status(Status::Draft);
    let at_str      = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO achievement_references (
             reference_id, student_id, detail_id, status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id_str, student_str, detail_str, status_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(reference)
  }

  async fn get_reference(
    &self,
    reference_id: Uuid,
  ) -> Result<Option<AchievementReference>> {
    self.get_reference_where("reference_id", reference_id).await
  }

  async fn get_reference_by_detail(
    &self,
    detail_id: Uuid,
  ) -> Result<Option<AchievementReference>> {
    self.get_reference_where("detail_id", detail_id).await
  }

  async fn list_references(
    &self,
    query: ReferenceQuery,
  ) -> Result<Vec<ReferenceSummary>> {
    let students_json =
      query.student_ids.as_deref().map(encode_uuids).transpose()?;
    let status_str = query.status.map(encode_status);
    let limit_val  = i64::try_from(query.effective_limit()).unwrap_or(i64::MAX);
    let offset_val = i64::try_from(query.effective_offset()).unwrap_or(i64::MAX);

    let raws: Vec<RawReference> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {REFERENCE_COLUMNS} FROM achievement_references
           WHERE (?1 IS NULL OR student_id IN (SELECT value FROM json_each(?1)))
             AND (CASE WHEN ?2 IS NULL THEN status != 'deleted' ELSE status = ?2 END)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![students_json, status_str, limit_val, offset_val],
            RawReference::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|raw| raw.into_reference().map(|r| r.summary()))
      .collect()
  }

  /// A single conditional `UPDATE ... WHERE status = expected`. When it
  /// matches nothing, the current status is read on the same connection to
  /// tell a lost race from a missing row.
  async fn transition(
    &self,
    reference_id: Uuid,
    change: StatusChange,
  ) -> Result<TransitionOutcome> {
    let id_str       = encode_uuid(reference_id);
    let expected_str = encode_status(change.expected());
    let target_str   = encode_status(change.target());
    let at_str       = encode_dt(change.at());

    let (submitted_at, verified_at, verified_by, note) = match &change {
      StatusChange::Submit { .. } => (Some(at_str.clone()), None, None, None),
      StatusChange::Verify { verifier_id, .. } => {
        (None, Some(at_str.clone()), Some(encode_uuid(*verifier_id)), None)
      }
      StatusChange::Reject { note, .. } => {
        (None, Some(at_str.clone()), None, Some(note.clone()))
      }
      StatusChange::Delete { .. } => (None, None, None, None),
    };

    let (applied, current): (Option<RawReference>, Option<String>) = self
      .conn
      .call(move |conn| {
        let applied = conn
          .query_row(
            &format!(
              "UPDATE achievement_references SET
                 status         = ?3,
                 updated_at     = ?4,
                 submitted_at   = COALESCE(?5, submitted_at),
                 verified_at    = COALESCE(?6, verified_at),
                 verified_by    = COALESCE(?7, verified_by),
                 rejection_note = COALESCE(?8, rejection_note)
               WHERE reference_id = ?1 AND status = ?2
               RETURNING {REFERENCE_COLUMNS}"
            ),
            rusqlite::params![
              id_str,
              expected_str,
              target_str,
              at_str,
              submitted_at,
              verified_at,
              verified_by,
              note,
            ],
            RawReference::from_row,
          )
          .optional()?;
        if applied.is_some() {
          return Ok((applied, None));
        }

        let current = conn
          .query_row(
            "SELECT status FROM achievement_references WHERE reference_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;
        Ok((None, current))
      })
      .await?;

    Ok(match (applied, current) {
      (Some(raw), _) => TransitionOutcome::Applied(raw.into_reference()?),
      (None, Some(status)) => TransitionOutcome::Stale(decode_status(&status)?),
      (None, None) => TransitionOutcome::Missing,
    })
  }

  async fn delete_reference(&self, reference_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(reference_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM achievement_references WHERE reference_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }
}
