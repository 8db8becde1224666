//! [`SqliteDetailStore`]: the SQLite implementation of [`DetailStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use accolade_core::{
  achievement::{AchievementDetail, Attachment, DetailPatch, NewDetail},
  store::DetailStore,
};

use crate::{
  Result,
  encode::{
    DETAIL_COLUMNS, RawDetail, encode_attachment, encode_details, encode_dt,
    encode_tags, encode_uuid, encode_uuids,
  },
  schema::DETAIL_SCHEMA,
};

/// Detail documents backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteDetailStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteDetailStore {
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
        conn.execute_batch(DETAIL_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run an `UPDATE ... RETURNING` against one visible document.
  async fn update_returning(
    &self,
    sql: String,
    params: Vec<Option<String>>,
  ) -> Result<Option<AchievementDetail>> {
    let raw: Option<RawDetail> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params_from_iter(params.iter()),
              RawDetail::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDetail::into_detail).transpose()
  }
}

impl DetailStore for SqliteDetailStore {
  type Error = crate::Error;

  async fn insert_detail(
    &self,
    student_id: Uuid,
    input: NewDetail,
  ) -> Result<AchievementDetail> {
    let now = Utc::now();
    let detail = AchievementDetail {
      detail_id: Uuid::new_v4(),
      student_id,
      title: input.title,
      description: input.description,
      details: input.details,
      attachments: Vec::new(),
      tags: input.tags,
      points: input.points,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    };

    let id_str              = encode_uuid(detail.detail_id);
    let student_str         = encode_uuid(student_id);
    let (type_tag, payload) = encode_details(&detail.details)?;
    let title               = detail.title.clone();
    let description         = detail.description.clone();
    let tags_str            = encode_tags(&detail.tags)?;
    let points              = i64::from(detail.points);
    let at_str              = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO achievement_details (
             detail_id, student_id, achievement_type, title, description,
             details_json, attachments, tags, points, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, '[]', ?7, ?8, ?9, ?9)",
          rusqlite::params![
            id_str,
            student_str,
            type_tag,
            title,
            description,
            payload,
            tags_str,
            points,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(detail)
  }

  async fn get_detail(
    &self,
    detail_id: Uuid,
    include_deleted: bool,
  ) -> Result<Option<AchievementDetail>> {
    let id_str = encode_uuid(detail_id);

    let raw: Option<RawDetail> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {DETAIL_COLUMNS} FROM achievement_details
                 WHERE detail_id = ?1 AND (?2 OR deleted_at IS NULL)"
              ),
              rusqlite::params![id_str, include_deleted],
              RawDetail::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDetail::into_detail).transpose()
  }

  async fn update_detail(
    &self,
    detail_id: Uuid,
    patch: DetailPatch,
  ) -> Result<Option<AchievementDetail>> {
    let (type_tag, payload) = match &patch.details {
      Some(details) => {
        let (tag, payload) = encode_details(details)?;
        (Some(tag), Some(payload))
      }
      None => (None, None),
    };
    let tags_str = patch.tags.as_deref().map(encode_tags).transpose()?;

    self
      .update_returning(
        format!(
          "UPDATE achievement_details SET
             title            = COALESCE(?3, title),
             description      = COALESCE(?4, description),
             achievement_type = COALESCE(?5, achievement_type),
             details_json     = COALESCE(?6, details_json),
             tags             = COALESCE(?7, tags),
             updated_at       = ?2
           WHERE detail_id = ?1 AND deleted_at IS NULL
           RETURNING {DETAIL_COLUMNS}"
        ),
        vec![
          Some(encode_uuid(detail_id)),
          Some(encode_dt(Utc::now())),
          patch.title,
          patch.description,
          type_tag,
          payload,
          tags_str,
        ],
      )
      .await
  }

  async fn set_points(&self, detail_id: Uuid, points: u32) -> Result<bool> {
    let id_str = encode_uuid(detail_id);
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE achievement_details SET points = ?2, updated_at = ?3
           WHERE detail_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id_str, i64::from(points), at_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn push_attachment(
    &self,
    detail_id: Uuid,
    attachment: Attachment,
  ) -> Result<Option<AchievementDetail>> {
    self
      .update_returning(
        format!(
          "UPDATE achievement_details SET
             attachments = json_insert(attachments, '$[#]', json(?3)),
             updated_at  = ?2
           WHERE detail_id = ?1 AND deleted_at IS NULL
           RETURNING {DETAIL_COLUMNS}"
        ),
        vec![
          Some(encode_uuid(detail_id)),
          Some(encode_dt(Utc::now())),
          Some(encode_attachment(&attachment)?),
        ],
      )
      .await
  }

  async fn pull_attachment(
    &self,
    detail_id: Uuid,
    file_name: String,
  ) -> Result<Option<AchievementDetail>> {
    self
      .update_returning(
        format!(
          "UPDATE achievement_details SET
             attachments = (
               SELECT json_group_array(json(a.value))
               FROM json_each(achievement_details.attachments) AS a
               WHERE json_extract(a.value, '$.file_name') IS NOT ?3
             ),
             updated_at  = ?2
           WHERE detail_id = ?1 AND deleted_at IS NULL
           RETURNING {DETAIL_COLUMNS}"
        ),
        vec![
          Some(encode_uuid(detail_id)),
          Some(encode_dt(Utc::now())),
          Some(file_name),
        ],
      )
      .await
  }

  async fn soft_delete(&self, detail_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(detail_id);
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE achievement_details
           SET deleted_at = COALESCE(deleted_at, ?2), updated_at = ?2
           WHERE detail_id = ?1",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn find_by_tag(
    &self,
    tag: String,
    student_ids: Option<Vec<Uuid>>,
    limit: usize,
  ) -> Result<Vec<AchievementDetail>> {
    let students_json = student_ids.as_deref().map(encode_uuids).transpose()?;
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawDetail> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DETAIL_COLUMNS} FROM achievement_details d
           WHERE d.deleted_at IS NULL
             AND EXISTS (SELECT 1 FROM json_each(d.tags) t WHERE t.value = ?1)
             AND (?2 IS NULL OR d.student_id IN (SELECT value FROM json_each(?2)))
           ORDER BY d.created_at DESC
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![tag, students_json, limit_val],
            RawDetail::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDetail::into_detail).collect()
  }
}
