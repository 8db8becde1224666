//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with fixed nanosecond precision, so that
//! lexical order in SQL matches chronological order. UUIDs are hyphenated
//! lowercase strings. Structured fields are compact JSON.

use accolade_core::{
  achievement::{AchievementDetail, AchievementDetails, Attachment},
  reference::{AchievementReference, Status},
};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_uuids(ids: &[Uuid]) -> Result<String> {
  let ids: Vec<String> = ids.iter().copied().map(encode_uuid).collect();
  Ok(serde_json::to_string(&ids)?)
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Status ──────────────────────────────────────────────────────────────────

pub fn encode_status(status: Status) -> &'static str {
  match status {
    Status::Draft => "draft",
    Status::Submitted => "submitted",
    Status::Verified => "verified",
    Status::Rejected => "rejected",
    Status::Deleted => "deleted",
  }
}

pub fn decode_status(s: &str) -> Result<Status> {
  s.parse().map_err(|_| Error::UnknownValue {
    kind:  "status",
    value: s.to_owned(),
  })
}

// ─── Detail payloads ─────────────────────────────────────────────────────────

/// Split details into the type tag column and the inner JSON payload.
pub fn encode_details(details: &AchievementDetails) -> Result<(String, String)> {
  let mut tagged = serde_json::to_value(details)?;
  let data = tagged
    .get_mut("data")
    .map(serde_json::Value::take)
    .unwrap_or(serde_json::Value::Null);
  Ok((details.achievement_type().to_string(), data.to_string()))
}

pub fn encode_tags(tags: &[String]) -> Result<String> {
  Ok(serde_json::to_string(tags)?)
}

pub fn encode_attachment(attachment: &Attachment) -> Result<String> {
  Ok(serde_json::to_string(attachment)?)
}

fn decode_points(points: i64) -> Result<u32> {
  u32::try_from(points).map_err(|_| Error::PointsOutOfRange(points))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawDetail::from_row`].
pub const DETAIL_COLUMNS: &str = "detail_id, student_id, achievement_type, \
  title, description, details_json, attachments, tags, points, created_at, \
  updated_at, deleted_at";

/// Raw values read directly from an `achievement_details` row.
pub struct RawDetail {
  pub detail_id:        String,
  pub student_id:       String,
  pub achievement_type: String,
  pub title:            String,
  pub description:      String,
  pub details_json:     String,
  pub attachments:      String,
  pub tags:             String,
  pub points:           i64,
  pub created_at:       String,
  pub updated_at:       String,
  pub deleted_at:       Option<String>,
}

impl RawDetail {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      detail_id:        row.get(0)?,
      student_id:       row.get(1)?,
      achievement_type: row.get(2)?,
      title:            row.get(3)?,
      description:      row.get(4)?,
      details_json:     row.get(5)?,
      attachments:      row.get(6)?,
      tags:             row.get(7)?,
      points:           row.get(8)?,
      created_at:       row.get(9)?,
      updated_at:       row.get(10)?,
      deleted_at:       row.get(11)?,
    })
  }

  pub fn into_detail(self) -> Result<AchievementDetail> {
    let data: serde_json::Value = serde_json::from_str(&self.details_json)?;
    Ok(AchievementDetail {
      detail_id:   decode_uuid(&self.detail_id)?,
      student_id:  decode_uuid(&self.student_id)?,
      title:       self.title,
      description: self.description,
      details:     AchievementDetails::from_parts(&self.achievement_type, data)?,
      attachments: serde_json::from_str(&self.attachments)?,
      tags:        serde_json::from_str(&self.tags)?,
      points:      decode_points(self.points)?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
      deleted_at:  decode_opt_dt(self.deleted_at)?,
    })
  }
}

/// Column list matching [`RawReference::from_row`].
pub const REFERENCE_COLUMNS: &str = "reference_id, student_id, detail_id, \
  status, submitted_at, verified_at, verified_by, rejection_note, created_at, \
  updated_at";

/// Raw values read directly from an `achievement_references` row.
pub struct RawReference {
  pub reference_id:   String,
  pub student_id:     String,
  pub detail_id:      String,
  pub status:         String,
  pub submitted_at:   Option<String>,
  pub verified_at:    Option<String>,
  pub verified_by:    Option<String>,
  pub rejection_note: Option<String>,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawReference {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reference_id:   row.get(0)?,
      student_id:     row.get(1)?,
      detail_id:      row.get(2)?,
      status:         row.get(3)?,
      submitted_at:   row.get(4)?,
      verified_at:    row.get(5)?,
      verified_by:    row.get(6)?,
      rejection_note: row.get(7)?,
      created_at:     row.get(8)?,
      updated_at:     row.get(9)?,
    })
  }

  pub fn into_reference(self) -> Result<AchievementReference> {
    Ok(AchievementReference {
      reference_id:   decode_uuid(&self.reference_id)?,
      student_id:     decode_uuid(&self.student_id)?,
      detail_id:      decode_uuid(&self.detail_id)?,
      status:         decode_status(&self.status)?,
      submitted_at:   decode_opt_dt(self.submitted_at)?,
      verified_at:    decode_opt_dt(self.verified_at)?,
      verified_by:    self.verified_by.as_deref().map(decode_uuid).transpose()?,
      rejection_note: self.rejection_note,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use accolade_core::achievement::{
    AchievementType, CertificationDetails,
  };

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let early = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
      .unwrap()
      .with_timezone(&Utc);
    let late = early + chrono::Duration::nanoseconds(1_500);
    assert!(encode_dt(early) < encode_dt(late));
    assert_eq!(encode_dt(early).len(), encode_dt(late).len());
    assert_eq!(decode_dt(&encode_dt(late)).unwrap(), late);
  }

  #[test]
  fn details_split_into_tag_and_payload() {
    let details = AchievementDetails::Certification(CertificationDetails {
      certification_name:   Some("AWS Solutions Architect".into()),
      issued_by:            Some("Amazon".into()),
      certification_number: None,
      valid_until:          None,
    });
    let (tag, data) = encode_details(&details).unwrap();
    assert_eq!(tag, "certification");
    assert!(!data.contains("\"type\""));

    let decoded =
      AchievementDetails::from_parts(&tag, serde_json::from_str(&data).unwrap())
        .unwrap();
    assert_eq!(decoded.achievement_type(), AchievementType::Certification);
    assert_eq!(decoded, details);
  }

  #[test]
  fn unknown_status_is_rejected() {
    assert!(matches!(
      decode_status("archived"),
      Err(Error::UnknownValue { kind: "status", .. })
    ));
    assert_eq!(decode_status(encode_status(Status::Rejected)).unwrap(), Status::Rejected);
  }
}
