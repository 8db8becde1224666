//! Achievement detail documents: the variable-shaped payload kept in the
//! document store.
//!
//! The type tag is never stored on its own: it is the discriminant of
//! [`AchievementDetails`], so the tag and the type-specific fields cannot
//! disagree.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Type tag ────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AchievementType {
  Competition,
  Publication,
  Certification,
  Organizational,
  Other,
}

// ─── Type-specific details ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionLevel {
  International,
  National,
  Regional,
  Local,
}

/// Every type-specific field is optional: a `{type, title}` pair is enough
/// to open a draft, and the rest is filled in while editing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionDetails {
  pub competition_name: Option<String>,
  pub level:            Option<CompetitionLevel>,
  /// Final placing, 1 being first.
  pub rank:             Option<u32>,
  /// e.g. "gold", "silver", "honourable mention".
  pub medal:            Option<String>,
  pub event_date:       Option<NaiveDate>,
  pub location:         Option<String>,
  pub organizer:        Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationDetails {
  /// Journal, conference, book chapter, ...
  pub publication_type:  Option<String>,
  pub publication_title: Option<String>,
  pub authors:           Vec<String>,
  pub publisher:         Option<String>,
  pub issn:              Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificationDetails {
  pub certification_name:   Option<String>,
  pub issued_by:            Option<String>,
  pub certification_number: Option<String>,
  pub valid_until:          Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationalDetails {
  pub organization_name: Option<String>,
  pub position:          Option<String>,
  pub period_start:      Option<NaiveDate>,
  pub period_end:        Option<NaiveDate>,
}

/// The type-specific bag of an achievement. The variant name is the
/// achievement type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AchievementDetails {
  Competition(CompetitionDetails),
  Publication(PublicationDetails),
  Certification(CertificationDetails),
  Organizational(OrganizationalDetails),
  /// Anything that does not fit the taxonomy.
  Other(serde_json::Map<String, serde_json::Value>),
}

impl AchievementDetails {
  pub fn achievement_type(&self) -> AchievementType {
    match self {
      Self::Competition(_) => AchievementType::Competition,
      Self::Publication(_) => AchievementType::Publication,
      Self::Certification(_) => AchievementType::Certification,
      Self::Organizational(_) => AchievementType::Organizational,
      Self::Other(_) => AchievementType::Other,
    }
  }

  /// Build details from a type tag and its untyped payload, as received from
  /// a client. A missing payload is the type's empty bag. An unrecognized
  /// tag or a field of the wrong shape is a validation error.
  pub fn from_parts(type_tag: &str, data: serde_json::Value) -> Result<Self> {
    let kind: AchievementType = type_tag.parse().map_err(|_| {
      Error::Validation(format!("unknown achievement type: {type_tag:?}"))
    })?;
    let data = match data {
      serde_json::Value::Null => serde_json::Value::Object(Default::default()),
      data => data,
    };
    let wrapped = serde_json::json!({ "type": kind.as_ref(), "data": data });
    serde_json::from_value(wrapped).map_err(|e| {
      Error::Validation(format!("invalid {kind} details: {e}"))
    })
  }

  /// Checks only what is present: names that are given must not be blank
  /// and a given period must be ordered.
  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Competition(c) => {
        require_present("competition_name", c.competition_name.as_deref())
      }
      Self::Publication(p) => {
        require_present("publication_title", p.publication_title.as_deref())?;
        require_present("publication_type", p.publication_type.as_deref())?;
        if p.authors.iter().any(|a| a.trim().is_empty()) {
          return Err(Error::Validation("authors must not be blank".into()));
        }
        Ok(())
      }
      Self::Certification(c) => {
        require_present("certification_name", c.certification_name.as_deref())?;
        require_present("issued_by", c.issued_by.as_deref())
      }
      Self::Organizational(o) => {
        require_present("organization_name", o.organization_name.as_deref())?;
        require_present("position", o.position.as_deref())?;
        if let (Some(start), Some(end)) = (o.period_start, o.period_end)
          && end < start
        {
          return Err(Error::Validation(
            "period_end is before period_start".into(),
          ));
        }
        Ok(())
      }
      Self::Other(_) => Ok(()),
    }
  }
}

fn require_present(field: &str, value: Option<&str>) -> Result<()> {
  match value {
    Some(value) => require(field, value),
    None => Ok(()),
  }
}

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{field} must not be empty")));
  }
  Ok(())
}

fn validate_tags(tags: &[String]) -> Result<()> {
  if tags.iter().any(|t| t.trim().is_empty()) {
    return Err(Error::Validation("tags must not be empty".into()));
  }
  Ok(())
}

// ─── Attachments ─────────────────────────────────────────────────────────────

/// A file attached as evidence. Only the URL is stored; the bytes live
/// elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
  pub file_name:   String,
  pub file_url:    String,
  /// MIME type, e.g. `application/pdf`.
  pub file_type:   String,
  pub uploaded_at: DateTime<Utc>,
}

/// Input to [`crate::lifecycle::Coordinator::add_attachment`]. The upload
/// timestamp is assigned by the coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAttachment {
  pub file_name: String,
  pub file_url:  String,
  pub file_type: String,
}

impl NewAttachment {
  pub fn validate(&self) -> Result<()> {
    require("file_name", &self.file_name)?;
    require("file_url", &self.file_url)
  }

  pub fn stamp(self, uploaded_at: DateTime<Utc>) -> Attachment {
    Attachment {
      file_name: self.file_name,
      file_url: self.file_url,
      file_type: self.file_type,
      uploaded_at,
    }
  }
}

// ─── AchievementDetail ───────────────────────────────────────────────────────

/// The detail document. `detail_id`, `student_id` and `created_at` never
/// change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDetail {
  pub detail_id:   Uuid,
  /// Denormalised copy of the owning reference's student id.
  pub student_id:  Uuid,
  pub title:       String,
  pub description: String,
  pub details:     AchievementDetails,
  pub attachments: Vec<Attachment>,
  pub tags:        Vec<String>,
  pub points:      u32,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
  pub deleted_at:  Option<DateTime<Utc>>,
}

impl AchievementDetail {
  pub fn achievement_type(&self) -> AchievementType {
    self.details.achievement_type()
  }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }

  pub fn attachment(&self, file_name: &str) -> Option<&Attachment> {
    self.attachments.iter().find(|a| a.file_name == file_name)
  }
}

// ─── NewDetail ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::DetailStore::insert_detail`]. Identity and
/// timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDetail {
  pub title:       String,
  pub description: String,
  pub details:     AchievementDetails,
  pub tags:        Vec<String>,
  /// Usually left at 0 and assigned by the verifier.
  pub points:      u32,
}

impl NewDetail {
  pub fn new(title: impl Into<String>, details: AchievementDetails) -> Self {
    Self {
      title: title.into(),
      description: String::new(),
      details,
      tags: Vec::new(),
      points: 0,
    }
  }

  pub fn validate(&self) -> Result<()> {
    require("title", &self.title)?;
    validate_tags(&self.tags)?;
    self.details.validate()
  }
}

// ─── DetailPatch ─────────────────────────────────────────────────────────────

/// A partial update to a draft's detail document. `None` leaves the field as
/// it is.
#[derive(Debug, Clone, Default)]
pub struct DetailPatch {
  pub title:       Option<String>,
  pub description: Option<String>,
  pub details:     Option<AchievementDetails>,
  pub tags:        Option<Vec<String>>,
}

impl DetailPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.details.is_none()
      && self.tags.is_none()
  }

  pub fn validate(&self) -> Result<()> {
    if self.is_empty() {
      return Err(Error::Validation("update changes nothing".into()));
    }
    if let Some(title) = &self.title {
      require("title", title)?;
    }
    if let Some(tags) = &self.tags {
      validate_tags(tags)?;
    }
    if let Some(details) = &self.details {
      details.validate()?;
    }
    Ok(())
  }

  /// Apply the patch in place. Does not touch `updated_at`.
  pub fn apply_to(self, detail: &mut AchievementDetail) {
    if let Some(title) = self.title {
      detail.title = title;
    }
    if let Some(description) = self.description {
      detail.description = description;
    }
    if let Some(details) = self.details {
      detail.details = details;
    }
    if let Some(tags) = self.tags {
      detail.tags = tags;
    }
  }
}
