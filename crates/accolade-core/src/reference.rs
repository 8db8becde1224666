//! Reference rows and the status state machine.
//!
//! ```text
//! draft --submit--> submitted --verify--> verified
//! draft --submit--> submitted --reject--> rejected
//! draft --delete-------------------------> deleted
//! ```
//!
//! `verified`, `rejected` and `deleted` are terminal. Nothing leads back to
//! `draft`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
  Draft,
  Submitted,
  Verified,
  Rejected,
  Deleted,
}

impl Status {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Verified | Self::Rejected | Self::Deleted)
  }
}

// ─── Operation ───────────────────────────────────────────────────────────────

/// Everything a caller can attempt against a reference that depends on its
/// status.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
  Submit,
  Verify,
  Reject,
  Delete,
  /// Changes to a draft's detail document or attachments. Leaves the status
  /// as it is.
  Edit,
}

impl Operation {
  /// The status the operation requires and the status it leaves behind.
  pub fn transition(self) -> (Status, Status) {
    match self {
      Self::Submit => (Status::Draft, Status::Submitted),
      Self::Verify => (Status::Submitted, Status::Verified),
      Self::Reject => (Status::Submitted, Status::Rejected),
      Self::Delete => (Status::Draft, Status::Deleted),
      Self::Edit => (Status::Draft, Status::Draft),
    }
  }

  pub fn requires(self) -> Status { self.transition().0 }

  pub fn is_permitted_from(self, current: Status) -> bool {
    self.requires() == current
  }
}

// ─── AchievementReference ────────────────────────────────────────────────────

/// The relational record tracking status and ownership of one detail
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementReference {
  pub reference_id:   Uuid,
  pub student_id:     Uuid,
  /// Exactly one reference exists per detail document.
  pub detail_id:      Uuid,
  pub status:         Status,
  pub submitted_at:   Option<DateTime<Utc>>,
  /// Decision time; set by both verify and reject.
  pub verified_at:    Option<DateTime<Utc>>,
  /// Set by verify only.
  pub verified_by:    Option<Uuid>,
  /// Present iff the status is `rejected`.
  pub rejection_note: Option<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

impl AchievementReference {
  pub fn summary(&self) -> ReferenceSummary {
    ReferenceSummary {
      reference_id: self.reference_id,
      detail_id:    self.detail_id,
      student_id:   self.student_id,
      status:       self.status,
      submitted_at: self.submitted_at,
      created_at:   self.created_at,
      updated_at:   self.updated_at,
    }
  }
}

/// The listing shape of a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSummary {
  pub reference_id: Uuid,
  pub detail_id:    Uuid,
  pub student_id:   Uuid,
  pub status:       Status,
  pub submitted_at: Option<DateTime<Utc>>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

// ─── Status changes ──────────────────────────────────────────────────────────

/// A conditional status write. The store applies it only if the row is still
/// in [`StatusChange::expected`].
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
  Submit { at: DateTime<Utc> },
  Verify { at: DateTime<Utc>, verifier_id: Uuid },
  Reject { at: DateTime<Utc>, note: String },
  Delete { at: DateTime<Utc> },
}

impl StatusChange {
  pub fn operation(&self) -> Operation {
    match self {
      Self::Submit { .. } => Operation::Submit,
      Self::Verify { .. } => Operation::Verify,
      Self::Reject { .. } => Operation::Reject,
      Self::Delete { .. } => Operation::Delete,
    }
  }

  pub fn expected(&self) -> Status { self.operation().transition().0 }

  pub fn target(&self) -> Status { self.operation().transition().1 }

  pub fn at(&self) -> DateTime<Utc> {
    match self {
      Self::Submit { at }
      | Self::Verify { at, .. }
      | Self::Reject { at, .. }
      | Self::Delete { at } => *at,
    }
  }

  /// Apply the change to an in-memory row, as a store would.
  pub fn apply_to(&self, reference: &mut AchievementReference) {
    reference.status = self.target();
    reference.updated_at = self.at();
    match self {
      Self::Submit { at } => reference.submitted_at = Some(*at),
      Self::Verify { at, verifier_id } => {
        reference.verified_at = Some(*at);
        reference.verified_by = Some(*verifier_id);
      }
      Self::Reject { at, note } => {
        reference.verified_at = Some(*at);
        reference.rejection_note = Some(note.clone());
      }
      Self::Delete { .. } => {}
    }
  }
}

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
  /// The write landed; the row as it now stands.
  Applied(AchievementReference),
  /// The row exists but was no longer in the expected status.
  Stale(Status),
  Missing,
}

// ─── Query type ──────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Cap a requested page size at `MAX_PAGE_SIZE`. A limit of 0 is an empty
/// page.
pub fn page_limit(requested: usize) -> usize { requested.min(MAX_PAGE_SIZE) }

/// Parameters for [`crate::store::ReferenceStore::list_references`].
/// Results are ordered by creation time, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceQuery {
  /// Restrict to these owners. `None` means every student.
  pub student_ids: Option<Vec<Uuid>>,
  /// Restrict to one status. When unset, `deleted` rows are left out.
  pub status:      Option<Status>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

impl ReferenceQuery {
  pub fn for_student(student_id: Uuid) -> Self {
    Self { student_ids: Some(vec![student_id]), ..Self::default() }
  }

  pub fn page(mut self, limit: usize, offset: usize) -> Self {
    self.limit = Some(limit);
    self.offset = Some(offset);
    self
  }

  pub fn effective_limit(&self) -> usize {
    page_limit(self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
  }

  pub fn effective_offset(&self) -> usize { self.offset.unwrap_or(0) }

  /// Whether a row passes the student and status filters.
  pub fn matches(&self, reference: &AchievementReference) -> bool {
    let student_ok = self
      .student_ids
      .as_ref()
      .is_none_or(|ids| ids.contains(&reference.student_id));
    let status_ok = match self.status {
      Some(status) => reference.status == status,
      None => reference.status != Status::Deleted,
    };
    student_ok && status_ok
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [Status; 5] = [
    Status::Draft,
    Status::Submitted,
    Status::Verified,
    Status::Rejected,
    Status::Deleted,
  ];

  #[test]
  fn only_listed_transitions_are_permitted() {
    let permitted: Vec<(Status, Operation)> = ALL
      .iter()
      .flat_map(|s| {
        [
          Operation::Submit,
          Operation::Verify,
          Operation::Reject,
          Operation::Delete,
        ]
        .into_iter()
        .filter(move |op| op.is_permitted_from(*s))
        .map(move |op| (*s, op))
      })
      .collect();

    assert_eq!(permitted, vec![
      (Status::Draft, Operation::Submit),
      (Status::Draft, Operation::Delete),
      (Status::Submitted, Operation::Verify),
      (Status::Submitted, Operation::Reject),
    ]);
  }

  #[test]
  fn terminal_statuses_permit_nothing() {
    for status in ALL.into_iter().filter(|s| s.is_terminal()) {
      for op in [
        Operation::Submit,
        Operation::Verify,
        Operation::Reject,
        Operation::Delete,
        Operation::Edit,
      ] {
        assert!(!op.is_permitted_from(status), "{op} from {status}");
      }
    }
  }

  #[test]
  fn status_strings_match_wire_names() {
    let names: Vec<String> = ALL.iter().map(ToString::to_string).collect();
    assert_eq!(names, [
      "draft",
      "submitted",
      "verified",
      "rejected",
      "deleted"
    ]);
    assert_eq!(
      serde_json::to_string(&Status::Submitted).unwrap(),
      "\"submitted\""
    );
    assert_eq!("rejected".parse::<Status>().unwrap(), Status::Rejected);
  }

  #[test]
  fn reject_change_records_note_and_decision_time() {
    let now = Utc::now();
    let mut reference = AchievementReference {
      reference_id:   Uuid::new_v4(),
      student_id:     Uuid::new_v4(),
      detail_id:      Uuid::new_v4(),
      status:         Status::Submitted,
      submitted_at:   Some(now),
      verified_at:    None,
      verified_by:    None,
      rejection_note: None,
      created_at:     now,
      updated_at:     now,
    };
    let change = StatusChange::Reject { at: now, note: "no evidence".into() };
    assert_eq!(change.expected(), Status::Submitted);
    change.apply_to(&mut reference);
    assert_eq!(reference.status, Status::Rejected);
    assert_eq!(reference.verified_at, Some(now));
    assert_eq!(reference.verified_by, None);
    assert_eq!(reference.rejection_note.as_deref(), Some("no evidence"));
  }

  #[test]
  fn page_size_is_clamped() {
    let query = ReferenceQuery::default();
    assert_eq!(query.effective_limit(), DEFAULT_PAGE_SIZE);
    assert_eq!(ReferenceQuery::default().page(0, 0).effective_limit(), 0);
    assert_eq!(
      ReferenceQuery::default().page(5000, 0).effective_limit(),
      MAX_PAGE_SIZE
    );
  }
}
