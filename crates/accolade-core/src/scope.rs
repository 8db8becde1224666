//! Authorization scoping: which students a caller may act on.
//!
//! The authentication layer hands us a verified [`Actor`]; nothing here
//! re-checks credentials.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::store::Directory;

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
pub enum Role {
  Student,
  Advisor,
  Admin,
}

/// A verified caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Actor {
  Student { user_id: Uuid, student_id: Uuid },
  Advisor { user_id: Uuid, lecturer_id: Uuid },
  Admin { user_id: Uuid },
}

impl Actor {
  pub fn role(&self) -> Role {
    match self {
      Self::Student { .. } => Role::Student,
      Self::Advisor { .. } => Role::Advisor,
      Self::Admin { .. } => Role::Admin,
    }
  }

  pub fn user_id(&self) -> Uuid {
    match self {
      Self::Student { user_id, .. }
      | Self::Advisor { user_id, .. }
      | Self::Admin { user_id } => *user_id,
    }
  }

  /// May this caller create, edit, submit or delete `student_id`'s
  /// achievements? Only the owner and administrators may.
  pub fn may_own(&self, student_id: Uuid) -> bool {
    match self {
      Self::Student { student_id: own, .. } => *own == student_id,
      Self::Advisor { .. } => false,
      Self::Admin { .. } => true,
    }
  }

  /// The id recorded as `verified_by`: the lecturer id for advisors, the
  /// user id for administrators. Students never verify.
  pub fn verifier_id(&self) -> Option<Uuid> {
    match self {
      Self::Student { .. } => None,
      Self::Advisor { lecturer_id, .. } => Some(*lecturer_id),
      Self::Admin { user_id } => Some(*user_id),
    }
  }
}

/// The set of students a caller may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
  Own(Uuid),
  Advisees(BTreeSet<Uuid>),
  All,
}

impl Scope {
  pub fn permits(&self, student_id: Uuid) -> bool {
    match self {
      Self::Own(own) => *own == student_id,
      Self::Advisees(ids) => ids.contains(&student_id),
      Self::All => true,
    }
  }

  /// The scope as a store filter. `None` means unrestricted.
  pub fn student_ids(&self) -> Option<Vec<Uuid>> {
    match self {
      Self::Own(own) => Some(vec![*own]),
      Self::Advisees(ids) => Some(ids.iter().copied().collect()),
      Self::All => None,
    }
  }

  /// True when no student at all is in scope.
  pub fn is_empty(&self) -> bool {
    matches!(self, Self::Advisees(ids) if ids.is_empty())
  }
}

/// Compute the full scope of `actor`. Advisors need one directory lookup.
pub async fn scope_for<D: Directory>(
  directory: &D,
  actor: &Actor,
) -> Result<Scope, D::Error> {
  Ok(match actor {
    Actor::Student { student_id, .. } => Scope::Own(*student_id),
    Actor::Advisor { lecturer_id, .. } => {
      Scope::Advisees(directory.advisees_of(*lecturer_id).await?.into_iter().collect())
    }
    Actor::Admin { .. } => Scope::All,
  })
}

/// Whether `actor` may read `student_id`'s achievements. Cheaper than
/// [`scope_for`] when only one student is in question.
pub async fn may_read<D: Directory>(
  directory: &D,
  actor: &Actor,
  student_id: Uuid,
) -> Result<bool, D::Error> {
  match actor {
    Actor::Student { student_id: own, .. } => Ok(*own == student_id),
    Actor::Advisor { lecturer_id, .. } => {
      directory.is_advisor_of(*lecturer_id, student_id).await
    }
    Actor::Admin { .. } => Ok(true),
  }
}

/// Whether `actor` may verify or reject `student_id`'s achievements: their
/// assigned advisor, or an administrator.
pub async fn may_decide<D: Directory>(
  directory: &D,
  actor: &Actor,
  student_id: Uuid,
) -> Result<bool, D::Error> {
  match actor {
    Actor::Student { .. } => Ok(false),
    Actor::Advisor { lecturer_id, .. } => {
      directory.is_advisor_of(*lecturer_id, student_id).await
    }
    Actor::Admin { .. } => Ok(true),
  }
}
