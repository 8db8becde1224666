//! Consistency warnings raised when a cross-store sequence stops half-way.
//!
//! These are not errors returned to callers (the caller gets the storage
//! error that interrupted the sequence). They are logged, and the log is the
//! durable record. The in-memory [`ConsistencyLedger`] only holds what was
//! flagged since startup and not yet acknowledged, up to a fixed capacity.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A partially completed cross-store sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyWarning {
  /// `create` wrote the detail document but not its reference row. The
  /// document is invisible to every query path.
  OrphanedDetail {
    detail_id:  Uuid,
    student_id: Uuid,
    cause:      String,
  },
  /// `verify` committed the status but the point value on the detail
  /// document was not updated.
  StalePoints {
    reference_id: Uuid,
    detail_id:    Uuid,
    points:       u32,
    cause:        String,
  },
  /// `delete` or `purge` hid the detail document but the reference row was
  /// not updated to match.
  HiddenDetailLiveReference {
    reference_id: Uuid,
    detail_id:    Uuid,
    cause:        String,
  },
}

impl ConsistencyWarning {
  pub fn detail_id(&self) -> Uuid {
    match self {
      Self::OrphanedDetail { detail_id, .. }
      | Self::StalePoints { detail_id, .. }
      | Self::HiddenDetailLiveReference { detail_id, .. } => *detail_id,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedWarning {
  pub flagged_at: DateTime<Utc>,
  #[serde(flatten)]
  pub warning:    ConsistencyWarning,
}

/// Most warnings kept in memory; older ones are dropped first.
pub const LEDGER_CAPACITY: usize = 1024;

/// Shared, bounded record of flagged warnings awaiting reconciliation.
///
/// Cloning is cheap; clones share the same record. Nothing here survives a
/// restart.
#[derive(Debug, Clone)]
pub struct ConsistencyLedger {
  entries:  Arc<Mutex<VecDeque<FlaggedWarning>>>,
  capacity: usize,
}

impl Default for ConsistencyLedger {
  fn default() -> Self { Self::with_capacity(LEDGER_CAPACITY) }
}

impl ConsistencyLedger {
  pub fn new() -> Self { Self::default() }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      entries: Arc::new(Mutex::new(VecDeque::new())),
      capacity: capacity.max(1),
    }
  }

  /// Log `warning` and keep it for reconciliation.
  pub fn flag(&self, warning: ConsistencyWarning) {
    tracing::warn!(
      detail_id = %warning.detail_id(),
      ?warning,
      "cross-store sequence left a partial state"
    );
    let mut entries = self.lock();
    if entries.len() == self.capacity
      && let Some(dropped) = entries.pop_front()
    {
      tracing::warn!(
        detail_id = %dropped.warning.detail_id(),
        "consistency ledger full, dropping oldest warning"
      );
    }
    entries.push_back(FlaggedWarning { flagged_at: Utc::now(), warning });
  }

  pub fn entries(&self) -> Vec<FlaggedWarning> {
    self.lock().iter().cloned().collect()
  }

  /// Forget every warning about `detail_id` once it has been reconciled.
  /// Returns how many were removed.
  pub fn acknowledge(&self, detail_id: Uuid) -> usize {
    let mut entries = self.lock();
    let before = entries.len();
    entries.retain(|e| e.warning.detail_id() != detail_id);
    before - entries.len()
  }

  pub fn len(&self) -> usize { self.lock().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<FlaggedWarning>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
