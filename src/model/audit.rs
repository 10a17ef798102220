//! [`AuditRecord`]: an append-only event log entry, opaque to the core
//! beyond being written on significant state changes (spec §3.1). Optional;
//! no core invariant depends on it. The teacher's hash-chained, multi-sink
//! audit subsystem is out of scope here — this is deliberately the thin
//! shape spec §6.1 describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// The caller responsible for the action, if known.
    pub user_id: Option<String>,
    /// The instance the action concerned, if any (absent for fleet-wide
    /// operations such as a bulk apply recorded once rather than per-target).
    pub instance_id: Option<Uuid>,
    /// Short, stable verb: `"create"`, `"update"`, `"delete"`, `"rollback"`,
    /// `"bulk_apply"`, and so on.
    pub action: String,
    /// Opaque structured detail, e.g. a diff or a bulk operation's
    /// per-target outcome.
    pub changes: Value,
    pub status: AuditStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of the action the record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failure,
}

/// Fields required to record a new audit entry. `id` and `created_at` are
/// assigned by the Repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub user_id: Option<String>,
    pub instance_id: Option<Uuid>,
    pub action: String,
    pub changes: Value,
    pub status: AuditStatus,
    pub error: Option<String>,
}
