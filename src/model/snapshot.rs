//! [`ConfigSnapshot`]: a point-in-time capture of an instance's live
//! configuration, taken automatically before every guarded write (spec
//! §3.1, §4.E.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A captured configuration document, ordered by `created_at` per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub config: Value,
    /// ETag the remote reported when this snapshot was captured, if any.
    pub etag: Option<String>,
    /// `"system"` for snapshots captured automatically before a guarded
    /// write (spec §4.E.2); otherwise the caller that requested a manual
    /// capture.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to record a new snapshot. `id` and `created_at` are
/// assigned by the Repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConfigSnapshot {
    pub instance_id: Uuid,
    pub config: Value,
    pub etag: Option<String>,
    pub created_by: String,
}
