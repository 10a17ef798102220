//! Narrow, per-entity repository traits (spec §4.A).
//!
//! The teacher's `Repository<Id, Entity, Create, Update>` trait is generic
//! over a uniform CRUD shape with filter/pagination support. None of this
//! domain's four entities share that shape — snapshots and audit records
//! are append-only and list by `instance_id`, while instances and templates
//! are plain CRUD — so each gets its own trait instead of forcing a common
//! one.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{
    AuditRecord, ConfigSnapshot, ConfigTemplate, NewAuditRecord, NewConfigSnapshot,
    NewProxyInstance, ProxyInstance, UpdateProxyInstance,
};

/// CRUD storage for registered proxy instances.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn create_instance(&self, new: NewProxyInstance) -> Result<ProxyInstance>;
    async fn get_instance(&self, id: Uuid) -> Result<ProxyInstance>;
    async fn update_instance(&self, id: Uuid, update: UpdateProxyInstance) -> Result<ProxyInstance>;
    async fn delete_instance(&self, id: Uuid) -> Result<()>;
    async fn list_instances(&self) -> Result<Vec<ProxyInstance>>;

    /// Overwrite just the derived status fields, bypassing the full update
    /// path (written by the Health Supervisor, never by a configuration
    /// write).
    async fn set_instance_status(
        &self,
        id: Uuid,
        status: crate::model::InstanceStatus,
        last_seen: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()>;
}

/// CRUD storage for reusable configuration templates.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn create_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate>;
    async fn get_template(&self, id: Uuid) -> Result<ConfigTemplate>;
    async fn update_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate>;
    async fn delete_template(&self, id: Uuid) -> Result<()>;
    async fn list_templates(&self) -> Result<Vec<ConfigTemplate>>;
}

/// Append-only storage for configuration snapshots (spec §4.E.3).
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn create_snapshot(&self, new: NewConfigSnapshot) -> Result<ConfigSnapshot>;
    async fn get_snapshot(&self, id: Uuid) -> Result<ConfigSnapshot>;
    /// Snapshots for one instance, newest first, capped at `limit`.
    async fn list_snapshots(&self, instance_id: Uuid, limit: u32) -> Result<Vec<ConfigSnapshot>>;
}

/// Append-only storage for audit records (spec §3.1).
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn create_audit_record(&self, new: NewAuditRecord) -> Result<AuditRecord>;
    /// Audit entries, newest first, capped at `limit`. `instance_id: None`
    /// returns fleet-wide entries only (e.g. bulk operations).
    async fn list_audit(&self, instance_id: Option<Uuid>, limit: u32) -> Result<Vec<AuditRecord>>;
}
