//! In-process `Repository` implementation backed by `tokio::sync::RwLock`
//! over `HashMap`s. Always compiled (no `database` feature gate) so tests
//! and embedders who don't need Postgres have a working backend for free.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{
    AuditRecord, ConfigSnapshot, ConfigTemplate, InstanceStatus, NewAuditRecord,
    NewConfigSnapshot, NewProxyInstance, ProxyInstance, UpdateProxyInstance,
};
use crate::repository::error::RepositoryError;
use crate::repository::{AuditRepository, InstanceRepository, SnapshotRepository, TemplateRepository};

/// In-memory storage for every entity this crate persists.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    instances: RwLock<HashMap<Uuid, ProxyInstance>>,
    templates: RwLock<HashMap<Uuid, ConfigTemplate>>,
    snapshots: RwLock<HashMap<Uuid, ConfigSnapshot>>,
    audit: RwLock<HashMap<Uuid, AuditRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceRepository for InMemoryRepository {
    async fn create_instance(&self, new: NewProxyInstance) -> Result<ProxyInstance> {
        ProxyInstance::validate(&new.admin_url, &new.auth, &new.credentials)?;
        let now = Utc::now();
        let instance = ProxyInstance {
            id: Uuid::now_v7(),
            name: new.name,
            admin_url: new.admin_url,
            auth: new.auth,
            credentials: new.credentials,
            status: InstanceStatus::Unknown,
            last_seen: None,
            created_at: now,
            updated_at: now,
        };
        self.instances
            .write()
            .await
            .insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn get_instance(&self, id: Uuid) -> Result<ProxyInstance> {
        self.instances
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::from(RepositoryError::not_found("ProxyInstance", id.to_string())))
    }

    async fn update_instance(&self, id: Uuid, update: UpdateProxyInstance) -> Result<ProxyInstance> {
        ProxyInstance::validate(&update.admin_url, &update.auth, &update.credentials)?;
        let mut guard = self.instances.write().await;
        let existing = guard
            .get_mut(&id)
            .ok_or_else(|| Error::from(RepositoryError::not_found("ProxyInstance", id.to_string())))?;
        existing.name = update.name;
        existing.admin_url = update.admin_url;
        existing.auth = update.auth;
        existing.credentials = update.credentials;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_instance(&self, id: Uuid) -> Result<()> {
        self.instances
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::from(RepositoryError::not_found("ProxyInstance", id.to_string())))
    }

    async fn list_instances(&self) -> Result<Vec<ProxyInstance>> {
        let mut instances: Vec<_> = self.instances.read().await.values().cloned().collect();
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instances)
    }

    async fn set_instance_status(
        &self,
        id: Uuid,
        status: InstanceStatus,
        last_seen: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()> {
        let mut guard = self.instances.write().await;
        let existing = guard
            .get_mut(&id)
            .ok_or_else(|| Error::from(RepositoryError::not_found("ProxyInstance", id.to_string())))?;
        existing.status = status;
        existing.last_seen = last_seen;
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for InMemoryRepository {
    async fn create_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate> {
        self.templates
            .write()
            .await
            .insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> Result<ConfigTemplate> {
        self.templates
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::from(RepositoryError::not_found("ConfigTemplate", id.to_string())))
    }

    async fn update_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate> {
        let mut guard = self.templates.write().await;
        if !guard.contains_key(&template.id) {
            return Err(Error::from(RepositoryError::not_found(
                "ConfigTemplate",
                template.id.to_string(),
            )));
        }
        guard.insert(template.id, template.clone());
        Ok(template)
    }

    async fn delete_template(&self, id: Uuid) -> Result<()> {
        self.templates
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::from(RepositoryError::not_found("ConfigTemplate", id.to_string())))
    }

    async fn list_templates(&self) -> Result<Vec<ConfigTemplate>> {
        let mut templates: Vec<_> = self.templates.read().await.values().cloned().collect();
        templates.sort_by_key(|t| t.created_at);
        Ok(templates)
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn create_snapshot(&self, new: NewConfigSnapshot) -> Result<ConfigSnapshot> {
        let snapshot = ConfigSnapshot {
            id: Uuid::now_v7(),
            instance_id: new.instance_id,
            config: new.config,
            etag: new.etag,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        self.snapshots
            .write()
            .await
            .insert(snapshot.id, snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, id: Uuid) -> Result<ConfigSnapshot> {
        self.snapshots
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::from(RepositoryError::not_found("ConfigSnapshot", id.to_string())))
    }

    async fn list_snapshots(&self, instance_id: Uuid, limit: u32) -> Result<Vec<ConfigSnapshot>> {
        let mut snapshots: Vec<_> = self
            .snapshots
            .read()
            .await
            .values()
            .filter(|s| s.instance_id == instance_id)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots.truncate(limit as usize);
        Ok(snapshots)
    }
}

#[async_trait]
impl AuditRepository for InMemoryRepository {
    async fn create_audit_record(&self, new: NewAuditRecord) -> Result<AuditRecord> {
        let record = AuditRecord {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            instance_id: new.instance_id,
            action: new.action,
            changes: new.changes,
            status: new.status,
            error: new.error,
            created_at: Utc::now(),
        };
        self.audit.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_audit(&self, instance_id: Option<Uuid>, limit: u32) -> Result<Vec<AuditRecord>> {
        let mut records: Vec<_> = self
            .audit
            .read()
            .await
            .values()
            .filter(|r| match instance_id {
                Some(id) => r.instance_id == Some(id),
                None => r.instance_id.is_none(),
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit as usize);
        Ok(records)
    }
}
