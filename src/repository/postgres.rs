//! PostgreSQL-backed `Repository` implementation (spec §4.A), feature-gated
//! behind `database`. Schema is created on first use via [`PgRepository::initialize`],
//! following the teacher's `PgAuditStorage::initialize` pattern rather than
//! a separate migrations runner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::model::{
    AuditRecord, AuthKind, ConfigSnapshot, ConfigTemplate, Credentials, InstanceStatus,
    NewAuditRecord, NewConfigSnapshot, NewProxyInstance, ProxyInstance, TemplateVariable,
    UpdateProxyInstance,
};
use crate::repository::error::{RepositoryError, RepositoryOperation};
use crate::repository::{AuditRepository, InstanceRepository, SnapshotRepository, TemplateRepository};

/// PostgreSQL-backed storage for every entity this crate persists.
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and build the pool, applying the teacher's retry/backoff
    /// policy (see `database::create_pool`).
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = crate::database::create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they don't already exist.
    ///
    /// Should be called once during application startup.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS proxy_instances (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                admin_url TEXT NOT NULL,
                auth JSONB NOT NULL,
                credentials JSONB NOT NULL,
                status TEXT NOT NULL,
                last_seen TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "create proxy_instances table"))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_proxy_instances_name ON proxy_instances (name)")
            .execute(&self.pool)
            .await
            .map_err(backend_err(RepositoryOperation::Create, "create proxy_instances name index"))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_proxy_instances_status ON proxy_instances (status)")
            .execute(&self.pool)
            .await
            .map_err(backend_err(RepositoryOperation::Create, "create proxy_instances status index"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS config_templates (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                template JSONB NOT NULL,
                variables JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "create config_templates table"))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_config_templates_category ON config_templates (category)")
            .execute(&self.pool)
            .await
            .map_err(backend_err(RepositoryOperation::Create, "create config_templates category index"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS config_snapshots (
                id UUID PRIMARY KEY,
                instance_id UUID NOT NULL REFERENCES proxy_instances(id) ON DELETE CASCADE,
                config JSONB NOT NULL,
                etag TEXT,
                created_by TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "create config_snapshots table"))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_config_snapshots_instance ON config_snapshots (instance_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "create config_snapshots index"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_records (
                id UUID PRIMARY KEY,
                user_id TEXT,
                instance_id UUID,
                action TEXT NOT NULL,
                changes JSONB NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "create audit_records table"))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_records_instance ON audit_records (instance_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "create audit_records index"))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_records_timestamp ON audit_records (created_at DESC)")
            .execute(&self.pool)
            .await
            .map_err(backend_err(RepositoryOperation::Create, "create audit_records timestamp index"))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_records_user ON audit_records (user_id)")
            .execute(&self.pool)
            .await
            .map_err(backend_err(RepositoryOperation::Create, "create audit_records user index"))?;

        Ok(())
    }
}

fn backend_err(
    operation: RepositoryOperation,
    context: &'static str,
) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Storage(RepositoryError::backend(operation, format!("{context}: {e}")))
}

#[derive(sqlx::FromRow)]
struct ProxyInstanceRow {
    id: Uuid,
    name: String,
    admin_url: String,
    auth: serde_json::Value,
    credentials: serde_json::Value,
    status: String,
    last_seen: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProxyInstanceRow> for ProxyInstance {
    type Error = Error;

    fn try_from(row: ProxyInstanceRow) -> Result<Self> {
        let auth: AuthKind = serde_json::from_value(row.auth)?;
        let credentials: Credentials = serde_json::from_value(row.credentials)?;
        let status = status_from_str(&row.status);
        Ok(ProxyInstance {
            id: row.id,
            name: row.name,
            admin_url: row.admin_url,
            auth,
            credentials,
            status,
            last_seen: row.last_seen,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn status_to_str(status: InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Unknown => "unknown",
        InstanceStatus::Online => "online",
        InstanceStatus::Offline => "offline",
        InstanceStatus::Error => "error",
    }
}

fn status_from_str(s: &str) -> InstanceStatus {
    match s {
        "online" => InstanceStatus::Online,
        "offline" => InstanceStatus::Offline,
        "error" => InstanceStatus::Error,
        _ => InstanceStatus::Unknown,
    }
}

#[async_trait]
impl InstanceRepository for PgRepository {
    async fn create_instance(&self, new: NewProxyInstance) -> Result<ProxyInstance> {
        ProxyInstance::validate(&new.admin_url, &new.auth, &new.credentials)?;
        let now = Utc::now();
        let id = Uuid::now_v7();
        let auth_json = serde_json::to_value(&new.auth)?;
        let credentials_json = serde_json::to_value(&new.credentials)?;

        sqlx::query(
            r#"
            INSERT INTO proxy_instances
                (id, name, admin_url, auth, credentials, status, last_seen, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.admin_url)
        .bind(&auth_json)
        .bind(&credentials_json)
        .bind(status_to_str(InstanceStatus::Unknown))
        .bind(Option::<DateTime<Utc>>::None)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "insert proxy_instance"))?;

        Ok(ProxyInstance {
            id,
            name: new.name,
            admin_url: new.admin_url,
            auth: new.auth,
            credentials: new.credentials,
            status: InstanceStatus::Unknown,
            last_seen: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_instance(&self, id: Uuid) -> Result<ProxyInstance> {
        let row = sqlx::query_as::<_, ProxyInstanceRow>(
            "SELECT * FROM proxy_instances WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Read, "select proxy_instance"))?
        .ok_or_else(|| Error::from(RepositoryError::not_found("ProxyInstance", id.to_string())))?;

        row.try_into()
    }

    async fn update_instance(&self, id: Uuid, update: UpdateProxyInstance) -> Result<ProxyInstance> {
        ProxyInstance::validate(&update.admin_url, &update.auth, &update.credentials)?;
        let now = Utc::now();
        let auth_json = serde_json::to_value(&update.auth)?;
        let credentials_json = serde_json::to_value(&update.credentials)?;

        let result = sqlx::query(
            r#"
            UPDATE proxy_instances
            SET name = $2, admin_url = $3, auth = $4, credentials = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.admin_url)
        .bind(&auth_json)
        .bind(&credentials_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Update, "update proxy_instance"))?;

        if result.rows_affected() == 0 {
            return Err(Error::from(RepositoryError::not_found("ProxyInstance", id.to_string())));
        }

        self.get_instance(id).await
    }

    async fn delete_instance(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM proxy_instances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend_err(RepositoryOperation::Delete, "delete proxy_instance"))?;

        if result.rows_affected() == 0 {
            return Err(Error::from(RepositoryError::not_found("ProxyInstance", id.to_string())));
        }
        Ok(())
    }

    async fn list_instances(&self) -> Result<Vec<ProxyInstance>> {
        let rows = sqlx::query_as::<_, ProxyInstanceRow>(
            "SELECT * FROM proxy_instances ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::List, "list proxy_instances"))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn set_instance_status(
        &self,
        id: Uuid,
        status: InstanceStatus,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE proxy_instances SET status = $2, last_seen = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status_to_str(status))
        .bind(last_seen)
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Update, "update proxy_instance status"))?;

        if result.rows_affected() == 0 {
            return Err(Error::from(RepositoryError::not_found("ProxyInstance", id.to_string())));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ConfigTemplateRow {
    id: Uuid,
    name: String,
    description: String,
    category: String,
    template: serde_json::Value,
    variables: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConfigTemplateRow> for ConfigTemplate {
    type Error = Error;

    fn try_from(row: ConfigTemplateRow) -> Result<Self> {
        let variables: Vec<TemplateVariable> = serde_json::from_value(row.variables)?;
        Ok(ConfigTemplate {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            template: row.template,
            variables,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl TemplateRepository for PgRepository {
    async fn create_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate> {
        let variables_json = serde_json::to_value(&template.variables)?;
        sqlx::query(
            r#"
            INSERT INTO config_templates (id, name, description, category, template, variables, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.category)
        .bind(&template.template)
        .bind(&variables_json)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "insert config_template"))?;

        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> Result<ConfigTemplate> {
        let row = sqlx::query_as::<_, ConfigTemplateRow>(
            "SELECT * FROM config_templates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Read, "select config_template"))?
        .ok_or_else(|| Error::from(RepositoryError::not_found("ConfigTemplate", id.to_string())))?;

        row.try_into()
    }

    async fn update_template(&self, template: ConfigTemplate) -> Result<ConfigTemplate> {
        let variables_json = serde_json::to_value(&template.variables)?;
        let result = sqlx::query(
            r#"
            UPDATE config_templates
            SET name = $2, description = $3, category = $4, template = $5, variables = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.category)
        .bind(&template.template)
        .bind(&variables_json)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Update, "update config_template"))?;

        if result.rows_affected() == 0 {
            return Err(Error::from(RepositoryError::not_found(
                "ConfigTemplate",
                template.id.to_string(),
            )));
        }
        Ok(template)
    }

    async fn delete_template(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM config_templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend_err(RepositoryOperation::Delete, "delete config_template"))?;

        if result.rows_affected() == 0 {
            return Err(Error::from(RepositoryError::not_found("ConfigTemplate", id.to_string())));
        }
        Ok(())
    }

    async fn list_templates(&self) -> Result<Vec<ConfigTemplate>> {
        let rows = sqlx::query_as::<_, ConfigTemplateRow>(
            "SELECT * FROM config_templates ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::List, "list config_templates"))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ConfigSnapshotRow {
    id: Uuid,
    instance_id: Uuid,
    config: serde_json::Value,
    etag: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl From<ConfigSnapshotRow> for ConfigSnapshot {
    fn from(row: ConfigSnapshotRow) -> Self {
        ConfigSnapshot {
            id: row.id,
            instance_id: row.instance_id,
            config: row.config,
            etag: row.etag,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl SnapshotRepository for PgRepository {
    async fn create_snapshot(&self, new: NewConfigSnapshot) -> Result<ConfigSnapshot> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO config_snapshots (id, instance_id, config, etag, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(new.instance_id)
        .bind(&new.config)
        .bind(&new.etag)
        .bind(&new.created_by)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "insert config_snapshot"))?;

        Ok(ConfigSnapshot {
            id,
            instance_id: new.instance_id,
            config: new.config,
            etag: new.etag,
            created_by: new.created_by,
            created_at: now,
        })
    }

    async fn get_snapshot(&self, id: Uuid) -> Result<ConfigSnapshot> {
        let row = sqlx::query_as::<_, ConfigSnapshotRow>(
            "SELECT * FROM config_snapshots WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Read, "select config_snapshot"))?
        .ok_or_else(|| Error::from(RepositoryError::not_found("ConfigSnapshot", id.to_string())))?;

        Ok(row.into())
    }

    async fn list_snapshots(&self, instance_id: Uuid, limit: u32) -> Result<Vec<ConfigSnapshot>> {
        let rows = sqlx::query_as::<_, ConfigSnapshotRow>(
            "SELECT * FROM config_snapshots WHERE instance_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(instance_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::List, "list config_snapshots"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

fn audit_status_to_str(status: crate::model::AuditStatus) -> &'static str {
    match status {
        crate::model::AuditStatus::Success => "success",
        crate::model::AuditStatus::Failure => "failure",
    }
}

fn audit_status_from_str(s: &str) -> crate::model::AuditStatus {
    match s {
        "failure" => crate::model::AuditStatus::Failure,
        _ => crate::model::AuditStatus::Success,
    }
}

#[derive(sqlx::FromRow)]
struct AuditRecordRow {
    id: Uuid,
    user_id: Option<String>,
    instance_id: Option<Uuid>,
    action: String,
    changes: serde_json::Value,
    status: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditRecordRow> for AuditRecord {
    fn from(row: AuditRecordRow) -> Self {
        AuditRecord {
            id: row.id,
            user_id: row.user_id,
            instance_id: row.instance_id,
            action: row.action,
            changes: row.changes,
            status: audit_status_from_str(&row.status),
            error: row.error,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AuditRepository for PgRepository {
    async fn create_audit_record(&self, new: NewAuditRecord) -> Result<AuditRecord> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO audit_records (id, user_id, instance_id, action, changes, status, error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&new.user_id)
        .bind(new.instance_id)
        .bind(&new.action)
        .bind(&new.changes)
        .bind(audit_status_to_str(new.status))
        .bind(&new.error)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(backend_err(RepositoryOperation::Create, "insert audit_record"))?;

        Ok(AuditRecord {
            id,
            user_id: new.user_id,
            instance_id: new.instance_id,
            action: new.action,
            changes: new.changes,
            status: new.status,
            error: new.error,
            created_at: now,
        })
    }

    async fn list_audit(&self, instance_id: Option<Uuid>, limit: u32) -> Result<Vec<AuditRecord>> {
        let rows = match instance_id {
            Some(instance_id) => {
                sqlx::query_as::<_, AuditRecordRow>(
                    "SELECT * FROM audit_records WHERE instance_id = $1 ORDER BY created_at DESC LIMIT $2",
                )
                .bind(instance_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, AuditRecordRow>(
                    "SELECT * FROM audit_records WHERE instance_id IS NULL ORDER BY created_at DESC LIMIT $1",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend_err(RepositoryOperation::List, "list audit_records"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
