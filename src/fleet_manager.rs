//! Public surface composing the Client Registry, Health Supervisor, Config
//! Orchestrator, and Template Renderer into one facade over a [`Repository`]
//! (spec §4.G).
//!
//! `FleetManager` owns instance CRUD (which also drives the Client
//! Registry's build/rebuild/drop lifecycle per spec §9) and schedules an
//! immediate asynchronous status refresh after a successful create or
//! update, reusing the exact probe-and-record unit the Health Supervisor's
//! background loop runs per tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{AdminClientConfig as AdminClientSettings, SupervisorConfig};
use crate::error::{Error, Result};
use crate::health_supervisor::{self, HealthSupervisor};
use crate::model::{
    AuditStatus, ConfigTemplate, InstanceStatus, NewAuditRecord, NewConfigTemplate,
    NewProxyInstance, ProxyInstance, UpdateProxyInstance,
};
use crate::orchestrator::ConfigOrchestrator;
use crate::registry::ClientRegistry;
use crate::repository::{AuditRepository, InstanceRepository, Repository, TemplateRepository};
use crate::template_renderer::TemplateRenderer;

/// Result of an ad-hoc `test_connection` probe (spec §4.G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub healthy: bool,
    pub latency_ms: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The fleet control plane's public surface: instance lifecycle, ad-hoc
/// health checks, and the Config Orchestrator / Template Renderer
/// operations, all composed over one `Repository`.
pub struct FleetManager {
    instances: Arc<dyn InstanceRepository>,
    templates: Arc<dyn TemplateRepository>,
    audit: Arc<dyn AuditRepository>,
    registry: Arc<ClientRegistry>,
    orchestrator: ConfigOrchestrator,
    template_renderer: TemplateRenderer,
    health: Arc<HealthSupervisor>,
}

impl FleetManager {
    /// Compose a `FleetManager` over `repository`, using `admin_client`
    /// defaults for every `AdminClient` the Client Registry builds. The
    /// Health Supervisor's background loop is constructed but not started —
    /// call [`FleetManager::start_health_monitoring`] to begin it.
    pub fn new<R>(repository: Arc<R>, admin_client: AdminClientSettings) -> Self
    where
        R: Repository + 'static,
    {
        Self::with_supervisor_config(repository, admin_client, SupervisorConfig::default())
    }

    /// As [`FleetManager::new`], but with explicit control over the Health
    /// Supervisor's shutdown grace period.
    pub fn with_supervisor_config<R>(
        repository: Arc<R>,
        admin_client: AdminClientSettings,
        supervisor: SupervisorConfig,
    ) -> Self
    where
        R: Repository + 'static,
    {
        let instances: Arc<dyn InstanceRepository> = repository.clone();
        let templates: Arc<dyn TemplateRepository> = repository.clone();
        let snapshots = repository.clone();
        let audit: Arc<dyn AuditRepository> = repository.clone();

        let registry = Arc::new(ClientRegistry::new(instances.clone(), admin_client));
        let orchestrator = ConfigOrchestrator::new(registry.clone(), snapshots);
        let template_renderer = TemplateRenderer::new(templates.clone());
        let health = Arc::new(HealthSupervisor::new(
            instances.clone(),
            registry.clone(),
            supervisor.shutdown_grace(),
        ));

        Self {
            instances,
            templates,
            audit,
            registry,
            orchestrator,
            template_renderer,
            health,
        }
    }

    /// Start the Health Supervisor's background probe loop at `interval`
    /// (spec §4.D).
    pub async fn start_health_monitoring(self: &Arc<Self>, interval: Duration) {
        self.health.start(interval).await;
    }

    /// Signal the Health Supervisor to stop and wait out its grace period
    /// for in-flight probes (spec §5).
    pub async fn shutdown(&self) {
        self.health.shutdown().await;
    }

    // -- Instance lifecycle (spec §4.G, §6.3) --------------------------------

    /// Register a new instance and schedule an immediate asynchronous status
    /// refresh for it.
    pub async fn create_instance(&self, new: NewProxyInstance) -> Result<ProxyInstance> {
        let instance = self.instances.create_instance(new).await?;
        self.record_audit("create", Some(instance.id), serde_json::json!({"name": instance.name})).await;
        self.schedule_status_refresh(instance.id);
        Ok(instance)
    }

    pub async fn get_instance(&self, id: Uuid) -> Result<ProxyInstance> {
        self.instances.get_instance(id).await
    }

    pub async fn list_instances(&self) -> Result<Vec<ProxyInstance>> {
        self.instances.list_instances().await
    }

    /// Apply `update`, rebuild the instance's cached `AdminClient` so
    /// subsequent operations reach the (possibly changed) `admin_url` and
    /// credentials rather than a stale one, and schedule an immediate status
    /// refresh (spec §9: "build-on-create, rebuild-on-update, drop-on-delete").
    pub async fn update_instance(&self, id: Uuid, update: UpdateProxyInstance) -> Result<ProxyInstance> {
        let instance = self.instances.update_instance(id, update).await?;
        self.registry.rebuild(&instance).await?;
        self.record_audit("update", Some(instance.id), serde_json::json!({"name": instance.name})).await;
        self.schedule_status_refresh(instance.id);
        Ok(instance)
    }

    /// Delete the instance and drop its cached `AdminClient`, stopping
    /// health updates for it.
    pub async fn delete_instance(&self, id: Uuid) -> Result<()> {
        self.instances.delete_instance(id).await?;
        self.registry.remove(id).await;
        self.record_audit("delete", Some(id), Value::Null).await;
        Ok(())
    }

    /// Run a single ad-hoc health check against the instance and persist the
    /// resulting status transition, returning `{healthy, latency_ms,
    /// message, timestamp}` (spec §4.G).
    pub async fn test_connection(&self, instance_id: Uuid) -> Result<ConnectionTestResult> {
        // Surfacing the instance lookup error here (rather than folding it
        // into an unhealthy result) matches spec §4.G's state machine: a
        // probe can only ever observe `online`/`offline`/`error` for an
        // instance that exists.
        self.instances.get_instance(instance_id).await?;

        let client = match self.registry.get_or_create(instance_id).await {
            Ok(client) => client,
            Err(e) => {
                let timestamp = Utc::now();
                let _ = self
                    .instances
                    .set_instance_status(instance_id, InstanceStatus::Error, None)
                    .await;
                return Ok(ConnectionTestResult {
                    healthy: false,
                    latency_ms: 0,
                    message: e.to_string(),
                    timestamp,
                });
            }
        };

        let start = Instant::now();
        let outcome = client.health_check().await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let timestamp = Utc::now();

        let (healthy, status, message) = match &outcome {
            Ok(true) => (true, InstanceStatus::Online, "ok".to_string()),
            Ok(false) => (false, InstanceStatus::Offline, "health check returned a non-200 status".to_string()),
            Err(e @ (Error::Transport(_) | Error::Timeout(_))) => (false, InstanceStatus::Error, e.to_string()),
            Err(e) => (false, InstanceStatus::Offline, e.to_string()),
        };

        let last_seen = healthy.then_some(timestamp);
        if let Err(e) = self.instances.set_instance_status(instance_id, status, last_seen).await {
            tracing::warn!(instance_id = %instance_id, error = %e, "failed to persist ad-hoc probe status");
        }

        Ok(ConnectionTestResult { healthy, latency_ms, message, timestamp })
    }

    fn schedule_status_refresh(&self, instance_id: Uuid) {
        let registry = self.registry.clone();
        let instances = self.instances.clone();
        tokio::spawn(async move {
            health_supervisor::probe_and_record(instance_id, &registry, instances.as_ref()).await;
        });
    }

    // -- Config Orchestrator pass-throughs (spec §4.E, §6.3) -----------------

    pub async fn get_config(&self, instance_id: Uuid, path: &str) -> Result<(Value, Option<String>)> {
        self.orchestrator.get_config(instance_id, path).await
    }

    pub async fn set_config(
        &self,
        instance_id: Uuid,
        path: &str,
        document: &Value,
        if_match: &str,
    ) -> Result<()> {
        self.orchestrator.set_config(instance_id, path, document, if_match).await
    }

    pub async fn patch_config(&self, instance_id: Uuid, path: &str, document: &Value) -> Result<()> {
        self.orchestrator.patch_config(instance_id, path, document).await
    }

    pub async fn delete_config(&self, instance_id: Uuid, path: &str) -> Result<()> {
        self.orchestrator.delete_config(instance_id, path).await
    }

    pub async fn adapt_config(&self, instance_id: Uuid, text: &str, adapter: Option<&str>) -> Result<Value> {
        self.orchestrator.adapt_config(instance_id, text, adapter).await
    }

    pub async fn rollback(&self, instance_id: Uuid, snapshot_id: Uuid) -> Result<()> {
        let result = self.orchestrator.rollback(instance_id, snapshot_id).await;
        self.record_audit(
            "rollback",
            Some(instance_id),
            serde_json::json!({"snapshot_id": snapshot_id, "ok": result.is_ok()}),
        )
        .await;
        result
    }

    /// Fan out `set_config` to every id in `instance_ids` in parallel
    /// (spec §4.E.6). Always returns exactly one entry per input id.
    pub async fn bulk_set_config(
        &self,
        instance_ids: Vec<Uuid>,
        path: &str,
        document: &Value,
    ) -> HashMap<Uuid, Result<()>> {
        let results = self.orchestrator.bulk_set_config(instance_ids, path, document).await;
        let outcomes: HashMap<String, bool> = results
            .iter()
            .map(|(id, r)| (id.to_string(), r.is_ok()))
            .collect();
        self.record_audit("bulk_apply", None, serde_json::json!({"outcomes": outcomes})).await;
        results
    }

    // -- Template Renderer pass-throughs (spec §4.F, §6.3) -------------------

    pub async fn list_templates(&self) -> Result<Vec<ConfigTemplate>> {
        self.templates.list_templates().await
    }

    pub async fn get_template(&self, id: Uuid) -> Result<ConfigTemplate> {
        self.templates.get_template(id).await
    }

    pub async fn create_template(&self, new: NewConfigTemplate) -> Result<ConfigTemplate> {
        let now = Utc::now();
        let template = ConfigTemplate {
            id: Uuid::now_v7(),
            name: new.name,
            description: new.description,
            category: new.category,
            template: new.template,
            variables: new.variables,
            created_at: now,
            updated_at: now,
        };
        template
            .validate_variable_names_unique()
            .map_err(Error::Validation)?;
        self.templates.create_template(template).await
    }

    pub async fn validate_template(&self, template_id: Uuid, variables: &HashMap<String, Value>) -> Result<()> {
        self.template_renderer.validate(template_id, variables).await
    }

    /// Render a template against `variables`. Typically called immediately
    /// before [`FleetManager::bulk_set_config`]; the two are composable but
    /// the core never combines them into one atomic "render then apply"
    /// operation (spec §4.E.7).
    pub async fn generate_config(&self, template_id: Uuid, variables: HashMap<String, Value>) -> Result<Value> {
        self.template_renderer.generate(template_id, variables).await
    }

    /// Best-effort audit write. Spec §3.1: audit is "optional; not required
    /// by any core invariant" — a failure here is logged and never
    /// propagated to the caller.
    async fn record_audit(&self, action: &str, instance_id: Option<Uuid>, changes: Value) {
        let record = NewAuditRecord {
            user_id: None,
            instance_id,
            action: action.to_string(),
            changes,
            status: AuditStatus::Success,
            error: None,
        };
        if let Err(e) = self.audit.create_audit_record(record).await {
            tracing::warn!(action, error = %e, "failed to write audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuthKind, Credentials};
    use crate::repository::memory::InMemoryRepository;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn new_instance(admin_url: String) -> NewProxyInstance {
        NewProxyInstance {
            name: "p1".to_string(),
            admin_url,
            auth: AuthKind::None,
            credentials: Credentials::default(),
        }
    }

    #[tokio::test]
    async fn create_instance_schedules_status_refresh_to_online() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let repo = Arc::new(InMemoryRepository::new());
        let fleet = FleetManager::new(repo.clone(), AdminClientSettings::default());
        let instance = fleet.create_instance(new_instance(server.uri())).await.unwrap();

        // The refresh is fire-and-forget; give the spawned task a moment.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let refreshed = fleet.get_instance(instance.id).await.unwrap();
        assert_eq!(refreshed.status, InstanceStatus::Online);
        assert!(refreshed.last_seen.is_some());
    }

    #[tokio::test]
    async fn test_connection_reports_healthy_and_persists_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let repo = Arc::new(InMemoryRepository::new());
        let fleet = FleetManager::new(repo.clone(), AdminClientSettings::default());
        let instance = repo.create_instance(new_instance(server.uri())).await.unwrap();

        let before = Utc::now();
        let result = fleet.test_connection(instance.id).await.unwrap();
        assert!(result.healthy);
        assert_eq!(result.message, "ok");

        let refreshed = fleet.get_instance(instance.id).await.unwrap();
        assert_eq!(refreshed.status, InstanceStatus::Online);
        assert!(refreshed.last_seen.unwrap() >= before);
    }

    #[tokio::test]
    async fn test_connection_unknown_instance_is_not_found() {
        let repo = Arc::new(InMemoryRepository::new());
        let fleet = FleetManager::new(repo, AdminClientSettings::default());
        let err = fleet.test_connection(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn update_instance_rebuilds_client_so_new_url_is_used() {
        let old_server = MockServer::start().await;
        let new_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&old_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&new_server)
            .await;

        let repo = Arc::new(InMemoryRepository::new());
        let fleet = FleetManager::new(repo.clone(), AdminClientSettings::default());
        let instance = fleet.create_instance(new_instance(old_server.uri())).await.unwrap();

        let updated = fleet
            .update_instance(
                instance.id,
                UpdateProxyInstance {
                    name: instance.name.clone(),
                    admin_url: new_server.uri(),
                    auth: AuthKind::None,
                    credentials: Credentials::default(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.admin_url, new_server.uri());

        let result = fleet.test_connection(instance.id).await.unwrap();
        assert!(result.healthy, "must reach the new admin_url, not a cached client for the old one");
    }

    #[tokio::test]
    async fn delete_instance_removes_it_and_its_cached_client() {
        let repo = Arc::new(InMemoryRepository::new());
        let fleet = FleetManager::new(repo.clone(), AdminClientSettings::default());
        let instance = repo.create_instance(new_instance("http://stub:9001".to_string())).await.unwrap();

        fleet.delete_instance(instance.id).await.unwrap();
        assert!(fleet.get_instance(instance.id).await.is_err());
    }

    #[tokio::test]
    async fn create_and_generate_template_round_trip() {
        let repo = Arc::new(InMemoryRepository::new());
        let fleet = FleetManager::new(repo, AdminClientSettings::default());

        let template = fleet
            .create_template(NewConfigTemplate {
                name: "basic-reverse-proxy".to_string(),
                description: "minimal reverse proxy".to_string(),
                category: "reverse_proxy".to_string(),
                template: serde_json::json!({"upstream": "${upstream}"}),
                variables: vec![crate::model::TemplateVariable {
                    name: "upstream".to_string(),
                    var_type: crate::model::TemplateVariableType::String,
                    required: true,
                    default_value: None,
                    description: String::new(),
                }],
            })
            .await
            .unwrap();

        let rendered = fleet
            .generate_config(
                template.id,
                HashMap::from([("upstream".to_string(), serde_json::json!("localhost:8080"))]),
            )
            .await
            .unwrap();
        assert_eq!(rendered, serde_json::json!({"upstream": "localhost:8080"}));
    }

    #[tokio::test]
    async fn bulk_set_config_reports_one_entry_per_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let repo = Arc::new(InMemoryRepository::new());
        let fleet = FleetManager::new(repo.clone(), AdminClientSettings::default());
        let a = repo.create_instance(new_instance(server.uri())).await.unwrap();
        let b = repo
            .create_instance(new_instance("http://127.0.0.1:1".to_string()))
            .await
            .unwrap();

        let results = fleet
            .bulk_set_config(vec![a.id, b.id], "", &serde_json::json!({"x": 1}))
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[&a.id].is_ok());
        assert!(results[&b.id].is_err());
    }
}
