//! Periodic parallel liveness probing (spec §4.D).
//!
//! Runs as a plain `tokio::spawn` loop driven by `tokio::time::interval`; no
//! actor runtime. Concurrency is expressed with a `tokio::task::JoinSet`
//! fan-out per tick, and shutdown with a `tokio_util::sync::
//! CancellationToken` — the same primitive the teacher's
//! `background_worker.rs` reaches for outside of its actor machinery, reused
//! here without the actor wrapper spec §4.D's simpler model doesn't need.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::admin_client::AdminClient;
use crate::model::InstanceStatus;
use crate::registry::ClientRegistry;
use crate::repository::InstanceRepository;

/// Background health-probe loop owner (spec §4.D, §4.G).
pub struct HealthSupervisor {
    repository: Arc<dyn InstanceRepository>,
    registry: Arc<ClientRegistry>,
    shutdown_grace: Duration,
    cancel: CancellationToken,
    handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HealthSupervisor {
    pub fn new(
        repository: Arc<dyn InstanceRepository>,
        registry: Arc<ClientRegistry>,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            repository,
            registry,
            shutdown_grace,
            cancel: CancellationToken::new(),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Begin the background loop: on every tick, obtain the current list of
    /// instances, fan out `health_check()` in parallel (one task per
    /// instance), and write the new status back through the Repository.
    pub async fn start(self: &Arc<Self>, interval: Duration) {
        let supervisor = self.clone();
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::info!("health supervisor received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        supervisor.run_once().await;
                    }
                }
            }
        });

        *self.handle.lock().await = Some(task);
    }

    /// Fan out one probe round across every registered instance. Exposed
    /// directly so callers (and tests) can drive a single round without
    /// waiting on the interval.
    pub async fn run_once(&self) {
        let instances = match self.repository.list_instances().await {
            Ok(instances) => instances,
            Err(e) => {
                tracing::warn!(error = %e, "health supervisor failed to list instances");
                return;
            }
        };

        let mut tasks = JoinSet::new();
        for instance in instances {
            let registry = self.registry.clone();
            let repository = self.repository.clone();
            tasks.spawn(async move {
                probe_and_record(instance.id, &registry, repository.as_ref()).await;
            });
        }

        while tasks.join_next().await.is_some() {}
    }

    /// Signal the background loop to stop and wait up to the configured
    /// grace period for the in-flight round to finish (spec §4.D, §5).
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = tokio::time::timeout(self.shutdown_grace, handle).await;
        }
    }
}

/// Probe one instance and persist the resulting status transition.
/// Independent of other instances (spec §4.D "ordering"); this is the unit
/// a bulk/ad-hoc probe (`FleetManager::test_connection`) also reuses.
pub async fn probe_and_record(
    instance_id: Uuid,
    registry: &ClientRegistry,
    repository: &dyn InstanceRepository,
) {
    let (status, last_seen) = match registry.get_or_create(instance_id).await {
        Ok(client) => probe_status(&client).await,
        Err(e) => {
            tracing::warn!(instance_id = %instance_id, error = %e, "failed to obtain admin client for probe");
            (InstanceStatus::Error, None)
        }
    };

    if let Err(e) = repository
        .set_instance_status(instance_id, status, last_seen)
        .await
    {
        tracing::warn!(instance_id = %instance_id, error = %e, "failed to persist health status");
    }
}

/// Run a single `health_check()` and map the outcome onto spec §4.D's
/// transition rule: success → online, a failing check → offline, a
/// transport error that prevents the request → error.
pub async fn probe_status(
    client: &AdminClient,
) -> (InstanceStatus, Option<chrono::DateTime<Utc>>) {
    match client.health_check().await {
        Ok(true) => (InstanceStatus::Online, Some(Utc::now())),
        Ok(false) => (InstanceStatus::Offline, None),
        Err(crate::error::Error::Transport(_)) | Err(crate::error::Error::Timeout(_)) => {
            (InstanceStatus::Error, None)
        }
        Err(_) => (InstanceStatus::Offline, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminClientConfig as AdminClientSettings;
    use crate::model::{AuthKind, Credentials, NewProxyInstance};
    use crate::repository::memory::InMemoryRepository;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn run_once_marks_reachable_instance_online() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let repo = Arc::new(InMemoryRepository::new());
        let instance = repo
            .create_instance(NewProxyInstance {
                name: "p1".to_string(),
                admin_url: server.uri(),
                auth: AuthKind::None,
                credentials: Credentials::default(),
            })
            .await
            .unwrap();

        let registry = Arc::new(ClientRegistry::new(repo.clone(), AdminClientSettings::default()));
        let supervisor = HealthSupervisor::new(repo.clone(), registry, Duration::from_secs(1));
        supervisor.run_once().await;

        let refreshed = repo.get_instance(instance.id).await.unwrap();
        assert_eq!(refreshed.status, InstanceStatus::Online);
        assert!(refreshed.last_seen.is_some());
    }

    #[tokio::test]
    async fn run_once_marks_unreachable_instance_error() {
        let repo = Arc::new(InMemoryRepository::new());
        let instance = repo
            .create_instance(NewProxyInstance {
                name: "p1".to_string(),
                admin_url: "http://127.0.0.1:1".to_string(),
                auth: AuthKind::None,
                credentials: Credentials::default(),
            })
            .await
            .unwrap();

        let registry = Arc::new(ClientRegistry::new(repo.clone(), AdminClientSettings::default()));
        let supervisor = HealthSupervisor::new(repo.clone(), registry, Duration::from_secs(1));
        supervisor.run_once().await;

        let refreshed = repo.get_instance(instance.id).await.unwrap();
        assert_eq!(refreshed.status, InstanceStatus::Error);
    }

    #[tokio::test]
    async fn run_once_marks_4xx_instance_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let repo = Arc::new(InMemoryRepository::new());
        let instance = repo
            .create_instance(NewProxyInstance {
                name: "p1".to_string(),
                admin_url: server.uri(),
                auth: AuthKind::None,
                credentials: Credentials::default(),
            })
            .await
            .unwrap();

        let registry = Arc::new(ClientRegistry::new(repo.clone(), AdminClientSettings::default()));
        let supervisor = HealthSupervisor::new(repo.clone(), registry, Duration::from_secs(1));
        supervisor.run_once().await;

        let refreshed = repo.get_instance(instance.id).await.unwrap();
        assert_eq!(refreshed.status, InstanceStatus::Offline);
    }

    #[tokio::test]
    async fn start_then_shutdown_stops_cleanly() {
        let repo = Arc::new(InMemoryRepository::new());
        let registry = Arc::new(ClientRegistry::new(repo.clone(), AdminClientSettings::default()));
        let supervisor = Arc::new(HealthSupervisor::new(repo, registry, Duration::from_secs(1)));

        supervisor.start(Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        supervisor.shutdown().await;
    }
}
