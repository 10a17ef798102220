//! Configuration read/write/patch/delete/adapt/rollback plus bulk fan-out
//! (spec §4.E).
//!
//! Every operation resolves an [`AdminClient`](crate::admin_client::AdminClient)
//! through the [`ClientRegistry`]. The only operation with a side effect
//! beyond the remote call is the guarded write (§4.E.2), which captures a
//! pre-write [`ConfigSnapshot`] best-effort before issuing the write —
//! capture and write are deliberately two independent fallible steps, never
//! one pipeline, so a capture failure can never block the write (spec §9).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::NewConfigSnapshot;
use crate::registry::ClientRegistry;
use crate::repository::SnapshotRepository;

/// How many of an instance's most recent snapshots `rollback` scans looking
/// for the requested id (spec §4.E.5: "enumerate the most recent N").
const ROLLBACK_LOOKBACK: u32 = 100;

/// Composes the [`ClientRegistry`] and [`SnapshotRepository`] into the seven
/// sub-operations of spec §4.E.
pub struct ConfigOrchestrator {
    registry: Arc<ClientRegistry>,
    snapshots: Arc<dyn SnapshotRepository>,
}

impl ConfigOrchestrator {
    pub fn new(registry: Arc<ClientRegistry>, snapshots: Arc<dyn SnapshotRepository>) -> Self {
        Self { registry, snapshots }
    }

    /// §4.E.1: plain read, returning the document and its current ETag.
    pub async fn get_config(&self, instance_id: Uuid, path: &str) -> Result<(Value, Option<String>)> {
        let client = self.registry.get_or_create(instance_id).await?;
        client.get_config(path).await
    }

    /// §4.E.2: ETag-guarded write. When `if_match` is non-empty, best-effort
    /// captures the pre-write document as a [`ConfigSnapshot`] before issuing
    /// the write; a capture failure is logged and does not abort the write.
    pub async fn set_config(
        &self,
        instance_id: Uuid,
        path: &str,
        document: &Value,
        if_match: &str,
    ) -> Result<()> {
        let client = self.registry.get_or_create(instance_id).await?;

        if !if_match.is_empty() {
            match client.get_config(path).await {
                Ok((config, etag)) => {
                    let capture = self
                        .snapshots
                        .create_snapshot(NewConfigSnapshot {
                            instance_id,
                            config,
                            etag,
                            created_by: "system".to_string(),
                        })
                        .await;
                    if let Err(e) = capture {
                        tracing::warn!(
                            instance_id = %instance_id,
                            error = %e,
                            "pre-write snapshot capture failed; proceeding with guarded write anyway"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        instance_id = %instance_id,
                        error = %e,
                        "pre-write snapshot read failed; proceeding with guarded write anyway"
                    );
                }
            }
        }

        client.set_config(path, document, if_match).await
    }

    /// §4.E.3: thin pass-through, no snapshot.
    pub async fn patch_config(&self, instance_id: Uuid, path: &str, document: &Value) -> Result<()> {
        let client = self.registry.get_or_create(instance_id).await?;
        client.patch_config(path, document).await
    }

    /// §4.E.3: thin pass-through, no snapshot.
    pub async fn delete_config(&self, instance_id: Uuid, path: &str) -> Result<()> {
        let client = self.registry.get_or_create(instance_id).await?;
        client.delete_config(path).await
    }

    /// §4.E.4: thin pass-through.
    pub async fn adapt_config(
        &self,
        instance_id: Uuid,
        text: &str,
        adapter: Option<&str>,
    ) -> Result<Value> {
        let client = self.registry.get_or_create(instance_id).await?;
        client.adapt_config(text, adapter).await
    }

    /// §4.E.5: enumerate the instance's recent snapshots, find the one with
    /// `snapshot_id`, and replay it as an unconditional root write. A pure
    /// replay: exactly one `set_config("", snapshot.config, "")` call, no
    /// snapshot of its own.
    pub async fn rollback(&self, instance_id: Uuid, snapshot_id: Uuid) -> Result<()> {
        let candidates = self
            .snapshots
            .list_snapshots(instance_id, ROLLBACK_LOOKBACK)
            .await?;
        let snapshot = candidates
            .into_iter()
            .find(|s| s.id == snapshot_id)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "snapshot {snapshot_id} for instance {instance_id}"
                ))
            })?;

        let client = self.registry.get_or_create(instance_id).await?;
        client.set_config("", &snapshot.config, "").await
    }

    /// §4.E.6: fan out an unconditional `set_config` to every id in
    /// parallel. Never fails as a whole — every input id gets exactly one
    /// entry in the returned map, success or typed error.
    pub async fn bulk_set_config(
        &self,
        instance_ids: Vec<Uuid>,
        path: &str,
        document: &Value,
    ) -> HashMap<Uuid, Result<()>> {
        let mut tasks = JoinSet::new();
        for instance_id in instance_ids {
            let registry = self.registry.clone();
            let path = path.to_string();
            let document = document.clone();
            tasks.spawn(async move {
                let result = async {
                    let client = registry.get_or_create(instance_id).await?;
                    client.set_config(&path, &document, "").await
                }
                .await;
                (instance_id, result)
            });
        }

        let mut results = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((instance_id, result)) => {
                    results.insert(instance_id, result);
                }
                Err(e) => {
                    tracing::error!(error = %e, "bulk_set_config task panicked");
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminClientConfig as AdminClientSettings;
    use crate::model::{AuthKind, Credentials, NewProxyInstance};
    use crate::repository::memory::InMemoryRepository;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn orchestrator_with_instance(
        admin_url: String,
    ) -> (ConfigOrchestrator, Arc<InMemoryRepository>, Uuid) {
        let repo = Arc::new(InMemoryRepository::new());
        let instance = repo
            .create_instance(NewProxyInstance {
                name: "p1".to_string(),
                admin_url,
                auth: AuthKind::None,
                credentials: Credentials::default(),
            })
            .await
            .unwrap();
        let registry = Arc::new(ClientRegistry::new(repo.clone(), AdminClientSettings::default()));
        let orchestrator = ConfigOrchestrator::new(registry, repo.clone());
        (orchestrator, repo, instance.id)
    }

    #[tokio::test]
    async fn guarded_write_captures_snapshot_before_writing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"apps": {}}))
                    .insert_header("etag", "\"v1\""),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/"))
            .and(header("if-match", "v1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (orchestrator, repo, instance_id) = orchestrator_with_instance(server.uri()).await;
        orchestrator
            .set_config(instance_id, "", &serde_json::json!({"apps": {}}), "v1")
            .await
            .unwrap();

        let snapshots = repo.list_snapshots(instance_id, 10).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].etag.as_deref(), Some("\"v1\""));
        assert_eq!(snapshots[0].config, serde_json::json!({"apps": {}}));
        assert_eq!(snapshots[0].created_by, "system");
    }

    #[tokio::test]
    async fn guarded_write_mismatch_fails_precondition_and_still_snapshots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"apps": {}}))
                    .insert_header("etag", "\"v1\""),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(412).set_body_json(serde_json::json!({"error": "stale"})))
            .mount(&server)
            .await;

        let (orchestrator, repo, instance_id) = orchestrator_with_instance(server.uri()).await;
        let err = orchestrator
            .set_config(instance_id, "", &serde_json::json!({"apps": {}}), "v0")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { status: 412, .. }));

        let snapshots = repo.list_snapshots(instance_id, 10).await.unwrap();
        assert_eq!(snapshots.len(), 1, "capture happens regardless of write outcome");
    }

    #[tokio::test]
    async fn unguarded_write_does_not_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (orchestrator, repo, instance_id) = orchestrator_with_instance(server.uri()).await;
        orchestrator
            .set_config(instance_id, "", &serde_json::json!({"x": 1}), "")
            .await
            .unwrap();

        assert!(repo.list_snapshots(instance_id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rollback_replays_snapshot_as_unconditional_root_write() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (orchestrator, repo, instance_id) = orchestrator_with_instance(server.uri()).await;
        let snapshot = repo
            .create_snapshot(NewConfigSnapshot {
                instance_id,
                config: serde_json::json!({"apps": {}}),
                etag: Some("\"e1\"".to_string()),
                created_by: "system".to_string(),
            })
            .await
            .unwrap();

        orchestrator.rollback(instance_id, snapshot.id).await.unwrap();
    }

    #[tokio::test]
    async fn rollback_unknown_snapshot_is_not_found() {
        let (orchestrator, _repo, instance_id) = orchestrator_with_instance("http://stub:9001".to_string()).await;
        let err = orchestrator
            .rollback(instance_id, Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn bulk_set_config_reports_every_target_with_mixed_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/config/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let repo = Arc::new(InMemoryRepository::new());
        let reachable = repo
            .create_instance(NewProxyInstance {
                name: "reachable".to_string(),
                admin_url: server.uri(),
                auth: AuthKind::None,
                credentials: Credentials::default(),
            })
            .await
            .unwrap();
        let unreachable = repo
            .create_instance(NewProxyInstance {
                name: "unreachable".to_string(),
                admin_url: "http://127.0.0.1:1".to_string(),
                auth: AuthKind::None,
                credentials: Credentials::default(),
            })
            .await
            .unwrap();

        let registry = Arc::new(ClientRegistry::new(repo.clone(), AdminClientSettings::default()));
        let orchestrator = ConfigOrchestrator::new(registry, repo.clone());

        let results = orchestrator
            .bulk_set_config(vec![reachable.id, unreachable.id], "", &serde_json::json!({"x": 1}))
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[&reachable.id].is_ok());
        assert!(matches!(results[&unreachable.id], Err(Error::Transport(_))));
    }
}
