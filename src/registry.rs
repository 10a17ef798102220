//! Keyed pool of live [`AdminClient`]s, one per registered instance (spec
//! §4.C).
//!
//! Guarded by a read-preferring `tokio::sync::RwLock`: the common case (an
//! already-built client for a warm instance) only ever takes a shared read
//! hold; insert/replace/remove take the exclusive write hold only for the
//! duration of the map mutation, mirroring the teacher's guidance to
//! minimize write-lock hold time in its pool/cache modules.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::admin_client::{AdminClient, AdminClientConfig};
use crate::config::AdminClientConfig as AdminClientSettings;
use crate::error::Result;
use crate::model::ProxyInstance;
use crate::repository::InstanceRepository;

/// Keyed pool of [`AdminClient`]s. Reads are concurrent; writes (insert on
/// first use, replace on instance update, remove on delete) are serialised.
pub struct ClientRegistry {
    repository: Arc<dyn InstanceRepository>,
    defaults: AdminClientSettings,
    clients: RwLock<HashMap<Uuid, Arc<AdminClient>>>,
}

impl ClientRegistry {
    pub fn new(repository: Arc<dyn InstanceRepository>, defaults: AdminClientSettings) -> Self {
        Self {
            repository,
            defaults,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached client for `instance_id`, building and caching one
    /// from the Repository on a cache miss.
    pub async fn get_or_create(&self, instance_id: Uuid) -> Result<Arc<AdminClient>> {
        if let Some(client) = self.clients.read().await.get(&instance_id).cloned() {
            return Ok(client);
        }

        let instance = self.repository.get_instance(instance_id).await?;
        let client = Arc::new(self.build_client(&instance)?);

        let mut guard = self.clients.write().await;
        Ok(guard.entry(instance_id).or_insert(client).clone())
    }

    /// Rebuild and replace the cached client for `instance` unconditionally,
    /// e.g. after an instance update changed its `admin_url` or credentials
    /// (spec §9: "build-on-create, rebuild-on-update, drop-on-delete").
    pub async fn rebuild(&self, instance: &ProxyInstance) -> Result<Arc<AdminClient>> {
        let client = Arc::new(self.build_client(instance)?);
        self.clients
            .write()
            .await
            .insert(instance.id, client.clone());
        Ok(client)
    }

    /// Drop the cached client for a deleted instance.
    pub async fn remove(&self, instance_id: Uuid) {
        self.clients.write().await.remove(&instance_id);
    }

    fn build_client(&self, instance: &ProxyInstance) -> Result<AdminClient> {
        AdminClient::new(AdminClientConfig {
            base_url: instance.admin_url.clone(),
            auth: instance.auth.clone(),
            credentials: instance.credentials.clone(),
            timeout: self.defaults.request_timeout(),
            connect_timeout: self.defaults.connect_timeout(),
        })
    }
}
