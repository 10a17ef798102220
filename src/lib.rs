//! # proxyfleet
//!
//! A control plane for a fleet of remote HTTP reverse-proxy admin APIs.
//!
//! `proxyfleet` lets an operator register proxy instances, continuously
//! observe their liveness, read and mutate their live configuration with
//! optimistic concurrency, roll back to prior snapshots, render parameterised
//! configuration templates, and apply a change to many instances in parallel
//! with per-target success/failure accounting.
//!
//! This crate is the core control plane only: it has no opinion about HTTP
//! routing, request auth, or a bundled UI. Those are expected to live in a
//! thin facade crate that embeds [`FleetManager`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use proxyfleet::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let config = Config::load()?;
//! init_tracing(&config)?;
//!
//! let repository = Arc::new(InMemoryRepository::new());
//! let fleet = FleetManager::new(repository, config.admin_client.clone());
//!
//! let instance = fleet
//!     .create_instance(NewProxyInstance {
//!         name: "edge-1".to_string(),
//!         admin_url: "https://edge-1.internal:2019".to_string(),
//!         auth: AuthKind::None,
//!         credentials: Credentials::default(),
//!     })
//!     .await?;
//!
//! let health = fleet.test_connection(instance.id).await?;
//! tracing::info!(healthy = health.healthy, "probed instance");
//! # Ok(())
//! # }
//! ```

pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod error;
pub mod model;
pub mod observability;
pub mod repository;

pub mod admin_client;
pub mod registry;

pub mod health_supervisor;
pub mod orchestrator;
pub mod template_renderer;

pub mod fleet_manager;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::admin_client::{AdminClient, AdminClientConfig};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::fleet_manager::{ConnectionTestResult, FleetManager};
    pub use crate::health_supervisor::HealthSupervisor;
    pub use crate::model::{
        AuditRecord, AuthKind, ConfigSnapshot, ConfigTemplate, Credentials, InstanceStatus,
        NewProxyInstance, ProxyInstance, TemplateVariable, TemplateVariableType,
        UpdateProxyInstance,
    };
    pub use crate::observability::init_tracing;
    pub use crate::orchestrator::ConfigOrchestrator;
    pub use crate::registry::ClientRegistry;
    pub use crate::repository::memory::InMemoryRepository;
    pub use crate::repository::{AuditRepository, InstanceRepository, SnapshotRepository, TemplateRepository};
    pub use crate::template_renderer::TemplateRenderer;

    pub use tracing::{debug, error, info, instrument, trace, warn};
    pub use uuid::Uuid;
}
