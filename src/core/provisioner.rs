//! Startup provisioning of every external-resource handle.
//!
//! Storage and cache are mandatory once configured: any failure aborts startup.
//! The container runtime and orchestrator clients are best-effort: a failure
//! logs a warning and leaves the feature [`Feature::Disabled`].
use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::time::timeout;

use crate::{
    config::{AppConfig, StorageKind, UnknownStorageKind},
    core::{
        auth::{self, AuthError},
        services::BusinessServices,
    },
    metrics,
    ports::{
        cache::{Cache, CacheError},
        container::ContainerRuntime,
        orchestrator::Orchestrator,
        repository::{Repository, StorageError},
        subsystems::SubsystemConnector,
    },
};

/// Upper bound for each teardown call
pub const TEARDOWN_STEP_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for the storage readiness round-trip
pub const READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// An optional subsystem: either switched off (by configuration or because it
/// could not be reached) or provisioned.
#[derive(Debug, Clone, Default)]
pub enum Feature<T> {
    #[default]
    Disabled,
    Enabled(T),
}

impl<T> Feature<T> {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Feature::Enabled(_))
    }

    pub fn enabled(&self) -> Option<&T> {
        match self {
            Feature::Enabled(value) => Some(value),
            Feature::Disabled => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("storage: {0}")]
    UnknownStorageKind(#[from] UnknownStorageKind),

    #[error("storage ({kind}): {source}")]
    Storage {
        kind: StorageKind,
        #[source]
        source: StorageError,
    },

    #[error("migration ({kind}): {source}")]
    Migration {
        kind: StorageKind,
        #[source]
        source: StorageError,
    },

    #[error("seed ({kind}): {source}")]
    Seed {
        kind: StorageKind,
        #[source]
        source: StorageError,
    },

    #[error("storage readiness ({kind}): {reason}")]
    Readiness { kind: StorageKind, reason: String },

    #[error("cache: {0}")]
    Cache(#[source] CacheError),

    #[error("admin account: {0}")]
    AdminAccount(#[source] AuthError),
}

impl ProvisionError {
    /// Name of the subsystem that failed
    pub fn subsystem(&self) -> &'static str {
        match self {
            ProvisionError::UnknownStorageKind(_)
            | ProvisionError::Storage { .. }
            | ProvisionError::Readiness { .. } => "storage",
            ProvisionError::Migration { .. } => "migration",
            ProvisionError::Seed { .. } | ProvisionError::AdminAccount(_) => "seed",
            ProvisionError::Cache(_) => "cache",
        }
    }
}

/// Everything built at startup. Read-only after construction; shared by all
/// request handlers and released exactly once by [`ProvisionedDependencies::close`].
pub struct ProvisionedDependencies {
    pub storage_kind: StorageKind,
    pub repository: Arc<dyn Repository>,
    pub cache: Feature<Arc<dyn Cache>>,
    pub containers: Feature<Arc<dyn ContainerRuntime>>,
    pub orchestrator: Feature<Arc<dyn Orchestrator>>,
    pub services: BusinessServices,
    closed: AtomicBool,
}

impl ProvisionedDependencies {
    /// Release owned resources: storage, cache, container runtime, orchestrator.
    ///
    /// Every step is attempted even if an earlier one fails. Returns `false`
    /// when teardown already ran.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Teardown already performed, ignoring");
            return false;
        }
        release_all(
            &self.repository,
            &self.cache,
            &self.containers,
            &self.orchestrator,
        )
        .await;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ProvisionedDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedDependencies")
            .field("storage_kind", &self.storage_kind)
            .field("cache", &self.cache.is_enabled())
            .field("containers", &self.containers.is_enabled())
            .field("orchestrator", &self.orchestrator.is_enabled())
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub struct SubsystemProvisioner<'a> {
    config: &'a AppConfig,
    connector: &'a dyn SubsystemConnector,
}

impl<'a> SubsystemProvisioner<'a> {
    pub fn new(config: &'a AppConfig, connector: &'a dyn SubsystemConnector) -> Self {
        Self { config, connector }
    }

    /// Build the dependency bundle. On error, every handle acquired so far has
    /// been released again.
    pub async fn provision(&self) -> Result<ProvisionedDependencies, ProvisionError> {
        let kind = self.config.server.storage_kind()?;
        let db_config = self.config.database(kind);

        let repository = self
            .connector
            .connect_storage(kind, db_config)
            .await
            .map_err(|source| ProvisionError::Storage { kind, source })?;
        tracing::info!(%kind, "Storage connected");

        let cache = match self.connect_cache().await {
            Ok(cache) => cache,
            Err(e) => {
                release_all(&repository, &Feature::Disabled, &Feature::Disabled, &Feature::Disabled).await;
                return Err(e);
            }
        };

        if let Err(e) = self.prepare_storage(kind, repository.as_ref()).await {
            release_all(&repository, &cache, &Feature::Disabled, &Feature::Disabled).await;
            return Err(e);
        }

        let containers = self.connect_container_runtime().await;
        let orchestrator = self.connect_orchestrator().await;

        let services = BusinessServices::new(repository.clone(), cache.clone());

        tracing::info!(
            storage = %kind,
            cache = cache.is_enabled(),
            containers = containers.is_enabled(),
            orchestrator = orchestrator.is_enabled(),
            "Provisioning complete"
        );

        Ok(ProvisionedDependencies {
            storage_kind: kind,
            repository,
            cache,
            containers,
            orchestrator,
            services,
            closed: AtomicBool::new(false),
        })
    }

    async fn connect_cache(&self) -> Result<Feature<Arc<dyn Cache>>, ProvisionError> {
        let enabled = self.config.redis.enable;
        metrics::set_subsystem_enabled("cache", enabled);
        if !enabled {
            return Ok(Feature::Disabled);
        }

        let cache = self
            .connector
            .connect_cache(&self.config.redis)
            .await
            .map_err(ProvisionError::Cache)?;

        if let Err(e) = cache.ping().await {
            release("cache", cache.close()).await;
            return Err(ProvisionError::Cache(e));
        }

        tracing::info!(host = %self.config.redis.host, port = self.config.redis.port, "Cache connected");
        Ok(Feature::Enabled(cache))
    }

    /// Migrate (when requested), seed, then confirm the storage answers.
    async fn prepare_storage(
        &self,
        kind: StorageKind,
        repository: &dyn Repository,
    ) -> Result<(), ProvisionError> {
        if self.config.database(kind).migrate {
            tracing::info!(%kind, "Running storage migrations");
            repository
                .migrate()
                .await
                .map_err(|source| ProvisionError::Migration { kind, source })?;
        }

        let admin_hash = match self.config.server.admin_password.as_deref() {
            Some(password) if !password.is_empty() => {
                Some(auth::hash_password(password).map_err(ProvisionError::AdminAccount)?)
            }
            _ => None,
        };
        repository
            .init(admin_hash.as_deref())
            .await
            .map_err(|source| ProvisionError::Seed { kind, source })?;

        match timeout(READINESS_TIMEOUT, repository.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ProvisionError::Readiness {
                kind,
                reason: e.to_string(),
            }),
            Err(_) => Err(ProvisionError::Readiness {
                kind,
                reason: format!("no answer within {READINESS_TIMEOUT:?}"),
            }),
        }
    }

    async fn connect_container_runtime(&self) -> Feature<Arc<dyn ContainerRuntime>> {
        let feature = if !self.config.docker.enable {
            Feature::Disabled
        } else {
            match self
                .connector
                .connect_container_runtime(&self.config.docker)
                .await
            {
                Ok(client) => {
                    tracing::info!(host = %self.config.docker.host, "Container runtime connected");
                    Feature::Enabled(client)
                }
                Err(e) => {
                    tracing::warn!(
                        host = %self.config.docker.host,
                        error = %e,
                        "Failed to create container runtime client, container api disabled"
                    );
                    Feature::Disabled
                }
            }
        };
        metrics::set_subsystem_enabled("containers", feature.is_enabled());
        feature
    }

    async fn connect_orchestrator(&self) -> Feature<Arc<dyn Orchestrator>> {
        let feature = if !self.config.kubernetes.enable {
            Feature::Disabled
        } else {
            match self
                .connector
                .connect_orchestrator(&self.config.kubernetes)
                .await
            {
                Ok(client) => {
                    tracing::info!(
                        watched = ?self.config.kubernetes.watch_resources,
                        "Orchestrator client connected"
                    );
                    Feature::Enabled(client)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to create orchestrator client, cluster api disabled"
                    );
                    Feature::Disabled
                }
            }
        };
        metrics::set_subsystem_enabled("orchestrator", feature.is_enabled());
        feature
    }
}

async fn release_all(
    repository: &Arc<dyn Repository>,
    cache: &Feature<Arc<dyn Cache>>,
    containers: &Feature<Arc<dyn ContainerRuntime>>,
    orchestrator: &Feature<Arc<dyn Orchestrator>>,
) {
    release("storage", repository.close()).await;
    if let Feature::Enabled(cache) = cache {
        release("cache", cache.close()).await;
    }
    if let Feature::Enabled(containers) = containers {
        release("containers", containers.close()).await;
    }
    if let Feature::Enabled(orchestrator) = orchestrator {
        release("orchestrator", orchestrator.close()).await;
    }
}

/// Run one bounded teardown step. Failures are logged, never propagated.
async fn release<E, F>(subsystem: &'static str, close: F) -> bool
where
    E: fmt::Display,
    F: Future<Output = Result<(), E>>,
{
    match timeout(TEARDOWN_STEP_TIMEOUT, close).await {
        Ok(Ok(())) => {
            tracing::info!(subsystem, "Released");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(subsystem, error = %e, "Failed to release");
            false
        }
        Err(_) => {
            tracing::warn!(subsystem, timeout = ?TEARDOWN_STEP_TIMEOUT, "Timed out releasing");
            false
        }
    }
}
