use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::{DbConfig, DockerConfig, KubeConfig, RedisConfig, StorageKind},
    ports::{
        cache::{Cache, CacheError},
        container::{ContainerError, ContainerRuntime},
        orchestrator::{Orchestrator, OrchestratorError},
        repository::{Repository, StorageError},
    },
};

/// Dials the external subsystems. Swapped for fakes in tests.
#[async_trait]
pub trait SubsystemConnector: Send + Sync {
    async fn connect_storage(
        &self,
        kind: StorageKind,
        config: &DbConfig,
    ) -> Result<Arc<dyn Repository>, StorageError>;

    async fn connect_cache(&self, config: &RedisConfig) -> Result<Arc<dyn Cache>, CacheError>;

    async fn connect_container_runtime(
        &self,
        config: &DockerConfig,
    ) -> Result<Arc<dyn ContainerRuntime>, ContainerError>;

    async fn connect_orchestrator(
        &self,
        config: &KubeConfig,
    ) -> Result<Arc<dyn Orchestrator>, OrchestratorError>;
}
