use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    adapters::{
        cache::RedisCache, container::DockerClient, orchestrator::KubeClient,
        storage::SeaOrmRepository,
    },
    config::{DbConfig, DockerConfig, KubeConfig, RedisConfig, StorageKind},
    ports::{
        cache::{Cache, CacheError},
        container::{ContainerError, ContainerRuntime},
        orchestrator::{Orchestrator, OrchestratorError},
        repository::{Repository, StorageError},
        subsystems::SubsystemConnector,
    },
};

/// Connects to the real backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveConnector;

#[async_trait]
impl SubsystemConnector for LiveConnector {
    async fn connect_storage(
        &self,
        kind: StorageKind,
        config: &DbConfig,
    ) -> Result<Arc<dyn Repository>, StorageError> {
        Ok(Arc::new(SeaOrmRepository::connect(kind, config).await?))
    }

    async fn connect_cache(&self, config: &RedisConfig) -> Result<Arc<dyn Cache>, CacheError> {
        Ok(Arc::new(RedisCache::connect(config).await?))
    }

    async fn connect_container_runtime(
        &self,
        config: &DockerConfig,
    ) -> Result<Arc<dyn ContainerRuntime>, ContainerError> {
        Ok(Arc::new(DockerClient::connect(config).await?))
    }

    async fn connect_orchestrator(
        &self,
        config: &KubeConfig,
    ) -> Result<Arc<dyn Orchestrator>, OrchestratorError> {
        Ok(Arc::new(KubeClient::connect(config).await?))
    }
}
