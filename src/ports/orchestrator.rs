use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OrchestratorError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// The local cache did not become ready in time
    #[error("Cache for {kind} not ready: {message}")]
    CacheSync { kind: ResourceKind, message: String },

    /// The resource kind is not mirrored in the local cache
    #[error("Resource '{0}' is not watched")]
    NotWatched(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Resource kinds that can be mirrored into the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Namespaces,
    Pods,
    Services,
    Deployments,
    ConfigMaps,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Namespaces => "namespaces",
            ResourceKind::Pods => "pods",
            ResourceKind::Services => "services",
            ResourceKind::Deployments => "deployments",
            ResourceKind::ConfigMaps => "configmaps",
        }
    }

    pub fn is_namespaced(self) -> bool {
        self != ResourceKind::Namespaces
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "namespaces" | "namespace" => Ok(ResourceKind::Namespaces),
            "pods" | "pod" => Ok(ResourceKind::Pods),
            "services" | "service" => Ok(ResourceKind::Services),
            "deployments" | "deployment" => Ok(ResourceKind::Deployments),
            "configmaps" | "configmap" => Ok(ResourceKind::ConfigMaps),
            _ => Err(OrchestratorError::NotWatched(s.to_string())),
        }
    }
}

/// Flattened view of a cached object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
    pub created_at: Option<String>,
}

/// Cluster orchestration client backed by a change-notification cache.
#[async_trait]
pub trait Orchestrator: Send + Sync + 'static {
    /// Start the watches and wait until every cache is warm
    async fn start_cache(&self) -> OrchestratorResult<()>;

    fn watched(&self) -> Vec<ResourceKind>;

    /// List cached objects, optionally restricted to one namespace
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> OrchestratorResult<Vec<ObjectSummary>>;

    /// Stop the watches
    async fn close(&self) -> OrchestratorResult<()>;
}
