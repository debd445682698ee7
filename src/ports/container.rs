use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ContainerError {
    /// Host string could not be understood
    #[error("Invalid host '{0}'")]
    InvalidHost(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// The engine answered with a non-success status
    #[error("Engine returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type ContainerResult<T> = Result<T, ContainerError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
}

/// Container runtime client (Docker Engine API or compatible).
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    async fn ping(&self) -> ContainerResult<()>;

    async fn list_containers(&self) -> ContainerResult<Vec<ContainerSummary>>;

    async fn close(&self) -> ContainerResult<()>;
}
