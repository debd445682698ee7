use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Error type for asset lookups
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AssetError {
    /// The asset tree itself cannot be rooted. A startup defect, not a per-request miss.
    #[error("Asset root '{0}' is not available")]
    MissingRoot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A resolved file ready to be written to the client
#[derive(Debug, Clone)]
pub struct Asset {
    pub path: String,
    pub bytes: Bytes,
}

/// Source of static files for the frontend bundle.
#[async_trait]
pub trait AssetSource: Send + Sync + 'static {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Open a path relative to the asset root. `Ok(None)` means not found.
    async fn open(&self, relative_path: &str) -> Result<Option<Asset>, AssetError>;
}
