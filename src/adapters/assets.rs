//! Asset sources: the build-time bundle and a live directory.
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::ports::assets::{Asset, AssetError, AssetSource};

mod bundle {
    include!(concat!(env!("OUT_DIR"), "/embedded_assets.rs"));
}

/// Directory the build script embeds, relative to the crate root
pub const BUNDLE_ROOT: &str = "dist";

/// Read-only file tree compiled into the binary.
pub struct EmbeddedBundle {
    root: &'static str,
    files: HashMap<&'static str, &'static [u8]>,
}

impl EmbeddedBundle {
    /// The bundle produced by the build script.
    pub fn new() -> Self {
        Self::from_entries(BUNDLE_ROOT, bundle::EMBEDDED_ASSETS)
    }

    /// Root a bundle at `root`; entries outside it are ignored.
    pub fn from_entries(root: &'static str, entries: &'static [(&'static str, &'static [u8])]) -> Self {
        let files: HashMap<_, _> = entries
            .iter()
            .filter_map(|(key, bytes)| {
                let relative = key.strip_prefix(root)?.strip_prefix('/')?;
                Some((relative, *bytes))
            })
            .collect();
        tracing::debug!(root, files = files.len(), "Embedded bundle loaded");
        Self { root, files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for EmbeddedBundle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetSource for EmbeddedBundle {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn open(&self, relative_path: &str) -> Result<Option<Asset>, AssetError> {
        if self.files.is_empty() {
            return Err(AssetError::MissingRoot(self.root.to_string()));
        }
        Ok(self.files.get(relative_path).map(|bytes| Asset {
            path: relative_path.to_string(),
            bytes: Bytes::from_static(bytes),
        }))
    }
}

/// Files served straight from disk, re-read on every request.
#[derive(Debug, Clone)]
pub struct DiskDirectory {
    root: PathBuf,
}

impl DiskDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetSource for DiskDirectory {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn open(&self, relative_path: &str) -> Result<Option<Asset>, AssetError> {
        let canonical_root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|_| AssetError::MissingRoot(self.root.display().to_string()))?;

        let full_path = self.root.join(relative_path.trim_start_matches('/'));
        let canonical_path = match tokio::fs::canonicalize(&full_path).await {
            Ok(path) => path,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(None);
            }
            Err(e) => return Err(AssetError::Io(e)),
        };

        // Symlinks may still point outside the root
        if !canonical_path.starts_with(&canonical_root) {
            tracing::warn!(path = relative_path, "Asset resolves outside the served directory");
            return Ok(None);
        }

        match tokio::fs::metadata(&canonical_path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AssetError::Io(e)),
        }

        let bytes = tokio::fs::read(&canonical_path).await?;
        Ok(Some(Asset {
            path: relative_path.to_string(),
            bytes: Bytes::from(bytes),
        }))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    static ENTRIES: &[(&str, &[u8])] = &[
        ("dist/index.html", b"<html></html>"),
        ("dist/assets/app.js", b"console.log(1)"),
        ("other/secret.txt", b"nope"),
    ];

    async fn create_test_file(dir: &TempDir, path: &str, content: &str) -> std::io::Result<()> {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full_path, content).await
    }

    #[tokio::test]
    async fn test_embedded_lookup_is_rooted() {
        let bundle = EmbeddedBundle::from_entries("dist", ENTRIES);
        assert_eq!(bundle.len(), 2);

        let asset = bundle.open("assets/app.js").await.unwrap().unwrap();
        assert_eq!(asset.bytes, Bytes::from_static(b"console.log(1)"));

        assert!(bundle.open("missing.css").await.unwrap().is_none());
        assert!(bundle.open("../other/secret.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_bundle_cannot_be_rooted() {
        let bundle = EmbeddedBundle::from_entries("public", ENTRIES);
        assert!(bundle.is_empty());
        assert!(matches!(
            bundle.open("index.html").await,
            Err(AssetError::MissingRoot(root)) if root == "public"
        ));
    }

    #[tokio::test]
    async fn test_build_bundle_contains_entry_document() {
        let bundle = EmbeddedBundle::new();
        assert!(bundle.open("index.html").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_disk_reads_files() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(&temp_dir, "index.html", "hello").await.unwrap();
        create_test_file(&temp_dir, "assets/app.css", "body{}").await.unwrap();

        let disk = DiskDirectory::new(temp_dir.path());
        let asset = disk.open("assets/app.css").await.unwrap().unwrap();
        assert_eq!(asset.bytes, Bytes::from_static(b"body{}"));
        assert!(disk.open("missing.txt").await.unwrap().is_none());
        // directories are not files
        assert!(disk.open("assets").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_stays_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        create_test_file(&temp_dir, "public/index.html", "inside").await.unwrap();
        create_test_file(&temp_dir, "secret.txt", "outside").await.unwrap();

        let disk = DiskDirectory::new(temp_dir.path().join("public"));
        assert!(disk.open("../secret.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let disk = DiskDirectory::new(temp_dir.path().join("absent"));
        assert!(matches!(
            disk.open("index.html").await,
            Err(AssetError::MissingRoot(_))
        ));
    }
}
