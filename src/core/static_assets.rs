//! Dual-mode static asset resolution.
//!
//! The resolver never knows where bytes come from: release builds hand it the
//! embedded bundle, development builds a live directory. Both go through the
//! same lookup, so the only mode-specific rule is the one guarding the disk.
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, Method, StatusCode, header};

use crate::{
    config::RunMode,
    core::pipeline::{Interceptor, Stage},
    ports::assets::{Asset, AssetError, AssetSource},
};

/// Entry document of the single-page frontend
pub const ENTRY_DOCUMENT: &str = "index.html";

pub struct StaticAssetResolver {
    source: Arc<dyn AssetSource>,
    mode: RunMode,
}

impl StaticAssetResolver {
    pub fn new(source: Arc<dyn AssetSource>, mode: RunMode) -> Self {
        Self { source, mode }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Map a request path to an asset. `None` means "not handled".
    pub async fn resolve(&self, request_path: &str) -> Option<Asset> {
        let decoded = match urlencoding::decode(request_path) {
            Ok(decoded) => decoded,
            Err(_) => {
                tracing::debug!(path = request_path, "Undecodable asset path, passing through");
                return None;
            }
        };

        // Never let a request walk out of the served directory.
        if self.mode == RunMode::Development && decoded.contains("..") {
            tracing::debug!(path = request_path, "Rejected parent traversal in asset path");
            return None;
        }

        let relative = decoded.trim_start_matches('/');
        let relative = if relative.is_empty() || relative.ends_with('/') {
            format!("{relative}{ENTRY_DOCUMENT}")
        } else {
            relative.to_string()
        };

        self.open(&relative).await
    }

    /// The single-page entry document, used by the client-side routing fallback.
    pub async fn entry_document(&self) -> Option<Asset> {
        self.open(ENTRY_DOCUMENT).await
    }

    async fn open(&self, relative: &str) -> Option<Asset> {
        match self.source.open(relative).await {
            Ok(asset) => asset,
            Err(e @ AssetError::MissingRoot(_)) => {
                tracing::error!(source = self.source.name(), error = %e, "Asset source cannot be rooted");
                None
            }
            Err(e) => {
                tracing::warn!(source = self.source.name(), path = relative, error = %e, "Failed to open asset");
                None
            }
        }
    }
}

/// Build the response for a resolved asset.
pub fn asset_response(asset: Asset, method: &Method) -> Response {
    let content_type = mime_guess::from_path(&asset.path).first_or_octet_stream();
    let cache_control = if asset.path.ends_with(ENTRY_DOCUMENT) {
        "no-cache"
    } else if asset.path.starts_with("assets/") {
        "public, max-age=31536000, immutable"
    } else {
        "public, max-age=3600"
    };

    let length = asset.bytes.len();
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(asset.bytes)
    };

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response
}

#[async_trait]
impl Interceptor for StaticAssetResolver {
    fn stage(&self) -> Stage {
        Stage::StaticAssets
    }

    async fn intercept(&self, req: Request, next: Next) -> Response {
        let method = req.method().clone();
        if method != Method::GET && method != Method::HEAD {
            return next.run(req).await;
        }

        match self.resolve(req.uri().path()).await {
            Some(asset) => asset_response(asset, &method),
            None => next.run(req).await,
        }
    }
}
