use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderValue, header::HeaderName},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;

use crate::core::{
    auth::Identity,
    pipeline::{Interceptor, Stage},
};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id of one request, caller supplied or generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// One access log line per request, written after the response.
#[derive(Debug, Default)]
pub struct LoggingInterceptor;

fn request_id(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn stage(&self) -> Stage {
        Stage::Logging
    }

    async fn intercept(&self, mut req: Request, next: Next) -> Response {
        let start = Instant::now();
        let id = request_id(&req);
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let client = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string());
        req.extensions_mut().insert(RequestId(id.clone()));

        let mut response = next.run(req).await;

        let status = response.status().as_u16();
        let user = response
            .extensions()
            .get::<Identity>()
            .map(|identity| identity.name().to_string())
            .unwrap_or_else(|| "-".to_string());
        let latency_ms = start.elapsed().as_millis() as u64;

        if status >= 500 {
            tracing::error!(request_id = %id, %method, %path, status, latency_ms, %client, %user, "Request failed");
        } else {
            tracing::info!(request_id = %id, %method, %path, status, latency_ms, %client, %user, "Request completed");
        }

        if let Ok(value) = HeaderValue::from_str(&id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}
