use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderValue, header::HeaderName},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::{
    core::pipeline::{Interceptor, Stage},
    tracing_setup::create_request_span,
};

pub const TRACEPARENT_HEADER: HeaderName = HeaderName::from_static("traceparent");
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Trace id shared with handlers through request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

/// Extract the trace id of a W3C `traceparent` header
/// (`version-traceid-parentid-flags`).
pub fn parse_traceparent(value: &str) -> Option<&str> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let parent_id = parts.next()?;
    let flags = parts.next()?;

    let is_hex = |s: &str| s.bytes().all(|b| b.is_ascii_hexdigit());
    let valid = version.len() == 2
        && version != "ff"
        && trace_id.len() == 32
        && is_hex(trace_id)
        && trace_id.bytes().any(|b| b != b'0')
        && parent_id.len() == 16
        && is_hex(parent_id)
        && flags.len() == 2;
    valid.then_some(trace_id)
}

/// Runs the handler inside a request span, continuing the caller's trace when
/// one is propagated.
#[derive(Debug, Default)]
pub struct TraceContextInterceptor;

#[async_trait]
impl Interceptor for TraceContextInterceptor {
    fn stage(&self) -> Stage {
        Stage::Tracing
    }

    async fn intercept(&self, mut req: Request, next: Next) -> Response {
        let trace_id = req
            .headers()
            .get(&TRACEPARENT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_traceparent)
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let span = create_request_span(req.method().as_str(), req.uri().path(), &trace_id);
        req.extensions_mut().insert(TraceId(trace_id.clone()));

        let mut response = next.run(req).instrument(span.clone()).await;
        span.record("http.status_code", response.status().as_u16());

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert(TRACE_ID_HEADER, value);
        }
        response
    }
}
