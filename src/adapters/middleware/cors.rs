use std::{convert::Infallible, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderName, Method, header},
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tower::{Layer, ServiceExt};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::{logging::REQUEST_ID_HEADER, trace_context::TRACE_ID_HEADER};
use crate::{
    config::{AllowedOrigins, CorsConfig},
    core::pipeline::{Interceptor, Stage},
};

const ALLOW_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

const ALLOW_HEADERS: [HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::AUTHORIZATION,
    HeaderName::from_static("x-requested-with"),
    REQUEST_ID_HEADER,
];

#[derive(Debug, Error)]
#[error("invalid CORS configuration: {0}")]
pub struct InvalidCorsConfig(String);

/// Cross-origin policy from the `cors` configuration section.
///
/// Preflight requests are answered here and never reach authentication.
#[derive(Debug, Clone)]
pub struct CorsInterceptor {
    layer: CorsLayer,
}

impl CorsInterceptor {
    pub fn new(config: &CorsConfig) -> Result<Self, InvalidCorsConfig> {
        let allow_origin = match config.origins().map_err(InvalidCorsConfig)? {
            AllowedOrigins::Any => AllowOrigin::any(),
            AllowedOrigins::List(origins) => AllowOrigin::list(origins),
        };

        let layer = CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(ALLOW_METHODS)
            .allow_headers(ALLOW_HEADERS)
            .expose_headers([REQUEST_ID_HEADER, TRACE_ID_HEADER])
            .allow_credentials(config.allow_credentials)
            .max_age(Duration::from_secs(config.max_age_secs));
        Ok(Self { layer })
    }
}

#[async_trait]
impl Interceptor for CorsInterceptor {
    fn stage(&self) -> Stage {
        Stage::Cors
    }

    async fn intercept(&self, req: Request, next: Next) -> Response {
        let result: Result<Response, Infallible> = self.layer.layer(next).oneshot(req).await;
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use http_body_util::BodyExt;

    use super::*;
    use crate::core::pipeline::Pipeline;

    const DASHBOARD: &str = "https://admin.example.com";

    fn config() -> CorsConfig {
        CorsConfig {
            allowed_origins: vec![DASHBOARD.to_string()],
            allow_credentials: true,
            ..Default::default()
        }
    }

    fn app(config: &CorsConfig, hits: Arc<AtomicUsize>) -> Router {
        Pipeline::builder()
            .register(Arc::new(CorsInterceptor::new(config).unwrap()))
            .unwrap()
            .build()
            .apply(Router::new().route(
                "/api/v1/users",
                get(move || async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "users"
                }),
            ))
    }

    fn from_origin(method: Method, origin: &str) -> http::request::Builder {
        http::Request::builder()
            .method(method)
            .uri("/api/v1/users")
            .header(header::ORIGIN, origin)
    }

    #[tokio::test]
    async fn test_preflight_is_answered_directly() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(&config(), hits.clone())
            .oneshot(
                from_origin(Method::OPTIONS, DASHBOARD)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], DASHBOARD);
        assert!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS]
                .to_str()
                .unwrap()
                .contains("DELETE")
        );
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert!(response.into_body().collect().await.unwrap().to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_allowed_origin_gets_credentials() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(&config(), hits.clone())
            .oneshot(from_origin(Method::GET, DASHBOARD).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], DASHBOARD);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(
            headers[header::ACCESS_CONTROL_EXPOSE_HEADERS]
                .to_str()
                .unwrap()
                .contains("x-request-id")
        );
    }

    #[tokio::test]
    async fn test_foreign_origin_is_not_reflected() {
        let response = app(&config(), Arc::new(AtomicUsize::new(0)))
            .oneshot(
                from_origin(Method::GET, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_default_policy_allows_no_origin() {
        let response = app(&CorsConfig::default(), Arc::new(AtomicUsize::new(0)))
            .oneshot(from_origin(Method::GET, DASHBOARD).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .is_none()
        );
    }

    #[test]
    fn test_wildcard_with_credentials_is_rejected() {
        let config = CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
            ..Default::default()
        };
        assert!(CorsInterceptor::new(&config).is_err());
    }
}
