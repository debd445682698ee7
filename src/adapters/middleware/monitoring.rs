use async_trait::async_trait;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

use crate::{
    core::pipeline::{Interceptor, Stage},
    metrics::{self, RequestTimer},
};

/// Label used for requests that matched no route
const UNMATCHED: &str = "unmatched";

/// Request counter and latency histogram around everything downstream.
#[derive(Debug, Default)]
pub struct MonitoringInterceptor;

#[async_trait]
impl Interceptor for MonitoringInterceptor {
    fn stage(&self) -> Stage {
        Stage::Monitoring
    }

    async fn intercept(&self, req: Request, next: Next) -> Response {
        // route templates keep label cardinality bounded
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map(|matched| matched.as_str().to_string())
            .unwrap_or_else(|| UNMATCHED.to_string());
        let method = req.method().to_string();

        let timer = RequestTimer::new(&path, &method);
        let response = next.run(req).await;
        metrics::increment_request_total(&path, &method, response.status().as_u16());
        drop(timer);

        response
    }
}
