use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response};

use crate::core::{
    pipeline::{Interceptor, Stage},
    rate_limiter::RateLimitRules,
};

/// Admission control: the first exhausted rule answers the request.
pub struct RateLimitInterceptor {
    rules: RateLimitRules,
}

impl RateLimitInterceptor {
    pub fn new(rules: RateLimitRules) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl Interceptor for RateLimitInterceptor {
    fn stage(&self) -> Stage {
        Stage::RateLimit
    }

    async fn intercept(&self, req: Request, next: Next) -> Response {
        match self.rules.check(&req) {
            Ok(()) => next.run(req).await,
            Err(rejection) => {
                tracing::debug!(path = %req.uri().path(), "Request rejected by rate limit");
                *rejection
            }
        }
    }
}
