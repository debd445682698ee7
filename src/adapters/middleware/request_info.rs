use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response};

use crate::core::{
    pipeline::{Interceptor, Stage},
    request_info::RequestInfoFactory,
};

/// Attaches the parsed [`RequestInfo`](crate::core::request_info::RequestInfo)
/// to the request extensions.
pub struct RequestInfoInterceptor {
    factory: RequestInfoFactory,
}

impl RequestInfoInterceptor {
    pub fn new(factory: RequestInfoFactory) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl Interceptor for RequestInfoInterceptor {
    fn stage(&self) -> Stage {
        Stage::RequestInfo
    }

    async fn intercept(&self, mut req: Request, next: Next) -> Response {
        let info = self.factory.parse(req.method(), req.uri().path());
        req.extensions_mut().insert(info);
        next.run(req).await
    }
}
