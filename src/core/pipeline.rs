//! The ordered middleware pipeline.
//!
//! Every request traverses the stages in the order of [`Stage`]:
//!
//! 1. rate limiting
//! 2. static asset resolution
//! 3. monitoring
//! 4. CORS
//! 5. request-context enrichment
//! 6. logging
//! 7. authentication
//! 8. authorization
//! 9. tracing
//!
//! The order is a correctness invariant, so it is enforced when the pipeline is
//! built: [`PipelineBuilder::register`] rejects an interceptor that would land
//! outside its slot. Any interceptor may answer on its own instead of calling
//! `next`, which skips every later stage.
use std::{fmt, sync::Arc};

use async_trait::async_trait;
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use thiserror::Error;

/// Slots of the pipeline, declared in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    RateLimit,
    StaticAssets,
    Monitoring,
    Cors,
    RequestInfo,
    Logging,
    Authentication,
    Authorization,
    Tracing,
}

impl Stage {
    pub const ORDER: [Stage; 9] = [
        Stage::RateLimit,
        Stage::StaticAssets,
        Stage::Monitoring,
        Stage::Cors,
        Stage::RequestInfo,
        Stage::Logging,
        Stage::Authentication,
        Stage::Authorization,
        Stage::Tracing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::RateLimit => "rate-limit",
            Stage::StaticAssets => "static-assets",
            Stage::Monitoring => "monitoring",
            Stage::Cors => "cors",
            Stage::RequestInfo => "request-info",
            Stage::Logging => "logging",
            Stage::Authentication => "authentication",
            Stage::Authorization => "authorization",
            Stage::Tracing => "tracing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One request interceptor bound to a pipeline slot.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    fn stage(&self) -> Stage;

    /// Either answer the request or pass it on with `next.run(req)`.
    async fn intercept(&self, req: Request, next: Next) -> Response;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("stage '{0}' is already registered")]
    DuplicateStage(Stage),

    #[error("stage '{stage}' cannot be registered after '{after}'")]
    OutOfOrder { stage: Stage, after: Stage },

    #[error("stage '{stage}' requires '{requires}' to be registered first")]
    MissingDependency { stage: Stage, requires: Stage },
}

#[derive(Default)]
pub struct PipelineBuilder {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor. Stages must be registered in ascending order,
    /// each at most once. Stages may be left out, except that authorization
    /// is only accepted after authentication.
    pub fn register(mut self, interceptor: Arc<dyn Interceptor>) -> Result<Self, PipelineError> {
        let stage = interceptor.stage();
        if let Some(last) = self.interceptors.last().map(|i| i.stage()) {
            if last == stage {
                return Err(PipelineError::DuplicateStage(stage));
            }
            if last > stage {
                return Err(PipelineError::OutOfOrder { stage, after: last });
            }
        }
        if stage == Stage::Authorization && !self.has(Stage::Authentication) {
            return Err(PipelineError::MissingDependency {
                stage,
                requires: Stage::Authentication,
            });
        }
        self.interceptors.push(interceptor);
        Ok(self)
    }

    fn has(&self, stage: Stage) -> bool {
        self.interceptors.iter().any(|i| i.stage() == stage)
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            interceptors: self.interceptors.into(),
        }
    }
}

/// A frozen, ordered chain of interceptors.
#[derive(Clone)]
pub struct Pipeline {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.interceptors.iter().map(|i| i.stage()).collect()
    }

    /// Wrap every route of `router`, fallback included, with the chain.
    ///
    /// The last layer added runs first, so the stages are layered in reverse.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.interceptors
            .iter()
            .rev()
            .fold(router, |router, interceptor| {
                let interceptor = interceptor.clone();
                router.layer(middleware::from_fn(move |req: Request, next: Next| {
                    let interceptor = interceptor.clone();
                    async move { interceptor.intercept(req, next).await }
                }))
            })
    }
}
