//! Interceptors for each pipeline stage.
//!
//! The static asset stage lives in [`crate::core::static_assets`].
pub mod auth;
pub mod cors;
pub mod logging;
pub mod monitoring;
pub mod rate_limit;
pub mod request_info;
pub mod trace_context;

pub use auth::{AuthenticationInterceptor, AuthorizationInterceptor};
pub use cors::CorsInterceptor;
pub use logging::{LoggingInterceptor, RequestId};
pub use monitoring::MonitoringInterceptor;
pub use rate_limit::RateLimitInterceptor;
pub use request_info::RequestInfoInterceptor;
pub use trace_context::{TraceContextInterceptor, TraceId};
