pub mod auth;
pub mod authorization;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod provisioner;
pub mod rate_limiter;
pub mod registry;
pub mod request_info;
pub mod services;
pub mod state;
pub mod static_assets;

pub use lifecycle::{DrainOutcome, LifecycleManager};
pub use pipeline::{Interceptor, Pipeline, Stage};
pub use provisioner::{Feature, ProvisionError, ProvisionedDependencies, SubsystemProvisioner};
pub use registry::{ControllerRegistration, RouteCatalog, RouteRegistry};
pub use state::AppState;
pub use static_assets::StaticAssetResolver;
