use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::{
    config::AppConfig,
    core::{
        auth::JwtService, provisioner::ProvisionedDependencies, registry::RouteCatalog,
        static_assets::StaticAssetResolver,
    },
    ports::authorization::Authorizer,
    utils::ShutdownToken,
};

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub deps: Arc<ProvisionedDependencies>,
    pub jwt: Arc<JwtService>,
    pub authorizer: Arc<dyn Authorizer>,
    pub assets: Arc<StaticAssetResolver>,
    pub catalog: Arc<RouteCatalog>,
    pub metrics: PrometheusHandle,
    pub shutdown: ShutdownToken,
}

impl AppState {
    /// Liveness as reported by `/healthz`: false once shutdown has begun.
    pub fn is_live(&self) -> bool {
        !self.shutdown.is_shutdown_initiated()
    }
}
