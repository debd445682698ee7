//! Composition root for the HTTP surface: pipeline, routes and shared state.
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Request, State},
    http::Method,
    response::{IntoResponse, Response},
};
use eyre::{Result, WrapErr, eyre};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::compression::CompressionLayer;

use crate::{
    adapters::{
        assets::{DiskDirectory, EmbeddedBundle},
        controllers, middleware, system_routes,
    },
    config::{AppConfig, RunMode},
    core::{
        AppState, Pipeline, ProvisionedDependencies, RouteRegistry, StaticAssetResolver,
        auth::JwtService,
        authorization::RoleAuthorizer,
        error::ApiError,
        rate_limiter::RateLimitRules,
        registry::API_V1_PREFIX,
        request_info::RequestInfoFactory,
        static_assets::asset_response,
    },
    ports::{assets::AssetSource, authorization::Authorizer},
    utils::ShutdownToken,
};

/// The embedded bundle in release mode, the configured directory otherwise.
pub fn asset_source(config: &AppConfig) -> Arc<dyn AssetSource> {
    match config.server.env {
        RunMode::Release => Arc::new(EmbeddedBundle::new()),
        RunMode::Development => Arc::new(DiskDirectory::new(&config.server.static_dir)),
    }
}

/// Everything the router needs besides the provisioned dependencies.
pub struct AppParts {
    pub config: Arc<AppConfig>,
    pub deps: Arc<ProvisionedDependencies>,
    pub assets: Arc<dyn AssetSource>,
    pub metrics: PrometheusHandle,
    pub shutdown: ShutdownToken,
}

/// Build the full application router.
///
/// Routes are registered first so the catalogue is complete before the state
/// is frozen; the pipeline then wraps every route and the fallback.
pub fn build_app(parts: AppParts) -> Result<Router> {
    let AppParts {
        config,
        deps,
        assets,
        metrics,
        shutdown,
    } = parts;
    let mode = config.server.env;

    let mut registry = system_routes::register(RouteRegistry::new(API_V1_PREFIX), mode)
        .wrap_err("failed to mount system routes")?;
    for registration in controllers::registrations(&deps) {
        registry = registry
            .register(registration)
            .wrap_err("failed to register controller")?;
    }
    let (router, catalog) = registry.finish();
    tracing::info!(
        controllers = ?catalog.controllers,
        routes = catalog.routes.len(),
        "Routes registered"
    );

    let jwt = Arc::new(JwtService::new(
        &config.server.jwt_secret,
        Duration::from_secs(config.server.token_ttl_secs),
    ));
    let authorizer: Arc<dyn Authorizer> = Arc::new(RoleAuthorizer::new(controllers::RESOURCES));
    let resolver = Arc::new(StaticAssetResolver::new(assets, mode));
    let rules = RateLimitRules::from_config(&config.server.rate_limits)
        .map_err(|e| eyre!("invalid rate limit rules: {e}"))?;
    let factory = RequestInfoFactory::default();

    let pipeline = Pipeline::builder()
        .register(Arc::new(middleware::RateLimitInterceptor::new(rules)))?
        .register(resolver.clone())?
        .register(Arc::new(middleware::MonitoringInterceptor))?
        .register(Arc::new(middleware::CorsInterceptor::new(&config.cors)?))?
        .register(Arc::new(middleware::RequestInfoInterceptor::new(factory.clone())))?
        .register(Arc::new(middleware::LoggingInterceptor))?
        .register(Arc::new(middleware::AuthenticationInterceptor::new(
            jwt.clone(),
            deps.services.users.clone(),
        )))?
        .register(Arc::new(middleware::AuthorizationInterceptor::new(
            authorizer.clone(),
            factory,
        )))?
        .register(Arc::new(middleware::TraceContextInterceptor))?
        .build();
    tracing::debug!(stages = ?pipeline.stages(), "Middleware pipeline built");

    let state = AppState {
        config,
        deps,
        jwt,
        authorizer,
        assets: resolver,
        catalog: Arc::new(catalog),
        metrics,
        shutdown,
    };

    let router = pipeline
        .apply(router.fallback(spa_fallback))
        .with_state(state)
        .layer(CompressionLayer::new());
    Ok(router)
}

/// Client-side routes get the entry document; unknown API paths get a 404.
async fn spa_fallback(State(state): State<AppState>, req: Request) -> Response {
    let path = req.uri().path();
    let is_api = path == "/api" || path.starts_with("/api/");
    let method = req.method();

    if !is_api && (method == Method::GET || method == Method::HEAD) {
        if let Some(document) = state.assets.entry_document().await {
            return asset_response(document, method);
        }
    }
    ApiError::NotFound(format!("no route for {method} {path}")).into_response()
}
