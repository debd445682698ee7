//! Composition of fixed system routes and named resource controllers.
//!
//! Controllers are bound under a shared API prefix. The registry keeps the
//! controller names in registration order together with every route path it
//! has seen, which is what `/api/list` reports.
use std::collections::BTreeSet;

use axum::{Router, routing::MethodRouter};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Prefix every controller is mounted under
pub const API_V1_PREFIX: &str = "/api/v1";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("controller '{0}' is already registered")]
    DuplicateController(&'static str),

    #[error("route '{path}' of controller '{controller}' is already registered")]
    DuplicateRoute { controller: &'static str, path: String },
}

/// Route builder handed to a controller's binder. Paths are relative to the
/// API prefix.
pub struct ControllerRoutes<S> {
    prefix: String,
    router: Router<S>,
    paths: BTreeSet<String>,
}

impl<S> ControllerRoutes<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            router: Router::new(),
            paths: BTreeSet::new(),
        }
    }

    pub fn route(mut self, path: &str, method_router: MethodRouter<S>) -> Self {
        let full_path = format!("{}{}", self.prefix, path);
        self.router = self.router.route(&full_path, method_router);
        self.paths.insert(full_path);
        self
    }
}

/// A named bundle of routes.
pub struct ControllerRegistration<S> {
    pub name: &'static str,
    pub bind: fn(ControllerRoutes<S>) -> ControllerRoutes<S>,
}

impl<S> ControllerRegistration<S> {
    pub const fn new(
        name: &'static str,
        bind: fn(ControllerRoutes<S>) -> ControllerRoutes<S>,
    ) -> Self {
        Self { name, bind }
    }
}

/// What `/api/list` reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RouteCatalog {
    /// Controller names in registration order
    pub controllers: Vec<String>,
    /// Every registered path, sorted
    pub routes: Vec<String>,
}

pub struct RouteRegistry<S> {
    api_prefix: String,
    router: Router<S>,
    controllers: Vec<&'static str>,
    routes: BTreeSet<String>,
}

impl<S> RouteRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(api_prefix: impl Into<String>) -> Self {
        Self {
            api_prefix: api_prefix.into(),
            router: Router::new(),
            controllers: Vec::new(),
            routes: BTreeSet::new(),
        }
    }

    /// Add a fixed route outside the controller prefix.
    pub fn route(mut self, path: &str, method_router: MethodRouter<S>) -> Result<Self, RegistryError> {
        if !self.routes.insert(path.to_string()) {
            return Err(RegistryError::DuplicateRoute {
                controller: "system",
                path: path.to_string(),
            });
        }
        self.router = self.router.route(path, method_router);
        Ok(self)
    }

    /// Bind a controller once under the API prefix.
    pub fn register(mut self, registration: ControllerRegistration<S>) -> Result<Self, RegistryError> {
        let name = registration.name;
        if self.controllers.contains(&name) {
            return Err(RegistryError::DuplicateController(name));
        }

        let routes = (registration.bind)(ControllerRoutes::new(&self.api_prefix));
        if let Some(path) = routes.paths.iter().find(|p| self.routes.contains(*p)) {
            return Err(RegistryError::DuplicateRoute {
                controller: name,
                path: path.clone(),
            });
        }

        tracing::info!(controller = name, routes = routes.paths.len(), "Registered controller");
        self.routes.extend(routes.paths);
        self.router = self.router.merge(routes.router);
        self.controllers.push(name);
        Ok(self)
    }

    pub fn controllers(&self) -> &[&'static str] {
        &self.controllers
    }

    /// Freeze the registry into its router and catalogue.
    pub fn finish(self) -> (Router<S>, RouteCatalog) {
        let catalog = RouteCatalog {
            controllers: self.controllers.iter().map(|c| (*c).to_string()).collect(),
            routes: self.routes.into_iter().collect(),
        };
        (self.router, catalog)
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn widgets(routes: ControllerRoutes<()>) -> ControllerRoutes<()> {
        routes
            .route("/widgets", get(|| async { "widgets" }))
            .route("/widgets/{id}", get(|| async { "widget" }))
    }

    fn gadgets(routes: ControllerRoutes<()>) -> ControllerRoutes<()> {
        routes.route("/gadgets", get(|| async { "gadgets" }))
    }

    #[test]
    fn test_duplicate_controller_is_rejected() {
        let err = RouteRegistry::new(API_V1_PREFIX)
            .register(ControllerRegistration::new("widgets", widgets))
            .unwrap()
            .register(ControllerRegistration::new("widgets", gadgets))
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::DuplicateController("widgets"));
    }

    #[test]
    fn test_overlapping_route_is_rejected() {
        let err = RouteRegistry::new(API_V1_PREFIX)
            .register(ControllerRegistration::new("widgets", widgets))
            .unwrap()
            .register(ControllerRegistration::new("more-widgets", widgets))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RegistryError::DuplicateRoute { controller: "more-widgets", .. }
        ));
    }

    #[test]
    fn test_catalog_lists_controllers_and_routes() {
        let (_, catalog) = RouteRegistry::new(API_V1_PREFIX)
            .route("/healthz", get(|| async { "ok" }))
            .unwrap()
            .register(ControllerRegistration::new("gadgets", gadgets))
            .unwrap()
            .register(ControllerRegistration::new("widgets", widgets))
            .unwrap()
            .finish();

        assert_eq!(catalog.controllers, vec!["gadgets", "widgets"]);
        assert_eq!(
            catalog.routes,
            vec![
                "/api/v1/gadgets",
                "/api/v1/widgets",
                "/api/v1/widgets/{id}",
                "/healthz"
            ]
        );
    }

    #[tokio::test]
    async fn test_controllers_are_mounted_under_prefix() {
        let (router, _) = RouteRegistry::new(API_V1_PREFIX)
            .register(ControllerRegistration::new("widgets", widgets))
            .unwrap()
            .finish();

        let response = router
            .clone()
            .oneshot(
                http::Request::builder()
                    .uri("/api/v1/widgets/3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(http::Request::builder().uri("/widgets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
