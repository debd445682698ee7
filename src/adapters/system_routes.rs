//! Fixed operational routes mounted outside the controller prefix.
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tokio::time::timeout;
use utoipa::{
    Modify, OpenApi, ToSchema,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    adapters::controllers,
    config::RunMode,
    core::{
        AppState, RouteCatalog, RouteRegistry,
        auth::Identity,
        error::{ApiError, ErrorBody},
        provisioner::READINESS_TIMEOUT,
        registry::{API_V1_PREFIX, RegistryError},
    },
    ports::{
        authorization::ResourceRule,
        container::ContainerSummary,
        orchestrator::{ObjectSummary, ResourceKind},
        repository::{Group, Post, User},
    },
};

pub static SYSTEM_TAG: &str = "system";

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// False once shutdown has begun
    pub ping: bool,
    pub db_repository: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_time: &'static str,
}

/// Landing document of the API.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIndex {
    pub name: &'static str,
    pub version: &'static str,
    /// Controller prefix
    pub api: &'static str,
    /// Route catalogue
    pub routes: &'static str,
    /// Swagger UI, absent in release mode
    pub docs: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    pub profile: String,
    pub workers: usize,
    pub alive_tasks: usize,
    pub global_queue_depth: usize,
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "keel", description = "Admin dashboard backend"),
    paths(
        healthz,
        version,
        api_index,
        api_list,
        controllers::auth::issue_token,
        controllers::auth::list_providers,
        controllers::auth::current_identity,
        controllers::users::list_users,
        controllers::users::get_user,
        controllers::groups::list_groups,
        controllers::posts::list_posts,
        controllers::rbac::list_resources,
        controllers::containers::list_containers,
        controllers::kubernetes::list_namespaces,
        controllers::kubernetes::list_namespaced,
    ),
    components(schemas(
        ErrorBody,
        Health,
        VersionInfo,
        ServiceIndex,
        RouteCatalog,
        Identity,
        User,
        Group,
        Post,
        ResourceRule,
        ContainerSummary,
        ObjectSummary,
        ResourceKind,
    )),
    modifiers(&BearerSecurity)
)]
pub struct ApiDoc;

/// Mount the system routes. Documentation is left out in release mode.
pub fn register(
    registry: RouteRegistry<AppState>,
    mode: RunMode,
) -> Result<RouteRegistry<AppState>, RegistryError> {
    let registry = registry
        .route("/healthz", get(healthz))?
        .route("/version", get(version))?
        .route("/metrics", get(metrics))?
        .route("/api/index", get(api_index))?
        .route("/api/list", get(api_list))?
        .route("/debug/pprof/", get(runtime_stats_index))?
        .route("/debug/pprof/{*profile}", get(runtime_stats))?;

    if mode == RunMode::Release {
        return Ok(registry);
    }
    registry
        .route("/swagger/", get(swagger_ui))?
        .route("/swagger/openapi.json", get(openapi_document))
}

/// Liveness together with storage readiness.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = SYSTEM_TAG,
    responses((status = 200, description = "Health report", body = Health))
)]
pub async fn healthz(State(state): State<AppState>) -> Json<Health> {
    let db_repository = match timeout(READINESS_TIMEOUT, state.deps.repository.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Storage ping failed");
            false
        }
        Err(_) => {
            tracing::warn!(timeout = ?READINESS_TIMEOUT, "Storage ping timed out");
            false
        }
    };
    Json(Health {
        ping: state.is_live(),
        db_repository,
    })
}

#[utoipa::path(
    get,
    path = "/version",
    tag = SYSTEM_TAG,
    responses((status = 200, description = "Build metadata", body = VersionInfo))
)]
pub async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("KEEL_GIT_HASH"),
        build_time: env!("KEEL_BUILD_TIME"),
    })
}

async fn metrics(State(state): State<AppState>) -> Response {
    let mut response = state.metrics.render().into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE),
    );
    response
}

#[utoipa::path(
    get,
    path = "/api/index",
    tag = SYSTEM_TAG,
    responses((status = 200, description = "Where to find the API", body = ServiceIndex))
)]
pub async fn api_index(State(state): State<AppState>) -> Json<ServiceIndex> {
    Json(ServiceIndex {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        api: API_V1_PREFIX,
        routes: "/api/list",
        docs: (!state.config.server.env.is_release()).then_some("/swagger/"),
    })
}

/// Registered controllers and every mounted path.
#[utoipa::path(
    get,
    path = "/api/list",
    tag = SYSTEM_TAG,
    responses((status = 200, description = "Route catalogue", body = RouteCatalog))
)]
pub async fn api_list(State(state): State<AppState>) -> Json<RouteCatalog> {
    Json(state.catalog.as_ref().clone())
}

fn collect_runtime_stats(profile: String) -> RuntimeStats {
    let metrics = tokio::runtime::Handle::current().metrics();
    RuntimeStats {
        profile,
        workers: metrics.num_workers(),
        alive_tasks: metrics.num_alive_tasks(),
        global_queue_depth: metrics.global_queue_depth(),
    }
}

async fn runtime_stats_index() -> Json<RuntimeStats> {
    Json(collect_runtime_stats("runtime".to_string()))
}

async fn runtime_stats(Path(profile): Path<String>) -> Result<Json<RuntimeStats>, ApiError> {
    match profile.trim_end_matches('/') {
        "" | "runtime" | "goroutine" | "heap" => Ok(Json(collect_runtime_stats(profile))),
        other => Err(ApiError::NotFound(format!("unknown profile '{other}'"))),
    }
}

async fn openapi_document() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_PAGE)
}

// The UI assets come from the unpkg CDN and need outbound network access.
// The OpenAPI document is always served locally.
const SWAGGER_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>keel API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: "/swagger/openapi.json", dom_id: "#swagger-ui" });
    };
  </script>
</body>
</html>
"##;
