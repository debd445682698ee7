use axum::{
    Json,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::{
        AppState, ControllerRegistration,
        error::{ApiError, ErrorBody},
        registry::ControllerRoutes,
    },
    ports::orchestrator::{ObjectSummary, Orchestrator, ResourceKind},
};

pub static KUBERNETES_TAG: &str = "kubernetes";

#[derive(Debug, Serialize, ToSchema)]
pub struct ObjectList {
    pub items: Vec<ObjectSummary>,
}

pub fn registration() -> ControllerRegistration<AppState> {
    ControllerRegistration::new("kubernetes", bind)
}

fn bind(routes: ControllerRoutes<AppState>) -> ControllerRoutes<AppState> {
    routes
        .route("/namespaces", get(list_namespaces))
        .route("/namespaces/{namespace}/{resource}", get(list_namespaced))
}

fn orchestrator(state: &AppState) -> Result<&dyn Orchestrator, ApiError> {
    state
        .deps
        .orchestrator
        .enabled()
        .map(|orchestrator| orchestrator.as_ref())
        .ok_or_else(|| ApiError::Unavailable("orchestrator is disabled".to_string()))
}

/// Namespaces from the watch cache.
#[utoipa::path(
    get,
    path = "/api/v1/namespaces",
    tag = KUBERNETES_TAG,
    responses(
        (status = 200, description = "Cached namespaces", body = ObjectList),
        (status = 404, description = "Namespaces are not watched", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_namespaces(State(state): State<AppState>) -> Result<Json<ObjectList>, ApiError> {
    let items = orchestrator(&state)?
        .list(ResourceKind::Namespaces, None)
        .await?;
    Ok(Json(ObjectList { items }))
}

/// Objects of one kind inside a namespace, from the watch cache.
#[utoipa::path(
    get,
    path = "/api/v1/namespaces/{namespace}/{resource}",
    tag = KUBERNETES_TAG,
    params(
        ("namespace" = String, Path, description = "Namespace name"),
        ("resource" = String, Path, description = "pods, services, deployments or configmaps")
    ),
    responses(
        (status = 200, description = "Cached objects", body = ObjectList),
        (status = 400, description = "Kind is not namespaced", body = ErrorBody),
        (status = 404, description = "Kind is not watched", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_namespaced(
    State(state): State<AppState>,
    Path((namespace, resource)): Path<(String, String)>,
) -> Result<Json<ObjectList>, ApiError> {
    let kind: ResourceKind = resource.parse()?;
    if !kind.is_namespaced() {
        return Err(ApiError::BadRequest(format!("'{kind}' is not a namespaced resource")));
    }
    let items = orchestrator(&state)?.list(kind, Some(&namespace)).await?;
    Ok(Json(ObjectList { items }))
}
