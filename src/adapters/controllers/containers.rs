use axum::{Json, extract::State, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::{
        AppState, ControllerRegistration,
        error::{ApiError, ErrorBody},
        registry::ControllerRoutes,
    },
    ports::container::ContainerSummary,
};

pub static CONTAINERS_TAG: &str = "containers";

#[derive(Debug, Serialize, ToSchema)]
pub struct ContainerList {
    pub items: Vec<ContainerSummary>,
}

pub fn registration() -> ControllerRegistration<AppState> {
    ControllerRegistration::new("containers", |routes: ControllerRoutes<AppState>| {
        routes.route("/containers", get(list_containers))
    })
}

/// Every container known to the engine, stopped ones included.
#[utoipa::path(
    get,
    path = "/api/v1/containers",
    tag = CONTAINERS_TAG,
    responses(
        (status = 200, description = "All containers", body = ContainerList),
        (status = 503, description = "Engine unreachable", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_containers(State(state): State<AppState>) -> Result<Json<ContainerList>, ApiError> {
    let runtime = state
        .deps
        .containers
        .enabled()
        .ok_or_else(|| ApiError::Unavailable("container runtime is disabled".to_string()))?;
    let items = runtime.list_containers().await?;
    Ok(Json(ContainerList { items }))
}
