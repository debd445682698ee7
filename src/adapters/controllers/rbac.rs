use axum::{Json, extract::State, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::{AppState, ControllerRegistration, error::ErrorBody, registry::ControllerRoutes},
    ports::authorization::ResourceRule,
};

pub static RBAC_TAG: &str = "rbac";

#[derive(Debug, Serialize, ToSchema)]
pub struct ResourceList {
    pub items: Vec<ResourceRule>,
}

pub fn registration() -> ControllerRegistration<AppState> {
    ControllerRegistration::new("rbac", |routes: ControllerRoutes<AppState>| {
        routes.route("/resources", get(list_resources))
    })
}

/// Resources and verbs known to the authorization policy.
#[utoipa::path(
    get,
    path = "/api/v1/resources",
    tag = RBAC_TAG,
    responses(
        (status = 200, description = "Resource catalogue", body = ResourceList),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_resources(State(state): State<AppState>) -> Json<ResourceList> {
    Json(ResourceList {
        items: state.authorizer.resources(),
    })
}
