use axum::{Json, extract::State, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::{
        AppState, ControllerRegistration,
        error::{ApiError, ErrorBody},
        registry::ControllerRoutes,
    },
    ports::repository::Group,
};

pub static GROUPS_TAG: &str = "groups";

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupList {
    pub items: Vec<Group>,
}

pub fn registration() -> ControllerRegistration<AppState> {
    ControllerRegistration::new("groups", |routes: ControllerRoutes<AppState>| {
        routes.route("/groups", get(list_groups))
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = GROUPS_TAG,
    responses(
        (status = 200, description = "All groups", body = GroupList),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_groups(State(state): State<AppState>) -> Result<Json<GroupList>, ApiError> {
    let items = state.deps.services.groups.list().await?;
    Ok(Json(GroupList { items }))
}
